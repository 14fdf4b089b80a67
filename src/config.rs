use std::path::PathBuf;

use chrono::Duration;
use clap::Parser;
use tui_dispatch_debug::DebugCliArgs;

use crate::api::{API_BASE, GROUP_INDEX_CONCURRENCY};
use crate::cache::{CacheSettings, DEFAULT_BATCH_SIZE, DEFAULT_TTL_HOURS};
use crate::store::StoreKind;
use crate::window::DEFAULT_PAGE_SIZE;

const APP_DIR: &str = "pokedex";

#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "Browse the PokeAPI catalog with cached, filterable, incremental paging")]
pub struct Cli {
    /// PokeAPI base URL
    #[arg(long, env = "POKEDEX_API_BASE", default_value = API_BASE)]
    pub api_base: String,

    /// Rows added to the list per growth step
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Detail requests issued concurrently during population
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Age after which the persisted catalog is refetched
    #[arg(long, default_value_t = DEFAULT_TTL_HOURS, value_parser = clap::value_parser!(i64).range(1..))]
    pub ttl_hours: i64,

    #[arg(long, value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,

    /// Directory for the persisted catalog (defaults to the user cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Concurrent requests while indexing version groups
    #[arg(long, default_value_t = GROUP_INDEX_CONCURRENCY)]
    pub group_concurrency: usize,

    /// tracing filter directive, e.g. `info` or `pokedex::cache=debug`
    #[arg(long, env = "POKEDEX_LOG", default_value = "info")]
    pub log_level: String,

    /// Log file (defaults to `pokedex.log` in the cache dir)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub debug: DebugCliArgs,
}

impl Cli {
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            batch_size: self.batch_size,
            ttl: Duration::hours(self.ttl_hours),
            ..CacheSettings::default()
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs_next::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.cache_root().join("pokedex.log"))
    }
}
