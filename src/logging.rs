use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::SetupError;

/// Routes tracing output to `path`; the terminal belongs to the UI.
pub fn init_logging(directive: &str, path: &Path) -> Result<(), SetupError> {
    let env_filter = EnvFilter::try_new(directive)
        .map_err(|err| SetupError::Logger(format!("invalid log level '{directive}': {err}")))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|err| SetupError::Logger(err.to_string()))?;

    Ok(())
}
