//! Runs effects against the catalog services and maps the outcome to the
//! completion action the reducer expects.

use std::sync::Arc;

use tui_dispatch::TaskKey;

use crate::action::Action;
use crate::api::{MembershipSource, RemoteCatalogSource};
use crate::cache::{CacheSettings, CatalogCache};
use crate::effect::Effect;
use crate::membership::MembershipDirectory;
use crate::store::PersistentCacheStore;

#[derive(Clone)]
pub struct Services {
    cache: CatalogCache,
    directory: Arc<MembershipDirectory>,
    source: Arc<dyn RemoteCatalogSource>,
}

impl Services {
    pub fn new(
        source: Arc<dyn RemoteCatalogSource>,
        membership: Arc<dyn MembershipSource>,
        store: Arc<dyn PersistentCacheStore>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            cache: CatalogCache::new(source.clone(), store, settings),
            directory: Arc::new(MembershipDirectory::new(membership)),
            source,
        }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    pub fn task_key(effect: &Effect) -> TaskKey {
        match effect {
            Effect::LoadSnapshot => TaskKey::new("snapshot"),
            Effect::LoadPage(request) => TaskKey::new(format!("page_{}", request.offset)),
            Effect::LoadTypes => TaskKey::new("types"),
            Effect::LoadGroups => TaskKey::new("groups"),
            Effect::LoadMembership { group_id } => TaskKey::new(format!("membership_{group_id}")),
            Effect::ClearCache => TaskKey::new("cache_clear"),
        }
    }

    pub async fn run(self, effect: Effect) -> Action {
        match effect {
            Effect::LoadSnapshot => match self.cache.get_snapshot().await {
                Ok(snapshot) => Action::SnapshotDidLoad(snapshot),
                Err(err) => Action::SnapshotDidError(err.to_string()),
            },
            Effect::LoadPage(request) => {
                match self.cache.load_page(request.limit, request.offset).await {
                    Ok(page) => Action::PageDidLoad {
                        request,
                        snapshot: page.snapshot,
                        listed: page.listed,
                        has_next: page.has_next,
                    },
                    Err(err) => Action::PageDidError {
                        request,
                        error: err.to_string(),
                    },
                }
            }
            Effect::LoadTypes => match self.source.list_tags().await {
                Ok(types) => Action::TypesDidLoad(types),
                Err(err) => Action::TypesDidError(err.to_string()),
            },
            Effect::LoadGroups => match self.directory.buckets().await {
                Ok(buckets) => Action::GroupsDidLoad(buckets),
                Err(err) => Action::GroupsDidError(err.to_string()),
            },
            Effect::LoadMembership { group_id } => match self.directory.group(group_id).await {
                Ok(group) => Action::MembershipDidLoad(group.as_ref().clone()),
                Err(err) => Action::MembershipDidError {
                    group_id,
                    error: err.to_string(),
                },
            },
            Effect::ClearCache => {
                self.cache.clear().await;
                Action::CacheDidClear(self.cache.snapshot())
            }
        }
    }
}
