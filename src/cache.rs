//! Authoritative catalog snapshot with deduplicated population.
//!
//! A population is a shared future: the first caller that finds the snapshot
//! missing or stale creates it, every later caller awaits a clone of the same
//! handle, and the handle is dropped when it settles so a failed attempt can be
//! retried on the next access. Raw pages loaded for incremental browsing merge
//! into the same snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures_util::future::{join_all, BoxFuture, Shared};
use futures_util::FutureExt;

use crate::api::{ListItem, RemoteCatalogSource};
use crate::entity::{CachedCatalogRecord, CatalogEntity, CatalogSnapshot};
use crate::error::{CatalogError, Result};
use crate::store::PersistentCacheStore;

pub const CATALOG_KEY: &str = "catalog-snapshot";
pub const DEFAULT_BATCH_SIZE: usize = 30;
pub const DEFAULT_TTL_HOURS: i64 = 24;

type Population = Shared<BoxFuture<'static, Result<Arc<CatalogSnapshot>>>>;

#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub batch_size: usize,
    pub ttl: Duration,
    pub key: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            key: CATALOG_KEY.to_string(),
        }
    }
}

/// Result of merging one raw list page into the snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PageLoad {
    pub snapshot: Arc<CatalogSnapshot>,
    /// Rows the list page returned, fetched or not.
    pub listed: usize,
    pub added: usize,
    pub has_next: bool,
}

#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    source: Arc<dyn RemoteCatalogSource>,
    store: Arc<dyn PersistentCacheStore>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    snapshot: Arc<CatalogSnapshot>,
    in_flight: Option<Population>,
    revision: u64,
    /// Bumped by `clear()`; populations started under an older value do not install.
    generation: u64,
    storage_degraded: bool,
}

enum Access {
    Hit(Arc<CatalogSnapshot>),
    Wait(Population),
}

/// What a population produced before it is installed.
struct Populated {
    entities: Vec<CatalogEntity>,
    dropped: usize,
    captured_at: DateTime<Utc>,
    from_store: bool,
}

impl CatalogCache {
    pub fn new(
        source: Arc<dyn RemoteCatalogSource>,
        store: Arc<dyn PersistentCacheStore>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                store,
                settings,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Current snapshot without triggering any work.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.lock().snapshot.clone()
    }

    pub fn is_populating(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// True once a storage failure pushed the cache into memory-only mode.
    pub fn storage_degraded(&self) -> bool {
        self.lock().storage_degraded || !self.inner.store.is_durable()
    }

    /// Returns a complete, fresh snapshot, populating it if needed. Concurrent
    /// callers share one population attempt.
    pub async fn get_snapshot(&self) -> Result<Arc<CatalogSnapshot>> {
        match self.access() {
            Access::Hit(snapshot) => Ok(snapshot),
            Access::Wait(population) => population.await,
        }
    }

    fn access(&self) -> Access {
        let mut state = self.lock();
        if state.snapshot.complete && state.snapshot.is_fresh(Utc::now(), self.inner.settings.ttl)
        {
            tracing::debug!(revision = state.snapshot.revision, "snapshot cache hit");
            return Access::Hit(state.snapshot.clone());
        }
        match &state.in_flight {
            Some(population) => Access::Wait(population.clone()),
            None => {
                let population = self.clone().populate(state.generation).boxed().shared();
                state.in_flight = Some(population.clone());
                Access::Wait(population)
            }
        }
    }

    /// Drops the in-memory snapshot and the persisted record.
    ///
    /// A population already running is not cancelled: it finishes without
    /// installing or persisting anything, and its waiters are handed to the
    /// population of the new generation. Until it settles it may overlap with
    /// that newer population; this is the only case with two in flight.
    pub async fn clear(&self) {
        {
            let mut state = self.lock();
            state.generation += 1;
            state.revision += 1;
            state.in_flight = None;
            state.snapshot = Arc::new(CatalogSnapshot::empty(state.revision));
        }
        if let Err(err) = self.inner.store.delete(&self.inner.settings.key).await {
            self.degrade(&err);
        }
        tracing::info!("catalog cache cleared");
    }

    /// Fetches one raw list page and merges its entities into the snapshot.
    pub async fn load_page(&self, limit: usize, offset: usize) -> Result<PageLoad> {
        {
            let state = self.lock();
            if state.snapshot.complete {
                return Ok(PageLoad {
                    snapshot: state.snapshot.clone(),
                    listed: 0,
                    added: 0,
                    has_next: false,
                });
            }
        }

        let page = self.inner.source.list_page(limit, offset).await?;
        let listed = page.items.len();
        let (entities, dropped) = self.fetch_batched(&page.items).await;
        if dropped > 0 {
            tracing::warn!(offset, dropped, "page loaded partially");
        }

        let mut state = self.lock();
        let mut snapshot = (*state.snapshot).clone();
        let added = snapshot.merge(entities);
        if added > 0 {
            state.revision += 1;
            snapshot.revision = state.revision;
            state.snapshot = Arc::new(snapshot);
        }
        let has_next = page.has_next && !state.snapshot.complete;
        tracing::debug!(offset, listed, added, has_next, "page merged");
        Ok(PageLoad {
            snapshot: state.snapshot.clone(),
            listed,
            added,
            has_next,
        })
    }

    async fn populate(self, generation: u64) -> Result<Arc<CatalogSnapshot>> {
        let outcome = self.run_population(generation).await;
        if let Some(installed) = self.install(generation, outcome) {
            return installed;
        }
        tracing::debug!("population superseded by clear; waiters join the current one");
        match self.access() {
            Access::Hit(snapshot) => Ok(snapshot),
            Access::Wait(population) => population.await,
        }
    }

    /// Installs a finished population. `None` when `clear()` ran in between.
    fn install(
        &self,
        generation: u64,
        outcome: Result<Populated>,
    ) -> Option<Result<Arc<CatalogSnapshot>>> {
        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }
        state.in_flight = None;
        let populated = match outcome {
            Ok(populated) => populated,
            Err(err) => return Some(Err(err)),
        };

        // Pages merged before the first population stay; a refresh replaces
        // the previous complete snapshot outright.
        let mut snapshot = if state.snapshot.complete {
            CatalogSnapshot::from_entities(populated.entities, populated.captured_at)
        } else {
            let mut snapshot = (*state.snapshot).clone();
            snapshot.merge(populated.entities);
            snapshot
        };
        snapshot.complete = true;
        snapshot.dropped = populated.dropped;
        snapshot.captured_at = populated.captured_at;
        state.revision += 1;
        snapshot.revision = state.revision;
        let snapshot = Arc::new(snapshot);
        state.snapshot = snapshot.clone();
        tracing::info!(
            entities = snapshot.len(),
            dropped = snapshot.dropped,
            from_store = populated.from_store,
            "catalog snapshot installed"
        );
        Some(Ok(snapshot))
    }

    async fn run_population(&self, generation: u64) -> Result<Populated> {
        if let Some(record) = self.load_persisted().await {
            return Ok(Populated {
                entities: record.entities,
                dropped: 0,
                captured_at: record.captured_at,
                from_store: true,
            });
        }

        tracing::info!("populating catalog from source");
        let source = &self.inner.source;
        let probe = source.list_page(1, 0).await?;
        let items = if probe.total_count == 0 {
            Vec::new()
        } else {
            source.list_page(probe.total_count, 0).await?.items
        };

        let (entities, dropped) = self.fetch_batched(&items).await;
        if dropped > 0 {
            tracing::warn!(
                requested = items.len(),
                dropped,
                "partial population; failed entities omitted"
            );
        }

        let populated = Populated {
            entities,
            dropped,
            captured_at: Utc::now(),
            from_store: false,
        };
        self.persist(&populated, generation).await;
        Ok(populated)
    }

    /// Sequential batches, concurrent within a batch; failures are dropped.
    async fn fetch_batched(&self, items: &[ListItem]) -> (Vec<CatalogEntity>, usize) {
        let batch_size = self.inner.settings.batch_size.max(1);
        let mut entities = Vec::with_capacity(items.len());
        let mut dropped = 0;
        for batch in items.chunks(batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|item| self.inner.source.fetch_detail(&item.detail_url)),
            )
            .await;
            for (item, result) in batch.iter().zip(results) {
                match result {
                    Ok(entity) => entities.push(entity),
                    Err(err) => {
                        dropped += 1;
                        tracing::warn!(id = item.id, error = %err, "detail fetch failed");
                    }
                }
            }
        }
        (entities, dropped)
    }

    async fn load_persisted(&self) -> Option<CachedCatalogRecord> {
        let key = &self.inner.settings.key;
        let raw = match self.inner.store.read(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                self.degrade(&err);
                return None;
            }
        };

        let record: CachedCatalogRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable catalog record");
                self.discard_persisted().await;
                return None;
            }
        };

        if record.is_expired(Utc::now(), self.inner.settings.ttl) {
            tracing::info!(captured_at = %record.captured_at, "catalog record expired");
            self.discard_persisted().await;
            return None;
        }
        tracing::debug!(entities = record.entities.len(), "catalog record adopted");
        Some(record)
    }

    async fn discard_persisted(&self) {
        if let Err(err) = self.inner.store.delete(&self.inner.settings.key).await {
            self.degrade(&err);
        }
    }

    async fn persist(&self, populated: &Populated, generation: u64) {
        {
            let state = self.lock();
            if state.storage_degraded || state.generation != generation {
                return;
            }
        }
        let record = CachedCatalogRecord {
            entities: populated.entities.clone(),
            captured_at: populated.captured_at,
        };
        let raw = match serde_json::to_string(&record) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "catalog record not serializable");
                return;
            }
        };
        if let Err(err) = self.inner.store.write(&self.inner.settings.key, &raw).await {
            self.degrade(&err);
        }
    }

    fn degrade(&self, err: &CatalogError) {
        let mut state = self.lock();
        if !state.storage_degraded {
            tracing::warn!(error = %err, "persistent cache unavailable; memory-only for this session");
        }
        state.storage_degraded = true;
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
