#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pokedex::api::{
    GroupMember, GroupSummary, ListItem, ListPage, MembershipSource, RemoteCatalogSource,
};
use pokedex::entity::{CatalogEntity, CatalogSnapshot};
use pokedex::error::{CatalogError, Result};
use pokedex::store::PersistentCacheStore;

pub fn entity(id: u32, name: &str, tags: &[&str]) -> CatalogEntity {
    CatalogEntity::new(id, name, tags.iter().map(|tag| tag.to_string()).collect())
}

pub fn numbered(count: u32) -> Vec<CatalogEntity> {
    (1..=count)
        .map(|id| entity(id, &format!("mon-{id}"), &["normal"]))
        .collect()
}

pub fn ids(entities: &[CatalogEntity]) -> Vec<u32> {
    entities.iter().map(|entity| entity.id).collect()
}

pub fn complete_snapshot(entities: Vec<CatalogEntity>, revision: u64) -> CatalogSnapshot {
    let mut snapshot = CatalogSnapshot::from_entities(entities, Utc::now());
    snapshot.complete = true;
    snapshot.revision = revision;
    snapshot
}

fn index(entities: Vec<CatalogEntity>) -> BTreeMap<u32, CatalogEntity> {
    entities.into_iter().map(|entity| (entity.id, entity)).collect()
}

/// In-memory catalog source with call counters and failure injection.
pub struct MockCatalog {
    entities: Mutex<BTreeMap<u32, CatalogEntity>>,
    /// Extra listing rows repeating ids that are already listed.
    duplicates: Vec<u32>,
    failing: Mutex<HashSet<u32>>,
    fail_listing: AtomicBool,
    delay: Option<Duration>,
    detail_delay: Option<Duration>,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    details_in_flight: AtomicUsize,
    max_details_in_flight: AtomicUsize,
    /// `(started, id)` in the order detail fetches started and finished.
    detail_events: Mutex<Vec<(bool, u32)>>,
}

impl MockCatalog {
    pub fn new(entities: Vec<CatalogEntity>) -> Self {
        Self {
            entities: Mutex::new(index(entities)),
            duplicates: Vec::new(),
            failing: Mutex::new(HashSet::new()),
            fail_listing: AtomicBool::new(false),
            delay: None,
            detail_delay: None,
            list_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            details_in_flight: AtomicUsize::new(0),
            max_details_in_flight: AtomicUsize::new(0),
            detail_events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    /// Swaps the upstream catalog, e.g. to simulate a changed dataset.
    pub fn replace(&self, entities: Vec<CatalogEntity>) {
        *self.entities.lock().unwrap() = index(entities);
    }

    pub fn max_details_in_flight(&self) -> usize {
        self.max_details_in_flight.load(Ordering::SeqCst)
    }

    pub fn detail_events(&self) -> Vec<(bool, u32)> {
        self.detail_events.lock().unwrap().clone()
    }

    pub fn with_duplicates(mut self, ids: &[u32]) -> Self {
        self.duplicates = ids.to_vec();
        self
    }

    pub fn with_failing(self, ids: &[u32]) -> Self {
        self.failing.lock().unwrap().extend(ids.iter().copied());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.fail_listing.store(fails, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    fn rows(&self) -> Vec<u32> {
        let mut rows: Vec<u32> = self.entities.lock().unwrap().keys().copied().collect();
        rows.extend(self.duplicates.iter().copied());
        rows
    }
}

#[async_trait]
impl RemoteCatalogSource for MockCatalog {
    async fn list_page(&self, limit: usize, offset: usize) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(CatalogError::SourceUnavailable("listing offline".to_string()));
        }
        let rows = self.rows();
        let items = rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|id| ListItem {
                id: *id,
                detail_url: format!("mock://pokemon/{id}"),
            })
            .collect();
        Ok(ListPage {
            items,
            total_count: rows.len(),
            has_next: offset + limit < rows.len(),
        })
    }

    async fn fetch_detail(&self, detail_url: &str) -> Result<CatalogEntity> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let id = pokedex::api::id_from_url(detail_url).ok_or_else(|| CatalogError::Malformed {
            url: detail_url.to_string(),
            reason: "no id".to_string(),
        })?;
        self.detail_events.lock().unwrap().push((true, id));
        let running = self.details_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_details_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.detail_delay {
            tokio::time::sleep(delay).await;
        }
        self.details_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.detail_events.lock().unwrap().push((false, id));

        if self.failing.lock().unwrap().contains(&id) {
            return Err(CatalogError::SourceUnavailable(format!("detail {id} failed")));
        }
        self.entities
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::SourceUnavailable(format!("unknown id {id}")))
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .entities
            .lock()
            .unwrap()
            .values()
            .flat_map(|entity| entity.tags.iter().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tags.sort();
        Ok(tags)
    }
}

/// Version groups with fixed members.
pub struct MockGroups {
    groups: Vec<GroupSummary>,
    members: HashMap<u32, Vec<GroupMember>>,
    delay: Option<Duration>,
    pub member_calls: AtomicUsize,
}

impl MockGroups {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            members: HashMap::new(),
            delay: None,
            member_calls: AtomicUsize::new(0),
        }
    }

    pub fn group(mut self, group_id: u32, label: &str, members: &[(u32, Option<u32>)]) -> Self {
        self.groups.push(GroupSummary {
            group_id,
            name: format!("GROUP {group_id}"),
            generation_label: label.to_string(),
        });
        self.members.insert(
            group_id,
            members
                .iter()
                .map(|(entity_id, local_ordinal)| GroupMember {
                    entity_id: *entity_id,
                    local_ordinal: *local_ordinal,
                })
                .collect(),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn member_calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipSource for MockGroups {
    async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        Ok(self.groups.clone())
    }

    async fn fetch_group_members(&self, group_id: u32) -> Result<Vec<GroupMember>> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.members
            .get(&group_id)
            .cloned()
            .ok_or_else(|| CatalogError::SourceUnavailable(format!("group {group_id} missing")))
    }
}

/// Store that records every operation, optionally failing all of them.
#[derive(Default)]
pub struct RecordingStore {
    entries: Mutex<HashMap<String, String>>,
    ops: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl RecordingStore {
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.unavailable.store(true, Ordering::SeqCst);
        store
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn seed_record(&self, key: &str, entities: Vec<CatalogEntity>, captured_at: DateTime<Utc>) {
        let record = pokedex::entity::CachedCatalogRecord {
            entities,
            captured_at,
        };
        self.seed(key, &serde_json::to_string(&record).unwrap());
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn record(&self, op: &str, key: &str) -> Result<()> {
        self.ops.lock().unwrap().push(format!("{op} {key}"));
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::StorageUnavailable("sandboxed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentCacheStore for RecordingStore {
    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.record("write", key)?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.record("read", key)?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record("delete", key)?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
