use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SPRITE_BASE: &str = "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";

/// A single catalog record. Identity is `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: u32,
    pub name: String,
    pub image_ref: String,
    pub tags: Vec<String>,
}

impl CatalogEntity {
    pub fn new(id: u32, name: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image_ref: sprite_url(id),
            tags,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|own| own == tag)
    }
}

pub fn sprite_url(id: u32) -> String {
    format!("{SPRITE_BASE}/{id}.png")
}

/// Everything known about the catalog so far, ascending by id with unique ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    entities: Vec<CatalogEntity>,
    /// Set once a full population (or a fresh persisted record) backs this snapshot.
    pub complete: bool,
    /// Entities the last population could not fetch.
    pub dropped: usize,
    pub revision: u64,
    pub captured_at: DateTime<Utc>,
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::empty(0)
    }
}

impl CatalogSnapshot {
    pub fn empty(revision: u64) -> Self {
        Self {
            entities: Vec::new(),
            complete: false,
            dropped: 0,
            revision,
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Builds a snapshot from entities in arbitrary order. On duplicate ids the
    /// first occurrence wins.
    pub fn from_entities(entities: Vec<CatalogEntity>, captured_at: DateTime<Utc>) -> Self {
        let mut snapshot = Self {
            captured_at,
            ..Self::empty(0)
        };
        snapshot.merge(entities);
        snapshot
    }

    pub fn entities(&self) -> &[CatalogEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&CatalogEntity> {
        self.entities
            .binary_search_by_key(&id, |entity| entity.id)
            .ok()
            .map(|index| &self.entities[index])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Inserts entities whose id is not yet known, keeping id order. Returns how
    /// many were added; an incoming entity never replaces an existing one.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = CatalogEntity>) -> usize {
        let mut added = 0;
        for entity in incoming {
            if let Err(index) = self
                .entities
                .binary_search_by_key(&entity.id, |known| known.id)
            {
                self.entities.insert(index, entity);
                added += 1;
            }
        }
        added
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.captured_at < ttl
    }
}

/// Persisted form of a completed population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedCatalogRecord {
    pub entities: Vec<CatalogEntity>,
    pub captured_at: DateTime<Utc>,
}

impl CachedCatalogRecord {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.captured_at >= ttl
    }
}
