use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::entity::{CatalogEntity, CatalogSnapshot};
use crate::membership::MembershipGroup;

/// National id ranges per generation.
const GENERATION_RANGES: [(u32, u32); 9] = [
    (1, 151),
    (152, 251),
    (252, 386),
    (387, 493),
    (494, 649),
    (650, 721),
    (722, 809),
    (810, 898),
    (899, 1025),
];

pub const GENERATION_COUNT: u8 = GENERATION_RANGES.len() as u8;

/// Inclusive id range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub min: u32,
    pub max: u32,
}

impl IdRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn generation(generation: u8) -> Option<Self> {
        let index = usize::from(generation).checked_sub(1)?;
        GENERATION_RANGES
            .get(index)
            .map(|(min, max)| Self::new(*min, *max))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.min <= id && id <= self.max
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub search: String,
    /// Every tag must be present on the entity.
    pub tags: BTreeSet<String>,
    pub id_range: Option<IdRange>,
    pub group_id: Option<u32>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.tags.is_empty()
            && self.id_range.is_none()
            && self.group_id.is_none()
    }

    /// The synchronous predicates: search, tags, id range.
    pub fn matches(&self, entity: &CatalogEntity) -> bool {
        let query = self.search.trim().to_lowercase();
        let matches_query = query.is_empty()
            || entity.name.to_lowercase().contains(&query)
            || entity.id.to_string().contains(&query);
        matches_query
            && self.tags.iter().all(|tag| entity.has_tag(tag))
            && self.id_range.map_or(true, |range| range.contains(entity.id))
    }
}

/// Partial update of [`FilterCriteria`]; `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaPatch {
    pub search: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub id_range: Option<Option<IdRange>>,
    pub group_id: Option<Option<u32>>,
}

impl CriteriaPatch {
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn id_range(mut self, range: Option<IdRange>) -> Self {
        self.id_range = Some(range);
        self
    }

    pub fn group(mut self, group_id: Option<u32>) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn clear() -> Self {
        Self {
            search: Some(String::new()),
            tags: Some(BTreeSet::new()),
            id_range: Some(None),
            group_id: Some(None),
        }
    }

    fn apply(self, criteria: &mut FilterCriteria) {
        if let Some(search) = self.search {
            criteria.search = search;
        }
        if let Some(tags) = self.tags {
            criteria.tags = tags;
        }
        if let Some(range) = self.id_range {
            criteria.id_range = range;
        }
        if let Some(group_id) = self.group_id {
            criteria.group_id = group_id;
        }
    }
}

/// Outcome of [`FilterEngine::set_criteria`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CriteriaChange {
    pub changed: bool,
    /// Group whose members must be fetched before the result is usable.
    pub needs_group: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilteredResult {
    pub items: Vec<CatalogEntity>,
    pub loading_membership: bool,
}

/// Derives the ordered, filtered id list from a snapshot and the criteria.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterEngine {
    criteria: FilterCriteria,
    groups: HashMap<u32, MembershipGroup>,
    filtered: Vec<u32>,
    loading_membership: bool,
}

impl FilterEngine {
    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn set_criteria(&mut self, patch: CriteriaPatch) -> CriteriaChange {
        let mut next = self.criteria.clone();
        patch.apply(&mut next);
        if next == self.criteria {
            return CriteriaChange::default();
        }
        self.criteria = next;
        let needs_group = self
            .criteria
            .group_id
            .filter(|group_id| !self.groups.contains_key(group_id));
        CriteriaChange {
            changed: true,
            needs_group,
        }
    }

    pub fn has_group(&self, group_id: u32) -> bool {
        self.groups.contains_key(&group_id)
    }

    /// Caches a resolved group. Returns true when it is the active filter group.
    pub fn membership_loaded(&mut self, group: MembershipGroup) -> bool {
        let active = self.criteria.group_id == Some(group.group_id);
        self.groups.insert(group.group_id, group);
        active
    }

    /// Drops the membership filter if it still points at the failed group.
    pub fn membership_failed(&mut self, group_id: u32) -> bool {
        if self.criteria.group_id != Some(group_id) {
            return false;
        }
        self.criteria.group_id = None;
        true
    }

    /// Re-derives the filtered ids from one consistent snapshot + criteria pair.
    pub fn recompute(&mut self, snapshot: &CatalogSnapshot) {
        let group = match self.criteria.group_id {
            Some(group_id) => match self.groups.get(&group_id) {
                Some(group) => Some(group),
                None => {
                    self.loading_membership = true;
                    self.filtered.clear();
                    return;
                }
            },
            None => None,
        };
        self.loading_membership = false;

        let mut matched: Vec<&CatalogEntity> = snapshot
            .entities()
            .iter()
            .filter(|entity| self.criteria.matches(entity))
            .filter(|entity| group.map_or(true, |group| group.contains(entity.id)))
            .collect();

        if let Some(group) = group.filter(|group| group.has_ordinals()) {
            matched.sort_by_key(|entity| (group.ordinal(entity.id).unwrap_or(entity.id), entity.id));
        }
        self.filtered = matched.into_iter().map(|entity| entity.id).collect();
    }

    pub fn filtered_ids(&self) -> &[u32] {
        &self.filtered
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_loading_membership(&self) -> bool {
        self.loading_membership
    }

    pub fn result(&self, snapshot: &CatalogSnapshot) -> FilteredResult {
        FilteredResult {
            items: resolve(&self.filtered, snapshot),
            loading_membership: self.loading_membership,
        }
    }

    pub fn group(&self, group_id: u32) -> Option<&MembershipGroup> {
        self.groups.get(&group_id)
    }
}

pub(crate) fn resolve(ids: &[u32], snapshot: &CatalogSnapshot) -> Vec<CatalogEntity> {
    ids.iter()
        .filter_map(|id| snapshot.get(*id).cloned())
        .collect()
}
