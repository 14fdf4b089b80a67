use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::api::{GroupSummary, MembershipSource};
use crate::error::{CatalogError, Result};

/// A version group and the catalog ids it contains, with their group-local ordinals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MembershipGroup {
    pub group_id: u32,
    pub name: String,
    pub generation_label: String,
    pub members: BTreeMap<u32, Option<u32>>,
}

impl MembershipGroup {
    pub fn contains(&self, entity_id: u32) -> bool {
        self.members.contains_key(&entity_id)
    }

    pub fn ordinal(&self, entity_id: u32) -> Option<u32> {
        self.members.get(&entity_id).copied().flatten()
    }

    pub fn has_ordinals(&self) -> bool {
        self.members.values().any(Option::is_some)
    }
}

/// Groups sharing one generation label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupBucket {
    pub label: String,
    pub rank: u32,
    pub groups: Vec<GroupSummary>,
}

/// Buckets groups by the second `-` segment of their generation label
/// (`generation-iii` -> `iii`), ordered by the numeric value of that segment,
/// then group id.
pub fn bucket_groups(groups: &[GroupSummary]) -> Vec<GroupBucket> {
    let mut buckets: BTreeMap<(u32, String), Vec<GroupSummary>> = BTreeMap::new();
    for group in groups {
        let key = generation_key(&group.generation_label).to_string();
        let rank = label_rank(&key);
        buckets.entry((rank, key)).or_default().push(group.clone());
    }
    buckets
        .into_iter()
        .map(|((rank, label), mut groups)| {
            groups.sort_by_key(|group| group.group_id);
            GroupBucket {
                label,
                rank,
                groups,
            }
        })
        .collect()
}

fn generation_key(label: &str) -> &str {
    label.split('-').nth(1).unwrap_or(label)
}

/// Decimal or roman numeral value of a label segment; unknown labels sort last.
fn label_rank(segment: &str) -> u32 {
    if let Ok(value) = segment.parse::<u32>() {
        return value;
    }
    roman_value(segment).unwrap_or(u32::MAX)
}

fn roman_value(numeral: &str) -> Option<u32> {
    if numeral.is_empty() {
        return None;
    }
    let mut total = 0u32;
    let mut previous = 0u32;
    for ch in numeral.chars().rev() {
        let value = match ch.to_ascii_lowercase() {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if value < previous {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            previous = value;
        }
    }
    Some(total)
}

/// Session cache over a [`MembershipSource`]. Groups are fetched once; each
/// group's members are fetched at most once at a time and kept for the session.
pub struct MembershipDirectory {
    source: Arc<dyn MembershipSource>,
    groups: OnceCell<Vec<GroupSummary>>,
    members: Mutex<HashMap<u32, Arc<OnceCell<Arc<MembershipGroup>>>>>,
}

impl MembershipDirectory {
    pub fn new(source: Arc<dyn MembershipSource>) -> Self {
        Self {
            source,
            groups: OnceCell::new(),
            members: Mutex::new(HashMap::new()),
        }
    }

    pub async fn groups(&self) -> Result<&[GroupSummary]> {
        let groups = self
            .groups
            .get_or_try_init(|| async { self.source.list_groups().await })
            .await?;
        Ok(groups.as_slice())
    }

    pub async fn buckets(&self) -> Result<Vec<GroupBucket>> {
        Ok(bucket_groups(self.groups().await?))
    }

    /// Resolves a group and its members. Unknown ids are `InvalidCriteria`.
    pub async fn group(&self, group_id: u32) -> Result<Arc<MembershipGroup>> {
        let summary = self
            .groups()
            .await?
            .iter()
            .find(|group| group.group_id == group_id)
            .cloned()
            .ok_or_else(|| {
                CatalogError::InvalidCriteria(format!("unknown version group {group_id}"))
            })?;

        let cell = self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(group_id)
            .or_default()
            .clone();

        let group = cell
            .get_or_try_init(|| async {
                let members = self.source.fetch_group_members(group_id).await?;
                tracing::debug!(group_id, members = members.len(), "version group resolved");
                Ok::<_, CatalogError>(Arc::new(MembershipGroup {
                    group_id,
                    name: summary.name.clone(),
                    generation_label: summary.generation_label.clone(),
                    members: members
                        .into_iter()
                        .map(|member| (member.entity_id, member.local_ordinal))
                        .collect(),
                }))
            })
            .await?;
        Ok(group.clone())
    }
}
