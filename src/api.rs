use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::entity::CatalogEntity;
use crate::error::{CatalogError, Result};

pub const API_BASE: &str = "https://pokeapi.co/api/v2";
pub const GROUP_INDEX_CONCURRENCY: usize = 12;

/// One row of a raw catalog list page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListItem {
    pub id: u32,
    pub detail_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<ListItem>,
    pub total_count: usize,
    pub has_next: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_id: u32,
    pub name: String,
    pub generation_label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupMember {
    pub entity_id: u32,
    pub local_ordinal: Option<u32>,
}

/// The primary catalog: a paginated list whose rows each need a detail call.
#[async_trait]
pub trait RemoteCatalogSource: Send + Sync {
    async fn list_page(&self, limit: usize, offset: usize) -> Result<ListPage>;

    async fn fetch_detail(&self, detail_url: &str) -> Result<CatalogEntity>;

    /// Category tags an entity may carry.
    async fn list_tags(&self) -> Result<Vec<String>>;
}

/// The secondary dataset used by the membership filter.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<GroupSummary>>;

    async fn fetch_group_members(&self, group_id: u32) -> Result<Vec<GroupMember>>;
}

#[derive(Clone, Debug, Deserialize)]
struct NamedResource {
    name: String,
    url: String,
}

#[derive(Clone, Debug, Deserialize)]
struct ApiResource {
    url: String,
}

#[derive(Clone, Debug, Deserialize)]
struct ListResponse {
    count: usize,
    next: Option<String>,
    results: Vec<NamedResource>,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonResponse {
    id: u32,
    name: String,
    types: Vec<PokemonTypeSlot>,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonTypeSlot {
    slot: u8,
    #[serde(rename = "type")]
    type_info: NamedResource,
}

#[derive(Clone, Debug, Deserialize)]
struct VersionGroupResponse {
    id: u32,
    name: String,
    generation: NamedResource,
    pokedexes: Vec<ApiResource>,
}

#[derive(Clone, Debug, Deserialize)]
struct PokedexResponse {
    pokemon_entries: Vec<PokedexEntryResponse>,
}

#[derive(Clone, Debug, Deserialize)]
struct PokedexEntryResponse {
    entry_number: u32,
    pokemon_species: NamedResource,
}

/// PokeAPI-backed implementation of both sources.
#[derive(Clone, Debug)]
pub struct PokeApiClient {
    client: reqwest::Client,
    base_url: String,
    group_concurrency: usize,
}

impl Default for PokeApiClient {
    fn default() -> Self {
        Self::new(API_BASE)
    }
}

impl PokeApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            group_concurrency: GROUP_INDEX_CONCURRENCY,
        }
    }

    pub fn with_group_concurrency(mut self, limit: usize) -> Self {
        self.group_concurrency = limit.max(1);
        self
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| CatalogError::Malformed {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }

    /// Every row of a named resource list: a one-row request for the count,
    /// then one request sized to it.
    async fn list_all(&self, resource: &str) -> Result<ListResponse> {
        let url = format!("{}/{resource}?limit=1", self.base_url);
        let head: ListResponse = self.fetch_json(&url).await?;
        if head.next.is_none() {
            return Ok(head);
        }
        let url = format!("{}/{resource}?limit={}", self.base_url, head.count);
        let response: ListResponse = self.fetch_json(&url).await?;
        if response.next.is_some() {
            tracing::warn!(
                resource,
                count = response.count,
                returned = response.results.len(),
                "resource list still truncated"
            );
        }
        Ok(response)
    }

    async fn fetch_group_summary(&self, url: &str) -> Result<GroupSummary> {
        let response: VersionGroupResponse = self.fetch_json(url).await?;
        Ok(GroupSummary {
            group_id: response.id,
            name: format_group_name(&response.name),
            generation_label: response.generation.name,
        })
    }
}

#[async_trait]
impl RemoteCatalogSource for PokeApiClient {
    async fn list_page(&self, limit: usize, offset: usize) -> Result<ListPage> {
        let url = format!("{}/pokemon?limit={limit}&offset={offset}", self.base_url);
        let response: ListResponse = self.fetch_json(&url).await?;
        let items = response
            .results
            .into_iter()
            .filter_map(|entry| match id_from_url(&entry.url) {
                Some(id) => Some(ListItem {
                    id,
                    detail_url: entry.url,
                }),
                None => {
                    tracing::warn!(name = %entry.name, url = %entry.url, "list row without id");
                    None
                }
            })
            .collect();
        Ok(ListPage {
            items,
            total_count: response.count,
            has_next: response.next.is_some(),
        })
    }

    async fn fetch_detail(&self, detail_url: &str) -> Result<CatalogEntity> {
        let mut response: PokemonResponse = self.fetch_json(detail_url).await?;
        if response.name.trim().is_empty() {
            return Err(CatalogError::Malformed {
                url: detail_url.to_string(),
                reason: "empty name".to_string(),
            });
        }
        response.types.sort_by_key(|slot| slot.slot);
        let tags = response
            .types
            .into_iter()
            .map(|slot| slot.type_info.name)
            .collect();
        Ok(CatalogEntity::new(response.id, response.name, tags))
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        let response = self.list_all("type").await?;
        let mut types: Vec<String> = response
            .results
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| name != "unknown" && name != "shadow")
            .collect();
        types.sort();
        Ok(types)
    }
}

#[async_trait]
impl MembershipSource for PokeApiClient {
    async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        let response = self.list_all("version-group").await?;
        if response.results.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.group_concurrency));
        let mut join_set = JoinSet::new();
        for entry in response.results {
            let client = self.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    CatalogError::SourceUnavailable("group index semaphore closed".to_string())
                })?;
                client.fetch_group_summary(&entry.url).await
            });
        }

        let mut groups = Vec::new();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(group)) => groups.push(group),
                Ok(Err(err)) => tracing::warn!(error = %err, "version group dropped"),
                Err(err) => tracing::warn!(error = %err, "version group task failed"),
            }
        }

        if groups.is_empty() {
            return Err(CatalogError::SourceUnavailable(
                "failed to load version groups".to_string(),
            ));
        }
        groups.sort_by_key(|group| group.group_id);
        Ok(groups)
    }

    async fn fetch_group_members(&self, group_id: u32) -> Result<Vec<GroupMember>> {
        let url = format!("{}/version-group/{group_id}", self.base_url);
        let response: VersionGroupResponse = self.fetch_json(&url).await?;
        let Some(pokedex) = response.pokedexes.first() else {
            return Ok(Vec::new());
        };
        let dex: PokedexResponse = self.fetch_json(&pokedex.url).await?;
        Ok(dex
            .pokemon_entries
            .into_iter()
            .filter_map(|entry| {
                let entity_id = id_from_url(&entry.pokemon_species.url)?;
                Some(GroupMember {
                    entity_id,
                    local_ordinal: Some(entry.entry_number),
                })
            })
            .collect())
    }
}

/// Trailing numeric path segment of a resource URL.
pub fn id_from_url(url: &str) -> Option<u32> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

fn format_group_name(name: &str) -> String {
    name.replace('-', " ").to_ascii_uppercase()
}
