use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tui_dispatch::DataResource;
use tui_dispatch_debug::debug::{ron_string, DebugSection, DebugState};

use crate::api::GroupSummary;
use crate::entity::{CatalogEntity, CatalogSnapshot};
use crate::filter::FilterEngine;
use crate::membership::GroupBucket;
use crate::window::{ListController, VisibleWindow};

/// Selection this close to the end of the visible window asks for more rows.
pub const NEAR_END_ROWS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusArea {
    Filters,
    DexList,
}

/// What the list can honestly claim about its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStatus {
    /// Nothing to show yet.
    Loading,
    /// Population failed and there is nothing to show.
    Error,
    /// Data present but incomplete, or a growth step failed.
    Partial,
    Ready,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub entities: usize,
    pub dropped: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppState {
    pub terminal_size: (u16, u16),
    pub focus: FocusArea,

    pub snapshot: Arc<CatalogSnapshot>,
    pub population: DataResource<PopulationSummary>,
    pub filter: FilterEngine,
    pub list: ListController,
    pub selected_index: usize,

    pub search: SearchState,
    pub types: DataResource<Vec<String>>,
    pub type_cursor: usize,
    pub generation: Option<u8>,
    pub groups: DataResource<Vec<GroupBucket>>,
    /// Index into the flattened group list, `None` for no membership filter.
    pub group_choice: Option<usize>,

    pub message: Option<String>,
    pub tick: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(crate::window::DEFAULT_PAGE_SIZE)
    }
}

impl AppState {
    pub fn new(page_size: usize) -> Self {
        Self {
            terminal_size: (80, 24),
            focus: FocusArea::DexList,
            snapshot: Arc::new(CatalogSnapshot::default()),
            population: DataResource::Empty,
            filter: FilterEngine::default(),
            list: ListController::new(page_size),
            selected_index: 0,
            search: SearchState::default(),
            types: DataResource::Empty,
            type_cursor: 0,
            generation: None,
            groups: DataResource::Empty,
            group_choice: None,
            message: None,
            tick: 0,
        }
    }

    pub fn filtered_len(&self) -> usize {
        self.filter.filtered_len()
    }

    pub fn visible_len(&self) -> usize {
        self.list.visible_len(self.filter.filtered_len())
    }

    pub fn visible_ids(&self) -> &[u32] {
        &self.filter.filtered_ids()[..self.visible_len()]
    }

    pub fn visible_window(&self) -> VisibleWindow {
        self.list.window(self.filter.filtered_ids(), &self.snapshot)
    }

    pub fn selected_entity(&self) -> Option<&CatalogEntity> {
        self.visible_ids()
            .get(self.selected_index)
            .and_then(|id| self.snapshot.get(*id))
    }

    pub fn set_selected_index(&mut self, index: usize) -> bool {
        let visible = self.visible_len();
        if visible == 0 {
            let changed = self.selected_index != 0;
            self.selected_index = 0;
            return changed;
        }
        let bounded = index.min(visible - 1);
        if bounded != self.selected_index {
            self.selected_index = bounded;
            return true;
        }
        false
    }

    pub fn clamp_selection(&mut self) {
        let visible = self.visible_len();
        if self.selected_index >= visible {
            self.selected_index = visible.saturating_sub(1);
        }
    }

    pub fn group_list(&self) -> Vec<&GroupSummary> {
        self.groups
            .data()
            .map(|buckets| buckets.iter().flat_map(|bucket| bucket.groups.iter()).collect())
            .unwrap_or_default()
    }

    pub fn selected_group(&self) -> Option<&GroupSummary> {
        let choice = self.group_choice?;
        self.group_list().get(choice).copied()
    }

    pub fn current_type(&self) -> Option<&String> {
        self.types.data().and_then(|types| types.get(self.type_cursor))
    }

    pub fn list_status(&self) -> ListStatus {
        if self.snapshot.is_empty() {
            if self.population.is_failed() {
                return ListStatus::Error;
            }
            return ListStatus::Loading;
        }
        if !self.snapshot.complete || self.snapshot.dropped > 0 || self.list.error().is_some() {
            return ListStatus::Partial;
        }
        ListStatus::Ready
    }

    pub fn is_busy(&self) -> bool {
        self.population.is_loading()
            || self.list.is_fetching()
            || self.filter.is_loading_membership()
    }

    pub fn focus_next(&mut self) {
        self.focus = match self.focus {
            FocusArea::Filters => FocusArea::DexList,
            FocusArea::DexList => FocusArea::Filters,
        };
    }

    pub fn focus_prev(&mut self) {
        self.focus_next();
    }
}

impl DebugState for AppState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        vec![
            DebugSection::new("Catalog")
                .entry("entities", ron_string(&self.snapshot.len()))
                .entry("complete", ron_string(&self.snapshot.complete))
                .entry("dropped", ron_string(&self.snapshot.dropped))
                .entry("revision", ron_string(&self.snapshot.revision))
                .entry("population_loading", ron_string(&self.population.is_loading()))
                .entry("status", ron_string(&self.list_status())),
            DebugSection::new("Filters")
                .entry("criteria", ron_string(self.filter.criteria()))
                .entry("filtered", ron_string(&self.filter.filtered_len()))
                .entry(
                    "loading_membership",
                    ron_string(&self.filter.is_loading_membership()),
                )
                .entry("search_active", ron_string(&self.search.active))
                .entry("generation", ron_string(&self.generation))
                .entry("group_choice", ron_string(&self.group_choice)),
            DebugSection::new("Window")
                .entry("epoch", ron_string(&self.list.epoch()))
                .entry("visible", ron_string(&self.visible_len()))
                .entry("cursor", ron_string(&self.list.cursor()))
                .entry("in_flight", ron_string(&self.list.in_flight()))
                .entry("phase", ron_string(&self.list.phase(self.filtered_len())))
                .entry("selected", ron_string(&self.selected_index))
                .entry("message", ron_string(&self.message)),
        ]
    }
}
