use std::collections::BTreeSet;
use std::sync::Arc;

use tui_dispatch::{DataResource, DispatchResult};

use crate::action::Action;
use crate::effect::Effect;
use crate::entity::CatalogSnapshot;
use crate::filter::{CriteriaPatch, IdRange, GENERATION_COUNT};
use crate::state::{AppState, PopulationSummary, NEAR_END_ROWS};
use crate::window::Growth;

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::Init => {
            state.population = DataResource::Loading;
            state.types = DataResource::Loading;
            state.groups = DataResource::Loading;
            state.message = None;
            state.filter.recompute(&state.snapshot);
            let mut effects = vec![Effect::LoadSnapshot, Effect::LoadTypes, Effect::LoadGroups];
            effects.extend(fill_window(state));
            DispatchResult::changed_with_many(effects)
        }

        Action::SnapshotDidLoad(snapshot) => {
            // A page load may have installed this same revision already.
            let revision = snapshot.revision;
            if !adopt_snapshot(state, snapshot) && revision != state.snapshot.revision {
                return DispatchResult::unchanged();
            }
            let dropped = state.snapshot.dropped;
            state.population = DataResource::Loaded(PopulationSummary {
                entities: state.snapshot.len(),
                dropped,
            });
            if dropped > 0 {
                state.message = Some(format!("{dropped} entries could not be loaded"));
            }
            DispatchResult::changed_with_many(fill_window(state).into_iter().collect())
        }

        Action::SnapshotDidError(error) => {
            state.population = DataResource::Failed(error.clone());
            state.message = Some(format!("Catalog error: {error}"));
            DispatchResult::changed()
        }

        Action::PageDidLoad {
            request,
            snapshot,
            listed,
            has_next,
        } => {
            adopt_snapshot(state, snapshot);
            let next = state
                .list
                .page_loaded(request, listed, has_next, state.filter.filtered_len());
            let effect = next.map(Effect::LoadPage).or_else(|| fill_window(state));
            DispatchResult::changed_with_many(effect.into_iter().collect())
        }

        Action::PageDidError { request, error } => {
            if request.epoch == state.list.epoch() {
                state.message = Some(format!("Page load failed: {error}"));
            }
            let next = state
                .list
                .page_failed(request, error, state.filter.filtered_len());
            DispatchResult::changed_with_many(next.map(Effect::LoadPage).into_iter().collect())
        }

        Action::TypesDidLoad(types) => {
            if state.type_cursor >= types.len() {
                state.type_cursor = 0;
            }
            state.types = DataResource::Loaded(types);
            DispatchResult::changed()
        }

        Action::TypesDidError(error) => {
            state.types = DataResource::Failed(error.clone());
            state.message = Some(format!("Type error: {error}"));
            DispatchResult::changed()
        }

        Action::GroupsDidLoad(buckets) => {
            state.groups = DataResource::Loaded(buckets);
            if state.group_choice.is_some() && state.selected_group().is_none() {
                state.group_choice = None;
            }
            DispatchResult::changed()
        }

        Action::GroupsDidError(error) => {
            state.groups = DataResource::Failed(error.clone());
            state.message = Some(format!("Version group error: {error}"));
            DispatchResult::changed()
        }

        Action::MembershipDidLoad(group) => {
            if !state.filter.membership_loaded(group) {
                return DispatchResult::changed();
            }
            state.filter.recompute(&state.snapshot);
            state.clamp_selection();
            DispatchResult::changed_with_many(fill_window(state).into_iter().collect())
        }

        Action::MembershipDidError { group_id, error } => {
            if !state.filter.membership_failed(group_id) {
                return DispatchResult::unchanged();
            }
            tracing::warn!(group_id, %error, "membership filter dropped");
            state.group_choice = None;
            state.message = Some(format!("Version group unavailable: {error}"));
            state.filter.recompute(&state.snapshot);
            state.clamp_selection();
            DispatchResult::changed_with_many(fill_window(state).into_iter().collect())
        }

        Action::ListNearEnd => {
            let (changed, effect) = grow_window(state);
            respond(changed, effect)
        }

        Action::ListRetry => {
            if state.list.error().is_none() {
                return DispatchResult::unchanged();
            }
            state.message = None;
            let request = state.list.retry(state.filter.filtered_len());
            DispatchResult::changed_with_many(request.map(Effect::LoadPage).into_iter().collect())
        }

        Action::SelectionMove(delta) => {
            let index = clamp_index(state.selected_index, state.visible_len(), delta);
            select(state, index)
        }

        Action::SelectionPage(delta) => {
            let page = list_page_size(state) as i16;
            let index = clamp_index(
                state.selected_index,
                state.visible_len(),
                delta.saturating_mul(page),
            );
            select(state, index)
        }

        Action::SelectionJumpTop => select(state, 0),

        Action::SelectionJumpBottom => {
            let last = state.visible_len().saturating_sub(1);
            select(state, last)
        }

        Action::DexSelect(index) => select(state, index),

        Action::SearchStart => {
            state.search.active = true;
            state.search.query.clear();
            state.focus = crate::state::FocusArea::DexList;
            apply_criteria(state, CriteriaPatch::default().search(""))
        }

        Action::SearchCancel => {
            if !state.search.active && state.search.query.is_empty() {
                return DispatchResult::unchanged();
            }
            state.search.active = false;
            state.search.query.clear();
            apply_criteria(state, CriteriaPatch::default().search(""))
        }

        Action::SearchSubmit => {
            if !state.search.active {
                return DispatchResult::unchanged();
            }
            state.search.active = false;
            DispatchResult::changed()
        }

        Action::SearchInput(ch) => {
            state.search.query.push(ch);
            let query = state.search.query.clone();
            apply_criteria(state, CriteriaPatch::default().search(query))
        }

        Action::SearchBackspace => {
            if state.search.query.pop().is_none() {
                return DispatchResult::unchanged();
            }
            let query = state.search.query.clone();
            apply_criteria(state, CriteriaPatch::default().search(query))
        }

        Action::TypeCursorNext => move_type_cursor(state, 1),
        Action::TypeCursorPrev => move_type_cursor(state, -1),

        Action::TypeToggle => {
            let Some(tag) = state.current_type().cloned() else {
                return DispatchResult::unchanged();
            };
            let mut tags = state.filter.criteria().tags.clone();
            if !tags.remove(&tag) {
                tags.insert(tag);
            }
            apply_criteria(state, CriteriaPatch::default().tags(tags))
        }

        Action::TypeFilterClear => {
            if state.filter.criteria().tags.is_empty() {
                return DispatchResult::unchanged();
            }
            apply_criteria(state, CriteriaPatch::default().tags(BTreeSet::<String>::new()))
        }

        Action::GenerationNext => cycle_generation(state, 1),
        Action::GenerationPrev => cycle_generation(state, -1),

        Action::GroupNext => cycle_group(state, 1),
        Action::GroupPrev => cycle_group(state, -1),

        Action::FiltersClear => {
            if state.filter.criteria().is_empty() && state.search.query.is_empty() {
                return DispatchResult::unchanged();
            }
            state.search = Default::default();
            state.generation = None;
            state.group_choice = None;
            apply_criteria(state, CriteriaPatch::clear())
        }

        Action::CacheClear => {
            state.message = Some("Clearing catalog cache...".to_string());
            state.population = DataResource::Loading;
            DispatchResult::changed_with(Effect::ClearCache)
        }

        Action::CacheDidClear(snapshot) => {
            let epoch = state.list.restart();
            tracing::info!(epoch, revision = snapshot.revision, "catalog reset");
            state.snapshot = snapshot;
            state.population = DataResource::Loading;
            state.message = None;
            state.selected_index = 0;
            state.filter.recompute(&state.snapshot);
            let mut effects = vec![Effect::LoadSnapshot];
            effects.extend(fill_window(state));
            DispatchResult::changed_with_many(effects)
        }

        Action::FocusNext => {
            if state.search.active {
                return DispatchResult::unchanged();
            }
            state.focus_next();
            DispatchResult::changed()
        }

        Action::FocusPrev => {
            if state.search.active {
                return DispatchResult::unchanged();
            }
            state.focus_prev();
            DispatchResult::changed()
        }

        Action::UiTerminalResize(width, height) => {
            if state.terminal_size != (width, height) {
                state.terminal_size = (width, height);
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }

        Action::Tick => {
            state.tick = state.tick.wrapping_add(1);
            if state.is_busy() {
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }

        Action::Quit => DispatchResult::unchanged(),
    }
}

/// Installs a snapshot only if it is newer than the one on screen.
fn adopt_snapshot(state: &mut AppState, snapshot: Arc<CatalogSnapshot>) -> bool {
    if snapshot.revision <= state.snapshot.revision {
        tracing::debug!(
            incoming = snapshot.revision,
            current = state.snapshot.revision,
            "older snapshot ignored"
        );
        return false;
    }
    if snapshot.complete {
        state.list.mark_exhausted();
    }
    state.snapshot = snapshot;
    state.filter.recompute(&state.snapshot);
    state.clamp_selection();
    true
}

fn apply_criteria(state: &mut AppState, patch: CriteriaPatch) -> DispatchResult<Effect> {
    let change = state.filter.set_criteria(patch);
    if !change.changed {
        return DispatchResult::changed();
    }
    let epoch = state.list.begin_epoch();
    tracing::debug!(epoch, criteria = ?state.filter.criteria(), "filter epoch started");
    state.selected_index = 0;
    state.filter.recompute(&state.snapshot);

    let mut effects = Vec::new();
    if let Some(group_id) = change.needs_group {
        effects.push(Effect::LoadMembership { group_id });
    }
    effects.extend(fill_window(state));
    DispatchResult::changed_with_many(effects)
}

fn fill_window(state: &mut AppState) -> Option<Effect> {
    if state.filter.is_loading_membership() {
        return None;
    }
    state
        .list
        .fill(state.filter.filtered_len())
        .map(Effect::LoadPage)
}

fn grow_window(state: &mut AppState) -> (bool, Option<Effect>) {
    if state.filter.is_loading_membership() {
        return (false, None);
    }
    match state.list.on_near_end(state.filter.filtered_len()) {
        Growth::Grew | Growth::Waiting => (true, None),
        Growth::Fetch(request) => (true, Some(Effect::LoadPage(request))),
        Growth::Ignored => (false, None),
    }
}

fn select(state: &mut AppState, index: usize) -> DispatchResult<Effect> {
    let moved = state.set_selected_index(index);
    let (grew, effect) = if state.selected_index + NEAR_END_ROWS >= state.visible_len() {
        grow_window(state)
    } else {
        (false, None)
    };
    respond(moved || grew, effect)
}

fn respond(changed: bool, effect: Option<Effect>) -> DispatchResult<Effect> {
    match effect {
        Some(effect) => DispatchResult::changed_with(effect),
        None if changed => DispatchResult::changed(),
        None => DispatchResult::unchanged(),
    }
}

fn move_type_cursor(state: &mut AppState, step: i16) -> DispatchResult<Effect> {
    let len = state.types.data().map(Vec::len).unwrap_or(0);
    if len == 0 {
        return DispatchResult::unchanged();
    }
    let next = (state.type_cursor as i16 + step).rem_euclid(len as i16) as usize;
    if next == state.type_cursor {
        return DispatchResult::unchanged();
    }
    state.type_cursor = next;
    DispatchResult::changed()
}

fn cycle_generation(state: &mut AppState, step: i16) -> DispatchResult<Effect> {
    let slots = i16::from(GENERATION_COUNT) + 1;
    let current = state.generation.map(i16::from).unwrap_or(0);
    let next = (current + step).rem_euclid(slots);
    state.generation = (next > 0).then_some(next as u8);
    let range = state.generation.and_then(IdRange::generation);
    apply_criteria(state, CriteriaPatch::default().id_range(range))
}

fn cycle_group(state: &mut AppState, step: i16) -> DispatchResult<Effect> {
    let len = state.group_list().len();
    if len == 0 {
        return DispatchResult::unchanged();
    }
    let slots = len as i16 + 1;
    let current = state.group_choice.map(|index| index as i16 + 1).unwrap_or(0);
    let next = (current + step).rem_euclid(slots);
    state.group_choice = (next > 0).then(|| (next - 1) as usize);
    let group_id = state.selected_group().map(|group| group.group_id);
    apply_criteria(state, CriteriaPatch::default().group(group_id))
}

fn clamp_index(current: usize, len: usize, delta: i16) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as i64 + i64::from(delta);
    next.clamp(0, len as i64 - 1) as usize
}

fn list_page_size(state: &AppState) -> usize {
    state.terminal_size.1.saturating_sub(10).max(1) as usize
}
