//! Reducer flows driven through an `EffectStore`, with async completions
//! dispatched by hand.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use pokedex::action::Action;
use pokedex::api::GroupSummary;
use pokedex::effect::Effect;
use pokedex::entity::CatalogSnapshot;
use pokedex::membership::{GroupBucket, MembershipGroup};
use pokedex::reducer::reducer;
use pokedex::state::{AppState, ListStatus};
use pokedex::window::PageRequest;
use pretty_assertions::assert_eq;
use tui_dispatch::EffectStore;

use common::{complete_snapshot, entity, numbered};

fn store() -> EffectStore<AppState, Action, Effect> {
    EffectStore::new(AppState::new(30), reducer)
}

fn loaded(count: u32) -> Arc<CatalogSnapshot> {
    Arc::new(complete_snapshot(numbered(count), 1))
}

fn partial(count: u32, revision: u64) -> Arc<CatalogSnapshot> {
    let mut snapshot = complete_snapshot(numbered(count), revision);
    snapshot.complete = false;
    Arc::new(snapshot)
}

fn first_page() -> PageRequest {
    PageRequest {
        epoch: 0,
        offset: 0,
        limit: 30,
    }
}

fn group_buckets() -> Vec<GroupBucket> {
    vec![GroupBucket {
        label: "i".to_string(),
        rank: 1,
        groups: vec![GroupSummary {
            group_id: 7,
            name: "RED BLUE".to_string(),
            generation_label: "generation-i".to_string(),
        }],
    }]
}

fn group_seven() -> MembershipGroup {
    MembershipGroup {
        group_id: 7,
        name: "RED BLUE".to_string(),
        generation_label: "generation-i".to_string(),
        members: BTreeMap::from([(2, Some(3)), (4, Some(1)), (5, None)]),
    }
}

#[test]
fn init_requests_catalog_reference_data_and_first_page() {
    let mut store = store();

    let result = store.dispatch(Action::Init);

    assert!(result.changed);
    assert_eq!(
        result.effects,
        vec![
            Effect::LoadSnapshot,
            Effect::LoadTypes,
            Effect::LoadGroups,
            Effect::LoadPage(first_page()),
        ]
    );
    assert!(store.state().population.is_loading());
    assert_eq!(store.state().list_status(), ListStatus::Loading);
}

#[test]
fn complete_catalog_window_grows_to_the_end() {
    let mut store = store();
    store.dispatch(Action::Init);
    let result = store.dispatch(Action::SnapshotDidLoad(loaded(100)));
    assert!(result.effects.is_empty());

    let mut sizes = vec![store.state().visible_len()];
    for _ in 0..3 {
        let result = store.dispatch(Action::ListNearEnd);
        assert!(result.changed);
        assert!(result.effects.is_empty());
        sizes.push(store.state().visible_len());
    }

    assert_eq!(sizes, vec![30, 60, 90, 100]);
    let window = store.state().visible_window();
    assert_eq!(window.items.len(), 100);
    assert!(!window.has_more);
    assert!(!store.dispatch(Action::ListNearEnd).changed);
    assert_eq!(store.state().list_status(), ListStatus::Ready);
}

#[test]
fn selecting_near_the_end_grows_the_window() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(loaded(100)));

    store.dispatch(Action::SelectionJumpBottom);

    assert_eq!(store.state().selected_index, 29);
    assert_eq!(store.state().visible_len(), 60);
}

#[test]
fn stale_page_merges_without_touching_the_new_window() {
    let mut store = store();
    store.dispatch(Action::Init);

    // Criteria change while the first page is in flight.
    let result = store.dispatch(Action::SearchInput('5'));
    assert!(result.effects.is_empty());
    assert_eq!(store.state().list.epoch(), 1);

    let result = store.dispatch(Action::PageDidLoad {
        request: first_page(),
        snapshot: partial(30, 1),
        listed: 30,
        has_next: true,
    });

    let window = store.state().visible_window();
    let ids: Vec<u32> = window.items.iter().map(|entity| entity.id).collect();
    assert_eq!(ids, vec![5, 15, 25]);
    assert_eq!(store.state().snapshot.len(), 30);
    // Three matches do not fill a 30-row window, so the next raw page follows.
    assert_eq!(
        result.effects,
        vec![Effect::LoadPage(PageRequest {
            epoch: 1,
            offset: 30,
            limit: 30,
        })]
    );
}

#[test]
fn older_snapshot_is_ignored() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(Arc::new(complete_snapshot(numbered(12), 3))));

    store.dispatch(Action::SnapshotDidLoad(Arc::new(complete_snapshot(numbered(2), 2))));

    assert_eq!(store.state().snapshot.revision, 3);
    assert_eq!(store.state().filtered_len(), 12);
    assert_eq!(store.state().population.data().map(|summary| summary.entities), Some(12));
}

#[test]
fn late_snapshot_from_before_a_reset_keeps_loading() {
    let mut store = store();
    store.dispatch(Action::Init);
    store.dispatch(Action::SnapshotDidLoad(loaded(100)));
    store.dispatch(Action::CacheClear);
    store.dispatch(Action::CacheDidClear(Arc::new(CatalogSnapshot::empty(5))));

    let result = store.dispatch(Action::SnapshotDidLoad(loaded(100)));

    assert!(!result.changed);
    assert!(store.state().population.is_loading());
    assert_eq!(store.state().list_status(), ListStatus::Loading);
}

#[test]
fn snapshot_already_installed_by_a_page_still_finishes_loading() {
    let mut store = store();
    store.dispatch(Action::Init);
    let snapshot = Arc::new(complete_snapshot(numbered(40), 4));
    store.dispatch(Action::PageDidLoad {
        request: first_page(),
        snapshot: snapshot.clone(),
        listed: 0,
        has_next: false,
    });
    assert!(store.state().population.is_loading());

    store.dispatch(Action::SnapshotDidLoad(snapshot));

    assert_eq!(
        store.state().population.data().map(|summary| summary.entities),
        Some(40)
    );
    assert_eq!(store.state().list_status(), ListStatus::Ready);
}

#[test]
fn category_toggles_compose_with_and() {
    let mut store = store();
    let snapshot = complete_snapshot(
        vec![
            entity(1, "charmander", &["fire"]),
            entity(2, "squirtle", &["water"]),
            entity(3, "charizard", &["fire", "flying"]),
        ],
        1,
    );
    store.dispatch(Action::SnapshotDidLoad(Arc::new(snapshot)));
    store.dispatch(Action::TypesDidLoad(vec![
        "fire".to_string(),
        "flying".to_string(),
        "water".to_string(),
    ]));

    store.dispatch(Action::TypeToggle);
    assert_eq!(store.state().visible_ids(), &[1, 3]);

    store.dispatch(Action::TypeCursorNext);
    store.dispatch(Action::TypeToggle);
    assert_eq!(store.state().visible_ids(), &[3]);

    store.dispatch(Action::TypeFilterClear);
    assert_eq!(store.state().visible_ids(), &[1, 2, 3]);
}

#[test]
fn generation_filter_uses_inclusive_ranges() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(loaded(200)));

    store.dispatch(Action::GenerationNext);
    assert_eq!(store.state().generation, Some(1));
    assert_eq!(store.state().filtered_len(), 151);

    store.dispatch(Action::GenerationNext);
    assert_eq!(store.state().filtered_len(), 49);
    assert_eq!(store.state().visible_ids()[0], 152);

    store.dispatch(Action::GenerationPrev);
    store.dispatch(Action::GenerationPrev);
    assert_eq!(store.state().generation, None);
    assert_eq!(store.state().filtered_len(), 200);
}

#[test]
fn membership_filter_waits_then_orders_by_local_ordinal() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(loaded(5)));
    store.dispatch(Action::GroupsDidLoad(group_buckets()));

    let result = store.dispatch(Action::GroupNext);

    assert_eq!(result.effects, vec![Effect::LoadMembership { group_id: 7 }]);
    assert!(store.state().filter.is_loading_membership());
    assert_eq!(store.state().visible_len(), 0);
    assert!(store.state().is_busy());

    store.dispatch(Action::MembershipDidLoad(group_seven()));

    assert!(!store.state().filter.is_loading_membership());
    assert_eq!(store.state().visible_ids(), &[4, 2, 5]);
}

#[test]
fn failed_membership_drops_the_group_filter() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(loaded(5)));
    store.dispatch(Action::GroupsDidLoad(group_buckets()));
    store.dispatch(Action::GroupNext);

    let result = store.dispatch(Action::MembershipDidError {
        group_id: 7,
        error: "offline".to_string(),
    });

    assert!(result.changed);
    assert_eq!(store.state().group_choice, None);
    assert_eq!(store.state().filter.criteria().group_id, None);
    assert_eq!(store.state().filtered_len(), 5);
    assert!(store.state().message.is_some());
}

#[test]
fn late_membership_for_an_inactive_group_is_cached_only() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(loaded(5)));

    let result = store.dispatch(Action::MembershipDidLoad(group_seven()));

    assert!(result.effects.is_empty());
    assert!(store.state().filter.has_group(7));
    assert_eq!(store.state().filtered_len(), 5);
}

#[test]
fn page_error_stops_growth_until_retry() {
    let mut store = store();
    store.dispatch(Action::Init);

    let result = store.dispatch(Action::PageDidError {
        request: first_page(),
        error: "timeout".to_string(),
    });
    assert!(result.effects.is_empty());
    assert_eq!(store.state().list.error(), Some("timeout"));
    assert!(!store.state().visible_window().has_more);

    assert!(!store.dispatch(Action::ListNearEnd).changed);

    let result = store.dispatch(Action::ListRetry);
    assert_eq!(result.effects, vec![Effect::LoadPage(first_page())]);
    assert_eq!(store.state().list.error(), None);
}

#[test]
fn partial_status_while_pages_trickle_in() {
    let mut store = store();
    store.dispatch(Action::Init);

    store.dispatch(Action::PageDidLoad {
        request: first_page(),
        snapshot: partial(30, 1),
        listed: 30,
        has_next: true,
    });

    assert_eq!(store.state().list_status(), ListStatus::Partial);
    assert_eq!(store.state().visible_len(), 30);
    assert!(store.state().visible_window().has_more);
}

#[test]
fn population_failure_with_nothing_loaded_is_an_error() {
    let mut store = store();
    store.dispatch(Action::Init);

    store.dispatch(Action::SnapshotDidError("catalog source unavailable".to_string()));

    assert_eq!(store.state().list_status(), ListStatus::Error);
}

#[test]
fn cache_clear_restarts_paging() {
    let mut store = store();
    store.dispatch(Action::Init);
    store.dispatch(Action::SnapshotDidLoad(loaded(100)));

    let result = store.dispatch(Action::CacheClear);
    assert_eq!(result.effects, vec![Effect::ClearCache]);

    let result = store.dispatch(Action::CacheDidClear(Arc::new(CatalogSnapshot::empty(5))));
    assert_eq!(
        result.effects,
        vec![
            Effect::LoadSnapshot,
            Effect::LoadPage(PageRequest {
                epoch: 1,
                offset: 0,
                limit: 30,
            }),
        ]
    );
    assert_eq!(store.state().visible_len(), 0);

    // The page requested before the reset lands late and is ignored.
    let result = store.dispatch(Action::PageDidLoad {
        request: first_page(),
        snapshot: partial(30, 1),
        listed: 30,
        has_next: true,
    });
    assert!(result.effects.is_empty());
    assert_eq!(store.state().snapshot.revision, 5);
    assert_eq!(store.state().list.cursor(), 0);
}

#[test]
fn search_cancel_restores_the_full_list() {
    let mut store = store();
    store.dispatch(Action::SnapshotDidLoad(loaded(40)));

    store.dispatch(Action::SearchStart);
    store.dispatch(Action::SearchInput('3'));
    store.dispatch(Action::SearchInput('3'));
    assert_eq!(store.state().visible_ids(), &[33]);

    store.dispatch(Action::SearchCancel);
    assert!(!store.state().search.active);
    assert_eq!(store.state().filtered_len(), 40);
}
