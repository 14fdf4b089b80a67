use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::CatalogSnapshot;
use crate::membership::{GroupBucket, MembershipGroup};
use crate::window::PageRequest;

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[action(infer_categories)]
pub enum Action {
    Init,
    SnapshotDidLoad(Arc<CatalogSnapshot>),
    SnapshotDidError(String),
    PageDidLoad {
        request: PageRequest,
        snapshot: Arc<CatalogSnapshot>,
        listed: usize,
        has_next: bool,
    },
    PageDidError {
        request: PageRequest,
        error: String,
    },

    TypesDidLoad(Vec<String>),
    TypesDidError(String),
    GroupsDidLoad(Vec<GroupBucket>),
    GroupsDidError(String),
    MembershipDidLoad(MembershipGroup),
    MembershipDidError { group_id: u32, error: String },

    ListNearEnd,
    ListRetry,
    SelectionMove(i16),
    SelectionPage(i16),
    SelectionJumpTop,
    SelectionJumpBottom,
    DexSelect(usize),

    SearchStart,
    SearchCancel,
    SearchSubmit,
    SearchInput(char),
    SearchBackspace,

    TypeCursorNext,
    TypeCursorPrev,
    TypeToggle,
    TypeFilterClear,
    GenerationNext,
    GenerationPrev,
    GroupNext,
    GroupPrev,
    FiltersClear,

    CacheClear,
    CacheDidClear(Arc<CatalogSnapshot>),

    FocusNext,
    FocusPrev,
    UiTerminalResize(u16, u16),
    Tick,
    Quit,
}
