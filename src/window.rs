//! Incremental list window over the filtered result.
//!
//! Each criteria change starts a new epoch. The window grows by slicing the
//! filtered ids when it can and asks for the next raw page only once it covers
//! everything filtered. Page completions from older epochs still advance the
//! raw cursor but never touch the current window.

use serde::{Deserialize, Serialize};

use crate::entity::{CatalogEntity, CatalogSnapshot};
use crate::filter::resolve;

pub const DEFAULT_PAGE_SIZE: usize = 30;

/// One raw page request, tagged with the epoch that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub epoch: u64,
    pub offset: usize,
    pub limit: usize,
}

/// What a near-end signal did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Growth {
    /// Sliced more of the already-filtered result.
    Grew,
    /// Needs this raw page.
    Fetch(PageRequest),
    /// A raw page is already in flight; growth continues when it lands.
    Waiting,
    /// Exhausted, failed, or already fetching for this epoch.
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListPhase {
    Idle,
    Fetching,
    Exhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibleWindow {
    pub items: Vec<CatalogEntity>,
    pub has_more: bool,
    pub is_fetching: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListController {
    page_size: usize,
    epoch: u64,
    window_len: usize,
    /// Next raw offset to request.
    cursor: usize,
    raw_exhausted: bool,
    in_flight: Option<PageRequest>,
    /// Epoch below which completions no longer move the cursor (set by restart).
    cursor_floor: u64,
    pending_growth: bool,
    /// Filtered length when the pending growth started.
    pending_from: usize,
    error: Option<String>,
}

impl Default for ListController {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListController {
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            epoch: 0,
            window_len: page_size,
            cursor: 0,
            raw_exhausted: false,
            in_flight: None,
            cursor_floor: 0,
            pending_growth: false,
            pending_from: 0,
            error: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn in_flight(&self) -> Option<PageRequest> {
        self.in_flight
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_raw_exhausted(&self) -> bool {
        self.raw_exhausted
    }

    /// Starts a new epoch: first page only, no pending growth, no error.
    pub fn begin_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.window_len = self.page_size;
        self.pending_growth = false;
        self.pending_from = 0;
        self.error = None;
        self.epoch
    }

    /// Forgets raw progress after the catalog was cleared.
    pub fn restart(&mut self) -> u64 {
        let epoch = self.begin_epoch();
        self.cursor = 0;
        self.raw_exhausted = false;
        self.in_flight = None;
        self.cursor_floor = epoch;
        epoch
    }

    /// The snapshot is complete; no raw page can add anything.
    pub fn mark_exhausted(&mut self) {
        self.raw_exhausted = true;
        self.pending_growth = false;
    }

    pub fn visible_len(&self, filtered_len: usize) -> usize {
        self.window_len.min(filtered_len)
    }

    pub fn has_more(&self, filtered_len: usize) -> bool {
        self.visible_len(filtered_len) < filtered_len
            || (!self.raw_exhausted && self.error.is_none())
    }

    pub fn is_fetching(&self) -> bool {
        self.pending_growth
    }

    pub fn phase(&self, filtered_len: usize) -> ListPhase {
        if self.pending_growth {
            ListPhase::Fetching
        } else if self.raw_exhausted && self.visible_len(filtered_len) >= filtered_len {
            ListPhase::Exhausted
        } else {
            ListPhase::Idle
        }
    }

    /// The consumer is close to the end of the rendered window.
    pub fn on_near_end(&mut self, filtered_len: usize) -> Growth {
        let visible = self.visible_len(filtered_len);
        if visible < filtered_len {
            self.window_len = visible + self.page_size;
            return Growth::Grew;
        }
        if self.raw_exhausted || self.error.is_some() || self.pending_growth {
            return Growth::Ignored;
        }
        self.window_len = visible + self.page_size;
        self.request_growth(filtered_len)
    }

    /// Fetches raw pages while the first window is not yet filled.
    pub fn fill(&mut self, filtered_len: usize) -> Option<PageRequest> {
        if filtered_len >= self.window_len
            || self.raw_exhausted
            || self.error.is_some()
            || self.pending_growth
        {
            return None;
        }
        match self.request_growth(filtered_len) {
            Growth::Fetch(request) => Some(request),
            _ => None,
        }
    }

    /// Clears a growth error and tries again.
    pub fn retry(&mut self, filtered_len: usize) -> Option<PageRequest> {
        self.error = None;
        match self.on_near_end(filtered_len) {
            Growth::Fetch(request) => Some(request),
            _ => None,
        }
    }

    /// Records a landed raw page. Returns the next page to fetch when the
    /// current epoch is still waiting for new filtered entries.
    pub fn page_loaded(
        &mut self,
        request: PageRequest,
        listed: usize,
        has_next: bool,
        filtered_len: usize,
    ) -> Option<PageRequest> {
        if self.in_flight == Some(request) {
            self.in_flight = None;
        }
        if request.epoch < self.cursor_floor {
            tracing::debug!(?request, "page from before restart ignored");
            return self.continue_pending(filtered_len);
        }
        self.cursor = self.cursor.max(request.offset + listed);
        if !has_next {
            self.raw_exhausted = true;
        }
        if request.epoch != self.epoch {
            tracing::debug!(
                stale = request.epoch,
                current = self.epoch,
                "stale page merged; window untouched"
            );
        }
        if self.pending_growth && filtered_len > self.pending_from {
            self.pending_growth = false;
            return None;
        }
        self.continue_pending(filtered_len)
    }

    /// Records a failed raw page. A failure in the current epoch disables
    /// growth; a stale one only frees the slot.
    pub fn page_failed(
        &mut self,
        request: PageRequest,
        error: impl Into<String>,
        filtered_len: usize,
    ) -> Option<PageRequest> {
        if self.in_flight == Some(request) {
            self.in_flight = None;
        }
        if request.epoch == self.epoch {
            self.error = Some(error.into());
            self.pending_growth = false;
            return None;
        }
        tracing::debug!(stale = request.epoch, "stale page failure ignored");
        self.continue_pending(filtered_len)
    }

    pub fn window(&self, filtered_ids: &[u32], snapshot: &CatalogSnapshot) -> VisibleWindow {
        let visible = self.visible_len(filtered_ids.len());
        VisibleWindow {
            items: resolve(&filtered_ids[..visible], snapshot),
            has_more: self.has_more(filtered_ids.len()),
            is_fetching: self.is_fetching(),
            error: self.error.clone(),
        }
    }

    fn request_growth(&mut self, filtered_len: usize) -> Growth {
        self.pending_growth = true;
        self.pending_from = filtered_len;
        match self.issue() {
            Some(request) => Growth::Fetch(request),
            None => Growth::Waiting,
        }
    }

    fn continue_pending(&mut self, filtered_len: usize) -> Option<PageRequest> {
        if !self.pending_growth {
            return None;
        }
        if self.raw_exhausted || filtered_len > self.pending_from {
            self.pending_growth = false;
            return None;
        }
        self.issue()
    }

    fn issue(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let request = PageRequest {
            epoch: self.epoch,
            offset: self.cursor,
            limit: self.page_size,
        };
        self.in_flight = Some(request);
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn snapshot(count: u32) -> CatalogSnapshot {
        CatalogSnapshot::from_entities(
            (1..=count)
                .map(|id| CatalogEntity::new(id, format!("mon-{id}"), Vec::new()))
                .collect(),
            Utc::now(),
        )
    }

    fn ids(window: &VisibleWindow) -> Vec<u32> {
        window.items.iter().map(|entity| entity.id).collect()
    }

    #[test]
    fn complete_catalog_grows_by_slicing_until_covered() {
        let snapshot = snapshot(100);
        let filtered: Vec<u32> = (1..=100).collect();
        let mut list = ListController::new(30);
        list.mark_exhausted();

        let window = list.window(&filtered, &snapshot);
        assert_eq!(ids(&window), (1..=30).collect::<Vec<_>>());
        assert!(window.has_more);

        assert_eq!(list.on_near_end(100), Growth::Grew);
        assert_eq!(list.window(&filtered, &snapshot).items.len(), 60);
        assert_eq!(list.on_near_end(100), Growth::Grew);
        assert_eq!(list.window(&filtered, &snapshot).items.len(), 90);
        assert_eq!(list.on_near_end(100), Growth::Grew);

        let window = list.window(&filtered, &snapshot);
        assert_eq!(ids(&window), (1..=100).collect::<Vec<_>>());
        assert!(!window.has_more);
        assert_eq!(list.on_near_end(100), Growth::Ignored);
        assert_eq!(list.phase(100), ListPhase::Exhausted);
    }

    #[test]
    fn covered_window_requests_next_raw_page() {
        let mut list = ListController::new(30);
        let Growth::Fetch(first) = list.on_near_end(0) else {
            panic!("expected a fetch");
        };
        assert_eq!(first.offset, 0);
        assert!(list.is_fetching());

        // A second signal while fetching does not issue another request.
        assert_eq!(list.on_near_end(0), Growth::Ignored);

        assert_eq!(list.page_loaded(first, 30, true, 30), None);
        assert!(!list.is_fetching());
        assert_eq!(list.cursor(), 30);

        let Growth::Fetch(second) = list.on_near_end(30) else {
            panic!("expected a fetch");
        };
        assert_eq!(second.offset, 30);
    }

    #[test]
    fn page_without_new_matches_fetches_again() {
        let mut list = ListController::new(30);
        let Growth::Fetch(first) = list.on_near_end(0) else {
            panic!("expected a fetch");
        };
        let next = list.page_loaded(first, 30, true, 0);
        assert_eq!(
            next,
            Some(PageRequest {
                epoch: first.epoch,
                offset: 30,
                limit: 30
            })
        );
        let last = list.page_loaded(next.unwrap(), 12, false, 0);
        assert_eq!(last, None);
        assert!(list.is_raw_exhausted());
        assert!(!list.has_more(0));
    }

    #[test]
    fn stale_epoch_completion_leaves_new_window_alone() {
        let mut list = ListController::new(30);
        let Growth::Fetch(stale) = list.on_near_end(0) else {
            panic!("expected a fetch");
        };

        list.begin_epoch();
        assert_eq!(list.on_near_end(0), Growth::Waiting);

        // The stale page brings no match for the new criteria; growth continues
        // under the new epoch.
        let next = list.page_loaded(stale, 30, true, 0).expect("follow-up fetch");
        assert_eq!(next.epoch, list.epoch());
        assert_eq!(next.offset, 30);
        assert_eq!(list.cursor(), 30);
    }

    #[test]
    fn failure_disables_growth_until_retry_or_new_epoch() {
        let mut list = ListController::new(30);
        let Growth::Fetch(request) = list.on_near_end(0) else {
            panic!("expected a fetch");
        };
        assert_eq!(list.page_failed(request, "offline", 0), None);
        assert_eq!(list.error(), Some("offline"));
        assert!(!list.has_more(0));
        assert_eq!(list.on_near_end(0), Growth::Ignored);

        let retried = list.retry(0).expect("retry fetches");
        assert_eq!(retried.offset, 0);
        assert_eq!(list.error(), None);

        list.page_failed(retried, "offline again", 0);
        list.begin_epoch();
        assert_eq!(list.error(), None);
        assert!(matches!(list.on_near_end(0), Growth::Fetch(_)));
    }

    #[test]
    fn fill_tops_up_a_short_first_window() {
        let mut list = ListController::new(30);
        let request = list.fill(4).expect("short window fetches");
        assert_eq!(list.fill(4), None);
        list.page_loaded(request, 30, true, 31);
        assert_eq!(list.fill(31), None);
    }

    #[test]
    fn restart_resets_cursor_and_ignores_old_pages() {
        let mut list = ListController::new(30);
        let Growth::Fetch(old) = list.on_near_end(0) else {
            panic!("expected a fetch");
        };
        list.restart();
        assert_eq!(list.cursor(), 0);
        list.page_loaded(old, 30, false, 0);
        assert_eq!(list.cursor(), 0);
        assert!(!list.is_raw_exhausted());
    }
}
