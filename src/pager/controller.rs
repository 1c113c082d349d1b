//! Pagination controller for one content stream.
//!
//! The controller never performs I/O. [`Pager::begin_initial`] and
//! [`Pager::begin_more`] hand out a [`PageRequest`] when a fetch should be
//! issued; the caller runs it and feeds the result back through
//! [`Pager::complete`]. Every request carries the generation it was issued
//! under, so a response that arrives after a tab switch or a new query is
//! recognised and dropped instead of being appended to the wrong list.
use serde::Serialize;

use super::state::{PageState, StreamKind, StreamQuery};
use crate::api::ApiError;
use crate::catalog::CatalogItem;

/// A page with fewer items than this ends the stream.
pub const SHORT_PAGE_THRESHOLD: usize = 5;

/// Whether a fetch replaces or extends the accumulated items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    Replace,
    Append,
}

/// A fetch the caller must perform on the pager's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub stream: StreamKind,
    pub generation: u64,
    pub query: StreamQuery,
    pub page: u32,
    pub mode: LoadMode,
}

/// What a stream currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum StreamStatus {
    Idle,
    Loading,
    /// Items shown, more pages available.
    Ready,
    /// Items shown, no more pages.
    Exhausted,
    /// The query matched nothing.
    Empty,
    /// Last fetch failed; retry-able.
    Failed(String),
}

/// Result of applying a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Loaded { added: usize, has_more: bool },
    Empty,
    Failed,
    /// The response belonged to an earlier generation and was discarded.
    Stale,
}

/// Paginated item list for a single stream.
#[derive(Debug, Clone)]
pub struct Pager {
    kind: StreamKind,
    state: PageState,
    items: Vec<CatalogItem>,
    generation: u64,
    status: StreamStatus,
    short_page_threshold: usize,
}

impl Pager {
    pub fn new(kind: StreamKind) -> Self {
        Self::with_threshold(kind, SHORT_PAGE_THRESHOLD)
    }

    pub fn with_threshold(kind: StreamKind, short_page_threshold: usize) -> Self {
        Self {
            kind,
            state: PageState::default(),
            items: Vec::new(),
            generation: 0,
            status: StreamStatus::Idle,
            short_page_threshold,
        }
    }

    /// Start the stream over for `query`.
    ///
    /// Returns `None` while a fetch for the same query is already in flight.
    /// A different query supersedes the in-flight fetch: its response will be
    /// reported as [`PageOutcome::Stale`].
    pub fn begin_initial(&mut self, query: StreamQuery) -> Option<PageRequest> {
        if self.state.loading && self.state.active_query.as_ref() == Some(&query) {
            tracing::debug!(stream = ?self.kind, %query, "Initial load already in flight");
            return None;
        }

        self.generation = self.generation.wrapping_add(1);
        self.state = PageState::starting(query.clone());
        self.state.loading = true;
        self.items.clear();
        self.status = StreamStatus::Loading;

        tracing::debug!(stream = ?self.kind, %query, generation = self.generation, "Loading first page");
        Some(self.request(query, LoadMode::Replace))
    }

    /// Request the next page, unless a fetch is in flight or the stream ended.
    pub fn begin_more(&mut self) -> Option<PageRequest> {
        if !self.state.can_load_more() {
            return None;
        }
        let query = self.state.active_query.clone()?;

        self.state.loading = true;
        self.status = StreamStatus::Loading;
        tracing::debug!(stream = ?self.kind, %query, page = self.state.cursor, "Loading next page");
        Some(self.request(query, LoadMode::Append))
    }

    fn request(&self, query: StreamQuery, mode: LoadMode) -> PageRequest {
        PageRequest {
            stream: self.kind,
            generation: self.generation,
            query,
            page: self.state.cursor,
            mode,
        }
    }

    /// Apply the result of `request`.
    ///
    /// `loading` is cleared on every path except a stale response, which
    /// belongs to a fetch this pager no longer tracks.
    ///
    /// # Returns
    ///
    /// - [`PageOutcome::Stale`] if `request` belongs to an older generation;
    ///   nothing changes
    /// - [`PageOutcome::Failed`] for any `Err`; items, cursor and `has_more`
    ///   are kept so the same page can be retried
    /// - [`PageOutcome::Empty`] for an empty batch; the stream ends
    /// - [`PageOutcome::Loaded`] otherwise; the batch is appended and the
    ///   cursor advances, and a batch shorter than the threshold ends the stream
    pub fn complete(
        &mut self,
        request: &PageRequest,
        result: Result<Vec<CatalogItem>, ApiError>,
    ) -> PageOutcome {
        if request.generation != self.generation {
            tracing::debug!(
                stream = ?self.kind,
                expected = self.generation,
                got = request.generation,
                page = request.page,
                "Ignoring stale page (generation mismatch)"
            );
            return PageOutcome::Stale;
        }

        self.state.loading = false;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(
                    stream = ?self.kind,
                    page = request.page,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Page fetch failed"
                );
                self.status = StreamStatus::Failed(e.to_string());
                return PageOutcome::Failed;
            }
        };

        if batch.is_empty() {
            self.state.has_more = false;
            self.status = if self.items.is_empty() {
                StreamStatus::Empty
            } else {
                StreamStatus::Exhausted
            };
            tracing::debug!(stream = ?self.kind, page = request.page, "Empty page ends stream");
            return PageOutcome::Empty;
        }

        let added = batch.len();
        if added < self.short_page_threshold {
            tracing::debug!(stream = ?self.kind, page = request.page, added, "Short page ends stream");
            self.state.has_more = false;
        }
        self.items.extend(batch);
        self.state.cursor = self.state.cursor.saturating_add(1);
        self.status = if self.state.has_more {
            StreamStatus::Ready
        } else {
            StreamStatus::Exhausted
        };

        PageOutcome::Loaded {
            added,
            has_more: self.state.has_more,
        }
    }

    /// Give up on `request` without a result (the fetch task died).
    ///
    /// Same effect on state as a transport failure.
    pub fn abort(&mut self, request: &PageRequest, reason: &str) -> PageOutcome {
        if request.generation != self.generation {
            return PageOutcome::Stale;
        }
        self.state.loading = false;
        self.status = StreamStatus::Failed(reason.to_string());
        PageOutcome::Failed
    }

    /// Drop the stream's query and items; in-flight responses become stale.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.state = PageState::default();
        self.items.clear();
        self.status = StreamStatus::Idle;
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn active_query(&self) -> Option<&StreamQuery> {
        self.state.active_query.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HomeTab;
    use pretty_assertions::assert_eq;

    fn items(range: std::ops::Range<usize>) -> Vec<CatalogItem> {
        range
            .map(|i| CatalogItem {
                id: i.to_string(),
                title: format!("Drama {i}"),
                cover_url: String::new(),
            })
            .collect()
    }

    fn ids(pager: &Pager) -> Vec<String> {
        pager.items().iter().map(|i| i.id.clone()).collect()
    }

    fn foryou() -> StreamQuery {
        StreamQuery::Tab(HomeTab::ForYou)
    }

    #[test]
    fn test_first_page_then_append() {
        let mut pager = Pager::new(StreamKind::Home);
        let first = pager.begin_initial(foryou()).unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.mode, LoadMode::Replace);

        let outcome = pager.complete(&first, Ok(items(0..9)));
        assert_eq!(outcome, PageOutcome::Loaded { added: 9, has_more: true });
        assert_eq!(pager.state().cursor, 2);
        assert_eq!(pager.status(), &StreamStatus::Ready);

        let more = pager.begin_more().unwrap();
        assert_eq!(more.page, 2);
        assert_eq!(more.mode, LoadMode::Append);
        pager.complete(&more, Ok(items(9..18)));

        assert_eq!(pager.state().cursor, 3);
        let expected: Vec<String> = (0..18).map(|i| i.to_string()).collect();
        assert_eq!(ids(&pager), expected);
    }

    #[test]
    fn test_load_more_while_loading_is_noop() {
        let mut pager = Pager::new(StreamKind::Home);
        let first = pager.begin_initial(foryou()).unwrap();
        pager.complete(&first, Ok(items(0..9)));

        let _in_flight = pager.begin_more().unwrap();
        let before = pager.state().clone();
        assert_eq!(pager.begin_more(), None);
        assert_eq!(pager.state(), &before);
        assert_eq!(pager.items().len(), 9);
    }

    #[test]
    fn test_same_query_initial_while_loading_is_dropped() {
        let mut pager = Pager::new(StreamKind::Home);
        let first = pager.begin_initial(foryou()).unwrap();
        assert_eq!(pager.begin_initial(foryou()), None);
        assert_eq!(pager.generation(), first.generation);
    }

    #[test]
    fn test_short_page_ends_stream() {
        let mut pager = Pager::new(StreamKind::Search);
        let first = pager
            .begin_initial(StreamQuery::Search("ceo".into()))
            .unwrap();
        let outcome = pager.complete(&first, Ok(items(0..3)));
        assert_eq!(outcome, PageOutcome::Loaded { added: 3, has_more: false });
        assert_eq!(pager.status(), &StreamStatus::Exhausted);
        assert_eq!(pager.begin_more(), None);
    }

    #[test]
    fn test_empty_result_is_terminal_not_error() {
        let mut pager = Pager::new(StreamKind::Search);
        let first = pager
            .begin_initial(StreamQuery::Search("zzz".into()))
            .unwrap();
        assert_eq!(pager.complete(&first, Ok(Vec::new())), PageOutcome::Empty);
        assert_eq!(pager.status(), &StreamStatus::Empty);
        assert!(!pager.state().has_more);
        assert!(!pager.is_loading());
    }

    #[test]
    fn test_empty_page_after_items_is_exhausted() {
        let mut pager = Pager::new(StreamKind::Home);
        let first = pager.begin_initial(foryou()).unwrap();
        pager.complete(&first, Ok(items(0..10)));
        let more = pager.begin_more().unwrap();
        assert_eq!(pager.complete(&more, Ok(Vec::new())), PageOutcome::Empty);
        assert_eq!(pager.status(), &StreamStatus::Exhausted);
        assert_eq!(pager.items().len(), 10);
        assert_eq!(pager.state().cursor, 2);
    }

    #[test]
    fn test_failure_keeps_items_and_has_more() {
        let mut pager = Pager::new(StreamKind::Home);
        let first = pager.begin_initial(foryou()).unwrap();
        pager.complete(&first, Ok(items(0..9)));

        let more = pager.begin_more().unwrap();
        let outcome = pager.complete(&more, Err(ApiError::HttpStatus(503)));
        assert_eq!(outcome, PageOutcome::Failed);
        assert!(!pager.is_loading());
        assert!(pager.state().has_more);
        assert_eq!(pager.state().cursor, 2);
        assert_eq!(pager.items().len(), 9);
        assert!(matches!(pager.status(), StreamStatus::Failed(_)));

        // Retry asks for the same page.
        assert_eq!(pager.begin_more().unwrap().page, 2);
    }

    #[test]
    fn test_tab_switch_makes_old_response_stale() {
        let mut pager = Pager::new(StreamKind::Home);
        let old = pager.begin_initial(foryou()).unwrap();
        let new = pager
            .begin_initial(StreamQuery::Tab(HomeTab::Trending))
            .unwrap();
        assert_ne!(old.generation, new.generation);

        assert_eq!(pager.complete(&old, Ok(items(0..9))), PageOutcome::Stale);
        assert!(pager.items().is_empty());
        assert!(pager.is_loading());

        pager.complete(&new, Ok(items(100..106)));
        assert_eq!(ids(&pager)[0], "100");
        assert_eq!(
            pager.active_query(),
            Some(&StreamQuery::Tab(HomeTab::Trending))
        );
    }

    #[test]
    fn test_slow_first_page_cannot_clobber_reload() {
        let mut pager = Pager::new(StreamKind::Home);
        let first = pager.begin_initial(foryou()).unwrap();
        pager.complete(&first, Ok(items(0..9)));
        let more = pager.begin_more().unwrap();

        // Reload of the same tab while page 2 is in flight is dropped.
        assert_eq!(pager.begin_initial(foryou()), None);
        pager.complete(&more, Ok(items(9..12)));
        assert_eq!(pager.items().len(), 12);
    }

    #[test]
    fn test_clear_discards_in_flight() {
        let mut pager = Pager::new(StreamKind::Search);
        let req = pager
            .begin_initial(StreamQuery::Search("ceo".into()))
            .unwrap();
        pager.clear();
        assert_eq!(pager.complete(&req, Ok(items(0..9))), PageOutcome::Stale);
        assert!(pager.items().is_empty());
        assert_eq!(pager.status(), &StreamStatus::Idle);
        assert_eq!(pager.active_query(), None);
        assert_eq!(pager.begin_more(), None);
    }

    #[test]
    fn test_abort_releases_loading() {
        let mut pager = Pager::new(StreamKind::Home);
        let req = pager.begin_initial(foryou()).unwrap();
        assert_eq!(pager.abort(&req, "task died"), PageOutcome::Failed);
        assert!(!pager.is_loading());
        assert!(pager.state().has_more);
        assert_eq!(pager.begin_more().unwrap().page, 1);
    }

    #[test]
    fn test_custom_threshold() {
        let mut pager = Pager::with_threshold(StreamKind::Home, 10);
        let first = pager.begin_initial(foryou()).unwrap();
        assert_eq!(
            pager.complete(&first, Ok(items(0..9))),
            PageOutcome::Loaded { added: 9, has_more: false }
        );
    }
}
