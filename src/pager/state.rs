//! Per-stream pagination state.
use serde::Serialize;
use std::fmt;

use crate::api::HomeTab;

/// Which stream a pager drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Home,
    Search,
}

/// What a stream is currently paging through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StreamQuery {
    Tab(HomeTab),
    Search(String),
}

impl StreamQuery {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamQuery::Tab(_) => StreamKind::Home,
            StreamQuery::Search(_) => StreamKind::Search,
        }
    }
}

impl fmt::Display for StreamQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamQuery::Tab(tab) => write!(f, "tab:{tab}"),
            StreamQuery::Search(q) => write!(f, "search:{q}"),
        }
    }
}

/// Cursor and flags of one stream.
///
/// `loading` covers exactly one outstanding fetch. `has_more` only ever goes
/// from true to false until the next [`PageState::starting`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageState {
    /// Next page to request, 1-based.
    pub cursor: u32,
    pub loading: bool,
    pub has_more: bool,
    pub active_query: Option<StreamQuery>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            cursor: 1,
            loading: false,
            has_more: true,
            active_query: None,
        }
    }
}

impl PageState {
    /// Fresh state for a new tab or query.
    pub fn starting(query: StreamQuery) -> Self {
        Self {
            active_query: Some(query),
            ..Self::default()
        }
    }

    /// Whether `loadMore` would issue a fetch.
    pub fn can_load_more(&self) -> bool {
        !self.loading && self.has_more && self.active_query.is_some()
    }
}
