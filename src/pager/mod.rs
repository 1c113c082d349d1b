//! Pagination controller and search debounce.
//!
//! One [`Pager`] per stream (home feed, search results). Pagers are plain
//! state machines; the application layer performs the fetches they request.

pub mod controller;
pub mod debounce;
pub mod state;

pub use controller::{
    LoadMode, PageOutcome, PageRequest, Pager, StreamStatus, SHORT_PAGE_THRESHOLD,
};
pub use debounce::{SearchDebouncer, SearchInput};
pub use state::{PageState, StreamKind, StreamQuery};
