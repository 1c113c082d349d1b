//! Trailing debounce for search input.
//!
//! Each keystroke cancels the pending query and restarts the timer. The
//! owner polls on its tick and fires the query once the delay has passed
//! with no further input.
use std::time::Duration;
use tokio::time::Instant;

use crate::util::MAX_SEARCH_QUERY_LENGTH;

/// What the UI should do after a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchInput {
    /// Under the minimum length: show suggestions, never fetch.
    ShowSuggestions,
    /// A fetch is scheduled for `deadline` unless more input arrives.
    Scheduled { deadline: Instant },
    /// Over the length cap: refused without fetching.
    TooLong,
}

#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    min_chars: usize,
    pending: Option<(String, Instant)>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration, min_chars: usize) -> Self {
        Self {
            delay,
            min_chars,
            pending: None,
        }
    }

    /// Register the full current input text.
    pub fn on_input(&mut self, text: &str) -> SearchInput {
        self.pending = None;

        let query = text.trim();
        let chars = query.chars().count();
        if chars < self.min_chars {
            return SearchInput::ShowSuggestions;
        }
        if chars > MAX_SEARCH_QUERY_LENGTH {
            tracing::debug!(chars, max = MAX_SEARCH_QUERY_LENGTH, "Search query too long");
            return SearchInput::TooLong;
        }

        let deadline = Instant::now() + self.delay;
        self.pending = Some((query.to_string(), deadline));
        SearchInput::Scheduled { deadline }
    }

    /// Take the pending query if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(q, _)| q),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
