//! Headless application state.
//!
//! [`App`] owns both content streams, the search debounce, the open drama
//! and the session. Fetches run as background tasks (see [`tasks`]) that
//! report back through [`AppEvent`]s; [`events::handle_app_event`] applies
//! them, dropping any response whose generation is no longer current.
//! [`runner`] drives the loop for the CLI.

pub mod events;
pub mod runner;
pub mod tasks;

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::access::UpsellOption;
use crate::api::{ApiClient, DramaBundle, HomeTab};
use crate::catalog::{CatalogItem, EpisodeRef};
use crate::config::Config;
use crate::pager::{Pager, SearchDebouncer, SearchInput, StreamKind, StreamQuery};
use crate::session::Session;
use crate::util::validate_media_url;

pub use events::{handle_app_event, AppEvent};
pub use runner::{handle_tick, run_until_settled};

// ============================================================================
// View State
// ============================================================================

/// What the search screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchView {
    Suggestions,
    Results,
}

/// Loading state of the drama detail screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DramaState {
    Idle,
    Loading { card: Option<CatalogItem> },
    Loaded(Box<DramaBundle>),
    /// The random pick returned nothing usable.
    NothingFound,
    Failed { error: String },
}

/// Result of asking to play an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlayOutcome {
    Ready { episode: EpisodeRef, url: String },
    /// Policy denial; the user must choose one of `options`.
    Denied {
        episode_index: usize,
        options: Vec<UpsellOption>,
    },
    /// Permitted, but the episode has no playable URL.
    Unavailable { episode_index: usize },
    /// No drama is open or the index is out of range.
    NoSuchEpisode { episode_index: usize },
}

// ============================================================================
// Application State
// ============================================================================

#[derive(Debug)]
pub struct App {
    pub client: ApiClient,
    pub config: Config,
    pub session: Session,

    // Streams
    pub home: Pager,
    pub search: Pager,

    // Search
    pub search_input: String,
    pub search_view: SearchView,
    pub debouncer: SearchDebouncer,
    pub suggestions: Vec<String>,
    pub suggestions_loading: bool,

    // Detail
    pub drama: DramaState,
    /// Bumped on every open; a `DramaLoaded` with an older generation is stale.
    pub drama_generation: u64,

    pub status_message: Option<(String, Instant)>,

    /// Background writes (watch history) not yet known to have finished.
    pending_writes: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(client: ApiClient, config: Config, session: Session) -> Self {
        let threshold = config.short_page_threshold;
        let debouncer = SearchDebouncer::new(config.search_debounce(), config.min_search_chars);
        Self {
            client,
            config,
            session,
            home: Pager::with_threshold(StreamKind::Home, threshold),
            search: Pager::with_threshold(StreamKind::Search, threshold),
            search_input: String::new(),
            search_view: SearchView::Suggestions,
            debouncer,
            suggestions: Vec::new(),
            suggestions_loading: false,
            drama: DramaState::Idle,
            drama_generation: 0,
            status_message: None,
            pending_writes: Vec::new(),
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(message = %message, "Status");
        self.status_message = Some((message, Instant::now()));
    }

    pub fn pager(&self, stream: StreamKind) -> &Pager {
        match stream {
            StreamKind::Home => &self.home,
            StreamKind::Search => &self.search,
        }
    }

    pub fn pager_mut(&mut self, stream: StreamKind) -> &mut Pager {
        match stream {
            StreamKind::Home => &mut self.home,
            StreamKind::Search => &mut self.search,
        }
    }

    /// Whether any fetch or debounce timer is still outstanding.
    pub fn has_pending_work(&self) -> bool {
        self.home.is_loading()
            || self.search.is_loading()
            || self.debouncer.is_pending()
            || self.suggestions_loading
            || matches!(self.drama, DramaState::Loading { .. })
    }

    // ------------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------------

    /// Switch the home feed to `tab` and load its first page.
    pub fn select_tab(&mut self, tab: HomeTab, event_tx: &mpsc::Sender<AppEvent>) {
        if let Some(request) = self.home.begin_initial(StreamQuery::Tab(tab)) {
            tasks::spawn_page_load(request, self.client.clone(), event_tx.clone());
        }
    }

    /// Load the next page of `stream` if it has one and is idle.
    pub fn load_more(&mut self, stream: StreamKind, event_tx: &mpsc::Sender<AppEvent>) -> bool {
        match self.pager_mut(stream).begin_more() {
            Some(request) => {
                tasks::spawn_page_load(request, self.client.clone(), event_tx.clone());
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// Handle an edit of the search box. The fetch itself fires from
    /// [`handle_tick`] once the input has been quiet for the debounce delay.
    pub fn on_search_input(&mut self, text: &str, event_tx: &mpsc::Sender<AppEvent>) {
        self.search_input = text.to_string();
        match self.debouncer.on_input(text) {
            SearchInput::ShowSuggestions => self.show_suggestions(event_tx),
            SearchInput::TooLong => {
                self.set_status(format!(
                    "Search query too long (max {} chars)",
                    crate::util::MAX_SEARCH_QUERY_LENGTH
                ));
            }
            SearchInput::Scheduled { .. } => {}
        }
    }

    /// Search immediately, skipping the debounce but not the length gates.
    pub fn submit_search(&mut self, text: &str, event_tx: &mpsc::Sender<AppEvent>) {
        self.on_search_input(text, event_tx);
        if let Some(deadline) = self.debouncer.deadline() {
            if let Some(query) = self.debouncer.poll(deadline) {
                self.start_search(query, event_tx);
            }
        }
    }

    pub(crate) fn start_search(&mut self, query: String, event_tx: &mpsc::Sender<AppEvent>) {
        self.search_view = SearchView::Results;
        if let Some(request) = self.search.begin_initial(StreamQuery::Search(query)) {
            tasks::spawn_page_load(request, self.client.clone(), event_tx.clone());
        }
    }

    /// Leave results and show popular searches, dropping any in-flight search.
    fn show_suggestions(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        self.search.clear();
        self.search_view = SearchView::Suggestions;
        if self.suggestions.is_empty() && !self.suggestions_loading {
            self.suggestions_loading = true;
            tasks::spawn_suggestions_load(self.client.clone(), event_tx.clone());
        }
    }

    // ------------------------------------------------------------------------
    // Detail & Playback
    // ------------------------------------------------------------------------

    pub fn open_drama(&mut self, card: CatalogItem, event_tx: &mpsc::Sender<AppEvent>) {
        if !card.is_openable() {
            self.set_status("This drama cannot be opened");
            return;
        }
        self.drama_generation = self.drama_generation.wrapping_add(1);
        self.drama = DramaState::Loading {
            card: Some(card.clone()),
        };
        tasks::spawn_drama_load(
            Some(card),
            self.drama_generation,
            self.client.clone(),
            event_tx.clone(),
        );
    }

    pub fn open_random(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        self.drama_generation = self.drama_generation.wrapping_add(1);
        self.drama = DramaState::Loading { card: None };
        tasks::spawn_drama_load(
            None,
            self.drama_generation,
            self.client.clone(),
            event_tx.clone(),
        );
    }

    pub fn current_drama(&self) -> Option<&DramaBundle> {
        match &self.drama {
            DramaState::Loaded(bundle) => Some(bundle),
            _ => None,
        }
    }

    /// Gate and resolve playback of the episode at `episode_index`.
    ///
    /// A permitted play by a signed-in user records watch history in the
    /// background; the outcome does not wait for it.
    pub fn play_episode(&mut self, episode_index: usize) -> PlayOutcome {
        let Some(bundle) = self.current_drama() else {
            return PlayOutcome::NoSuchEpisode { episode_index };
        };
        let Some(episode) = bundle.episodes.get(episode_index).cloned() else {
            return PlayOutcome::NoSuchEpisode { episode_index };
        };
        let card = bundle.detail.as_card();

        let decision = self
            .session
            .play_decision(episode_index, self.config.free_episode_limit);
        if let crate::access::PlayDecision::Denied { options } = decision {
            self.set_status("Upgrade to VIP or invite friends to unlock this episode");
            return PlayOutcome::Denied {
                episode_index,
                options,
            };
        }

        let Some(url) = episode.video_url.clone() else {
            self.set_status("Video not available");
            return PlayOutcome::Unavailable { episode_index };
        };
        if let Err(e) = validate_media_url(&url) {
            tracing::warn!(book_id = %card.id, episode_index, error = %e, "Rejected video URL");
            self.set_status("Video not available");
            return PlayOutcome::Unavailable { episode_index };
        }

        if !self.session.is_guest() {
            self.pending_writes.retain(|handle| !handle.is_finished());
            self.pending_writes.push(tasks::spawn_history_record(
                self.client.clone(),
                self.session.user_id(),
                card,
                episode_index + 1,
            ));
        }
        PlayOutcome::Ready { episode, url }
    }

    /// Number of background writes that may still be running.
    pub fn pending_writes(&self) -> usize {
        self.pending_writes
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait up to `limit` for background writes to finish.
    ///
    /// Returns how many were still running when the limit passed. Those keep
    /// running detached until the runtime shuts down.
    pub async fn finish_pending_writes(&mut self, limit: Duration) -> usize {
        let deadline = Instant::now() + limit;
        let mut unfinished = 0;
        for handle in self.pending_writes.drain(..) {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Background write task failed"),
                Err(_) => unfinished += 1,
            }
        }
        if unfinished > 0 {
            tracing::warn!(unfinished, ?limit, "Background writes still running at shutdown");
        }
        unfinished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DramaDetail;

    fn app() -> App {
        let client = ApiClient::with_base_url("http://127.0.0.1:9").unwrap();
        App::new(client, Config::default(), Session::guest())
    }

    fn bundle(episodes: usize) -> DramaBundle {
        DramaBundle {
            detail: DramaDetail {
                id: "7".to_string(),
                title: "Seven".to_string(),
                cover_url: String::new(),
                synopsis: String::new(),
                tags: Vec::new(),
            },
            episodes: (0..episodes)
                .map(|i| EpisodeRef {
                    index: i,
                    display_number: (i + 1).to_string(),
                    video_url: (i != 2).then(|| format!("https://cdn.example.com/{i}.mp4")),
                })
                .collect(),
        }
    }

    #[test]
    fn test_play_without_drama() {
        let mut app = app();
        assert_eq!(
            app.play_episode(0),
            PlayOutcome::NoSuchEpisode { episode_index: 0 }
        );
    }

    #[test]
    fn test_play_gating_for_guest() {
        let mut app = app();
        app.drama = DramaState::Loaded(Box::new(bundle(12)));

        assert!(matches!(app.play_episode(0), PlayOutcome::Ready { .. }));
        assert_eq!(
            app.play_episode(2),
            PlayOutcome::Unavailable { episode_index: 2 }
        );
        assert_eq!(
            app.play_episode(10),
            PlayOutcome::Denied {
                episode_index: 10,
                options: vec![UpsellOption::Upgrade, UpsellOption::InviteFriends],
            }
        );
        assert_eq!(
            app.play_episode(12),
            PlayOutcome::NoSuchEpisode { episode_index: 12 }
        );
    }

    #[tokio::test]
    async fn test_guest_play_spawns_no_writes() {
        let mut app = app();
        app.drama = DramaState::Loaded(Box::new(bundle(3)));
        assert!(matches!(app.play_episode(0), PlayOutcome::Ready { .. }));
        assert_eq!(app.pending_writes(), 0);
        assert_eq!(app.finish_pending_writes(Duration::from_millis(10)).await, 0);
    }

    #[test]
    fn test_unopenable_card_is_refused() {
        let mut app = app();
        let (tx, _rx) = mpsc::channel(4);
        app.open_drama(
            CatalogItem {
                id: String::new(),
                title: "x".to_string(),
                cover_url: String::new(),
            },
            &tx,
        );
        assert_eq!(app.drama, DramaState::Idle);
        assert!(app.status_message.is_some());
    }
}
