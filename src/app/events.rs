//! Application of background task results.
use super::{App, DramaState};
use crate::api::{ApiError, DramaBundle};
use crate::catalog::CatalogItem;
use crate::pager::{PageOutcome, PageRequest, StreamKind};

/// Messages sent from background tasks to the app.
#[derive(Debug)]
pub enum AppEvent {
    /// A page fetch finished.
    ///
    /// Fields:
    /// - `request`: the request as issued, including its generation
    /// - `result`: normalized items or the fetch error
    PageLoaded {
        request: PageRequest,
        result: Result<Vec<CatalogItem>, ApiError>,
    },
    /// A page fetch task panicked before producing a result.
    PageAborted { request: PageRequest, reason: String },
    SuggestionsLoaded(Result<Vec<String>, ApiError>),
    /// A drama (or random pick) finished loading.
    ///
    /// `Ok(None)` means the random pick returned nothing usable.
    DramaLoaded {
        generation: u64,
        result: Result<Option<DramaBundle>, String>,
    },
}

pub fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::PageLoaded { request, result } => {
            let outcome = app.pager_mut(request.stream).complete(&request, result);
            report_page_outcome(app, request.stream, &outcome);
        }
        AppEvent::PageAborted { request, reason } => {
            let outcome = app.pager_mut(request.stream).abort(&request, &reason);
            report_page_outcome(app, request.stream, &outcome);
        }
        AppEvent::SuggestionsLoaded(result) => {
            app.suggestions_loading = false;
            match result {
                Ok(keywords) => {
                    tracing::debug!(count = keywords.len(), "Suggestions loaded");
                    app.suggestions = keywords;
                }
                // Suggestions are decorative; an empty list is the fallback.
                Err(e) => tracing::warn!(error = %e, "Failed to load search suggestions"),
            }
        }
        AppEvent::DramaLoaded { generation, result } => {
            handle_drama_loaded(app, generation, result);
        }
    }
}

fn report_page_outcome(app: &mut App, stream: StreamKind, outcome: &PageOutcome) {
    match outcome {
        PageOutcome::Loaded { added, has_more } => {
            tracing::debug!(?stream, added, has_more, "Page applied");
        }
        PageOutcome::Empty if app.pager(stream).items().is_empty() => {
            app.set_status(match stream {
                StreamKind::Home => "No dramas found",
                StreamKind::Search => "Nothing found",
            });
        }
        PageOutcome::Failed => app.set_status("Failed to load. Try again."),
        PageOutcome::Empty | PageOutcome::Stale => {}
    }
}

fn handle_drama_loaded(app: &mut App, generation: u64, result: Result<Option<DramaBundle>, String>) {
    if generation != app.drama_generation {
        tracing::debug!(
            expected = app.drama_generation,
            got = generation,
            "Ignoring stale drama (generation mismatch)"
        );
        return;
    }

    app.drama = match result {
        Ok(Some(bundle)) => {
            tracing::debug!(book_id = %bundle.detail.id, episodes = bundle.episodes.len(), "Drama loaded");
            DramaState::Loaded(Box::new(bundle))
        }
        Ok(None) => {
            app.set_status("Failed to get random drama");
            DramaState::NothingFound
        }
        Err(error) => {
            tracing::warn!(error = %error, "Failed to load drama");
            app.set_status("Failed to load drama");
            DramaState::Failed { error }
        }
    };
}
