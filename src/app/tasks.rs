//! Background fetch tasks.
//!
//! Each task reports exactly one event back, including when it panics, so
//! the state that spawned it never stays stuck in a loading state.
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::AppEvent;
use crate::api::{ApiClient, ApiError, DramaBundle};
use crate::catalog::CatalogItem;
use crate::pager::{PageRequest, StreamQuery};

/// Wraps a future to catch panics and convert them to errors.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            }
        })
}

async fn send(tx: &mpsc::Sender<AppEvent>, event: AppEvent, name: &'static str) {
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, event = name, "Channel send failed (receiver dropped)");
    }
}

async fn fetch_page(
    client: &ApiClient,
    query: &StreamQuery,
    page: u32,
) -> Result<Vec<CatalogItem>, ApiError> {
    match query {
        StreamQuery::Tab(tab) => client.fetch_tab(*tab, page).await,
        StreamQuery::Search(q) => client.search(q, page).await,
    }
}

/// Fetch the page described by `request` and report `PageLoaded`.
pub(super) fn spawn_page_load(
    request: PageRequest,
    client: ApiClient,
    tx: mpsc::Sender<AppEvent>,
) {
    tokio::spawn(async move {
        let outcome = catch_task_panic(fetch_page(&client, &request.query, request.page)).await;
        let event = match outcome {
            Ok(result) => AppEvent::PageLoaded { request, result },
            Err(panic_msg) => {
                tracing::error!(task = "page_load", error = %panic_msg, "Background task panicked");
                AppEvent::PageAborted {
                    request,
                    reason: panic_msg,
                }
            }
        };
        send(&tx, event, "PageLoaded").await;
    });
}

/// Load popular search keywords and report `SuggestionsLoaded`.
pub(super) fn spawn_suggestions_load(client: ApiClient, tx: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let result = match catch_task_panic(client.popular_searches()).await {
            Ok(result) => result,
            Err(panic_msg) => {
                tracing::error!(task = "suggestions_load", error = %panic_msg, "Background task panicked");
                Ok(Vec::new())
            }
        };
        send(&tx, AppEvent::SuggestionsLoaded(result), "SuggestionsLoaded").await;
    });
}

async fn fetch_drama(
    client: &ApiClient,
    card: Option<CatalogItem>,
) -> Result<Option<DramaBundle>, ApiError> {
    let card = match card {
        Some(card) => card,
        None => match client.random_drama().await? {
            Some(detail) => detail.as_card(),
            None => return Ok(None),
        },
    };
    client.drama(&card).await.map(Some)
}

/// Load a drama (or a random one when `card` is `None`) and report
/// `DramaLoaded`.
pub(super) fn spawn_drama_load(
    card: Option<CatalogItem>,
    generation: u64,
    client: ApiClient,
    tx: mpsc::Sender<AppEvent>,
) {
    tokio::spawn(async move {
        let result = match catch_task_panic(fetch_drama(&client, card)).await {
            Ok(Ok(bundle)) => Ok(bundle),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic_msg) => {
                tracing::error!(task = "drama_load", error = %panic_msg, "Background task panicked");
                Err(panic_msg)
            }
        };
        send(&tx, AppEvent::DramaLoaded { generation, result }, "DramaLoaded").await;
    });
}

/// Record watch history. Failures are only logged; the handle lets a
/// short-lived caller wait for the write before shutting down.
pub(super) fn spawn_history_record(
    client: ApiClient,
    user_id: i64,
    card: CatalogItem,
    episode_number: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match client.record_history(user_id, &card, episode_number).await {
            Ok(()) => tracing::debug!(book_id = %card.id, episode_number, "Recorded watch history"),
            Err(e) => tracing::warn!(book_id = %card.id, error = %e, "Failed to record watch history"),
        }
    })
}
