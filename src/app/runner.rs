//! Event loop for the headless app.
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::events::handle_app_event;
use super::{App, AppEvent};

/// Tick period for debounce polling.
pub const TICK: Duration = Duration::from_millis(50);

/// Fire the debounced search once its deadline has passed.
pub fn handle_tick(app: &mut App, now: Instant, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(query) = app.debouncer.poll(now) {
        tracing::debug!(query = %query, "Debounced search fired");
        app.start_search(query, event_tx);
    }
}

/// Process events and ticks until no fetch or debounce timer is outstanding.
///
/// Returns `false` if interrupted by Ctrl-C.
pub async fn run_until_settled(
    app: &mut App,
    event_tx: &mpsc::Sender<AppEvent>,
    event_rx: &mut mpsc::Receiver<AppEvent>,
) -> bool {
    let mut tick_interval = tokio::time::interval(TICK);

    while app.has_pending_work() {
        // Drain queued events before waiting again.
        while let Ok(event) = event_rx.try_recv() {
            handle_app_event(app, event);
        }
        if !app.has_pending_work() {
            break;
        }

        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, stopping");
                return false;
            }

            Some(event) = event_rx.recv() => {
                handle_app_event(app, event);
            }

            _ = tick_interval.tick() => {
                handle_tick(app, Instant::now(), event_tx);
            }
        }
    }
    true
}
