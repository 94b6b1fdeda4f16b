//! Live dashboard streams over SSE.
//!
//! Each stream sends a full `snapshot` event immediately, then again after
//! every relevant data change. Change detection rides on the store's
//! LISTEN/NOTIFY feed; if the listening connection cannot be established the
//! stream degrades to polling. Comment-frame heartbeats keep idle
//! connections alive through proxies.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use nivaari_store::changes::{channel, ChangeFeed};
use nivaari_store::{AdminSnapshot, ModeratorSnapshot};

use crate::auth::{AdminSession, ModeratorSession};
use crate::AppState;

const HEARTBEAT: Duration = Duration::from_secs(20);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

fn snapshot_event<T: Serialize>(snapshot: &T) -> Event {
    match Event::default().event("snapshot").json_data(snapshot) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "failed to serialize snapshot");
            error_event("Failed to serialize snapshot")
        }
    }
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .data(serde_json::json!({ "message": message }).to_string())
}

/// Shared stream skeleton: initial snapshot, then one rebuild per change
/// notification, or per poll tick when listening is unavailable. The
/// listening connection is torn down when the client disconnects and the
/// stream is dropped.
fn live_stream<T, F, Fut>(
    pool: PgPool,
    channels: &'static [&'static str],
    build: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send,
    F: Fn(PgPool) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = anyhow::Result<T>> + Send,
{
    let stream = async_stream::stream! {
        match build(pool.clone()).await {
            Ok(snapshot) => yield Ok(snapshot_event(&snapshot)),
            Err(e) => {
                warn!(error = %e, "failed to build initial snapshot");
                yield Ok(error_event("Failed to load snapshot"));
            }
        }

        match ChangeFeed::connect(&pool, channels).await {
            Ok(mut feed) => {
                while feed.changed().await.is_some() {
                    match build(pool.clone()).await {
                        Ok(snapshot) => yield Ok(snapshot_event(&snapshot)),
                        Err(e) => {
                            warn!(error = %e, "failed to rebuild snapshot");
                            yield Ok(error_event("Failed to load snapshot"));
                        }
                    }
                }
                // Listener lost; end the stream so the client reconnects.
            }
            Err(e) => {
                warn!(error = %e, "change listener unavailable, falling back to polling");
                let mut ticker = tokio::time::interval(POLL_INTERVAL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    match build(pool.clone()).await {
                        Ok(snapshot) => yield Ok(snapshot_event(&snapshot)),
                        Err(e) => {
                            warn!(error = %e, "failed to rebuild snapshot");
                            yield Ok(error_event("Failed to load snapshot"));
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT))
}

// GET /api/moderator/reports/stream
pub async fn moderator_stream(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    live_stream(
        state.pool.clone(),
        &[channel::CITIZEN_REPORTS, channel::MODERATOR_DECISIONS],
        |pool| async move { ModeratorSnapshot::build(&pool).await },
    )
}

// GET /api/admin/moderators/stream
pub async fn admin_stream(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    live_stream(
        state.pool.clone(),
        &[
            channel::CITIZEN_REPORTS,
            channel::MODERATOR_DECISIONS,
            channel::MODERATORS,
            channel::USERS,
        ],
        |pool| async move { AdminSnapshot::build(&pool).await },
    )
}
