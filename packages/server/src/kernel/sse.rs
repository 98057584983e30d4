//! SSE endpoint for streaming pipeline progress to clients.
//!
//! Subscribes to the progress StreamHub topic for a transcript and forwards
//! each event as a one-line JSON SSE frame. The stream closes itself after
//! forwarding a terminal event (`completed` or `failed`); a subscriber that
//! connects late simply misses earlier events.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::future::ready;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::stream_hub::StreamHub;
use crate::domains::transcripts::{progress_topic, ProgressEvent};

/// Shared state for the SSE routes.
#[derive(Clone)]
pub struct SseState {
    pub stream_hub: StreamHub<ProgressEvent>,
}

/// Build the axum router for SSE endpoints.
pub fn router(state: SseState) -> Router {
    Router::new()
        .route("/api/transcripts/:transcript_id/events", get(progress_handler))
        .with_state(state)
}

/// Turn a progress subscription into `(event name, json data)` frames.
///
/// Ends after the first terminal event; a lagged receiver yields a `lagged`
/// frame and keeps streaming from wherever the channel buffer resumes.
fn event_frames(
    rx: broadcast::Receiver<ProgressEvent>,
) -> impl Stream<Item = (String, String)> {
    BroadcastStream::new(rx).scan(false, |finished, result| {
        if *finished {
            return ready(None);
        }
        let frame = match result {
            Ok(progress) => {
                *finished = progress.is_terminal();
                let data = serde_json::to_string(&progress).unwrap_or_else(|_| "{}".to_string());
                (progress.event_type().to_string(), data)
            }
            Err(BroadcastStreamRecvError::Lagged(_)) => ("lagged".to_string(), "{}".to_string()),
        };
        ready(Some(frame))
    })
}

/// SSE handler — subscribes to a transcript's progress topic and streams
/// events until a terminal one arrives.
async fn progress_handler(
    State(state): State<SseState>,
    Path(transcript_id): Path<Uuid>,
) -> impl IntoResponse {
    let rx = state
        .stream_hub
        .subscribe(&progress_topic(transcript_id))
        .await;

    let stream = event_frames(rx)
        .map(|(name, data)| Ok::<_, Infallible>(Event::default().event(name).data(data)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
