//! Server-Sent Events (SSE) stream
//!
//! A new client first receives a `Snapshot` event with the current view and
//! both playback channels, then every reader event as it is broadcast.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before taking the snapshot so nothing falls between them
    let rx = ctx.state.subscribe_events();

    let snapshot = json!({
        "type": "Snapshot",
        "router": ctx.state.router.snapshot().await,
        "sentence": ctx.state.sentence.snapshot().await,
        "word": ctx.state.popup.word_player().snapshot().await,
    });
    debug!("SSE client connected");

    let initial = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("Snapshot").data(snapshot.to_string()))
    });

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!("SSE client lagged, events dropped: {}", e);
                return None;
            }
        };
        match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(Event::default().event(event.event_type()).data(data))),
            Err(e) => {
                warn!("Failed to serialize {}: {}", event.event_type(), e);
                None
            }
        }
    });

    Sse::new(initial.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
