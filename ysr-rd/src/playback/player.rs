//! Channel player
//!
//! One playback lane (sentence or word). A channel holds at most one
//! session and moves Idle -> Loading -> Playing -> Idle.
//!
//! **Locking:** the channel state sits behind an async mutex that is never
//! held across the decode await or while an output thread is joined.
//! Sessions taken out of the slot are released after the guard is dropped.
//!
//! **Superseded loads:** every Loading state carries a generation number.
//! A decode that completes after its Loading state was stopped or replaced
//! sees a different slot and discards its result.

use crate::audio::adapter::AudioDecoder;
use crate::audio::output::{OutputBackend, OutputHandle};
use crate::error::{Error, Result};
use crate::playback::source::PlaybackSource;
use crate::playback::speed::PlaybackSpeed;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use ysr_common::events::{Channel, EndReason, EventBus, ReaderEvent};

/// Result of a play request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayOutcome {
    /// Audio is sounding
    Started,
    /// Same item was Loading or Playing and has been stopped
    Stopped,
    /// Item has no audio reference; nothing changed
    NoAudio,
    /// A later stop or play replaced this request while it was loading
    Superseded,
}

/// Channel status as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Idle,
    Loading,
    Playing,
}

/// Point-in-time view of a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnapshot {
    pub channel: Channel,
    pub status: ChannelStatus,
    pub item_id: Option<String>,
    pub speed: f32,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

/// A sounding clip and the output resource it holds
struct Session {
    item_id: String,
    generation: u64,
    source: Arc<PlaybackSource>,
    _output: OutputHandle,
}

enum Slot {
    Idle,
    Loading { item_id: String, generation: u64 },
    Playing(Session),
}

impl Slot {
    fn item_id(&self) -> Option<&str> {
        match self {
            Slot::Idle => None,
            Slot::Loading { item_id, .. } => Some(item_id),
            Slot::Playing(session) => Some(&session.item_id),
        }
    }

    fn is_loading(&self, generation: u64) -> bool {
        matches!(self, Slot::Loading { generation: g, .. } if *g == generation)
    }
}

struct Inner {
    slot: Slot,
    generation: u64,
    speed: PlaybackSpeed,
}

/// Playback lane with start, toggle-stop, speed and auto-stop-at-end
#[derive(Clone)]
pub struct ChannelPlayer {
    channel: Channel,
    inner: Arc<Mutex<Inner>>,
    decoder: Arc<dyn AudioDecoder>,
    output: Arc<dyn OutputBackend>,
    events: EventBus,
    release_grace: Duration,
}

impl ChannelPlayer {
    pub fn new(
        channel: Channel,
        decoder: Arc<dyn AudioDecoder>,
        output: Arc<dyn OutputBackend>,
        events: EventBus,
        release_grace: Duration,
    ) -> Self {
        Self {
            channel,
            inner: Arc::new(Mutex::new(Inner {
                slot: Slot::Idle,
                generation: 0,
                speed: PlaybackSpeed::default(),
            })),
            decoder,
            output,
            events,
            release_grace,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Start `item_id`, or stop it if it is already Loading or Playing.
    pub async fn play(&self, item_id: &str, audio_ref: Option<&str>) -> Result<PlayOutcome> {
        let mut inner = self.inner.lock().await;

        if inner.slot.item_id() == Some(item_id) {
            let previous = self.take_slot(&mut inner, EndReason::Stopped);
            drop(inner);
            release(previous).await;
            return Ok(PlayOutcome::Stopped);
        }

        self.begin(inner, item_id, audio_ref).await
    }

    /// Stop whatever is on the channel and start `item_id` from the beginning
    pub async fn restart(&self, item_id: &str, audio_ref: Option<&str>) -> Result<PlayOutcome> {
        let inner = self.inner.lock().await;
        self.begin(inner, item_id, audio_ref).await
    }

    /// Stop the current session, if any. Idempotent.
    pub async fn stop(&self) {
        self.end_current(EndReason::Stopped).await;
    }

    /// Stop for good when the reading surface goes away
    pub async fn teardown(&self) {
        self.end_current(EndReason::Teardown).await;
    }

    /// Change the speed; a running session converges on it without restarting
    pub async fn set_speed(&self, speed: PlaybackSpeed) {
        let mut inner = self.inner.lock().await;
        inner.speed = speed;
        if let Slot::Playing(session) = &inner.slot {
            session.source.set_target_rate(speed.value());
        }
        drop(inner);

        debug!("{} speed set to {}", self.channel, speed);
        self.events.emit(ReaderEvent::SpeedChanged {
            speed: speed.value(),
            timestamp: chrono::Utc::now(),
        });
    }

    pub async fn speed(&self) -> PlaybackSpeed {
        self.inner.lock().await.speed
    }

    pub async fn snapshot(&self) -> ChannelSnapshot {
        let inner = self.inner.lock().await;
        let (status, position_ms, duration_ms) = match &inner.slot {
            Slot::Idle => (ChannelStatus::Idle, None, None),
            Slot::Loading { .. } => (ChannelStatus::Loading, None, None),
            Slot::Playing(session) => (
                ChannelStatus::Playing,
                Some(session.source.position_ms()),
                Some(session.source.audio().duration_ms()),
            ),
        };
        ChannelSnapshot {
            channel: self.channel,
            status,
            item_id: inner.slot.item_id().map(str::to_string),
            speed: inner.speed.value(),
            position_ms,
            duration_ms,
        }
    }

    /// Item currently Loading or Playing
    pub async fn current_item(&self) -> Option<String> {
        self.inner.lock().await.slot.item_id().map(str::to_string)
    }

    /// Replace the slot with a new Loading state, decode, open output, commit
    async fn begin(
        &self,
        mut inner: tokio::sync::MutexGuard<'_, Inner>,
        item_id: &str,
        audio_ref: Option<&str>,
    ) -> Result<PlayOutcome> {
        let reference = match audio_ref.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reference) => reference.to_string(),
            None => {
                debug!("{}: {} has no audio", self.channel, item_id);
                return Ok(PlayOutcome::NoAudio);
            }
        };

        let previous = self.take_slot(&mut inner, EndReason::Replaced);
        inner.generation += 1;
        let generation = inner.generation;
        inner.slot = Slot::Loading {
            item_id: item_id.to_string(),
            generation,
        };
        drop(inner);
        release(previous).await;

        debug!("{}: loading {} (generation {})", self.channel, item_id, generation);

        let audio = match self.decoder.decode(&reference).await {
            Ok(audio) => audio,
            Err(e) => return self.fail(item_id, generation, e).await,
        };

        if !self.inner.lock().await.slot.is_loading(generation) {
            debug!("{}: discarding superseded decode for {}", self.channel, item_id);
            return Ok(PlayOutcome::Superseded);
        }

        let speed = self.inner.lock().await.speed;
        let (source, ended_rx) = PlaybackSource::new(audio, speed.value());
        let source = Arc::new(source);

        let output = Arc::clone(&self.output);
        let stream_source = Arc::clone(&source);
        let opened = tokio::task::spawn_blocking(move || output.open(stream_source))
            .await
            .map_err(|e| Error::AudioOutput(format!("Output task failed: {}", e)))
            .and_then(|r| r);

        let handle = match opened {
            Ok(handle) => handle,
            Err(e) => return self.fail(item_id, generation, e).await,
        };

        let mut inner = self.inner.lock().await;
        if !inner.slot.is_loading(generation) {
            drop(inner);
            release_handle(handle).await;
            debug!("{}: discarding superseded output for {}", self.channel, item_id);
            return Ok(PlayOutcome::Superseded);
        }

        // Speed may have changed while the output was opening
        source.set_target_rate(inner.speed.value());
        let speed = inner.speed;
        inner.slot = Slot::Playing(Session {
            item_id: item_id.to_string(),
            generation,
            source,
            _output: handle,
        });
        drop(inner);

        info!("{}: playing {} at {}", self.channel, item_id, speed);
        self.events.emit(ReaderEvent::SessionStarted {
            channel: self.channel,
            item_id: item_id.to_string(),
            speed: speed.value(),
            timestamp: chrono::Utc::now(),
        });

        self.watch_for_end(ended_rx, generation);
        Ok(PlayOutcome::Started)
    }

    /// Return to Idle after a failed load, unless the load was already superseded
    async fn fail(&self, item_id: &str, generation: u64, error: Error) -> Result<PlayOutcome> {
        let mut inner = self.inner.lock().await;
        if !inner.slot.is_loading(generation) {
            debug!("{}: ignoring failure of superseded load: {}", self.channel, error);
            return Ok(PlayOutcome::Superseded);
        }
        inner.slot = Slot::Idle;
        drop(inner);

        warn!("{}: playback of {} failed: {}", self.channel, item_id, error);
        self.events.emit(ReaderEvent::PlaybackWarning {
            channel: self.channel,
            item_id: item_id.to_string(),
            message: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
        Err(error)
    }

    /// Move the slot to Idle, emitting SessionEnded; the caller releases the session
    fn take_slot(&self, inner: &mut Inner, reason: EndReason) -> Option<Session> {
        let item_id = inner.slot.item_id()?.to_string();
        let previous = std::mem::replace(&mut inner.slot, Slot::Idle);

        debug!("{}: {} ended ({:?})", self.channel, item_id, reason);
        self.events.emit(ReaderEvent::SessionEnded {
            channel: self.channel,
            item_id,
            reason,
            timestamp: chrono::Utc::now(),
        });

        match previous {
            Slot::Playing(session) => Some(session),
            _ => None,
        }
    }

    async fn end_current(&self, reason: EndReason) {
        let mut inner = self.inner.lock().await;
        let previous = self.take_slot(&mut inner, reason);
        drop(inner);
        release(previous).await;
    }

    /// On natural end: go Idle at once, release the output after the grace delay
    fn watch_for_end(&self, ended_rx: oneshot::Receiver<()>, generation: u64) {
        let player = self.clone();
        tokio::spawn(async move {
            // Sender dropped means the session was torn down first
            if ended_rx.await.is_err() {
                return;
            }

            let session = {
                let mut inner = player.inner.lock().await;
                match &inner.slot {
                    Slot::Playing(s) if s.generation == generation => {
                        player.take_slot(&mut inner, EndReason::Completed)
                    }
                    _ => None,
                }
            };

            if let Some(session) = session {
                tokio::time::sleep(player.release_grace).await;
                release(Some(session)).await;
            }
        });
    }
}

/// Drop a session off the async runtime; joining its output thread blocks
async fn release(session: Option<Session>) {
    if let Some(session) = session {
        if let Err(e) = tokio::task::spawn_blocking(move || drop(session)).await {
            warn!("Failed to release playback session: {}", e);
        }
    }
}

async fn release_handle(handle: OutputHandle) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(handle)).await {
        warn!("Failed to release output: {}", e);
    }
}
