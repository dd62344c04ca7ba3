//! Event types broadcast to connected clients
//!
//! Events are sent over a tokio broadcast channel and serialized for SSE.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Independent playback lane. Each channel holds at most one session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Sentence (segment) audio
    Sentence,
    /// Vocabulary pronunciation audio
    Word,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Sentence => write!(f, "sentence"),
            Channel::Word => write!(f, "word"),
        }
    }
}

/// Why a playback session ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Audio played to the end
    Completed,
    /// Explicit stop or toggle
    Stopped,
    /// A new session on the same channel took over
    Replaced,
    /// Reading surface closed
    Teardown,
}

/// Which page the view router is showing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Reader,
    Admin,
}

/// Reader events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReaderEvent {
    /// A session began sounding
    SessionStarted {
        channel: Channel,
        item_id: String,
        speed: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session left the Playing/Loading state
    SessionEnded {
        channel: Channel,
        item_id: String,
        reason: EndReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transient, non-blocking warning (decode or output failure)
    PlaybackWarning {
        channel: Channel,
        item_id: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sentence speed changed
    SpeedChanged {
        speed: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Word popup opened (Some) or closed (None)
    PopupChanged {
        vocabulary_id: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Article collection reloaded after a mutation
    ArticlesChanged {
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Router switched pages
    ViewChanged {
        view: View,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReaderEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ReaderEvent::SessionStarted { .. } => "SessionStarted",
            ReaderEvent::SessionEnded { .. } => "SessionEnded",
            ReaderEvent::PlaybackWarning { .. } => "PlaybackWarning",
            ReaderEvent::SpeedChanged { .. } => "SpeedChanged",
            ReaderEvent::PopupChanged { .. } => "PopupChanged",
            ReaderEvent::ArticlesChanged { .. } => "ArticlesChanged",
            ReaderEvent::ViewChanged { .. } => "ViewChanged",
        }
    }
}

/// Thin wrapper over a broadcast sender; sending with no subscribers is fine
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: ReaderEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ReaderEvent::SessionEnded {
            channel: Channel::Sentence,
            item_id: "s1".to_string(),
            reason: EndReason::Completed,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SessionEnded");
        assert_eq!(json["channel"], "sentence");
        assert_eq!(json["reason"], "completed");
        assert_eq!(event.event_type(), "SessionEnded");
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(ReaderEvent::SpeedChanged {
            speed: 1.5,
            timestamp: chrono::Utc::now(),
        });
        match rx.recv().await.unwrap() {
            ReaderEvent::SpeedChanged { speed, .. } => assert_eq!(speed, 1.5),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
