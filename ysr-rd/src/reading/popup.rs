//! Word popup controller
//!
//! Tracks the single active vocabulary popup, computes its anchor relative to
//! the reading container, and drives pronunciation on the word channel.

use crate::playback::{ChannelPlayer, PlayOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use ysr_common::events::{EventBus, ReaderEvent};
use ysr_common::VocabularyItem;

/// Gap between the popup's anchor point and the top of the span
pub const POPUP_OFFSET_PX: f64 = 10.0;

/// Client-reported layout box, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// Popup anchor relative to the container: centred horizontally on the span, just above it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopupAnchor {
    pub top: f64,
    pub left: f64,
}

impl PopupAnchor {
    pub fn compute(span: &Rect, container: &Rect) -> Self {
        Self {
            top: span.top - container.top - POPUP_OFFSET_PX,
            left: span.left - container.left + span.width / 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePopup {
    pub vocabulary: VocabularyItem,
    /// None when the container has not been laid out yet
    pub anchor: Option<PopupAnchor>,
}

/// Where a document click landed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickTarget {
    #[serde(default)]
    pub inside_popup: bool,
    #[serde(default)]
    pub on_vocabulary_span: bool,
}

/// Result of activating a vocabulary span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupActivation {
    pub popup: ActivePopup,
    /// None when pronunciation failed
    pub playback: Option<PlayOutcome>,
    /// Failure message; the popup stays open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct WordPopupController {
    active: Mutex<Option<ActivePopup>>,
    word_player: ChannelPlayer,
    events: EventBus,
}

impl WordPopupController {
    pub fn new(word_player: ChannelPlayer, events: EventBus) -> Self {
        Self {
            active: Mutex::new(None),
            word_player,
            events,
        }
    }

    pub fn word_player(&self) -> &ChannelPlayer {
        &self.word_player
    }

    /// Open the popup for `item`, replacing any other, and pronounce it
    pub async fn activate(
        &self,
        item: &VocabularyItem,
        span: Rect,
        container: Option<Rect>,
    ) -> PopupActivation {
        let popup = ActivePopup {
            vocabulary: item.clone(),
            anchor: container.map(|c| PopupAnchor::compute(&span, &c)),
        };

        let previous = self.active.lock().await.replace(popup.clone());
        if let Some(previous) = previous {
            debug!("Replacing popup for {}", previous.vocabulary.id);
        }
        self.word_player.stop().await;

        self.events.emit(ReaderEvent::PopupChanged {
            vocabulary_id: Some(item.id.clone()),
            timestamp: chrono::Utc::now(),
        });

        let (playback, warning) = match item.audio_ref() {
            None => (Some(PlayOutcome::NoAudio), None),
            Some(audio) => match self.word_player.restart(&item.id, Some(audio)).await {
                Ok(outcome) => (Some(outcome), None),
                Err(e) => (None, Some(e.to_string())),
            },
        };

        PopupActivation {
            popup,
            playback,
            warning,
        }
    }

    /// Dismiss on a click outside both the popup and any vocabulary span.
    ///
    /// Returns true when a popup was closed. Word audio keeps playing.
    pub async fn handle_click(&self, target: ClickTarget) -> bool {
        if target.inside_popup || target.on_vocabulary_span {
            return false;
        }
        self.close().await
    }

    /// Close the popup if one is open
    pub async fn close(&self) -> bool {
        let closed = self.active.lock().await.take().is_some();
        if closed {
            self.events.emit(ReaderEvent::PopupChanged {
                vocabulary_id: None,
                timestamp: chrono::Utc::now(),
            });
        }
        closed
    }

    pub async fn active(&self) -> Option<ActivePopup> {
        self.active.lock().await.clone()
    }

    /// Close the popup and stop the word channel
    pub async fn teardown(&self) {
        self.close().await;
        self.word_player.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_math() {
        let span = Rect {
            top: 300.0,
            left: 120.0,
            width: 40.0,
            height: 18.0,
        };
        let container = Rect {
            top: 100.0,
            left: 20.0,
            width: 800.0,
            height: 2000.0,
        };
        let anchor = PopupAnchor::compute(&span, &container);
        assert_eq!(anchor.top, 190.0);
        assert_eq!(anchor.left, 120.0);
    }

    #[test]
    fn test_click_target_defaults() {
        let target: ClickTarget = serde_json::from_str("{}").unwrap();
        assert!(!target.inside_popup);
        assert!(!target.on_vocabulary_span);
        let target: ClickTarget = serde_json::from_str(r#"{"insidePopup":true}"#).unwrap();
        assert!(target.inside_popup);
    }
}
