//! Shared reading desk state
//!
//! One instance per process, shared by every HTTP handler. Holds the view
//! router, both playback channels and the word popup controller, and
//! coordinates opening and closing the reading surface across them.

use crate::audio::adapter::AudioDecoder;
use crate::audio::output::OutputBackend;
use crate::error::{Error, Result};
use crate::playback::{ChannelPlayer, PlayOutcome};
use crate::reading::{ReadingSurface, WordPopupController};
use crate::router::ViewRouter;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use ysr_common::events::{Channel, EventBus, ReaderEvent, View};
use ysr_common::store::ArticleStore;

pub struct SharedState {
    pub router: ViewRouter,
    pub sentence: ChannelPlayer,
    pub popup: WordPopupController,
    pub events: EventBus,
    output_name: &'static str,
}

impl SharedState {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        decoder: Arc<dyn AudioDecoder>,
        output: Arc<dyn OutputBackend>,
        release_grace: Duration,
        initial_view: View,
    ) -> Self {
        let events = EventBus::default();
        let output_name = output.name();

        let sentence = ChannelPlayer::new(
            Channel::Sentence,
            Arc::clone(&decoder),
            Arc::clone(&output),
            events.clone(),
            release_grace,
        );
        let word = ChannelPlayer::new(
            Channel::Word,
            decoder,
            output,
            events.clone(),
            release_grace,
        );

        Self {
            router: ViewRouter::new(store, events.clone(), initial_view),
            sentence,
            popup: WordPopupController::new(word, events.clone()),
            events,
            output_name,
        }
    }

    pub fn output_name(&self) -> &'static str {
        self.output_name
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ReaderEvent> {
        self.events.subscribe()
    }

    /// Open a published article: stop the previous surface, count the view, highlight
    pub async fn open_article(&self, id: &str) -> Result<ReadingSurface> {
        self.teardown_surface().await;
        let article = self.router.select_article(id).await?;
        Ok(ReadingSurface::build(&article))
    }

    /// Close the open article and release both channels
    pub async fn close_article(&self) -> Option<String> {
        self.teardown_surface().await;
        self.router.close_article().await
    }

    /// Play or toggle a segment of the open article on the sentence channel
    pub async fn play_segment(&self, segment_id: &str) -> Result<PlayOutcome> {
        let article = self
            .router
            .selected()
            .await
            .ok_or_else(|| Error::InvalidState("No article is open".to_string()))?;
        let segment = article
            .segment(segment_id)
            .ok_or_else(|| Error::NotFound(format!("Segment {}", segment_id)))?;

        self.sentence.play(&segment.id, segment.audio_ref()).await
    }

    /// Switch pages; leaving the reader tears the surface down
    pub async fn navigate(&self, view: View) -> crate::router::RouterSnapshot {
        self.teardown_surface().await;
        self.router.navigate(view).await
    }

    pub async fn pop_state(&self, query: Option<&str>) -> crate::router::RouterSnapshot {
        self.teardown_surface().await;
        self.router.pop_state(query).await
    }

    async fn teardown_surface(&self) {
        self.sentence.teardown().await;
        self.popup.teardown().await;
    }

    /// Release every output before exit
    pub async fn shutdown(&self) {
        info!("Releasing playback channels");
        self.teardown_surface().await;
    }
}
