//! Shared fixtures for the ysr-rd integration tests
//!
//! - WAV clips generated with hound and wrapped as `data:` URIs
//! - Article fixtures with segments and key vocabulary
//! - A decoder whose loads can be held open to test superseded requests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use ysr_rd::audio::{AudioDecoder, DecodedAudio};
use ysr_rd::playback::{ChannelPlayer, ChannelSnapshot, ChannelStatus};
use ysr_rd::Result;
use ysr_common::{ArticleDraft, Segment, VocabularyItem};

/// Sample rate of generated clips
pub const CLIP_SAMPLE_RATE: u32 = 16_000;

/// Mono 16-bit sine clip as WAV bytes
pub fn sine_wav_bytes(duration_ms: u64, frequency_hz: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: CLIP_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("wav writer");
        let frames = CLIP_SAMPLE_RATE as u64 * duration_ms / 1000;
        for n in 0..frames {
            let t = n as f32 / CLIP_SAMPLE_RATE as f32;
            let sample = (2.0 * PI * frequency_hz * t).sin() * 0.5;
            writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Inline audio reference for a generated clip
pub fn wav_data_uri(duration_ms: u64) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(sine_wav_bytes(duration_ms, 440.0));
    format!("data:audio/wav;base64,{}", encoded)
}

pub fn segment(id: &str, text: &str, audio: Option<String>) -> Segment {
    Segment {
        id: id.to_string(),
        text: text.to_string(),
        translation: Some(format!("{} (zh)", id)),
        audio_data: audio,
    }
}

pub fn vocabulary(id: &str, word: &str, audio: Option<String>) -> VocabularyItem {
    VocabularyItem {
        id: id.to_string(),
        word: word.to_string(),
        definition: format!("definition of {}", word),
        audio_data: audio,
    }
}

/// Published draft with one audio segment, one silent segment and two vocabulary entries
pub fn article_draft(id: &str, title: &str) -> ArticleDraft {
    ArticleDraft {
        id: id.to_string(),
        title: title.to_string(),
        author: "Chen".to_string(),
        segments: vec![
            segment("s1", "Please follow up with the team.", Some(wav_data_uri(2_000))),
            segment("s2", "Nothing to hear here.", None),
        ],
        tags: vec!["business".to_string()],
        key_vocabulary: vec![
            vocabulary("v1", "follow up", Some(wav_data_uri(2_000))),
            vocabulary("v2", "team", None),
        ],
        is_published: true,
        cover_image: None,
    }
}

/// Wraps a decoder and holds every load until a permit is released
pub struct GatedDecoder<D> {
    inner: D,
    gate: Semaphore,
    calls: AtomicUsize,
}

impl<D: AudioDecoder> GatedDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Let `n` waiting (or future) loads through
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<D: AudioDecoder> AudioDecoder for GatedDecoder<D> {
    async fn decode(&self, reference: &str) -> Result<Arc<DecodedAudio>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.inner.decode(reference).await
    }
}

/// Poll a channel until `predicate` holds, panicking after `timeout`
pub async fn wait_for_channel<F>(player: &ChannelPlayer, timeout: Duration, predicate: F) -> ChannelSnapshot
where
    F: Fn(&ChannelSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = player.snapshot().await;
        if predicate(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("Timed out waiting on {} channel, last state {:?}", snapshot.channel, snapshot);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the channel reports `status`
pub async fn wait_for_status(player: &ChannelPlayer, status: ChannelStatus) -> ChannelSnapshot {
    wait_for_channel(player, Duration::from_secs(5), |s| s.status == status).await
}

/// Poll a plain condition
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
