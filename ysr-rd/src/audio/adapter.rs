//! Audio decode adapter
//!
//! Turns a stored audio reference into a decoded buffer. The reference is
//! classified by [`AudioReference::parse`], the bytes are obtained from the
//! network, the media root, or the inline payload, and decoding runs on the
//! blocking pool. Every failure surfaces as [`Error::DecodeFailed`].

use crate::audio::decoder::{decode_bytes, decode_pcm16, FormatHint, DEFAULT_PCM_RATE};
use crate::audio::reference::{resolve_under, AudioReference};
use crate::audio::types::DecodedAudio;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Seam between playback and decoding
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, reference: &str) -> Result<Arc<DecodedAudio>>;
}

/// Bounded FIFO cache keyed by the reference string
struct DecodeCache {
    capacity: usize,
    entries: HashMap<String, Arc<DecodedAudio>>,
    order: VecDeque<String>,
}

impl DecodeCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Arc<DecodedAudio>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, audio: Arc<DecodedAudio>) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, audio);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Decoder for URLs, media-root paths and inline payloads
pub struct DecodeAdapter {
    client: reqwest::Client,
    media_root: PathBuf,
    cache: Mutex<DecodeCache>,
}

impl DecodeAdapter {
    pub fn new(media_root: PathBuf, cache_entries: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::DecodeFailed(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Decode adapter: media root {}, cache {} entries",
            media_root.display(),
            cache_entries
        );

        Ok(Self {
            client,
            media_root,
            cache: Mutex::new(DecodeCache::new(cache_entries)),
        })
    }

    /// Number of decoded clips currently cached
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    async fn decode_uncached(&self, reference: &str) -> Result<DecodedAudio> {
        let parsed = AudioReference::parse(reference)?;
        debug!("Decoding {}", parsed.describe());

        match parsed {
            AudioReference::Inline { mime, payload } => {
                let bytes = decode_base64(&payload)?;
                let hint = FormatHint::from_mime(&mime);
                run_blocking(move || decode_with_hint(bytes, &hint)).await
            }
            AudioReference::BareBase64(payload) => {
                let bytes = decode_base64(&payload)?;
                run_blocking(move || decode_bare(bytes)).await
            }
            AudioReference::Remote(url) => {
                let (bytes, hint) = self.fetch(&url).await?;
                run_blocking(move || decode_with_hint(bytes, &hint)).await
            }
            AudioReference::Local(path) => {
                let full = resolve_under(&self.media_root, &path)?;
                let bytes = tokio::fs::read(&full).await.map_err(|e| {
                    Error::DecodeFailed(format!("Failed to read {}: {}", full.display(), e))
                })?;
                let hint = full
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(FormatHint::from_extension)
                    .unwrap_or_default();
                run_blocking(move || decode_with_hint(bytes, &hint)).await
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, FormatHint)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DecodeFailed(format!("Fetch failed for {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DecodeFailed(format!(
                "Fetch failed for {}: HTTP {}",
                url, status
            )));
        }

        let mut hint = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(FormatHint::from_mime)
            .unwrap_or_default();

        if let Some(ext) = url_extension(url) {
            hint.extension = Some(ext);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::DecodeFailed(format!("Fetch failed for {}: {}", url, e)))?;

        Ok((bytes.to_vec(), hint))
    }
}

#[async_trait]
impl AudioDecoder for DecodeAdapter {
    async fn decode(&self, reference: &str) -> Result<Arc<DecodedAudio>> {
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(reference)) {
            debug!("Decode cache hit");
            return Ok(hit);
        }

        let audio = Arc::new(self.decode_uncached(reference).await?);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(reference.to_string(), Arc::clone(&audio));
        }
        debug!("Decode cache holds {} clip(s)", self.cached_entries());

        Ok(audio)
    }
}

async fn run_blocking<F>(f: F) -> Result<DecodedAudio>
where
    F: FnOnce() -> Result<DecodedAudio> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::DecodeFailed(format!("Decode task failed: {}", e)))?
}

fn decode_with_hint(bytes: Vec<u8>, hint: &FormatHint) -> Result<DecodedAudio> {
    match hint.raw_pcm_rate() {
        Some(rate) => decode_pcm16(&bytes, rate),
        None => decode_bytes(bytes, hint),
    }
}

/// Bare payloads have no declared format: try the container probe, then raw PCM
fn decode_bare(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let fallback = bytes.clone();
    match decode_bytes(bytes, &FormatHint::default()) {
        Ok(audio) => Ok(audio),
        Err(e) => {
            warn!("Probe failed for bare payload ({}), treating as raw PCM", e);
            decode_pcm16(&fallback, DEFAULT_PCM_RATE)
        }
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let unpadded = cleaned.trim_end_matches('=');
    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(unpadded))
        .map_err(|e| Error::DecodeFailed(format!("Malformed base64 payload: {}", e)))
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
