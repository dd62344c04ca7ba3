//! Audio output backends
//!
//! An output pulls frames from a [`PlaybackSource`] on its own OS thread
//! until the returned [`OutputHandle`] is dropped. cpal streams are not
//! `Send`, so the thread that builds a stream also owns and drops it.
//!
//! For cpal that thread is also the feeder: it renders from the source into
//! a lock-free ring buffer, and the device callback only pops frames.

use crate::audio::types::AudioFrame;
use crate::error::{Error, Result};
use crate::playback::source::PlaybackSource;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use ysr_common::config::{AudioConfig, OutputKind};

/// Audio buffered between the feeder and the device callback
const HANDOFF_MS: u32 = 100;

/// How often the feeder tops up the ring buffer
const FEED_INTERVAL: Duration = Duration::from_millis(10);

/// Opens output streams for playback sessions
pub trait OutputBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start pulling from `source`. Blocks until the stream is running.
    fn open(&self, source: Arc<PlaybackSource>) -> Result<OutputHandle>;
}

/// Build the backend selected in configuration
pub fn create_backend(config: &AudioConfig) -> Arc<dyn OutputBackend> {
    match config.output {
        OutputKind::Device => {
            match CpalOutput::list_devices() {
                Ok(devices) if devices.is_empty() => warn!("No audio output devices found"),
                Ok(devices) => info!("Audio output devices: {}", devices.join(", ")),
                Err(e) => warn!("Could not list audio devices: {}", e),
            }
            Arc::new(CpalOutput::new(config.device.clone()))
        }
        OutputKind::Null => Arc::new(NullOutput::default()),
    }
}

/// Owns a running output thread.
///
/// Dropping the handle closes the release channel; the thread tears its
/// stream down and is joined.
pub struct OutputHandle {
    release_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl OutputHandle {
    fn new(release_tx: mpsc::Sender<()>, worker: JoinHandle<()>) -> Self {
        Self {
            release_tx: Some(release_tx),
            worker: Some(worker),
        }
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.release_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputHandle")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

// ========================================================================
// cpal device output
// ========================================================================

/// System audio device via cpal
pub struct CpalOutput {
    requested_device: Option<String>,
}

impl CpalOutput {
    pub fn new(requested_device: Option<String>) -> Self {
        Self { requested_device }
    }

    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Find the requested device, falling back to the default device
    fn select_device(requested: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = requested {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(dev) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                return Ok(dev);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        host.default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
    }

    /// Prefer stereo f32; otherwise take the device default
    fn best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let preferred = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .find(|c| c.channels() == 2 && c.sample_format() == SampleFormat::F32);

        if let Some(supported) = preferred {
            let supported = supported.with_max_sample_rate();
            return Ok((supported.config(), supported.sample_format()));
        }

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        Ok((supported.config(), supported.sample_format()))
    }

    /// Build a stream, prime its ring buffer from `source` and start it.
    ///
    /// Returns the stream, the feeder's end of the ring buffer and the device rate.
    fn start_stream(
        requested: Option<&str>,
        source: &PlaybackSource,
    ) -> Result<(Stream, HeapProd<AudioFrame>, u32)> {
        let device = Self::select_device(requested)?;
        let (config, sample_format) = Self::best_config(&device)?;
        let sample_rate = config.sample_rate.0;

        debug!(
            "Audio config: device={}, sample_rate={}, channels={}, format={:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            config.channels,
            sample_format
        );

        let capacity = ((sample_rate * HANDOFF_MS) / 1000).max(1) as usize;
        let (mut producer, consumer) = HeapRb::<AudioFrame>::new(capacity).split();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream(&device, &config, consumer, |s| s),
            SampleFormat::I16 => build_stream(&device, &config, consumer, |s| {
                (s * i16::MAX as f32) as i16
            }),
            SampleFormat::U16 => build_stream(&device, &config, consumer, |s| {
                ((s + 1.0) * 32767.5) as u16
            }),
            other => Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            ))),
        }?;

        feed(source, sample_rate, &mut producer, &mut Vec::new());

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        Ok((stream, producer, sample_rate))
    }
}

/// Top the ring buffer up with freshly rendered frames
fn feed(
    source: &PlaybackSource,
    sample_rate: u32,
    producer: &mut HeapProd<AudioFrame>,
    scratch: &mut Vec<AudioFrame>,
) {
    let vacant = producer.vacant_len();
    if vacant == 0 {
        return;
    }
    scratch.resize(vacant, AudioFrame::zero());
    source.fill(sample_rate, scratch);
    producer.push_slice(scratch);
}

/// Build a stream writing frames converted by `convert`.
///
/// The callback never blocks: it pops what the feeder has rendered and pads
/// an underrun with silence.
fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<AudioFrame>,
    convert: F,
) -> Result<Stream>
where
    T: cpal::SizedSample + Send + 'static,
    F: Fn(f32) -> T + Send + 'static,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<AudioFrame> = vec![AudioFrame::zero(); 4096];
    let reported = AtomicBool::new(false);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                if scratch.len() < frames {
                    scratch.resize(frames, AudioFrame::zero());
                }
                let block = &mut scratch[..frames];
                let popped = consumer.pop_slice(block);
                block[popped..].fill(AudioFrame::zero());

                for (out, frame) in data.chunks_mut(channels).zip(block.iter_mut()) {
                    frame.clamp();
                    out[0] = convert(frame.left);
                    if channels > 1 {
                        out[1] = convert(frame.right);
                    }
                    for extra in out.iter_mut().skip(2) {
                        *extra = convert(0.0);
                    }
                }
            },
            move |err| {
                // Log once per stream; the callback keeps firing on a broken device
                if !reported.swap(true, Ordering::SeqCst) {
                    error!("Audio stream error: {}", err);
                }
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

impl OutputBackend for CpalOutput {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&self, source: Arc<PlaybackSource>) -> Result<OutputHandle> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let requested = self.requested_device.clone();

        let worker = std::thread::Builder::new()
            .name("ysr-audio-out".to_string())
            .spawn(move || {
                let (stream, mut producer, sample_rate) =
                    match CpalOutput::start_stream(requested.as_deref(), &source) {
                        Ok(started) => started,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                let _ = ready_tx.send(Ok(()));

                // Keep feeding until the handle is dropped
                let mut scratch = Vec::new();
                loop {
                    match release_rx.recv_timeout(FEED_INTERVAL) {
                        Err(RecvTimeoutError::Timeout) => {
                            feed(&source, sample_rate, &mut producer, &mut scratch)
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                if let Err(e) = stream.pause() {
                    debug!("Failed to pause stream on release: {}", e);
                }
                drop(stream);
                debug!("Audio stream released");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        let handle = OutputHandle::new(release_tx, worker);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio stream started");
                Ok(handle)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::AudioOutput(
                "Audio thread exited before the stream started".to_string(),
            )),
        }
    }
}

// ========================================================================
// Null output
// ========================================================================

/// Consumes frames in real time without a device
pub struct NullOutput {
    sample_rate: u32,
    chunk: Duration,
    opened: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new(48_000)
    }
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            chunk: Duration::from_millis(10),
            opened: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Streams opened since creation
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams currently held open
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the active count when the worker exits
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl OutputBackend for NullOutput {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open(&self, source: Arc<PlaybackSource>) -> Result<OutputHandle> {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let sample_rate = self.sample_rate;
        let chunk = self.chunk;
        let frames_per_chunk =
            ((sample_rate as u128 * chunk.as_millis()) / 1000).max(1) as usize;

        self.active.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        let worker = std::thread::Builder::new()
            .name("ysr-null-out".to_string())
            .spawn(move || {
                let _guard = guard;
                let mut scratch = vec![AudioFrame::zero(); frames_per_chunk];
                loop {
                    match release_rx.recv_timeout(chunk) {
                        Err(RecvTimeoutError::Timeout) => source.fill(sample_rate, &mut scratch),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        Ok(OutputHandle::new(release_tx, worker))
    }
}
