//! Frame source feeding an output stream
//!
//! Holds the decoded clip and a `rubato` resampler converting it from the
//! source rate to whatever rate the output runs at. Playback speed is folded
//! into the resample ratio: at speed `s` the ratio is
//! `output_rate / (source_rate * s)`.
//!
//! Speed changes are not applied instantly. Before each input chunk the live
//! rate moves towards the target by `1 - exp(-chunk_secs / tau)`, and the new
//! ratio goes to rubato with ramping on so the change spreads across the
//! chunk. The result is an exponential approach with time constant
//! [`RATE_TIME_CONSTANT_SECS`].
//!
//! Rendering runs on an output's feeder thread, never inside a device
//! callback. Position, live rate and end state are mirrored into atomics so
//! the player reads them without touching the renderer.

use crate::audio::types::{AudioFrame, DecodedAudio};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Time constant of the rate approach, in seconds
pub const RATE_TIME_CONSTANT_SECS: f32 = 0.1;

/// Source frames handed to the resampler per chunk
pub const CHUNK_FRAMES: usize = 256;

/// Live rate bounds, matching the selectable speeds
const MIN_RATE: f32 = 0.5;
const MAX_RATE: f32 = 2.0;

/// Headroom on the resampler's relative ratio; rubato rejects the exact bound
const MAX_RELATIVE_RATIO: f64 = 4.0;

struct Renderer {
    /// Rate the resampler was built for; 0 before the first fill
    output_rate: u32,
    resampler: Option<FastFixedIn<f32>>,
    /// Planar input scratch, one Vec per channel
    planar: [Vec<f32>; 2],
    /// Next source frame to feed
    next_input: usize,
    input_done: bool,
    /// Leading output frames of resampler delay still to drop
    skip: usize,
    pending: VecDeque<AudioFrame>,
    /// Live rate, converging on the target
    rate: f32,
    ended_tx: Option<oneshot::Sender<()>>,
}

impl Renderer {
    fn clamp_rate(rate: f32) -> f32 {
        rate.clamp(MIN_RATE, MAX_RATE)
    }
}

/// Shared between the playback session and its output thread
pub struct PlaybackSource {
    audio: Arc<DecodedAudio>,
    renderer: Mutex<Renderer>,
    /// Target rate as f32 bits
    target_rate: AtomicU32,
    /// Live rate as f32 bits
    current_rate: AtomicU32,
    /// Source frames played, as f64 bits
    position: AtomicU64,
    finished: AtomicBool,
}

impl PlaybackSource {
    /// Create a source starting at `rate`.
    ///
    /// The receiver fires once when the last resampled frame has been handed out.
    pub fn new(audio: Arc<DecodedAudio>, rate: f32) -> (Self, oneshot::Receiver<()>) {
        let (ended_tx, ended_rx) = oneshot::channel();
        let rate = Renderer::clamp_rate(rate);
        let source = Self {
            audio,
            renderer: Mutex::new(Renderer {
                output_rate: 0,
                resampler: None,
                planar: [
                    Vec::with_capacity(CHUNK_FRAMES),
                    Vec::with_capacity(CHUNK_FRAMES),
                ],
                next_input: 0,
                input_done: false,
                skip: 0,
                pending: VecDeque::new(),
                rate,
                ended_tx: Some(ended_tx),
            }),
            target_rate: AtomicU32::new(rate.to_bits()),
            current_rate: AtomicU32::new(rate.to_bits()),
            position: AtomicU64::new(0f64.to_bits()),
            finished: AtomicBool::new(false),
        };
        (source, ended_rx)
    }

    pub fn audio(&self) -> &DecodedAudio {
        &self.audio
    }

    /// Picked up by the renderer at the next chunk boundary
    pub fn set_target_rate(&self, rate: f32) {
        self.target_rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn target_rate(&self) -> f32 {
        f32::from_bits(self.target_rate.load(Ordering::Relaxed))
    }

    /// Rate currently applied to the resampler
    pub fn current_rate(&self) -> f32 {
        f32::from_bits(self.current_rate.load(Ordering::Relaxed))
    }

    /// Play position in source frames
    pub fn position_frames(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn position_ms(&self) -> u64 {
        if self.audio.sample_rate == 0 {
            return 0;
        }
        (self.position_frames() * 1000.0 / self.audio.sample_rate as f64) as u64
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Fill `out` with frames resampled to `output_rate`; silence after the end
    pub fn fill(&self, output_rate: u32, out: &mut [AudioFrame]) {
        let mut renderer = self.lock();

        if output_rate == 0 || self.audio.sample_rate == 0 {
            out.fill(AudioFrame::zero());
            self.finish(&mut renderer);
            return;
        }

        if renderer.output_rate != output_rate {
            if renderer.output_rate != 0 {
                debug!(
                    "Output rate changed {} -> {}, rebuilding resampler",
                    renderer.output_rate, output_rate
                );
            }
            renderer.output_rate = output_rate;
            renderer.resampler = None;
        }

        let step = self.audio.sample_rate as f64 / output_rate as f64;
        let mut position = self.position_frames();

        for frame in out.iter_mut() {
            if renderer.pending.is_empty() {
                self.render(&mut renderer);
            }
            match renderer.pending.pop_front() {
                Some(next) => {
                    *frame = next;
                    position += renderer.rate as f64 * step;
                }
                None => {
                    self.finish(&mut renderer);
                    *frame = AudioFrame::zero();
                }
            }
        }

        if !self.is_finished() {
            let position = position.min(self.audio.frame_count() as f64);
            self.position.store(position.to_bits(), Ordering::Relaxed);
        }
    }

    /// Resample chunks until output is pending or the input is exhausted
    fn render(&self, renderer: &mut Renderer) {
        while renderer.pending.is_empty() && !renderer.input_done {
            if let Err(e) = self.process_chunk(renderer) {
                warn!("Resampling failed, ending clip early: {}", e);
                renderer.input_done = true;
            }
        }
    }

    fn process_chunk(&self, r: &mut Renderer) -> Result<(), String> {
        let source_rate = self.audio.sample_rate as f64;

        if r.resampler.is_none() {
            let mut resampler = FastFixedIn::<f32>::new(
                r.output_rate as f64 / source_rate,
                MAX_RELATIVE_RATIO,
                PolynomialDegree::Cubic,
                CHUNK_FRAMES,
                2,
            )
            .map_err(|e| format!("Failed to create resampler: {}", e))?;
            resampler
                .set_resample_ratio_relative(1.0 / r.rate as f64, false)
                .map_err(|e| e.to_string())?;
            r.skip = resampler.output_delay();
            r.resampler = Some(resampler);
        }

        // One chunk's worth of wall time towards the target
        let chunk_secs = CHUNK_FRAMES as f32 / (source_rate as f32 * r.rate);
        let alpha = 1.0 - (-chunk_secs / RATE_TIME_CONSTANT_SECS).exp();
        let target = Renderer::clamp_rate(self.target_rate());
        r.rate = Renderer::clamp_rate(r.rate + (target - r.rate) * alpha);
        self.current_rate.store(r.rate.to_bits(), Ordering::Relaxed);

        let end = (r.next_input + CHUNK_FRAMES).min(self.audio.frame_count());
        for channel in r.planar.iter_mut() {
            channel.clear();
        }
        for index in r.next_input..end {
            if let Some(frame) = self.audio.frame(index) {
                r.planar[0].push(frame.left);
                r.planar[1].push(frame.right);
            }
        }
        let fed = end - r.next_input;
        r.next_input = end;

        let Some(resampler) = r.resampler.as_mut() else {
            return Err("resampler missing".to_string());
        };
        resampler
            .set_resample_ratio_relative(1.0 / r.rate as f64, true)
            .map_err(|e| e.to_string())?;

        let (output, keep) = if fed == CHUNK_FRAMES {
            let output = resampler
                .process(&r.planar[..], None)
                .map_err(|e| e.to_string())?;
            let len = output.first().map_or(0, Vec::len);
            (output, len)
        } else {
            // Last chunk is zero-padded; keep only what the real frames produce
            r.input_done = true;
            let output = resampler
                .process_partial(Some(&r.planar[..]), None)
                .map_err(|e| e.to_string())?;
            let produced = (fed as f64 * r.output_rate as f64 / (source_rate * r.rate as f64))
                .ceil() as usize;
            (output, produced + resampler.output_delay())
        };

        let (Some(left), Some(right)) = (output.first(), output.get(1)) else {
            return Err("resampler returned no channels".to_string());
        };
        for (&l, &rt) in left.iter().zip(right.iter()).take(keep) {
            if r.skip > 0 {
                r.skip -= 1;
                continue;
            }
            r.pending.push_back(AudioFrame::from_stereo(l, rt));
        }
        Ok(())
    }

    fn finish(&self, renderer: &mut Renderer) {
        if self.finished.swap(true, Ordering::Relaxed) {
            return;
        }
        self.position
            .store((self.audio.frame_count() as f64).to_bits(), Ordering::Relaxed);
        if let Some(tx) = renderer.ended_tx.take() {
            let _ = tx.send(());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Renderer> {
        match self.renderer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(frames: usize, rate: u32, value: f32) -> Arc<DecodedAudio> {
        let mut samples = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            samples.push(value);
            samples.push(-value);
        }
        Arc::new(DecodedAudio::new(samples, rate, 2))
    }

    /// Output frames handed out before the source reports its end
    fn frames_until_end(source: &PlaybackSource, output_rate: u32) -> usize {
        let mut out = [AudioFrame::zero()];
        let mut count = 0;
        while !source.is_finished() {
            source.fill(output_rate, &mut out);
            if !source.is_finished() {
                count += 1;
            }
            assert!(count < 1_000_000, "source never finished");
        }
        count
    }

    #[test]
    fn test_unity_rate_keeps_signal_and_length() {
        let (source, _ended) = PlaybackSource::new(constant(4000, 16_000, 0.5), 1.0);
        let mut out = vec![AudioFrame::zero(); 1000];
        source.fill(16_000, &mut out);

        assert!((out[500].left - 0.5).abs() < 0.01, "left {}", out[500].left);
        assert!((out[500].right + 0.5).abs() < 0.01, "right {}", out[500].right);
        assert_eq!(source.position_frames(), 1000.0);

        let remaining = frames_until_end(&source, 16_000);
        let total = 1000 + remaining;
        assert!((total as i64 - 4000).abs() < 40, "total {}", total);
    }

    #[test]
    fn test_upsampling_stretches_output() {
        let (source, _ended) = PlaybackSource::new(constant(4000, 16_000, 0.25), 1.0);
        let total = frames_until_end(&source, 48_000);
        assert!((total as i64 - 12_000).abs() < 120, "total {}", total);
    }

    #[test]
    fn test_end_fires_once_then_silence() {
        let (source, mut ended) = PlaybackSource::new(constant(300, 16_000, 0.5), 1.0);
        let mut out = vec![AudioFrame::from_stereo(1.0, 1.0); 1000];
        source.fill(16_000, &mut out);

        assert!(source.is_finished());
        assert_eq!(ended.try_recv(), Ok(()));
        assert_eq!(out[999], AudioFrame::zero());
        assert_eq!(source.position_frames(), 300.0);

        source.fill(16_000, &mut out);
        assert!(ended.try_recv().is_err());
    }

    #[test]
    fn test_empty_clip_ends_immediately() {
        let (source, mut ended) = PlaybackSource::new(constant(0, 16_000, 0.0), 1.0);
        let mut out = vec![AudioFrame::from_stereo(1.0, 1.0); 10];
        source.fill(16_000, &mut out);
        assert_eq!(ended.try_recv(), Ok(()));
        assert!(out.iter().all(|f| *f == AudioFrame::zero()));
    }

    #[test]
    fn test_rate_approaches_target_smoothly() {
        let (source, _ended) = PlaybackSource::new(constant(64_000, 16_000, 0.1), 1.0);
        source.set_target_rate(2.0);

        // About one time constant: roughly 63% of the way
        let mut out = vec![AudioFrame::zero(); 1600];
        source.fill(16_000, &mut out);
        let after_tau = source.current_rate();
        assert!(after_tau > 1.5 && after_tau < 1.8, "rate {}", after_tau);

        // Five more time constants: within 1%
        let mut out = vec![AudioFrame::zero(); 8000];
        source.fill(16_000, &mut out);
        assert!((source.current_rate() - 2.0).abs() < 0.02);
    }

    #[test]
    fn test_faster_rate_advances_further() {
        let (slow, _a) = PlaybackSource::new(constant(16_000, 16_000, 0.1), 0.5);
        let (fast, _b) = PlaybackSource::new(constant(16_000, 16_000, 0.1), 2.0);
        let mut out = vec![AudioFrame::zero(); 1600];
        slow.fill(16_000, &mut out);
        fast.fill(16_000, &mut out);
        assert!((slow.position_frames() - 800.0).abs() < 1e-6);
        assert!((fast.position_frames() - 3200.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_target_is_clamped() {
        let (source, _ended) = PlaybackSource::new(constant(64_000, 16_000, 0.1), 1.0);
        source.set_target_rate(8.0);
        let mut out = vec![AudioFrame::zero(); 16_000];
        source.fill(16_000, &mut out);
        assert!(source.current_rate() <= 2.0);
        assert!(!source.is_finished());
    }
}
