//! Core audio data types

/// A single stereo frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioFrame {
    /// Left channel sample
    pub left: f32,

    /// Right channel sample
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Create a frame from left and right samples
    pub fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Clamp samples to valid range [-1.0, 1.0] to prevent clipping
    pub fn clamp(&mut self) {
        self.left = self.left.clamp(-1.0, 1.0);
        self.right = self.right.clamp(-1.0, 1.0);
    }
}

/// Decoded clip ready for playback.
///
/// **Format:**
/// - Samples are f32 (-1.0 to 1.0)
/// - Stereo interleaved: [L, R, L, R, ...]
/// - Sample rate is the source rate; playback resamples on the fly
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,

    /// Source sample rate
    pub sample_rate: u32,

    /// Channel count of the source before stereo conversion
    pub source_channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, source_channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            source_channels,
        }
    }

    /// Number of stereo frames
    pub fn frame_count(&self) -> usize {
        self.samples.len() / 2
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frame_count() as u64 * 1000) / self.sample_rate as u64
    }

    /// Frame at `index`, or None past the end
    pub fn frame(&self, index: usize) -> Option<AudioFrame> {
        let i = index * 2;
        if i + 1 < self.samples.len() {
            Some(AudioFrame::from_stereo(self.samples[i], self.samples[i + 1]))
        } else {
            None
        }
    }
}
