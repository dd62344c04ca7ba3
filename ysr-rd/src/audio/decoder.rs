//! Audio decoder using symphonia
//!
//! Decodes an in-memory clip (MP3, FLAC, AAC/M4A, Vorbis, WAV) to interleaved
//! stereo f32. Raw 16-bit PCM without a container is handled separately by
//! [`decode_pcm16`].

use crate::audio::types::DecodedAudio;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Sample rate assumed for raw PCM when none is declared
pub const DEFAULT_PCM_RATE: u32 = 24_000;

/// Format hint derived from a MIME type or file extension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatHint {
    pub mime: Option<String>,
    pub extension: Option<String>,
}

impl FormatHint {
    pub fn from_mime(mime: &str) -> Self {
        Self {
            mime: Some(mime.to_ascii_lowercase()),
            extension: None,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        Self {
            mime: None,
            extension: Some(ext.to_ascii_lowercase()),
        }
    }

    /// Sample rate if the hint declares raw 16-bit PCM (`audio/pcm`, `audio/L16`, `.pcm`)
    pub fn raw_pcm_rate(&self) -> Option<u32> {
        if let Some(mime) = &self.mime {
            let mut parts = mime.split(';').map(str::trim);
            let essence = parts.next().unwrap_or_default();
            if essence == "audio/pcm" || essence == "audio/l16" {
                let rate = parts
                    .filter_map(|p| p.strip_prefix("rate="))
                    .find_map(|r| r.parse::<u32>().ok())
                    .unwrap_or(DEFAULT_PCM_RATE);
                return Some(rate);
            }
        }
        match self.extension.as_deref() {
            Some("pcm") => Some(DEFAULT_PCM_RATE),
            _ => None,
        }
    }

    fn to_symphonia(&self) -> Hint {
        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }
        if let Some(mime) = &self.mime {
            let essence = mime.split(';').next().unwrap_or_default().trim();
            hint.mime_type(essence);
            if let Some(ext) = extension_for_mime(essence) {
                hint.with_extension(ext);
            }
        }
        hint
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        _ => None,
    }
}

/// Decode a complete clip held in memory.
///
/// Probes the container, takes the first audio track and decodes every packet.
/// Mono is duplicated to both channels; sources with more than two channels
/// keep the first two.
pub fn decode_bytes(bytes: Vec<u8>, hint: &FormatHint) -> Result<DecodedAudio> {
    if bytes.is_empty() {
        return Err(Error::DecodeFailed("Empty audio payload".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint.to_symphonia(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::DecodeFailed(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::DecodeFailed("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::DecodeFailed(format!("Unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut source_channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame, skip it
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(Error::DecodeFailed(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        let channels = spec.channels.count();
        source_channels = channels as u16;

        let too_small = sample_buf
            .as_ref()
            .map(|buf| buf.capacity() < decoded.capacity() * channels)
            .unwrap_or(true);
        if too_small {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            append_stereo(buf.samples(), channels, &mut samples);
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::DecodeFailed("No audio frames decoded".to_string()));
    }

    debug!(
        "Decoded {} frames at {} Hz ({} source channels)",
        samples.len() / 2,
        sample_rate,
        source_channels
    );

    Ok(DecodedAudio::new(samples, sample_rate, source_channels))
}

/// Interpret bytes as 16-bit little-endian mono PCM.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32) -> Result<DecodedAudio> {
    if bytes.len() < 2 {
        return Err(Error::DecodeFailed("No audio frames decoded".to_string()));
    }
    if sample_rate == 0 {
        return Err(Error::DecodeFailed("Invalid PCM sample rate".to_string()));
    }

    let mut samples = Vec::with_capacity(bytes.len());
    for pair in bytes.chunks_exact(2) {
        let value = i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0;
        samples.push(value);
        samples.push(value);
    }

    Ok(DecodedAudio::new(samples, sample_rate, 1))
}

/// Convert interleaved samples with `channels` channels to stereo and append them
fn append_stereo(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            out.reserve(interleaved.len() * 2);
            for &s in interleaved {
                out.push(s);
                out.push(s);
            }
        }
        2 => out.extend_from_slice(interleaved),
        n => {
            out.reserve(interleaved.len() / n * 2);
            for frame in interleaved.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_pcm_hint() {
        assert_eq!(FormatHint::from_mime("audio/pcm").raw_pcm_rate(), Some(24_000));
        assert_eq!(
            FormatHint::from_mime("audio/L16;rate=16000").raw_pcm_rate(),
            Some(16_000)
        );
        assert_eq!(FormatHint::from_extension("pcm").raw_pcm_rate(), Some(24_000));
        assert_eq!(FormatHint::from_mime("audio/mpeg").raw_pcm_rate(), None);
    }

    #[test]
    fn test_pcm16_is_duplicated_to_stereo() {
        let bytes = [0x00, 0x40, 0x00, 0xC0]; // 16384, -16384
        let audio = decode_pcm16(&bytes, 24_000).unwrap();
        assert_eq!(audio.sample_rate, 24_000);
        assert_eq!(audio.source_channels, 1);
        assert_eq!(audio.samples, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_pcm16_empty_is_error() {
        assert!(decode_pcm16(&[0x01], 24_000).is_err());
    }

    #[test]
    fn test_append_stereo_drops_extra_channels() {
        let mut out = Vec::new();
        append_stereo(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.4, 0.5]);
    }

    #[test]
    fn test_garbage_bytes_fail_to_probe() {
        let result = decode_bytes(vec![1, 2, 3, 4, 5, 6, 7, 8], &FormatHint::default());
        assert!(matches!(result, Err(Error::DecodeFailed(_))));
    }

    #[test]
    fn test_empty_bytes_fail() {
        assert!(decode_bytes(Vec::new(), &FormatHint::default()).is_err());
    }
}
