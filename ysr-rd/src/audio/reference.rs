//! Audio reference classification
//!
//! Stored audio references carry no type field. The kind is inferred from
//! the string's structure alone:
//!
//! | Shape                                   | Kind                    |
//! |-----------------------------------------|-------------------------|
//! | `data:<mime>;base64,<payload>`          | inline payload          |
//! | `http://...` / `https://...`            | network reference       |
//! | `file://`, `/`, `./`, `../`, separators | local path (media root) |
//! | bare file name with audio extension     | local path (media root) |
//! | only base64 alphabet characters         | bare inline base64      |

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// File extensions treated as local clip names even without a separator
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "ogg", "oga", "m4a", "mp4", "aac", "pcm",
];

/// Classified audio reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioReference {
    /// `data:` URI; `mime` is the declared media type including parameters
    Inline { mime: String, payload: String },

    /// HTTP(S) URL
    Remote(String),

    /// Path relative to (or absolute under) the media root
    Local(PathBuf),

    /// Base64 payload without an envelope
    BareBase64(String),
}

impl AudioReference {
    /// Classify a non-blank reference string
    pub fn parse(reference: &str) -> Result<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(Error::DecodeFailed("Empty audio reference".to_string()));
        }

        if starts_with_ignore_case(trimmed, "data:") {
            return parse_data_uri(trimmed);
        }

        if starts_with_ignore_case(trimmed, "http://") || starts_with_ignore_case(trimmed, "https://")
        {
            return Ok(AudioReference::Remote(trimmed.to_string()));
        }

        if starts_with_ignore_case(trimmed, "file://") {
            return Ok(AudioReference::Local(PathBuf::from(&trimmed["file://".len()..])));
        }

        if looks_like_path(trimmed) {
            return Ok(AudioReference::Local(PathBuf::from(trimmed)));
        }

        if is_base64_alphabet(trimmed) {
            return Ok(AudioReference::BareBase64(trimmed.to_string()));
        }

        Err(Error::DecodeFailed(format!(
            "Unrecognized audio reference: {}",
            abbreviate(trimmed)
        )))
    }

    /// Short form for log lines (inline payloads can be megabytes)
    pub fn describe(&self) -> String {
        match self {
            AudioReference::Inline { mime, payload } => {
                format!("inline {} ({} chars)", mime, payload.len())
            }
            AudioReference::Remote(url) => url.clone(),
            AudioReference::Local(path) => path.display().to_string(),
            AudioReference::BareBase64(payload) => format!("base64 ({} chars)", payload.len()),
        }
    }
}

/// Join `path` onto `media_root`, refusing anything that could escape it.
///
/// Absolute paths are re-rooted under the media root.
pub fn resolve_under(media_root: &Path, path: &Path) -> Result<PathBuf> {
    let mut resolved = media_root.to_path_buf();
    for component in path.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(Error::DecodeFailed(format!(
                    "Path escapes media root: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(resolved)
}

fn parse_data_uri(uri: &str) -> Result<AudioReference> {
    let body = &uri["data:".len()..];
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| Error::DecodeFailed("Malformed data URI: missing ','".to_string()))?;

    let mut params = header.split(';').map(str::trim);
    let mime = params.next().unwrap_or_default();
    let rest: Vec<&str> = params.collect();

    if !rest.iter().any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(Error::DecodeFailed(
            "Only base64 data URIs are supported".to_string(),
        ));
    }

    let extra: Vec<&str> = rest
        .into_iter()
        .filter(|p| !p.eq_ignore_ascii_case("base64") && !p.is_empty())
        .collect();
    let mime = if extra.is_empty() {
        mime.to_ascii_lowercase()
    } else {
        format!("{};{}", mime.to_ascii_lowercase(), extra.join(";"))
    };

    Ok(AudioReference::Inline {
        mime,
        payload: payload.trim().to_string(),
    })
}

fn looks_like_path(s: &str) -> bool {
    if s.starts_with('/') || s.starts_with("./") || s.starts_with("../") {
        return true;
    }
    if s.contains('\\') {
        return true;
    }
    // Base64 may contain '/', so a separator only counts with a file-like last segment
    if s.contains('/') {
        let last = s.rsplit('/').next().unwrap_or_default();
        if has_audio_extension(last) || !is_base64_alphabet(s) {
            return true;
        }
    }
    has_audio_extension(s)
}

fn has_audio_extension(s: &str) -> bool {
    Path::new(s)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn is_base64_alphabet(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\n' | b'\r'))
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn abbreviate(s: &str) -> String {
    if s.chars().count() <= 48 {
        s.to_string()
    } else {
        let head: String = s.chars().take(48).collect();
        format!("{}...", head)
    }
}
