//! Playback speed

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Playback rate restricted to the selectable steps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct PlaybackSpeed(f32);

impl PlaybackSpeed {
    /// Selectable rates, slowest first
    pub const ALLOWED: [f32; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

    pub const NORMAL: PlaybackSpeed = PlaybackSpeed(1.0);

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<f32> for PlaybackSpeed {
    type Error = Error;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::ALLOWED
            .iter()
            .find(|&&allowed| (allowed - value).abs() < 1e-6)
            .map(|&allowed| PlaybackSpeed(allowed))
            .ok_or_else(|| {
                Error::BadRequest(format!(
                    "Unsupported speed {}; allowed: {:?}",
                    value,
                    Self::ALLOWED
                ))
            })
    }
}

impl From<PlaybackSpeed> for f32 {
    fn from(speed: PlaybackSpeed) -> f32 {
        speed.0
    }
}

impl std::fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_values() {
        for v in PlaybackSpeed::ALLOWED {
            assert_eq!(PlaybackSpeed::try_from(v).unwrap().value(), v);
        }
    }

    #[test]
    fn test_rejects_other_values() {
        assert!(PlaybackSpeed::try_from(3.0).is_err());
        assert!(PlaybackSpeed::try_from(0.0).is_err());
        assert!(PlaybackSpeed::try_from(1.1).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let speed: PlaybackSpeed = serde_json::from_str("1.25").unwrap();
        assert_eq!(speed.value(), 1.25);
        assert!(serde_json::from_str::<PlaybackSpeed>("4.0").is_err());
        assert_eq!(serde_json::to_string(&PlaybackSpeed::NORMAL).unwrap(), "1.0");
    }
}
