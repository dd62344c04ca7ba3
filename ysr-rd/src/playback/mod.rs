//! Per-channel playback sessions

pub mod player;
pub mod source;
pub mod speed;

pub use player::{ChannelPlayer, ChannelSnapshot, ChannelStatus, PlayOutcome};
pub use source::PlaybackSource;
pub use speed::PlaybackSpeed;
