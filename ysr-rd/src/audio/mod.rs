//! Audio decode and output

pub mod adapter;
pub mod decoder;
pub mod output;
pub mod reference;
pub mod types;

pub use adapter::{AudioDecoder, DecodeAdapter};
pub use output::{create_backend, CpalOutput, NullOutput, OutputBackend, OutputHandle};
pub use reference::AudioReference;
pub use types::{AudioFrame, DecodedAudio};
