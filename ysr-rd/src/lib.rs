//! # YaSong Reader reading desk (ysr-rd)
//!
//! Serves the reader and admin pages as a JSON API: decodes segment and
//! vocabulary audio, plays it on two independent channels, highlights key
//! vocabulary in sentence text, and positions the word popup.
//!
//! **Architecture:** symphonia decode on the blocking pool, one output thread
//! per playback session (cpal or null), axum HTTP + SSE.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod reading;
pub mod router;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
