//! # YaSong Reader Common Library
//!
//! Shared code for the ysr services:
//! - Article data model
//! - Article Store Facade (local mock record / remote table service)
//! - Reader event types
//! - Bootstrap configuration loading
//! - SQLite initialization

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod model;
pub mod store;

pub use error::{Error, Result};
pub use model::{Article, ArticleDraft, ArticleSummary, Segment, VocabularyItem};
