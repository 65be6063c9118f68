//! Core types for the Newswire feed collector
//!
//! This crate defines the shared data structures used across the workspace:
//! the news item model, the runtime configuration object and the
//! workspace-wide error type.

pub mod config;
pub mod error;
pub mod news;

pub use config::{FeedSourceConfig, NewswireConfig, SimilarityConfig, SimilarityStrategy};
pub use error::{NewswireError, NewswireResult};
pub use news::{FeedEntry, Item};
