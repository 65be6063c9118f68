//! Feed source clients for the Newswire collector
//!
//! This crate provides:
//! - The [`FeedSource`] contract the scheduler pulls candidate entries from
//! - An HTTP client for RSS 2.0 and Atom feeds

pub mod error;
pub mod rss_client;
pub mod source;

pub use error::NewsError;
pub use rss_client::{parse_feed, RssClient, RssFeed, RssSource};
pub use source::FeedSource;
#[cfg(any(test, feature = "test-util"))]
pub use source::StaticSource;
