//! Feed source contract

#[cfg(any(test, feature = "test-util"))]
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use newswire_core::FeedEntry;

use crate::error::NewsError;

/// Anything the scheduler can pull candidate entries from.
///
/// Sources share no mutable state during a fetch, so the scheduler is free to
/// run several `fetch` calls concurrently.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Pull the current entries, newest first as the source orders them
    async fn fetch(&self) -> Result<Vec<FeedEntry>, NewsError>;
}

/// In-memory source serving a fixed entry list, or failing on demand
#[cfg(any(test, feature = "test-util"))]
pub struct StaticSource {
    name: String,
    entries: Mutex<Option<Vec<FeedEntry>>>,
}

#[cfg(any(test, feature = "test-util"))]
impl StaticSource {
    pub fn new(name: &str, entries: Vec<FeedEntry>) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(Some(entries)),
        }
    }

    /// A source whose every fetch fails
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(None),
        }
    }

    /// Replace what the next fetch returns
    pub fn set_entries(&self, entries: Vec<FeedEntry>) {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = Some(entries);
    }

    /// Make subsequent fetches fail
    pub fn set_failing(&self) {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl FeedSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, NewsError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| NewsError::RequestFailed(format!("{} is unavailable", self.name)))
    }
}
