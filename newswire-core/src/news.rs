//! News data structures shared by the fetcher, filter, dedup engine and store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw entry as produced by a feed source.
///
/// Every field is optional: a source that omits a field yields `None`, and the
/// candidate filter decides what that means. It is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Headline
    pub title: Option<String>,
    /// Article URL
    pub link: Option<String>,
    /// Publication timestamp text, as the source wrote it
    pub published: Option<String>,
}

impl FeedEntry {
    pub fn new(title: &str, link: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            published: None,
        }
    }

    /// Attach a publication timestamp
    pub fn with_published(mut self, published: &str) -> Self {
        self.published = Some(published.to_string());
        self
    }
}

/// A stored or candidate news item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Article title
    pub title: String,
    /// Article URL
    pub link: String,
    /// Publication date text (`pubDate` in the persisted document)
    pub published_at: String,
}

impl Item {
    pub fn new(title: impl Into<String>, link: impl Into<String>, published_at: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: published_at.into(),
        }
    }

    /// Build a candidate item from a raw feed entry.
    ///
    /// Missing title or link become empty strings so the filter can reject
    /// them. A missing or blank publication date falls back to `ingested_at`
    /// rendered as RFC 2822.
    pub fn from_entry(entry: &FeedEntry, ingested_at: DateTime<Utc>) -> Self {
        let published_at = entry
            .published
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| ingested_at.to_rfc2822());

        Self {
            title: entry.title.clone().unwrap_or_default(),
            link: entry.link.clone().unwrap_or_default(),
            published_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_from_entry_keeps_published_text() {
        let entry = FeedEntry::new("PM announces new policy", "https://example.com/news/1")
            .with_published("Tue, 10 Jun 2025 09:00:00 +0600");
        let item = Item::from_entry(&entry, fixed_now());

        assert_eq!(item.title, "PM announces new policy");
        assert_eq!(item.link, "https://example.com/news/1");
        assert_eq!(item.published_at, "Tue, 10 Jun 2025 09:00:00 +0600");
    }

    #[test]
    fn test_from_entry_defaults_to_ingestion_time() {
        let entry = FeedEntry::new("Title", "https://example.com/a");
        let item = Item::from_entry(&entry, fixed_now());
        assert_eq!(item.published_at, fixed_now().to_rfc2822());
        assert!(DateTime::parse_from_rfc2822(&item.published_at).is_ok());

        let blank = FeedEntry::new("Title", "https://example.com/a").with_published("   ");
        assert_eq!(Item::from_entry(&blank, fixed_now()).published_at, item.published_at);
    }

    #[test]
    fn test_from_entry_missing_fields_become_empty() {
        let entry = FeedEntry::default();
        let item = Item::from_entry(&entry, fixed_now());
        assert!(item.title.is_empty());
        assert!(item.link.is_empty());
    }
}
