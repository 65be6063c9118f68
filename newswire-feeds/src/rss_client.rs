//! RSS Feed Client
//!
//! Fetches and parses RSS/Atom feeds into raw [`FeedEntry`] values. No
//! filtering happens here: entries missing a title or link are passed on with
//! `None` fields and the candidate filter drops them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use newswire_core::{FeedEntry, FeedSourceConfig};

use crate::error::NewsError;
use crate::source::FeedSource;

const USER_AGENT: &str = "Newswire/1.0";

/// RSS feed definition
#[derive(Debug, Clone)]
pub struct RssFeed {
    /// Name of the source
    pub name: String,
    /// RSS feed URL
    pub url: String,
}

impl RssFeed {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

impl From<&FeedSourceConfig> for RssFeed {
    fn from(config: &FeedSourceConfig) -> Self {
        Self::new(&config.name, &config.url)
    }
}

/// RSS feed client
#[derive(Clone)]
pub struct RssClient {
    client: Client,
}

impl RssClient {
    /// Create a new RSS client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Bind a feed to this client, producing a schedulable source
    pub fn source(&self, feed: RssFeed) -> RssSource {
        RssSource {
            client: self.clone(),
            feed,
        }
    }

    /// Fetch a single RSS feed
    #[instrument(skip(self), fields(feed = %feed.name))]
    pub async fn fetch_feed(&self, feed: &RssFeed) -> Result<Vec<FeedEntry>, NewsError> {
        let response = self
            .client
            .get(&feed.url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| NewsError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NewsError::ApiError {
                status: response.status().as_u16(),
                message: format!("Failed to fetch {}", feed.url),
            });
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| NewsError::RequestFailed(e.to_string()))?;

        let entries = parse_feed(&content)
            .map_err(|_| NewsError::ParseError(format!("Failed to parse feed: {}", feed.url)))?;

        debug!("Parsed {} entries from {}", entries.len(), feed.name);
        Ok(entries)
    }
}

impl Default for RssClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// A feed bound to the client that fetches it
pub struct RssSource {
    client: RssClient,
    feed: RssFeed,
}

#[async_trait]
impl FeedSource for RssSource {
    fn name(&self) -> &str {
        &self.feed.name
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, NewsError> {
        self.client.fetch_feed(&self.feed).await
    }
}

/// Parse a feed body, trying RSS first, then Atom
pub fn parse_feed(content: &[u8]) -> Result<Vec<FeedEntry>, NewsError> {
    if let Ok(channel) = rss::Channel::read_from(content) {
        return Ok(parse_rss_channel(&channel));
    }

    if let Ok(atom_feed) = atom_syndication::Feed::read_from(content) {
        return Ok(parse_atom_feed(&atom_feed));
    }

    Err(NewsError::ParseError(
        "body is neither RSS nor Atom".to_string(),
    ))
}

/// Parse RSS channel into entries
fn parse_rss_channel(channel: &rss::Channel) -> Vec<FeedEntry> {
    channel
        .items()
        .iter()
        .map(|item| {
            // Some feeds only carry a permalink guid
            let link = item.link().map(str::to_string).or_else(|| {
                item.guid()
                    .filter(|g| g.is_permalink())
                    .map(|g| g.value().to_string())
            });

            FeedEntry {
                title: item.title().map(str::to_string),
                link,
                published: item.pub_date().map(str::to_string),
            }
        })
        .collect()
}

/// Parse Atom feed into entries
fn parse_atom_feed(atom_feed: &atom_syndication::Feed) -> Vec<FeedEntry> {
    atom_feed
        .entries()
        .iter()
        .map(|entry| {
            let title = entry.title().to_string();
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href().to_string());

            let published = entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .to_rfc2822();

            FeedEntry {
                title: Some(title).filter(|t| !t.is_empty()),
                link,
                published: Some(published),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const RSS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <description>Example feed</description>
    <item>
      <title>PM announces new policy</title>
      <link>https://example.com/news/1</link>
      <pubDate>Tue, 10 Jun 2025 09:00:00 +0600</pubDate>
    </item>
    <item>
      <title>Guid only story</title>
      <guid isPermaLink="true">https://example.com/news/2</guid>
    </item>
    <item>
      <link>https://example.com/news/3</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:example</id>
  <updated>2025-06-10T09:00:00Z</updated>
  <entry>
    <title>Atom story</title>
    <id>urn:example:1</id>
    <link rel="alternate" href="https://example.com/atom/1"/>
    <updated>2025-06-10T09:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let entries = parse_feed(RSS_BODY.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].title.as_deref(), Some("PM announces new policy"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/news/1"));
        assert_eq!(
            entries[0].published.as_deref(),
            Some("Tue, 10 Jun 2025 09:00:00 +0600")
        );

        assert_eq!(entries[1].link.as_deref(), Some("https://example.com/news/2"));
        assert!(entries[1].published.is_none());

        assert!(entries[2].title.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let entries = parse_feed(ATOM_BODY.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("Atom story"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/atom/1"));
        assert!(entries[0].published.is_some());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_feed(b"<html>not a feed</html>"),
            Err(NewsError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_feed_over_http() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/rss.xml");
                then.status(200)
                    .header("content-type", "application/rss+xml")
                    .body(RSS_BODY);
            })
            .await;

        let client = RssClient::default();
        let source = client.source(RssFeed::new("Example", &server.url("/rss.xml")));
        let entries = source.fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(source.name(), "Example");
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_feed_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/down.xml");
                then.status(503);
            })
            .await;

        let client = RssClient::default();
        let result = client
            .fetch_feed(&RssFeed::new("Down", &server.url("/down.xml")))
            .await;

        assert!(matches!(result, Err(NewsError::ApiError { status: 503, .. })));
    }
}
