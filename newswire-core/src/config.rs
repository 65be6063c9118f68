//! Collector configuration
//!
//! Built once at startup and passed by reference into the scheduler, the
//! dedup engine and the similarity oracle. Every key has a default, so an
//! absent configuration file yields a working collector.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{NewswireError, NewswireResult};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "NEWSWIRE_CONFIG";
/// Configuration file used when `NEWSWIRE_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "newswire.json";

/// A feed source polled every cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSourceConfig {
    /// Human-readable source name, used in logs
    pub name: String,
    /// RSS or Atom feed URL
    pub url: String,
}

impl FeedSourceConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Which similarity notion decides "same story"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityStrategy {
    /// Edit-distance ratio on normalized titles, 0-100
    Lexical,
    /// Cosine similarity of title embeddings, -1.0 to 1.0
    Semantic,
}

impl SimilarityStrategy {
    /// Match cutoff used when the configuration leaves it unset
    pub fn default_threshold(self) -> f64 {
        match self {
            SimilarityStrategy::Lexical => 85.0,
            SimilarityStrategy::Semantic => 0.88,
        }
    }

    /// Inclusive range a threshold must fall in
    pub fn score_range(self) -> (f64, f64) {
        match self {
            SimilarityStrategy::Lexical => (0.0, 100.0),
            SimilarityStrategy::Semantic => (-1.0, 1.0),
        }
    }
}

/// Similarity oracle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_strategy")]
    pub strategy: SimilarityStrategy,
    /// Match cutoff; `None` uses the strategy default
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Embedding model (semantic strategy only)
    #[serde(default = "default_model")]
    pub model: String,
    /// SQLite path for the fingerprint cache; `None` keeps it in memory
    #[serde(default)]
    pub cache_path: Option<String>,
    /// Cached fingerprints older than this are pruned after each cycle
    #[serde(default = "default_cache_max_age_days")]
    pub cache_max_age_days: u32,
}

impl SimilarityConfig {
    /// Threshold actually in force
    pub fn effective_threshold(&self) -> f64 {
        self.threshold
            .unwrap_or_else(|| self.strategy.default_threshold())
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            threshold: None,
            model: default_model(),
            cache_path: None,
            cache_max_age_days: default_cache_max_age_days(),
        }
    }
}

/// Top-level collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewswireConfig {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSourceConfig>,
    /// Persisted store document
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Store capacity bound
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Per-source, per-cycle candidate cap
    #[serde(default = "default_max_feed_items")]
    pub max_feed_items: usize,
    /// Comparison window bound; `null` compares against the whole store
    #[serde(default = "default_max_existing_check")]
    pub max_existing_check: Option<usize>,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    /// Link substrings that reject a candidate outright
    #[serde(default = "default_block_list")]
    pub block_list: Vec<String>,
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Upper bound on cycles a failing source is skipped for
    #[serde(default = "default_max_backoff_cycles")]
    pub max_backoff_cycles: u32,
    #[serde(default = "default_channel_title")]
    pub channel_title: String,
    #[serde(default)]
    pub channel_link: String,
    #[serde(default)]
    pub channel_description: String,
}

impl Default for NewswireConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            store_path: default_store_path(),
            max_items: default_max_items(),
            max_feed_items: default_max_feed_items(),
            max_existing_check: default_max_existing_check(),
            similarity: SimilarityConfig::default(),
            block_list: default_block_list(),
            cycle_interval_secs: default_cycle_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_backoff_cycles: default_max_backoff_cycles(),
            channel_title: default_channel_title(),
            channel_link: String::new(),
            channel_description: String::new(),
        }
    }
}

impl NewswireConfig {
    /// Load configuration the way the daemon does:
    ///
    /// 1. Read the JSON file named by `NEWSWIRE_CONFIG` (default `newswire.json`)
    /// 2. Apply `NEWSWIRE_STORE_PATH` / `NEWSWIRE_INTERVAL_SECS` overrides
    /// 3. Validate
    pub fn from_env() -> NewswireResult<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> NewswireResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No configuration file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_json(contents: &str) -> NewswireResult<Self> {
        serde_json::from_str(contents).map_err(|e| NewswireError::parse(e.to_string()))
    }

    /// Apply environment-style overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> NewswireResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("NEWSWIRE_STORE_PATH") {
            self.store_path = path;
        }

        if let Some(secs) = lookup("NEWSWIRE_INTERVAL_SECS") {
            self.cycle_interval_secs = secs.trim().parse().map_err(|_| {
                NewswireError::config(format!("NEWSWIRE_INTERVAL_SECS is not a number: {}", secs))
            })?;
        }

        Ok(())
    }

    /// Reject configurations the collector cannot run with
    pub fn validate(&self) -> NewswireResult<()> {
        if self.feeds.is_empty() {
            return Err(NewswireError::config("at least one feed source is required"));
        }

        for feed in &self.feeds {
            url::Url::parse(&feed.url).map_err(|e| {
                NewswireError::config(format!("feed {} has an invalid url {}: {}", feed.name, feed.url, e))
            })?;
        }

        let counts = [
            ("max_items", self.max_items),
            ("max_feed_items", self.max_feed_items),
            ("max_concurrent_fetches", self.max_concurrent_fetches),
        ];
        for (key, value) in counts {
            if value == 0 {
                return Err(NewswireError::config(format!("{} must be greater than zero", key)));
            }
        }

        if self.max_existing_check == Some(0) {
            return Err(NewswireError::config(
                "max_existing_check must be greater than zero (use null for the whole store)",
            ));
        }

        if self.cycle_interval_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(NewswireError::config(
                "cycle_interval_secs and fetch_timeout_secs must be greater than zero",
            ));
        }

        if self.similarity.cache_max_age_days == 0 {
            return Err(NewswireError::config(
                "similarity.cache_max_age_days must be greater than zero",
            ));
        }

        let threshold = self.similarity.effective_threshold();
        let (min, max) = self.similarity.strategy.score_range();
        if !(min..=max).contains(&threshold) {
            return Err(NewswireError::config(format!(
                "{:?} threshold {} outside [{}, {}]",
                self.similarity.strategy, threshold, min, max
            )));
        }

        Ok(())
    }
}

fn default_feeds() -> Vec<FeedSourceConfig> {
    vec![
        FeedSourceConfig::new("The Daily Star", "http://www.thedailystar.net/latest/rss/rss.xml"),
        FeedSourceConfig::new("TBS News", "https://tbsnews.net/top-news/rss.xml"),
        FeedSourceConfig::new("Dhaka Tribune", "https://www.dhakatribune.com/feed/"),
    ]
}

fn default_store_path() -> String {
    "result.xml".to_string()
}

fn default_max_items() -> usize {
    1000
}

fn default_max_feed_items() -> usize {
    50
}

fn default_max_existing_check() -> Option<usize> {
    Some(50)
}

fn default_strategy() -> SimilarityStrategy {
    SimilarityStrategy::Semantic
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_cache_max_age_days() -> u32 {
    30
}

fn default_block_list() -> Vec<String> {
    vec![
        "/sport/".to_string(),
        "/sports/".to_string(),
        "/entertainment/".to_string(),
    ]
}

fn default_cycle_interval() -> u64 {
    300 // 5 minutes
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_max_backoff_cycles() -> u32 {
    8
}

fn default_channel_title() -> String {
    "Newswire".to_string()
}
