//! Scheduler
//!
//! Polls every configured source once per cycle and feeds the entries through
//! the candidate filter and the dedup engine into the bounded store. Fetches
//! run concurrently; everything that touches the store or the comparison
//! window happens on the scheduler's own task, one entry at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use newswire_core::{FeedEntry, Item, NewswireConfig};
use newswire_embedding::{EmbeddingError, SimilarityOracle};
use newswire_feeds::{FeedSource, NewsError, RssClient, RssFeed};

use crate::dedup::{Admission, DedupEngine, WindowPolicy};
use crate::filter::{CandidateFilter, FilterVerdict};
use crate::store::{BoundedStore, ChannelMeta};

/// The only error class that ends a cycle early
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Similarity oracle unavailable: {0}")]
    Oracle(#[from] EmbeddingError),
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources_ok: usize,
    pub sources_failed: usize,
    /// Sources left out of this cycle while backing off
    pub sources_skipped: usize,
    pub entries_seen: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub accepted: usize,
    pub evicted: usize,
    pub persisted: bool,
    /// Cached fingerprints dropped for age
    pub pruned: usize,
}

/// Consecutive-failure bookkeeping for one source
#[derive(Debug, Clone, Copy, Default)]
struct SourceHealth {
    consecutive_failures: u32,
    skip_remaining: u32,
}

/// Drives ingestion cycles
pub struct Scheduler {
    sources: Vec<Arc<dyn FeedSource>>,
    health: Vec<SourceHealth>,
    filter: CandidateFilter,
    engine: DedupEngine,
    store: BoundedStore,
    max_feed_items: usize,
    max_concurrent_fetches: usize,
    max_backoff_cycles: u32,
    cache_max_age_days: u32,
    fetch_timeout: Duration,
    cycle_interval: Duration,
    clock: fn() -> DateTime<Utc>,
}

impl Scheduler {
    pub fn new(
        config: &NewswireConfig,
        sources: Vec<Arc<dyn FeedSource>>,
        oracle: Arc<SimilarityOracle>,
        store: BoundedStore,
    ) -> Self {
        let policy = WindowPolicy::from_max_existing_check(config.max_existing_check);

        Self {
            health: vec![SourceHealth::default(); sources.len()],
            sources,
            filter: CandidateFilter::new(&config.block_list),
            engine: DedupEngine::new(oracle, policy, config.max_items),
            store,
            max_feed_items: config.max_feed_items,
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
            max_backoff_cycles: config.max_backoff_cycles,
            cache_max_age_days: config.similarity.cache_max_age_days,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            cycle_interval: Duration::from_secs(config.cycle_interval_secs),
            clock: Utc::now,
        }
    }

    /// Scheduler polling the configured RSS/Atom feeds over HTTP, with the
    /// store loaded from `config.store_path`
    pub fn from_config(config: &NewswireConfig, oracle: Arc<SimilarityOracle>) -> Self {
        let client = RssClient::new(Duration::from_secs(config.fetch_timeout_secs));
        let sources: Vec<Arc<dyn FeedSource>> = config
            .feeds
            .iter()
            .map(|feed| Arc::new(client.source(RssFeed::from(feed))) as Arc<dyn FeedSource>)
            .collect();

        let store = BoundedStore::load(&config.store_path, config.max_items, ChannelMeta::from(config));
        let scheduler = Self::new(config, sources, oracle, store);

        info!(
            "Scheduler ready: {} sources, {} stored items, window {:?}",
            scheduler.sources.len(),
            scheduler.store.len(),
            scheduler.engine.policy()
        );

        scheduler
    }

    /// Replace the clock used to stamp entries without a publication date
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the per-source fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn store(&self) -> &BoundedStore {
        &self.store
    }

    /// Run cycles on the configured interval until `shutdown` flips to true
    /// (or its sender goes away).
    ///
    /// Returns an error only when the similarity oracle fails; the caller is
    /// expected to stop the process.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), CycleError> {
        info!(
            "Starting scheduler with cycle interval {}s",
            self.cycle_interval.as_secs()
        );

        let mut ticker = interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown sender dropped, stopping scheduler");
                        return Ok(());
                    }
                }
            }

            if *shutdown.borrow() {
                info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }

            let outcome = tokio::select! {
                result = self.run_cycle() => result,
                _ = shutdown.changed() => {
                    info!("Shutdown requested mid-cycle, abandoning it unsaved");
                    return Ok(());
                }
            };

            if let Err(e) = outcome {
                error!("Stopping: {}", e);
                return Err(e);
            }
        }
    }

    /// One pass over all sources followed by a single persist
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        let mut window = {
            let titles = self.store.newest_titles(self.store.capacity());
            self.engine.build_window(&titles).await?
        };

        let due = self.due_sources(&mut report);
        let fetched = self.fetch_all(due).await;
        let now = (self.clock)();

        for (index, result) in fetched {
            let source_name = self.sources[index].name().to_string();

            let entries = match result {
                Ok(entries) => {
                    self.record_success(index);
                    report.sources_ok += 1;
                    entries
                }
                Err(e) => {
                    self.record_failure(index);
                    report.sources_failed += 1;
                    warn!("Skipping source {} this cycle: {}", source_name, e);
                    continue;
                }
            };

            let mut accepted_here = 0;
            for entry in entries.iter().take(self.max_feed_items) {
                report.entries_seen += 1;
                let item = Item::from_entry(entry, now);

                let verdict = self.filter.verdict(&item);
                if verdict != FilterVerdict::Accepted {
                    debug!("Filtered {:?} from {}: {:?}", item.link, source_name, verdict);
                    report.filtered += 1;
                    continue;
                }

                match self.engine.admit(&item.title, &mut window).await? {
                    Admission::Duplicate { position, score } => {
                        debug!(
                            "Duplicate from {}: {:?} (window position {}, score {:.3})",
                            source_name, item.title, position, score
                        );
                        report.duplicates += 1;
                    }
                    Admission::Accepted => {
                        debug!("New item from {}: {:?}", source_name, item.title);
                        report.evicted += self.store.insert_front(item);
                        report.accepted += 1;
                        accepted_here += 1;
                    }
                }
            }

            debug!("Accepted {} items from {}", accepted_here, source_name);
        }

        report.evicted += self.store.truncate();

        match self.store.save() {
            Ok(()) => report.persisted = true,
            Err(e) => error!("Failed to persist store to {:?}: {}", self.store.path(), e),
        }

        match self.engine.oracle().prune_cache(self.cache_max_age_days) {
            Ok(pruned) => report.pruned = pruned,
            Err(e) => warn!("Failed to prune fingerprint cache: {}", e),
        }

        info!(
            "Cycle done: {} new, {} duplicates, {} filtered, {} evicted, sources {} ok / {} failed / {} skipped, store at {}",
            report.accepted,
            report.duplicates,
            report.filtered,
            report.evicted,
            report.sources_ok,
            report.sources_failed,
            report.sources_skipped,
            self.store.len()
        );

        Ok(report)
    }

    /// Indices of sources to poll this cycle; backing-off sources count down
    fn due_sources(&mut self, report: &mut CycleReport) -> Vec<usize> {
        let mut due = Vec::with_capacity(self.sources.len());
        for (index, health) in self.health.iter_mut().enumerate() {
            if health.skip_remaining > 0 {
                health.skip_remaining -= 1;
                report.sources_skipped += 1;
                debug!(
                    "Backing off {} ({} more cycles)",
                    self.sources[index].name(),
                    health.skip_remaining
                );
            } else {
                due.push(index);
            }
        }
        due
    }

    /// Fetch the given sources concurrently, each under its own timeout.
    ///
    /// Results come back in the order the sources were configured.
    async fn fetch_all(&self, due: Vec<usize>) -> Vec<(usize, Result<Vec<FeedEntry>, NewsError>)> {
        let timeout = self.fetch_timeout;

        stream::iter(due.into_iter().map(|index| {
            let source = Arc::clone(&self.sources[index]);
            async move {
                let result = match tokio::time::timeout(timeout, source.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(NewsError::Timeout(timeout.as_secs())),
                };
                (index, result)
            }
        }))
        .buffered(self.max_concurrent_fetches)
        .collect()
        .await
    }

    fn record_success(&mut self, index: usize) {
        self.health[index] = SourceHealth::default();
    }

    /// After `n` consecutive failures skip the next `2^(n-1) - 1` cycles,
    /// capped at `max_backoff_cycles`
    fn record_failure(&mut self, index: usize) {
        let health = &mut self.health[index];
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);

        let exponent = health.consecutive_failures - 1;
        let skip = 1u32
            .checked_shl(exponent)
            .unwrap_or(u32::MAX)
            .saturating_sub(1)
            .min(self.max_backoff_cycles);
        health.skip_remaining = skip;
    }
}
