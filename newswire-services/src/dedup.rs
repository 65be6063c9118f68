//! Dedup Engine
//!
//! Decides whether a candidate title is a story the store already holds by
//! scanning a bounded, newest-first window of fingerprints.
//!
//! The window bound trades recall for cost: a story re-reported after the
//! window has rolled past it is treated as new.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use newswire_embedding::{Fingerprint, Result, SimilarityOracle};

/// How many of the store's newest items each candidate is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Compare against everything the store holds
    FullStore,
    /// Compare against the newest `n` items only
    Bounded(usize),
}

impl WindowPolicy {
    /// `None` means the whole store
    pub fn from_max_existing_check(max_existing_check: Option<usize>) -> Self {
        match max_existing_check {
            Some(n) => WindowPolicy::Bounded(n),
            None => WindowPolicy::FullStore,
        }
    }

    /// Window size for a store holding at most `max_items`
    pub fn bound(self, max_items: usize) -> usize {
        match self {
            WindowPolicy::FullStore => max_items,
            WindowPolicy::Bounded(n) => n.min(max_items),
        }
    }
}

/// Newest-first fingerprints of recently stored items.
///
/// Never holds more than `bound` entries.
#[derive(Debug, Clone)]
pub struct ComparisonWindow {
    fingerprints: VecDeque<Fingerprint>,
    bound: usize,
}

impl ComparisonWindow {
    pub fn new(bound: usize) -> Self {
        Self {
            fingerprints: VecDeque::with_capacity(bound.min(1024)),
            bound,
        }
    }

    /// Build from fingerprints already ordered newest-first
    pub fn from_newest(fingerprints: Vec<Fingerprint>, bound: usize) -> Self {
        let mut fingerprints = VecDeque::from(fingerprints);
        fingerprints.truncate(bound);
        Self { fingerprints, bound }
    }

    /// Record a newly accepted item
    pub fn push_front(&mut self, fingerprint: Fingerprint) {
        if self.bound == 0 {
            return;
        }
        self.fingerprints.push_front(fingerprint);
        self.fingerprints.truncate(self.bound);
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }
}

/// Outcome of offering a candidate to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// New story; its fingerprint is now at the window front
    Accepted,
    /// Matches the window entry at `position` (0 = newest)
    Duplicate { position: usize, score: f64 },
}

/// Novelty decisions for one strategy and window policy
pub struct DedupEngine {
    oracle: Arc<SimilarityOracle>,
    policy: WindowPolicy,
    bound: usize,
}

impl DedupEngine {
    pub fn new(oracle: Arc<SimilarityOracle>, policy: WindowPolicy, max_items: usize) -> Self {
        Self {
            oracle,
            policy,
            bound: policy.bound(max_items),
        }
    }

    pub fn oracle(&self) -> &SimilarityOracle {
        &self.oracle
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Fingerprint the newest stored titles (newest first) into a fresh window
    pub async fn build_window(&self, newest_titles: &[&str]) -> Result<ComparisonWindow> {
        let titles = &newest_titles[..newest_titles.len().min(self.bound)];
        let fingerprints = self.oracle.fingerprints(titles).await?;
        debug!("Built comparison window of {} fingerprints", fingerprints.len());
        Ok(ComparisonWindow::from_newest(fingerprints, self.bound))
    }

    /// First window entry the candidate matches, scanning newest-first
    pub fn find_match(
        &self,
        candidate: &Fingerprint,
        window: &ComparisonWindow,
    ) -> Option<(usize, f64)> {
        let threshold = self.oracle.threshold();
        window
            .iter()
            .enumerate()
            .map(|(position, existing)| (position, self.oracle.score(candidate, existing)))
            .find(|&(_, score)| score >= threshold)
    }

    pub fn is_duplicate(&self, candidate: &Fingerprint, window: &ComparisonWindow) -> bool {
        self.find_match(candidate, window).is_some()
    }

    /// Fingerprint `title`, check it against the window and, when it is new,
    /// push its fingerprint to the window front.
    ///
    /// Errors come only from the oracle and mean dedup cannot be trusted.
    pub async fn admit(&self, title: &str, window: &mut ComparisonWindow) -> Result<Admission> {
        let fingerprint = self.oracle.fingerprint(title).await?;

        match self.find_match(&fingerprint, window) {
            Some((position, score)) => Ok(Admission::Duplicate { position, score }),
            None => {
                window.push_front(fingerprint);
                Ok(Admission::Accepted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexical_engine(policy: WindowPolicy, max_items: usize) -> DedupEngine {
        DedupEngine::new(Arc::new(SimilarityOracle::lexical(85.0)), policy, max_items)
    }

    fn lexical(text: &str) -> Fingerprint {
        Fingerprint::Lexical(text.to_string())
    }

    #[test]
    fn test_policy_bound() {
        assert_eq!(WindowPolicy::from_max_existing_check(None), WindowPolicy::FullStore);
        assert_eq!(WindowPolicy::FullStore.bound(500), 500);
        assert_eq!(WindowPolicy::Bounded(50).bound(1000), 50);
        assert_eq!(WindowPolicy::Bounded(50).bound(10), 10);
    }

    #[test]
    fn test_window_stays_bounded() {
        let mut window = ComparisonWindow::new(2);
        window.push_front(lexical("a"));
        window.push_front(lexical("b"));
        window.push_front(lexical("c"));

        assert_eq!(window.len(), 2);
        let texts: Vec<&str> = window.iter().filter_map(|f| f.as_text()).collect();
        assert_eq!(texts, vec!["c", "b"]);
    }

    #[test]
    fn test_find_match_scans_newest_first() {
        let engine = lexical_engine(WindowPolicy::Bounded(10), 100);
        let window = ComparisonWindow::from_newest(
            vec![
                lexical("something else entirely"),
                lexical("pm announces new policy"),
                lexical("pm announces new policy"),
            ],
            10,
        );

        let found = engine.find_match(&lexical("pm announces new policy"), &window);
        assert_eq!(found, Some((1, 100.0)));
    }

    #[test]
    fn test_is_duplicate_threshold_is_inclusive() {
        let window = ComparisonWindow::from_newest(vec![lexical("abcdefghix")], 10);
        let candidate = lexical("abcdefghij");

        // Scores exactly 90
        let at_threshold =
            DedupEngine::new(Arc::new(SimilarityOracle::lexical(90.0)), WindowPolicy::FullStore, 100);
        assert!(at_threshold.is_duplicate(&candidate, &window));

        let above =
            DedupEngine::new(Arc::new(SimilarityOracle::lexical(91.0)), WindowPolicy::FullStore, 100);
        assert!(!above.is_duplicate(&candidate, &window));
        assert!(!above.is_duplicate(&candidate, &ComparisonWindow::new(10)));
    }

    #[tokio::test]
    async fn test_admit_updates_window() {
        let engine = lexical_engine(WindowPolicy::Bounded(10), 100);
        let mut window = ComparisonWindow::new(10);

        let first = engine.admit("PM announces new policy", &mut window).await.unwrap();
        assert_eq!(first, Admission::Accepted);
        assert_eq!(window.len(), 1);

        let second = engine.admit("PM Announces New Policy", &mut window).await.unwrap();
        assert!(matches!(second, Admission::Duplicate { position: 0, .. }));
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn test_story_outside_window_is_new() {
        let engine = lexical_engine(WindowPolicy::Bounded(1), 100);
        let mut window = ComparisonWindow::new(1);

        engine.admit("PM announces new policy", &mut window).await.unwrap();
        engine.admit("Stock market falls sharply", &mut window).await.unwrap();

        let again = engine.admit("PM announces new policy", &mut window).await.unwrap();
        assert_eq!(again, Admission::Accepted);
    }

    #[tokio::test]
    async fn test_build_window_respects_bound() {
        let engine = lexical_engine(WindowPolicy::Bounded(2), 100);
        let window = engine
            .build_window(&["Newest story", "Older story", "Oldest story"])
            .await
            .unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window.bound(), 2);
        assert_eq!(window.iter().next().and_then(|f| f.as_text()), Some("newest story"));
    }
}
