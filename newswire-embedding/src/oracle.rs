//! The similarity oracle: one interface over the lexical and semantic strategies

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use newswire_core::{SimilarityConfig, SimilarityStrategy};

use crate::{
    client::{Embedder, EmbeddingClient},
    error::{EmbeddingError, Result},
    similarity::{cosine_similarity, lexical_ratio, normalize_title},
    store::FingerprintCache,
    types::{EmbeddingVector, Fingerprint},
};

const PROBE_TEXT: &str = "newswire startup probe";

enum Backend {
    Lexical,
    Semantic {
        embedder: Arc<dyn Embedder>,
        cache: FingerprintCache,
    },
}

/// Scores how alike two titles are.
///
/// Scores are pure functions of the two fingerprints. The only fallible step
/// is fingerprinting under the semantic strategy, and its errors are meant to
/// stop the caller: without embeddings the dedup invariant cannot hold.
pub struct SimilarityOracle {
    backend: Backend,
    threshold: f64,
}

impl SimilarityOracle {
    /// Lexical oracle; `threshold` is on the 0-100 scale
    pub fn lexical(threshold: f64) -> Self {
        Self {
            backend: Backend::Lexical,
            threshold,
        }
    }

    /// Semantic oracle; `threshold` is a cosine similarity
    pub fn semantic(embedder: Arc<dyn Embedder>, cache: FingerprintCache, threshold: f64) -> Self {
        Self {
            backend: Backend::Semantic { embedder, cache },
            threshold,
        }
    }

    /// Build the oracle selected by configuration.
    ///
    /// The semantic strategy needs an API key; `api_base` optionally points
    /// the embedding client at an OpenAI-compatible endpoint.
    pub fn from_config(
        config: &SimilarityConfig,
        api_key: Option<String>,
        api_base: Option<String>,
    ) -> Result<Self> {
        let threshold = config.effective_threshold();

        match config.strategy {
            SimilarityStrategy::Lexical => {
                info!("Using lexical similarity, threshold {}", threshold);
                Ok(Self::lexical(threshold))
            }
            SimilarityStrategy::Semantic => {
                let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                    EmbeddingError::Config(
                        "semantic similarity requires OPENAI_API_KEY".to_string(),
                    )
                })?;

                let cache = match &config.cache_path {
                    Some(path) => FingerprintCache::new(path)?,
                    None => FingerprintCache::new_in_memory()?,
                };

                info!(
                    "Using semantic similarity with {}, threshold {}",
                    config.model, threshold
                );
                let embedder = Arc::new(EmbeddingClient::new(api_key, &config.model, api_base));
                Ok(Self::semantic(embedder, cache, threshold))
            }
        }
    }

    pub fn strategy(&self) -> SimilarityStrategy {
        match self.backend {
            Backend::Lexical => SimilarityStrategy::Lexical,
            Backend::Semantic { .. } => SimilarityStrategy::Semantic,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Check that the embedding provider answers.
    ///
    /// Always succeeds for the lexical strategy.
    pub async fn probe(&self) -> Result<()> {
        if let Backend::Semantic { embedder, .. } = &self.backend {
            let vectors = embedder.embed_batch(&[PROBE_TEXT.to_string()]).await?;
            match vectors.first() {
                Some(v) if !v.is_empty() => {
                    info!("Embedding provider ready: model={}, dimension={}", embedder.model(), v.len());
                }
                _ => {
                    return Err(EmbeddingError::Config(
                        "embedding provider returned an empty probe vector".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fingerprint a single title
    pub async fn fingerprint(&self, title: &str) -> Result<Fingerprint> {
        let mut fingerprints = self.fingerprints(&[title]).await?;
        fingerprints
            .pop()
            .ok_or_else(|| EmbeddingError::Config("no fingerprint produced".to_string()))
    }

    /// Fingerprint several titles, preserving order.
    ///
    /// Under the semantic strategy, cache misses are embedded in a single
    /// batch request, as normalized titles, and written back to the cache.
    #[instrument(skip(self, titles), fields(count = titles.len()))]
    pub async fn fingerprints(&self, titles: &[&str]) -> Result<Vec<Fingerprint>> {
        match &self.backend {
            Backend::Lexical => Ok(titles
                .iter()
                .map(|t| Fingerprint::Lexical(normalize_title(t)))
                .collect()),
            Backend::Semantic { embedder, cache } => {
                let model = embedder.model();
                let mut vectors: Vec<Option<EmbeddingVector>> =
                    cache.get_many(model, titles).unwrap_or_else(|e| {
                        warn!("Fingerprint cache lookup failed, embedding everything: {}", e);
                        vec![None; titles.len()]
                    });

                // Misses grouped by normalized title, so each distinct
                // cache key is embedded once and under the text it keys
                let mut texts: Vec<String> = Vec::new();
                let mut slots: Vec<(usize, usize)> = Vec::new();
                for (i, vector) in vectors.iter().enumerate() {
                    if vector.is_some() {
                        continue;
                    }
                    let text = normalize_title(titles[i]);
                    let position = match texts.iter().position(|t| *t == text) {
                        Some(position) => position,
                        None => {
                            texts.push(text);
                            texts.len() - 1
                        }
                    };
                    slots.push((i, position));
                }

                if !texts.is_empty() {
                    debug!(
                        "{} of {} titles not cached ({} distinct)",
                        slots.len(),
                        titles.len(),
                        texts.len()
                    );
                    let embedded = embedder.embed_batch(&texts).await?;

                    if embedded.len() != texts.len() {
                        return Err(EmbeddingError::Config(format!(
                            "embedder returned {} vectors for {} titles",
                            embedded.len(),
                            texts.len()
                        )));
                    }

                    for (text, vector) in texts.iter().zip(&embedded) {
                        if let Err(e) = cache.put(model, text, vector) {
                            warn!("Failed to cache fingerprint: {}", e);
                        }
                    }
                    for (i, position) in slots {
                        vectors[i] = Some(embedded[position].clone());
                    }
                }

                Ok(vectors
                    .into_iter()
                    .map(|v| Fingerprint::Semantic(v.unwrap_or_default()))
                    .collect())
            }
        }
    }

    /// Drop cached fingerprints older than `max_age_days`.
    ///
    /// Returns how many were removed; always 0 for the lexical strategy.
    pub fn prune_cache(&self, max_age_days: u32) -> Result<usize> {
        match &self.backend {
            Backend::Lexical => Ok(0),
            Backend::Semantic { cache, .. } => cache.prune_older_than(i64::from(max_age_days)),
        }
    }

    /// Similarity of two fingerprints within the strategy's range.
    ///
    /// Fingerprints of the wrong kind score the range minimum.
    pub fn score(&self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        match (a, b) {
            (Fingerprint::Lexical(a), Fingerprint::Lexical(b)) => lexical_ratio(a, b),
            (Fingerprint::Semantic(a), Fingerprint::Semantic(b)) if a.len() == b.len() => {
                cosine_similarity(a, b)
            }
            _ => self.strategy().score_range().0,
        }
    }

    /// Inclusive threshold test
    pub fn is_match(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        self.score(a, b) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    /// Embedder backed by a lookup table that counts requests
    struct TableEmbedder {
        table: HashMap<String, EmbeddingVector>,
        calls: Mutex<Vec<usize>>,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model(&self) -> &str {
            "table"
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| self.table.get(t).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
                .collect())
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        fn model(&self) -> &str {
            "down"
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>> {
            Err(EmbeddingError::Config("provider unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_lexical_fingerprints_are_normalized() {
        let oracle = SimilarityOracle::lexical(85.0);
        let fp = oracle.fingerprint("  PM Announces  New Policy ").await.unwrap();
        assert_eq!(fp, Fingerprint::Lexical("pm announces new policy".to_string()));
    }

    #[tokio::test]
    async fn test_lexical_threshold_is_inclusive() {
        let a = Fingerprint::Lexical("abcdefghij".to_string());
        let b = Fingerprint::Lexical("abcdefghix".to_string());

        let at_threshold = SimilarityOracle::lexical(90.0);
        assert_eq!(at_threshold.score(&a, &b), 90.0);
        assert!(at_threshold.is_match(&a, &b));

        // Score one unit below the threshold
        let above = SimilarityOracle::lexical(91.0);
        assert!(!above.is_match(&a, &b));
    }

    #[tokio::test]
    async fn test_semantic_match_and_cache() {
        let embedder = Arc::new(TableEmbedder::new(&[
            ("actor dies at 80", vec![1.0, 0.1, 0.0]),
            ("actor passes away aged 80", vec![0.95, 0.15, 0.0]),
            ("stock market falls sharply", vec![0.0, 1.0, 0.0]),
        ]));
        let oracle = SimilarityOracle::semantic(
            embedder.clone(),
            FingerprintCache::new_in_memory().unwrap(),
            0.88,
        );

        let fps = oracle
            .fingerprints(&["Actor dies at 80", "Actor passes away aged 80", "Stock market falls sharply"])
            .await
            .unwrap();

        assert!(oracle.is_match(&fps[0], &fps[1]));
        assert!(!oracle.is_match(&fps[0], &fps[2]));

        // Second request is served from the cache
        let again = oracle.fingerprint("Actor dies at 80").await.unwrap();
        assert_eq!(again, fps[0]);
        assert_eq!(*embedder.calls.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_semantic_embeds_each_normalized_title_once() {
        let embedder = Arc::new(TableEmbedder::new(&[(
            "pm announces new policy",
            vec![1.0, 0.0, 0.0],
        )]));
        let oracle = SimilarityOracle::semantic(
            embedder.clone(),
            FingerprintCache::new_in_memory().unwrap(),
            0.88,
        );

        let fps = oracle
            .fingerprints(&["PM announces new policy", "pm  ANNOUNCES new policy "])
            .await
            .unwrap();
        assert_eq!(fps[0], Fingerprint::Semantic(vec![1.0, 0.0, 0.0]));
        assert_eq!(fps[0], fps[1]);

        // A different casing is a cache hit for the same vector
        let cased = oracle.fingerprint("Pm Announces New Policy").await.unwrap();
        assert_eq!(cased, fps[0]);
        assert_eq!(*embedder.calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_prune_cache() {
        let cache = FingerprintCache::new_in_memory().unwrap();
        let old = Utc::now() - chrono::Duration::days(40);
        cache.put_at("table", "old story", &[1.0, 0.0], old).unwrap();
        cache.put("table", "fresh story", &[0.0, 1.0]).unwrap();

        let oracle = SimilarityOracle::semantic(Arc::new(TableEmbedder::new(&[])), cache.clone(), 0.88);
        assert_eq!(oracle.prune_cache(30).unwrap(), 1);
        assert_eq!(cache.count().unwrap(), 1);

        assert_eq!(SimilarityOracle::lexical(85.0).prune_cache(30).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_semantic_failure_is_an_error() {
        let oracle = SimilarityOracle::semantic(
            Arc::new(DownEmbedder),
            FingerprintCache::new_in_memory().unwrap(),
            0.88,
        );

        assert!(oracle.fingerprint("anything").await.is_err());
        assert!(oracle.probe().await.is_err());
    }

    #[tokio::test]
    async fn test_mismatched_fingerprints_never_match() {
        let oracle = SimilarityOracle::lexical(0.0);
        let a = Fingerprint::Lexical("x".to_string());
        let b = Fingerprint::Semantic(vec![1.0]);
        assert_eq!(oracle.score(&a, &b), 0.0);

        let semantic = SimilarityOracle::semantic(
            Arc::new(DownEmbedder),
            FingerprintCache::new_in_memory().unwrap(),
            0.5,
        );
        let short = Fingerprint::Semantic(vec![1.0]);
        let long = Fingerprint::Semantic(vec![1.0, 0.0]);
        assert_eq!(semantic.score(&short, &long), -1.0);
        assert!(!semantic.is_match(&short, &long));
    }

    #[test]
    fn test_from_config_requires_key_for_semantic() {
        let config = SimilarityConfig::default();
        assert!(SimilarityOracle::from_config(&config, None, None).is_err());

        let lexical = SimilarityConfig {
            strategy: SimilarityStrategy::Lexical,
            ..SimilarityConfig::default()
        };
        let oracle = SimilarityOracle::from_config(&lexical, None, None).unwrap();
        assert_eq!(oracle.strategy(), SimilarityStrategy::Lexical);
        assert_eq!(oracle.threshold(), 85.0);
    }
}
