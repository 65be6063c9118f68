//! Similarity calculations

use ndarray::ArrayView1;
use rapidfuzz::fuzz;
use tracing::debug;

/// Normalize a title for comparison (lowercase, trim, collapse whitespace)
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-level similarity ratio of two already-normalized titles
///
/// Indel ratio `2·M / (|a| + |b|)`, where `M` counts characters kept in
/// common, scaled to 0-100 and rounded so thresholds compare against whole
/// numbers. A title with a few extra trailing words still scores high.
pub fn lexical_ratio(a: &str, b: &str) -> f64 {
    (fuzz::ratio(a.chars(), b.chars()) * 100.0).round()
}

/// Calculate cosine similarity between two embeddings
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical)
///
/// Formula: cos(θ) = (A · B) / (||A|| ||B||)
/// where:
/// - A · B is the dot product
/// - ||A|| and ||B|| are the magnitudes (L2 norms)
///
/// Vectors of different dimension, or zero vectors, score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        debug!(
            "Embedding dimensions differ ({} and {}), treating as unrelated",
            a.len(),
            b.len()
        );
        return 0.0;
    }

    let a_view = ArrayView1::from(a);
    let b_view = ArrayView1::from(b);

    let dot_product = a_view.dot(&b_view);
    let norm_a = a_view.dot(&a_view).sqrt();
    let norm_b = b_view.dot(&b_view).sqrt();

    // Avoid division by zero
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)) as f64
}
