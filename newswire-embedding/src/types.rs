//! Core types for fingerprints

/// Embedding vector (1536 dimensions for text-embedding-3-small)
pub type EmbeddingVector = Vec<f32>;

/// Comparable representation of a title.
///
/// Which variant is produced depends on the oracle's strategy; an oracle only
/// ever compares fingerprints it produced itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Fingerprint {
    /// Lowercased, trimmed, whitespace-collapsed title
    Lexical(String),
    /// Title embedding
    Semantic(EmbeddingVector),
}

impl Fingerprint {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Fingerprint::Lexical(text) => Some(text),
            Fingerprint::Semantic(_) => None,
        }
    }
}
