//! Similarity oracle for headline deduplication
//!
//! This crate decides how alike two news titles are, under one of two
//! interchangeable strategies selected at startup:
//!
//! ## Strategies
//! - Lexical: normalized Levenshtein ratio on normalized titles (0-100)
//! - Semantic: cosine similarity of title embeddings from an OpenAI-compatible
//!   embeddings endpoint (-1.0 to 1.0)
//!
//! Semantic fingerprints are cached in SQLite so titles already in the store
//! are not re-embedded every cycle.

pub mod client;
pub mod error;
pub mod oracle;
pub mod similarity;
pub mod store;
pub mod types;

pub use client::{Embedder, EmbeddingClient};
pub use error::{EmbeddingError, Result};
pub use oracle::SimilarityOracle;
pub use similarity::{cosine_similarity, lexical_ratio, normalize_title};
pub use store::FingerprintCache;
pub use types::{EmbeddingVector, Fingerprint};
