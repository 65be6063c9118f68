//! Error types for similarity operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}
