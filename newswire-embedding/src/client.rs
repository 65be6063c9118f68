//! Embedding providers

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::{
    error::{EmbeddingError, Result},
    types::EmbeddingVector,
};

/// Turns titles into fixed-dimension vectors.
///
/// Implementations must fail rather than return partial results: a missing
/// vector would let a duplicate through.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, part of the fingerprint cache key
    fn model(&self) -> &str;

    /// Embed every text, returning vectors in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;
}

/// OpenAI embedding client
pub struct EmbeddingClient {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: Option<usize>,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// `api_base` points the client at any OpenAI-compatible endpoint.
    pub fn new(api_key: String, model: &str, api_base: Option<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            dimension: known_dimension(model),
        }
    }

    /// Low-level embedding generation
    async fn generate_embeddings(&self, texts: Vec<String>) -> Result<Vec<EmbeddingVector>> {
        let requested = texts.len();
        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::StringArray(texts),
            encoding_format: None,
            dimensions: None,
            user: None,
        };

        let response = self.client.embeddings().create(request).await?;

        if response.data.len() != requested {
            return Err(EmbeddingError::Config(format!(
                "Requested {} embeddings, API returned {}",
                requested,
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        let expected = self
            .dimension
            .unwrap_or_else(|| data.first().map(|e| e.embedding.len()).unwrap_or(0));

        // Validate dimension
        for entry in &data {
            if entry.embedding.len() != expected {
                return Err(EmbeddingError::InvalidDimension {
                    expected,
                    actual: entry.embedding.len(),
                });
            }
        }

        info!(
            "Generated {} embeddings: dimension={}, model={}",
            data.len(),
            expected,
            self.model
        );

        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} titles", texts.len());
        self.generate_embeddings(texts.to_vec()).await
    }
}

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}
