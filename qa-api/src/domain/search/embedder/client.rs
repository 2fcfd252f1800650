//! The validated entry point to the embedding provider.

use tracing::debug;

use crate::domain::search::text::preprocess;
use crate::domain::search::traits::{Embedder, Result, SearchError};

/// Wraps an [`Embedder`] with input validation and preprocessing.
///
/// Every caller in the search domain goes through this type rather than the
/// raw provider, so empty text never reaches the network and batch output
/// always lines up with its input.
#[derive(Clone)]
pub struct EmbeddingClient<E> {
    embedder: E,
}

impl<E: Embedder> EmbeddingClient<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    /// Embed a single text.
    ///
    /// Fails with [`SearchError::EmptyInput`] for blank text without calling
    /// the provider.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SearchError::EmptyInput);
        }

        self.embedder.embed(&preprocess(text)).await
    }

    /// Embed many texts with one provider call.
    ///
    /// Returns an empty list for empty input without calling the provider.
    /// `result[i]` is the embedding of `texts[i]`.
    pub async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(SearchError::EmptyInput);
        }

        let inputs: Vec<String> = texts.iter().map(|t| preprocess(t)).collect();
        debug!(count = inputs.len(), "Requesting batch embeddings");

        let embeddings = self.embedder.embed_batch(&inputs).await?;
        if embeddings.len() != inputs.len() {
            return Err(SearchError::Embedding(format!(
                "Expected {} embeddings, provider returned {}",
                inputs.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}
