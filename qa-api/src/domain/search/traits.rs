//! Trait definitions for search domain abstractions.
//!
//! These traits enable dependency injection and easy testing through mocking.

use async_trait::async_trait;

use super::types::{
    AnswerHit, EmbeddingUpdate, EntityKind, IndexCoverage, IndexSource, QuestionHit, TagHit,
    UserHit,
};

/// Error type for search and indexing operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for SearchError {
    fn from(e: sqlx::Error) -> Self {
        SearchError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Raw access to an external embedding model.
///
/// Implementations send their input as-is and perform no retries;
/// validation and preprocessing live in [`EmbeddingClient`].
///
/// [`EmbeddingClient`]: super::embedder::EmbeddingClient
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embeddings for multiple texts in one provider call.
    ///
    /// The returned vectors must be in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| SearchError::Embedding("No embedding in response".into()))
    }

    /// Returns the embedding dimensions for this embedder.
    fn dimensions(&self) -> usize;
}

/// Vector-augmented storage for the four searchable entity types.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Load the text fields of one row and the time they were last updated.
    ///
    /// Returns `None` when the row does not exist.
    async fn load_source(&self, kind: EntityKind, id: i32) -> Result<Option<IndexSource>>;

    /// All rows of a kind that have never been embedded.
    async fn unindexed(&self, kind: EntityKind) -> Result<Vec<IndexSource>>;

    /// Rows whose embedding predates their last update.
    async fn stale(&self, kind: EntityKind) -> Result<Vec<IndexSource>>;

    /// Overwrite the embedding of one row and set `embedded_at` to the text
    /// version it was generated from.
    ///
    /// Returns false if the row no longer exists.
    async fn store_embedding(&self, kind: EntityKind, update: &EmbeddingUpdate) -> Result<bool>;

    /// Overwrite the embeddings of several rows in one transaction.
    ///
    /// Returns the number of rows updated.
    async fn store_embeddings(&self, kind: EntityKind, updates: &[EmbeddingUpdate])
        -> Result<usize>;

    /// Remove the embedding of a row whose text has become blank.
    ///
    /// Returns false if there was nothing to remove.
    async fn clear_embedding(&self, kind: EntityKind, id: i32) -> Result<bool>;

    /// Nearest questions to `embedding` by cosine distance.
    async fn nearest_questions(&self, embedding: &[f32], limit: i64) -> Result<Vec<QuestionHit>>;

    async fn nearest_answers(&self, embedding: &[f32], limit: i64) -> Result<Vec<AnswerHit>>;

    async fn nearest_tags(&self, embedding: &[f32], limit: i64) -> Result<Vec<TagHit>>;

    async fn nearest_users(&self, embedding: &[f32], limit: i64) -> Result<Vec<UserHit>>;

    /// Total, embedded and stale row counts for a kind.
    async fn coverage(&self, kind: EntityKind) -> Result<IndexCoverage>;
}
