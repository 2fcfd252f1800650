//! Search service ranking all entity types against one query embedding.

use std::future::Future;

use futures::future::try_join_all;
use tracing::{debug, instrument, warn};

use super::embedder::EmbeddingClient;
use super::ranking::DEFAULT_SIMILARITY_FLOOR;
use super::traits::{Embedder, Result, SearchError, SearchRepository};
use super::types::{EntityKind, IndexCoverage, SearchResults};

/// Configuration for the search service.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of results per type when the caller gives no limit
    pub default_limit: i64,
    /// Maximum number of results per type
    pub max_limit: i64,
    /// Maximum query length in characters, after trimming
    pub max_query_length: usize,
    /// Minimum similarity shown in grouped palette results
    pub similarity_floor: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
            max_query_length: 500,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
        }
    }
}

/// Search service that embeds a query once and ranks every requested
/// entity type against it.
///
/// # Type Parameters
///
/// * `E` - Embedder implementation for generating query embeddings
/// * `R` - SearchRepository implementation for database operations
///
/// # Examples
///
/// ```ignore
/// let service = SearchService::new(embedder, repository, SearchConfig::default());
/// let results = service.search("debounce hook", Some(5), &[EntityKind::Question]).await?;
/// ```
pub struct SearchService<E, R>
where
    E: Embedder,
    R: SearchRepository,
{
    client: EmbeddingClient<E>,
    repository: R,
    config: SearchConfig,
}

impl<E, R> SearchService<E, R>
where
    E: Embedder,
    R: SearchRepository,
{
    /// Create a new search service.
    pub fn new(embedder: E, repository: R, config: SearchConfig) -> Self {
        Self {
            client: EmbeddingClient::new(embedder),
            repository,
            config,
        }
    }

    /// Create a search service with default configuration.
    #[allow(dead_code)]
    pub fn with_defaults(embedder: E, repository: R) -> Self {
        Self::new(embedder, repository, SearchConfig::default())
    }

    pub fn similarity_floor(&self) -> f64 {
        self.config.similarity_floor
    }

    /// Rank entities of the requested types by similarity to `query`.
    ///
    /// # Arguments
    ///
    /// * `query` - Free text, 1 to 500 characters after trimming
    /// * `limit` - Results per type (None uses default, clamped to 1..=max_limit)
    /// * `types` - Entity types to search; the others stay empty and cost nothing
    ///
    /// # Returns
    ///
    /// Per-type lists sorted by similarity, highest first. No similarity
    /// floor is applied here.
    ///
    /// A type whose query fails is logged and comes back empty. A failed
    /// query embedding fails the whole call.
    #[instrument(name = "SearchService::search", skip(self))]
    pub async fn search(
        &self,
        query: &str,
        limit: Option<i64>,
        types: &[EntityKind],
    ) -> Result<SearchResults> {
        let query = self.validate(query)?;
        let limit = limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1));

        if types.is_empty() {
            return Ok(SearchResults::default());
        }

        let embedding = self.client.generate_embedding(&query).await?;
        let wants = |kind: EntityKind| types.contains(&kind);

        let (questions, answers, tags, users) = tokio::join!(
            isolated(
                EntityKind::Question,
                wants(EntityKind::Question),
                self.repository.nearest_questions(&embedding, limit),
            ),
            isolated(
                EntityKind::Answer,
                wants(EntityKind::Answer),
                self.repository.nearest_answers(&embedding, limit),
            ),
            isolated(
                EntityKind::Tag,
                wants(EntityKind::Tag),
                self.repository.nearest_tags(&embedding, limit),
            ),
            isolated(
                EntityKind::User,
                wants(EntityKind::User),
                self.repository.nearest_users(&embedding, limit),
            ),
        );

        let results = SearchResults {
            questions,
            answers,
            tags,
            users,
        };
        debug!(hits = results.len(), limit, "Search completed");

        Ok(results)
    }

    /// Embedding coverage for every entity type.
    pub async fn stats(&self) -> Result<Vec<IndexCoverage>> {
        try_join_all(EntityKind::ALL.map(|kind| self.repository.coverage(kind))).await
    }

    /// Trim, bound and lowercase the query.
    fn validate(&self, query: &str) -> Result<String> {
        let trimmed = query.trim();

        if trimmed.is_empty() {
            return Err(SearchError::InvalidQuery("query must not be empty".into()));
        }

        if trimmed.chars().count() > self.config.max_query_length {
            return Err(SearchError::InvalidQuery(format!(
                "query must be at most {} characters",
                self.config.max_query_length
            )));
        }

        Ok(trimmed.to_lowercase())
    }
}

/// Await `query` only if the type was requested, swallowing its failure.
async fn isolated<T>(
    kind: EntityKind,
    requested: bool,
    query: impl Future<Output = Result<Vec<T>>>,
) -> Vec<T> {
    if !requested {
        return vec![];
    }

    match query.await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(kind = %kind, error = %e, "Search query failed for entity type");
            vec![]
        }
    }
}
