//! Search indexer keeping stored embeddings in line with entity text.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::embedder::EmbeddingClient;
use super::traits::{Embedder, Result, SearchError, SearchRepository};
use super::types::{
    BackfillStats, EmbeddingUpdate, EntityKind, IndexEvent, IndexOutcome, IndexSource,
};

/// Configuration for the search indexer.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Batch size for questions, answers and users
    pub batch_size: usize,
    /// Batch size for tags, whose text is much shorter
    pub tag_batch_size: usize,
    /// Pause between consecutive batches to stay under provider rate limits
    pub batch_delay: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            tag_batch_size: 20,
            batch_delay: Duration::from_millis(100),
        }
    }
}

impl IndexerConfig {
    pub fn batch_size_for(&self, kind: EntityKind) -> usize {
        let size = match kind {
            EntityKind::Tag => self.tag_batch_size,
            _ => self.batch_size,
        };
        size.max(1)
    }
}

/// Indexer for generating and storing entity embeddings.
///
/// # Type Parameters
///
/// * `E` - Embedder implementation for generating embeddings
/// * `R` - SearchRepository implementation for database operations
///
/// # Example
///
/// ```ignore
/// let indexer = SearchIndexer::new(embedder, repository, IndexerConfig::default());
/// indexer.index_question(42).await?;
/// let stats = indexer.index_all().await;
/// println!("Backfilled {} rows", stats.total_indexed());
/// ```
pub struct SearchIndexer<E, R>
where
    E: Embedder,
    R: SearchRepository,
{
    client: EmbeddingClient<E>,
    repository: R,
    config: IndexerConfig,
}

impl<E, R> SearchIndexer<E, R>
where
    E: Embedder,
    R: SearchRepository,
{
    /// Create a new search indexer.
    pub fn new(embedder: E, repository: R, config: IndexerConfig) -> Self {
        Self {
            client: EmbeddingClient::new(embedder),
            repository,
            config,
        }
    }

    /// Create an indexer with default configuration.
    #[allow(dead_code)]
    pub fn with_defaults(embedder: E, repository: R) -> Self {
        Self::new(embedder, repository, IndexerConfig::default())
    }

    /// Re-embed one entity from its current text.
    ///
    /// A row that no longer exists is not an error: indexing always follows
    /// a primary write that may since have been undone. A row whose text is
    /// now blank loses its old embedding so it stops matching searches.
    #[instrument(name = "SearchIndexer::index_entity", skip(self), fields(entity = %event))]
    pub async fn index_entity(&self, event: IndexEvent) -> Result<IndexOutcome> {
        let Some(source) = self.repository.load_source(event.kind, event.id).await? else {
            debug!("Entity no longer exists, skipping");
            return Ok(IndexOutcome::Missing);
        };

        let prepared = source.text.prepare();
        if prepared.trim().is_empty() {
            if self.repository.clear_embedding(event.kind, event.id).await? {
                debug!("Entity text is now blank, cleared embedding");
            } else {
                debug!("Entity has no text to embed, skipping");
            }
            return Ok(IndexOutcome::Skipped);
        }

        let embedding = self.client.generate_embedding(&prepared).await?;
        let update = EmbeddingUpdate {
            id: source.id,
            embedding,
            source_updated_at: source.updated_at,
        };

        if self.repository.store_embedding(event.kind, &update).await? {
            Ok(IndexOutcome::Indexed)
        } else {
            debug!("Entity deleted while embedding, skipping");
            Ok(IndexOutcome::Missing)
        }
    }

    #[allow(dead_code)]
    pub async fn index_question(&self, id: i32) -> Result<IndexOutcome> {
        self.index_entity(IndexEvent::new(EntityKind::Question, id))
            .await
    }

    #[allow(dead_code)]
    pub async fn index_answer(&self, id: i32) -> Result<IndexOutcome> {
        self.index_entity(IndexEvent::new(EntityKind::Answer, id)).await
    }

    #[allow(dead_code)]
    pub async fn index_tag(&self, id: i32) -> Result<IndexOutcome> {
        self.index_entity(IndexEvent::new(EntityKind::Tag, id)).await
    }

    #[allow(dead_code)]
    pub async fn index_user(&self, id: i32) -> Result<IndexOutcome> {
        self.index_entity(IndexEvent::new(EntityKind::User, id)).await
    }

    /// Embed every row of `kind` that has no embedding yet.
    ///
    /// Returns the number of rows embedded. Batches committed before a
    /// failure stay written.
    pub async fn backfill(&self, kind: EntityKind) -> Result<usize> {
        self.run_backfill(kind).await.into_result()
    }

    pub async fn index_all_questions(&self) -> Result<usize> {
        self.backfill(EntityKind::Question).await
    }

    pub async fn index_all_answers(&self) -> Result<usize> {
        self.backfill(EntityKind::Answer).await
    }

    pub async fn index_all_tags(&self) -> Result<usize> {
        self.backfill(EntityKind::Tag).await
    }

    pub async fn index_all_users(&self) -> Result<usize> {
        self.backfill(EntityKind::User).await
    }

    /// Backfill all four entity types concurrently.
    ///
    /// A failure stops only that type's batch loop. Rows it committed
    /// before failing are still counted, and the failure is logged and
    /// counted in [`BackfillStats::errors`].
    pub async fn index_all(&self) -> BackfillStats {
        let (questions, answers, tags, users) = tokio::join!(
            self.run_backfill(EntityKind::Question),
            self.run_backfill(EntityKind::Answer),
            self.run_backfill(EntityKind::Tag),
            self.run_backfill(EntityKind::User),
        );

        let stats = collect_stats([
            (EntityKind::Question, questions),
            (EntityKind::Answer, answers),
            (EntityKind::Tag, tags),
            (EntityKind::User, users),
        ]);

        info!(
            questions = stats.questions,
            answers = stats.answers,
            tags = stats.tags,
            users = stats.users,
            errors = stats.errors,
            "Backfill completed"
        );

        stats
    }

    /// Re-embed rows of `kind` whose text changed after they were indexed.
    pub async fn reindex_stale(&self, kind: EntityKind) -> Result<usize> {
        self.run_stale(kind).await.into_result()
    }

    /// Re-index stale rows of all four entity types concurrently.
    pub async fn reindex_all_stale(&self) -> BackfillStats {
        let (questions, answers, tags, users) = tokio::join!(
            self.run_stale(EntityKind::Question),
            self.run_stale(EntityKind::Answer),
            self.run_stale(EntityKind::Tag),
            self.run_stale(EntityKind::User),
        );

        let stats = collect_stats([
            (EntityKind::Question, questions),
            (EntityKind::Answer, answers),
            (EntityKind::Tag, tags),
            (EntityKind::User, users),
        ]);

        info!(
            total = stats.total_indexed(),
            errors = stats.errors,
            "Stale re-index completed"
        );

        stats
    }

    #[instrument(name = "SearchIndexer::backfill", skip(self))]
    async fn run_backfill(&self, kind: EntityKind) -> BatchRun {
        match self.repository.unindexed(kind).await {
            Ok(sources) => {
                info!(count = sources.len(), "Backfilling unindexed rows");
                self.index_in_batches(kind, sources).await
            }
            Err(e) => BatchRun::failed(e),
        }
    }

    #[instrument(name = "SearchIndexer::reindex_stale", skip(self))]
    async fn run_stale(&self, kind: EntityKind) -> BatchRun {
        match self.repository.stale(kind).await {
            Ok(sources) => {
                info!(count = sources.len(), "Re-indexing stale rows");
                self.index_in_batches(kind, sources).await
            }
            Err(e) => BatchRun::failed(e),
        }
    }

    /// Embed `sources` batch by batch, one provider call per batch, writing
    /// each vector back to the row it was generated from.
    async fn index_in_batches(&self, kind: EntityKind, sources: Vec<IndexSource>) -> BatchRun {
        let mut run = BatchRun::default();

        if let Err(e) = self.write_batches(kind, sources, &mut run.indexed).await {
            warn!(indexed = run.indexed, error = %e, "Batch loop stopped early");
            run.error = Some(e);
        }

        run
    }

    async fn write_batches(
        &self,
        kind: EntityKind,
        sources: Vec<IndexSource>,
        indexed: &mut usize,
    ) -> Result<()> {
        let mut pending: Vec<(IndexSource, String)> = Vec::with_capacity(sources.len());

        for source in sources {
            let text = source.text.prepare();
            if text.trim().is_empty() {
                if self.repository.clear_embedding(kind, source.id).await? {
                    debug!(id = source.id, "Cleared embedding of blank row");
                }
                continue;
            }
            pending.push((source, text));
        }

        let batch_size = self.config.batch_size_for(kind);

        for (batch_number, batch) in pending.chunks(batch_size).enumerate() {
            if batch_number > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let embeddings = self.client.generate_embeddings(&texts).await?;

            let updates: Vec<EmbeddingUpdate> = batch
                .iter()
                .zip(embeddings)
                .map(|((source, _), embedding)| EmbeddingUpdate {
                    id: source.id,
                    embedding,
                    source_updated_at: source.updated_at,
                })
                .collect();
            *indexed += self.repository.store_embeddings(kind, &updates).await?;

            debug!(batch = batch_number, size = batch.len(), indexed = *indexed, "Stored batch");
        }

        Ok(())
    }
}

/// Rows written by one batch loop, and the error that ended it early.
#[derive(Debug, Default)]
struct BatchRun {
    indexed: usize,
    error: Option<SearchError>,
}

impl BatchRun {
    fn failed(error: SearchError) -> Self {
        Self {
            indexed: 0,
            error: Some(error),
        }
    }

    fn into_result(self) -> Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.indexed),
        }
    }
}

fn collect_stats(runs: [(EntityKind, BatchRun); 4]) -> BackfillStats {
    let mut stats = BackfillStats::default();

    for (kind, run) in runs {
        stats.record(kind, run.indexed);
        if let Some(e) = run.error {
            warn!(kind = %kind, indexed = run.indexed, error = %e, "Indexing failed for entity type");
            stats.errors += 1;
        }
    }

    stats
}
