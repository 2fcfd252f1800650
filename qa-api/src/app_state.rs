use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Settings,
    domain::search::{
        embedder::OpenAiEmbedder, repository::PgSearchRepository, Embedder, IndexQueue,
        IndexerConfig, SearchConfig, SearchError, SearchIndexer, SearchService,
    },
};

pub type AppSearchService = SearchService<OpenAiEmbedder, PgSearchRepository>;
pub type AppSearchIndexer = SearchIndexer<OpenAiEmbedder, PgSearchRepository>;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<AppSearchService>,
    pub indexer: Arc<AppSearchIndexer>,
    pub index_queue: IndexQueue,
}

impl AppState {
    pub async fn new(
        db_pool: PgPool,
        config: &Settings,
        index_queue: IndexQueue,
    ) -> Result<Self, SearchError> {
        let (search, indexer) = build_search(db_pool, config).await?;

        Ok(Self {
            search: Arc::new(search),
            indexer: Arc::new(indexer),
            index_queue,
        })
    }
}

/// Build the search service and indexer over one database pool.
///
/// Fails when the provider's vector size does not match the `embedding`
/// columns created by the migrations.
pub async fn build_search(
    db_pool: PgPool,
    config: &Settings,
) -> Result<(AppSearchService, AppSearchIndexer), SearchError> {
    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let repository = PgSearchRepository::new(db_pool);

    repository.verify_dimensions(embedder.dimensions()).await?;

    tracing::info!(
        model = embedder.model(),
        dimensions = embedder.dimensions(),
        "Configured embedding provider"
    );

    let search = SearchService::new(
        embedder.clone(),
        repository.clone(),
        SearchConfig::from(&config.search),
    );
    let indexer = SearchIndexer::new(embedder, repository, IndexerConfig::from(&config.indexing));

    Ok((search, indexer))
}
