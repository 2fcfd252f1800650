//! Semantic search over questions, answers, tags and users.
//!
//! Every searchable row carries an embedding of its text. A query is embedded
//! once and compared against each requested entity type with pgvector's
//! cosine distance.
//!
//! # Architecture
//!
//! The search system is built around trait abstractions for testability:
//!
//! - [`Embedder`] - Text embedding generation (OpenAI-compatible API, mocks)
//! - `SearchRepository` - Database operations (PostgreSQL, mocks)
//!
//! [`EmbeddingClient`](embedder::EmbeddingClient) sits in front of any [`Embedder`] and owns input
//! validation and preprocessing.
//!
//! # Example
//!
//! ```ignore
//! use qa_api::domain::search::{SearchService, SearchConfig, EntityKind};
//! use qa_api::domain::search::embedder::OpenAiEmbedder;
//! use qa_api::domain::search::repository::PgSearchRepository;
//!
//! let embedder = OpenAiEmbedder::new(&settings.embedding)?;
//! let repository = PgSearchRepository::new(pool);
//! let service = SearchService::new(embedder, repository, SearchConfig::default());
//!
//! let results = service.search("debounce hook", Some(5), &EntityKind::ALL).await?;
//! ```
//!
//! # Indexing
//!
//! Writes publish an [`IndexEvent`] on the [`IndexQueue`] after they commit;
//! [`run_search_index_worker`] embeds them in the background. Rows that were
//! never indexed, or were edited since, are caught up by
//! [`SearchIndexer::index_all`] and [`SearchIndexer::reindex_all_stale`].

mod index_worker;
mod indexer;
mod ranking;
mod service;
mod text;
mod traits;
mod types;

pub mod embedder;
pub mod repository;

pub use index_worker::{run_search_index_worker, ContentChange, IndexQueue, DEFAULT_QUEUE_CAPACITY};
pub use indexer::{IndexerConfig, SearchIndexer};
pub use ranking::{group_for_palette, PaletteGroup};
pub use service::{SearchConfig, SearchService};
pub use traits::{Embedder, SearchError};
pub use types::{BackfillStats, EntityKind, IndexCoverage, IndexEvent, SearchResults};
