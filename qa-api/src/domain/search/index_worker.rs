//! Background worker that keeps embeddings in step with content writes.
//!
//! Write handlers publish [`IndexEvent`]s after their own transaction has
//! committed. The worker consumes them one at a time so provider calls are
//! never issued in parallel bursts.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, instrument, warn};

use super::indexer::SearchIndexer;
use super::traits::{Embedder, SearchRepository};
use super::types::{EntityKind, IndexEvent, IndexOutcome};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Sending half of the index event queue.
///
/// Publishing never blocks and never fails the caller. A dropped event
/// leaves the entity absent or stale until the next backfill or stale
/// re-index picks it up.
#[derive(Clone)]
pub struct IndexQueue {
    sender: mpsc::Sender<IndexEvent>,
}

impl IndexQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IndexEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue one event. Returns false if it was dropped.
    pub fn publish(&self, event: IndexEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => {
                debug!(entity = %event, "Queued index event");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(entity = %event, "Index queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(entity = %event, "Index worker stopped, dropping event");
                false
            }
        }
    }

    /// Enqueue every event of a content change. Returns how many were queued.
    pub fn publish_change(&self, change: &ContentChange) -> usize {
        change
            .events()
            .into_iter()
            .filter(|event| self.publish(*event))
            .count()
    }
}

/// The entities touched by one content write.
///
/// Creating a question may also create tags on the fly; those ids travel
/// with the change instead of being buffered somewhere global.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    pub primary: IndexEvent,
    #[serde(default)]
    pub created_tags: Vec<i32>,
}

impl ContentChange {
    #[cfg(test)]
    pub fn new(primary: IndexEvent) -> Self {
        Self {
            primary,
            created_tags: vec![],
        }
    }

    #[cfg(test)]
    pub fn with_created_tags(mut self, tag_ids: impl IntoIterator<Item = i32>) -> Self {
        self.created_tags.extend(tag_ids);
        self
    }

    /// Events to publish, primary entity first.
    pub fn events(&self) -> Vec<IndexEvent> {
        std::iter::once(self.primary)
            .chain(
                self.created_tags
                    .iter()
                    .map(|id| IndexEvent::new(EntityKind::Tag, *id)),
            )
            .collect()
    }
}

/// Consume index events until every [`IndexQueue`] handle is dropped.
///
/// Failures are logged and the worker moves on to the next event.
#[instrument(name = "search_index_worker", skip_all)]
pub async fn run_search_index_worker<E, R>(
    mut receiver: mpsc::Receiver<IndexEvent>,
    indexer: Arc<SearchIndexer<E, R>>,
) where
    E: Embedder,
    R: SearchRepository,
{
    info!("Search index worker started");

    while let Some(event) = receiver.recv().await {
        match indexer.index_entity(event).await {
            Ok(IndexOutcome::Indexed) => debug!(entity = %event, "Indexed entity"),
            Ok(outcome) => debug!(entity = %event, ?outcome, "Nothing to index"),
            Err(e) => error!(entity = %event, error = %e, "Failed to index entity"),
        }
    }

    info!("Search index worker stopped");
}
