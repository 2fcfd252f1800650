//! Mock repository implementation for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use time::{Duration, OffsetDateTime};

use crate::domain::search::traits::{Result, SearchError, SearchRepository};
use crate::domain::search::types::{
    AnswerHit, EmbeddingUpdate, EntityKind, EntityText, IndexCoverage, IndexSource, QuestionHit,
    TagHit, UserHit,
};

#[derive(Debug, Clone)]
struct MockRow {
    text: EntityText,
    /// Parent question for answers.
    question_id: Option<i32>,
    embedding: Option<Vec<f32>>,
    updated_at: i64,
    embedded_at: Option<i64>,
}

/// Mock search repository backed by an in-memory HashMap.
///
/// Timestamps come from a logical clock so staleness checks are
/// deterministic. Nearest-neighbour queries compute cosine similarity in
/// memory and skip rows without an embedding.
///
/// # Examples
///
/// ```ignore
/// let repo = MockSearchRepository::new()
///     .with_question(1, "How to debounce", "I need to delay execution")
///     .with_tag(7, "react");
/// ```
#[derive(Clone, Default)]
pub struct MockSearchRepository {
    rows: Arc<RwLock<HashMap<(EntityKind, i32), MockRow>>>,
    clock: Arc<AtomicI64>,
    nearest_calls: Arc<RwLock<HashMap<EntityKind, usize>>>,
    failing_kinds: Arc<RwLock<Vec<EntityKind>>>,
}

#[allow(dead_code)]
impl MockSearchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn insert(&self, id: i32, text: EntityText, question_id: Option<i32>) {
        let updated_at = self.tick();
        self.rows.write().unwrap().insert(
            (text.kind(), id),
            MockRow {
                text,
                question_id,
                embedding: None,
                updated_at,
                embedded_at: None,
            },
        );
    }

    pub fn with_question(self, id: i32, title: &str, content: &str) -> Self {
        let text = EntityText::Question {
            title: title.to_string(),
            content: content.to_string(),
        };
        self.insert(id, text, None);
        self
    }

    pub fn with_answer(self, id: i32, question_id: i32, content: &str) -> Self {
        let text = EntityText::Answer {
            content: content.to_string(),
        };
        self.insert(id, text, Some(question_id));
        self
    }

    pub fn with_tag(self, id: i32, name: &str) -> Self {
        let text = EntityText::Tag {
            name: name.to_string(),
        };
        self.insert(id, text, None);
        self
    }

    pub fn with_user(self, id: i32, name: &str, username: &str, bio: Option<&str>) -> Self {
        let text = EntityText::User {
            name: name.to_string(),
            username: username.to_string(),
            bio: bio.map(str::to_string),
        };
        self.insert(id, text, None);
        self
    }

    /// Pre-set an embedding as if the row had been indexed.
    pub fn with_embedding(self, kind: EntityKind, id: i32, embedding: Vec<f32>) -> Self {
        let now = self.tick();
        if let Some(row) = self.rows.write().unwrap().get_mut(&(kind, id)) {
            row.embedding = Some(embedding);
            row.embedded_at = Some(now);
        }
        self
    }

    /// Make nearest-neighbour queries for `kind` fail.
    pub fn failing_search_for(self, kind: EntityKind) -> Self {
        self.failing_kinds.write().unwrap().push(kind);
        self
    }

    /// Simulate a content edit: replace the text and bump `updated_at`.
    pub fn edit(&self, id: i32, text: EntityText) {
        let now = self.tick();
        if let Some(row) = self.rows.write().unwrap().get_mut(&(text.kind(), id)) {
            row.text = text;
            row.updated_at = now;
        }
    }

    pub fn remove(&self, kind: EntityKind, id: i32) {
        self.rows.write().unwrap().remove(&(kind, id));
    }

    pub fn embedding(&self, kind: EntityKind, id: i32) -> Option<Vec<f32>> {
        self.rows
            .read()
            .unwrap()
            .get(&(kind, id))
            .and_then(|row| row.embedding.clone())
    }

    /// Number of nearest-neighbour queries issued for `kind`.
    pub fn nearest_calls(&self, kind: EntityKind) -> usize {
        self.nearest_calls
            .read()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    fn sources(&self, kind: EntityKind, pick: impl Fn(&MockRow) -> bool) -> Vec<IndexSource> {
        let rows = self.rows.read().unwrap();
        let mut sources: Vec<IndexSource> = rows
            .iter()
            .filter(|((k, _), row)| *k == kind && pick(row))
            .map(|((_, id), row)| source(*id, row))
            .collect();
        sources.sort_by_key(|s| s.id);
        sources
    }

    /// Rank embedded rows of `kind` by cosine similarity to `query`.
    fn rank(&self, kind: EntityKind, query: &[f32], limit: i64) -> Result<Vec<(i32, MockRow, f64)>> {
        *self.nearest_calls.write().unwrap().entry(kind).or_default() += 1;

        if self.failing_kinds.read().unwrap().contains(&kind) {
            return Err(SearchError::Database(format!("{kind} query failed")));
        }

        let rows = self.rows.read().unwrap();
        let mut ranked: Vec<(i32, MockRow, f64)> = rows
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .filter_map(|((_, id), row)| {
                let embedding = row.embedding.as_ref()?;
                Some((*id, row.clone(), cosine_similarity(query, embedding)))
            })
            .collect();

        ranked.sort_by(|a, b| b.2.total_cmp(&a.2));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    fn question_title(&self, question_id: Option<i32>) -> String {
        let rows = self.rows.read().unwrap();
        match question_id.and_then(|id| rows.get(&(EntityKind::Question, id))) {
            Some(MockRow {
                text: EntityText::Question { title, .. },
                ..
            }) => title.clone(),
            _ => String::new(),
        }
    }
}

fn source(id: i32, row: &MockRow) -> IndexSource {
    IndexSource {
        id,
        text: row.text.clone(),
        updated_at: at_tick(row.updated_at),
    }
}

/// Map a logical clock tick onto a timestamp.
fn at_tick(tick: i64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::seconds(tick)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SearchRepository for MockSearchRepository {
    async fn load_source(&self, kind: EntityKind, id: i32) -> Result<Option<IndexSource>> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .get(&(kind, id))
            .map(|row| source(id, row)))
    }

    async fn unindexed(&self, kind: EntityKind) -> Result<Vec<IndexSource>> {
        Ok(self.sources(kind, |row| row.embedding.is_none()))
    }

    async fn stale(&self, kind: EntityKind) -> Result<Vec<IndexSource>> {
        Ok(self.sources(kind, |row| {
            row.embedding.is_some() && row.embedded_at.map_or(true, |at| at < row.updated_at)
        }))
    }

    async fn store_embedding(&self, kind: EntityKind, update: &EmbeddingUpdate) -> Result<bool> {
        match self.rows.write().unwrap().get_mut(&(kind, update.id)) {
            Some(row) => {
                row.embedding = Some(update.embedding.clone());
                row.embedded_at = Some(update.source_updated_at.unix_timestamp());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn store_embeddings(
        &self,
        kind: EntityKind,
        updates: &[EmbeddingUpdate],
    ) -> Result<usize> {
        let mut count = 0;
        for update in updates {
            if self.store_embedding(kind, update).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn clear_embedding(&self, kind: EntityKind, id: i32) -> Result<bool> {
        match self.rows.write().unwrap().get_mut(&(kind, id)) {
            Some(row) if row.embedding.is_some() => {
                row.embedding = None;
                row.embedded_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn nearest_questions(&self, embedding: &[f32], limit: i64) -> Result<Vec<QuestionHit>> {
        let ranked = self.rank(EntityKind::Question, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(id, row, similarity)| {
                let title = match row.text {
                    EntityText::Question { title, .. } => title,
                    _ => String::new(),
                };
                QuestionHit {
                    id,
                    title,
                    author_id: 1,
                    author_name: "Author".to_string(),
                    author_image: None,
                    upvotes: 0,
                    answers: 0,
                    views: 0,
                    created_at: OffsetDateTime::UNIX_EPOCH,
                    similarity,
                }
            })
            .collect())
    }

    async fn nearest_answers(&self, embedding: &[f32], limit: i64) -> Result<Vec<AnswerHit>> {
        let ranked = self.rank(EntityKind::Answer, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(id, row, similarity)| AnswerHit {
                id,
                content: row.text.prepare(),
                question_id: row.question_id.unwrap_or_default(),
                question_title: self.question_title(row.question_id),
                author_id: 1,
                author_name: "Author".to_string(),
                author_image: None,
                upvotes: 0,
                created_at: OffsetDateTime::UNIX_EPOCH,
                similarity,
            })
            .collect())
    }

    async fn nearest_tags(&self, embedding: &[f32], limit: i64) -> Result<Vec<TagHit>> {
        let ranked = self.rank(EntityKind::Tag, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(id, row, similarity)| TagHit {
                id,
                name: row.text.prepare(),
                questions_count: 0,
                similarity,
            })
            .collect())
    }

    async fn nearest_users(&self, embedding: &[f32], limit: i64) -> Result<Vec<UserHit>> {
        let ranked = self.rank(EntityKind::User, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(id, row, similarity)| {
                let (name, username) = match row.text {
                    EntityText::User { name, username, .. } => (name, username),
                    _ => (String::new(), String::new()),
                };
                UserHit {
                    id,
                    name,
                    username,
                    image: None,
                    reputation: 0,
                    similarity,
                }
            })
            .collect())
    }

    async fn coverage(&self, kind: EntityKind) -> Result<IndexCoverage> {
        let rows = self.rows.read().unwrap();
        let of_kind: Vec<&MockRow> = rows
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, row)| row)
            .collect();

        Ok(IndexCoverage {
            kind,
            total: of_kind.len() as i64,
            embedded: of_kind.iter().filter(|r| r.embedding.is_some()).count() as i64,
            stale: of_kind
                .iter()
                .filter(|r| {
                    r.embedding.is_some() && r.embedded_at.map_or(true, |at| at < r.updated_at)
                })
                .count() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_source_and_missing_rows() {
        let repo = MockSearchRepository::new().with_tag(1, "rust");

        let source = repo.load_source(EntityKind::Tag, 1).await.unwrap().unwrap();
        assert_eq!(
            source.text,
            EntityText::Tag {
                name: "rust".to_string()
            }
        );
        assert_eq!(source.updated_at, at_tick(1));
        assert!(repo.load_source(EntityKind::Tag, 2).await.unwrap().is_none());
        assert!(repo.load_source(EntityKind::User, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nearest_skips_rows_without_embedding() {
        let repo = MockSearchRepository::new()
            .with_tag(1, "a")
            .with_tag(2, "b")
            .with_tag(3, "c")
            .with_embedding(EntityKind::Tag, 2, vec![1.0, 0.0])
            .with_embedding(EntityKind::Tag, 3, vec![0.0, 1.0]);

        let hits = repo.nearest_tags(&[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<i32> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-9);
        assert!(hits[1].similarity.abs() < 1e-9);
    }

    #[tokio::test]
    async fn edit_after_indexing_marks_row_stale() {
        let repo = MockSearchRepository::new()
            .with_tag(1, "js")
            .with_embedding(EntityKind::Tag, 1, vec![1.0]);
        assert!(repo.stale(EntityKind::Tag).await.unwrap().is_empty());

        repo.edit(
            1,
            EntityText::Tag {
                name: "javascript".to_string(),
            },
        );

        let stale = repo.stale(EntityKind::Tag).await.unwrap();
        assert_eq!(stale.len(), 1);
        let coverage = repo.coverage(EntityKind::Tag).await.unwrap();
        assert_eq!((coverage.total, coverage.embedded, coverage.stale), (1, 1, 1));
    }

    #[tokio::test]
    async fn store_embedding_reports_missing_row() {
        let repo = MockSearchRepository::new();
        let update = EmbeddingUpdate {
            id: 9,
            embedding: vec![1.0],
            source_updated_at: at_tick(0),
        };
        assert!(!repo.store_embedding(EntityKind::Question, &update).await.unwrap());
    }

    #[tokio::test]
    async fn embedding_from_an_older_version_stays_stale() {
        let repo = MockSearchRepository::new().with_tag(1, "js");
        let read = repo.load_source(EntityKind::Tag, 1).await.unwrap().unwrap();

        repo.edit(
            1,
            EntityText::Tag {
                name: "javascript".to_string(),
            },
        );
        let update = EmbeddingUpdate {
            id: 1,
            embedding: vec![1.0],
            source_updated_at: read.updated_at,
        };
        assert!(repo.store_embedding(EntityKind::Tag, &update).await.unwrap());

        assert_eq!(repo.stale(EntityKind::Tag).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_embedding_removes_vector() {
        let repo = MockSearchRepository::new()
            .with_tag(1, "js")
            .with_embedding(EntityKind::Tag, 1, vec![1.0]);

        assert!(repo.clear_embedding(EntityKind::Tag, 1).await.unwrap());
        assert!(!repo.clear_embedding(EntityKind::Tag, 1).await.unwrap());
        assert!(repo.embedding(EntityKind::Tag, 1).is_none());
        assert!(repo.nearest_tags(&[1.0], 10).await.unwrap().is_empty());
    }
}
