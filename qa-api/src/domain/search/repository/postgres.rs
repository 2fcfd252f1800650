//! PostgreSQL repository implementation with pgvector support.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{postgres::PgRow, FromRow, PgPool};
use time::OffsetDateTime;

use crate::domain::search::traits::{Result, SearchError, SearchRepository};
use crate::domain::search::types::{
    AnswerHit, EmbeddingUpdate, EntityKind, EntityText, IndexCoverage, IndexSource, QuestionHit,
    TagHit, UserHit,
};

/// Rows whose embedding predates their last update.
const STALE_FILTER: &str =
    "embedding IS NOT NULL AND (embedded_at IS NULL OR embedded_at < updated_at)";

/// PostgreSQL-backed search repository using pgvector for similarity search.
///
/// Each entity table carries `embedding vector(N)` and `embedded_at`
/// columns. Similarity is `1 - (embedding <=> query)` computed in SQL, and
/// rows with a null embedding never match.
#[derive(Clone)]
pub struct PgSearchRepository {
    pool: PgPool,
}

impl PgSearchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fail unless every `embedding` column is `vector(expected)`.
    ///
    /// The column size is fixed by the migration, so a provider configured
    /// for another dimensionality would fail on every write.
    pub async fn verify_dimensions(&self, expected: usize) -> Result<()> {
        for kind in EntityKind::ALL {
            let column: Option<i32> = sqlx::query_scalar(
                "SELECT atttypmod FROM pg_attribute \
                 WHERE attrelid = $1::regclass AND attname = 'embedding' AND NOT attisdropped",
            )
            .bind(kind.table())
            .fetch_optional(&self.pool)
            .await?;

            check_dimensions(kind, column, expected)?;
        }

        Ok(())
    }

    /// Select text fields plus `updated_at` for rows of `kind` matching `filter`.
    async fn sources(
        &self,
        kind: EntityKind,
        filter: &str,
        id: Option<i32>,
    ) -> Result<Vec<IndexSource>> {
        let columns = match kind {
            EntityKind::Question => "id, title, content",
            EntityKind::Answer => "id, content",
            EntityKind::Tag => "id, name",
            EntityKind::User => "id, name, username, bio",
        };
        let sql = format!(
            "SELECT {columns}, updated_at FROM {} WHERE {filter} ORDER BY id",
            kind.table()
        );

        match kind {
            EntityKind::Question => self.fetch::<QuestionTextRow>(&sql, id).await,
            EntityKind::Answer => self.fetch::<AnswerTextRow>(&sql, id).await,
            EntityKind::Tag => self.fetch::<TagTextRow>(&sql, id).await,
            EntityKind::User => self.fetch::<UserTextRow>(&sql, id).await,
        }
    }

    async fn fetch<T>(&self, sql: &str, id: Option<i32>) -> Result<Vec<IndexSource>>
    where
        T: for<'r> FromRow<'r, PgRow> + Into<IndexSource> + Send + Unpin,
    {
        let mut query = sqlx::query_as::<_, T>(sql);
        if let Some(id) = id {
            query = query.bind(id);
        }

        Ok(query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }
}

fn check_dimensions(kind: EntityKind, column: Option<i32>, expected: usize) -> Result<()> {
    match column {
        None => Err(SearchError::Config(format!(
            "{} has no embedding column, run the migrations",
            kind.table()
        ))),
        Some(size) if usize::try_from(size).ok() == Some(expected) => Ok(()),
        Some(size) => Err(SearchError::Config(format!(
            "{}.embedding is vector({size}) but embedding.dimensions is {expected}",
            kind.table()
        ))),
    }
}

fn store_sql(kind: EntityKind) -> String {
    format!(
        "UPDATE {} SET embedding = $1, embedded_at = $3 WHERE id = $2",
        kind.table()
    )
}

#[async_trait]
impl SearchRepository for PgSearchRepository {
    async fn load_source(&self, kind: EntityKind, id: i32) -> Result<Option<IndexSource>> {
        Ok(self.sources(kind, "id = $1", Some(id)).await?.into_iter().next())
    }

    async fn unindexed(&self, kind: EntityKind) -> Result<Vec<IndexSource>> {
        self.sources(kind, "embedding IS NULL", None).await
    }

    async fn stale(&self, kind: EntityKind) -> Result<Vec<IndexSource>> {
        self.sources(kind, STALE_FILTER, None).await
    }

    async fn store_embedding(&self, kind: EntityKind, update: &EmbeddingUpdate) -> Result<bool> {
        let result = sqlx::query(&store_sql(kind))
            .bind(Vector::from(update.embedding.clone()))
            .bind(update.id)
            .bind(update.source_updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn store_embeddings(
        &self,
        kind: EntityKind,
        updates: &[EmbeddingUpdate],
    ) -> Result<usize> {
        let sql = store_sql(kind);
        let mut tx = self.pool.begin().await?;
        let mut count = 0;

        for update in updates {
            let result = sqlx::query(&sql)
                .bind(Vector::from(update.embedding.clone()))
                .bind(update.id)
                .bind(update.source_updated_at)
                .execute(&mut *tx)
                .await?;
            count += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn clear_embedding(&self, kind: EntityKind, id: i32) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET embedding = NULL, embedded_at = NULL \
             WHERE id = $1 AND embedding IS NOT NULL",
            kind.table()
        );

        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn nearest_questions(&self, embedding: &[f32], limit: i64) -> Result<Vec<QuestionHit>> {
        let hits = sqlx::query_as::<_, QuestionHit>(
            r#"
            SELECT
                q.id,
                q.title,
                q.author_id,
                u.name AS author_name,
                u.image AS author_image,
                q.upvotes,
                q.answers,
                q.views,
                q.created_at,
                (1 - (q.embedding <=> $1))::float8 AS similarity
            FROM questions q
            JOIN users u ON u.id = q.author_id
            WHERE q.embedding IS NOT NULL
            ORDER BY q.embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(hits)
    }

    async fn nearest_answers(&self, embedding: &[f32], limit: i64) -> Result<Vec<AnswerHit>> {
        let hits = sqlx::query_as::<_, AnswerHit>(
            r#"
            SELECT
                a.id,
                a.content,
                a.question_id,
                q.title AS question_title,
                a.author_id,
                u.name AS author_name,
                u.image AS author_image,
                a.upvotes,
                a.created_at,
                (1 - (a.embedding <=> $1))::float8 AS similarity
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            JOIN users u ON u.id = a.author_id
            WHERE a.embedding IS NOT NULL
            ORDER BY a.embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(hits)
    }

    async fn nearest_tags(&self, embedding: &[f32], limit: i64) -> Result<Vec<TagHit>> {
        let hits = sqlx::query_as::<_, TagHit>(
            r#"
            SELECT
                id,
                name,
                questions_count,
                (1 - (embedding <=> $1))::float8 AS similarity
            FROM tags
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(hits)
    }

    async fn nearest_users(&self, embedding: &[f32], limit: i64) -> Result<Vec<UserHit>> {
        let hits = sqlx::query_as::<_, UserHit>(
            r#"
            SELECT
                id,
                name,
                username,
                image,
                reputation,
                (1 - (embedding <=> $1))::float8 AS similarity
            FROM users
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(hits)
    }

    async fn coverage(&self, kind: EntityKind) -> Result<IndexCoverage> {
        let sql = format!(
            "SELECT COUNT(*) AS total, COUNT(embedding) AS embedded, \
             COUNT(*) FILTER (WHERE {STALE_FILTER}) AS stale FROM {}",
            kind.table()
        );

        let row = sqlx::query_as::<_, CoverageRow>(&sql)
            .fetch_one(&self.pool)
            .await?;

        Ok(IndexCoverage {
            kind,
            total: row.total,
            embedded: row.embedded,
            stale: row.stale,
        })
    }
}

// Row types for sqlx queries

#[derive(FromRow)]
struct QuestionTextRow {
    id: i32,
    title: String,
    content: String,
    updated_at: OffsetDateTime,
}

#[derive(FromRow)]
struct AnswerTextRow {
    id: i32,
    content: String,
    updated_at: OffsetDateTime,
}

#[derive(FromRow)]
struct TagTextRow {
    id: i32,
    name: String,
    updated_at: OffsetDateTime,
}

#[derive(FromRow)]
struct UserTextRow {
    id: i32,
    name: String,
    username: String,
    bio: Option<String>,
    updated_at: OffsetDateTime,
}

#[derive(FromRow)]
struct CoverageRow {
    total: i64,
    embedded: i64,
    stale: i64,
}

impl From<QuestionTextRow> for IndexSource {
    fn from(row: QuestionTextRow) -> Self {
        IndexSource {
            id: row.id,
            text: EntityText::Question {
                title: row.title,
                content: row.content,
            },
            updated_at: row.updated_at,
        }
    }
}

impl From<AnswerTextRow> for IndexSource {
    fn from(row: AnswerTextRow) -> Self {
        IndexSource {
            id: row.id,
            text: EntityText::Answer {
                content: row.content,
            },
            updated_at: row.updated_at,
        }
    }
}

impl From<TagTextRow> for IndexSource {
    fn from(row: TagTextRow) -> Self {
        IndexSource {
            id: row.id,
            text: EntityText::Tag { name: row.name },
            updated_at: row.updated_at,
        }
    }
}

impl From<UserTextRow> for IndexSource {
    fn from(row: UserTextRow) -> Self {
        IndexSource {
            id: row.id,
            text: EntityText::User {
                name: row.name,
                username: row.username,
                bio: row.bio,
            },
            updated_at: row.updated_at,
        }
    }
}
