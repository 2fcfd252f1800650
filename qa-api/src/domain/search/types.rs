//! Core types for the search domain.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};
use time::OffsetDateTime;

use super::text::{prepare_answer_text, prepare_question_text, prepare_tag_text, prepare_user_text};

/// The four entity types that carry an embedding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    Question,
    Answer,
    Tag,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Question,
        EntityKind::Answer,
        EntityKind::Tag,
        EntityKind::User,
    ];

    /// Table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Question => "questions",
            EntityKind::Answer => "answers",
            EntityKind::Tag => "tags",
            EntityKind::User => "users",
        }
    }
}

/// The raw fields an entity contributes to its embedded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityText {
    Question { title: String, content: String },
    Answer { content: String },
    Tag { name: String },
    User {
        name: String,
        username: String,
        bio: Option<String>,
    },
}

impl EntityText {
    #[allow(dead_code)]
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityText::Question { .. } => EntityKind::Question,
            EntityText::Answer { .. } => EntityKind::Answer,
            EntityText::Tag { .. } => EntityKind::Tag,
            EntityText::User { .. } => EntityKind::User,
        }
    }

    /// Canonical string that gets embedded for this entity.
    pub fn prepare(&self) -> String {
        match self {
            EntityText::Question { title, content } => prepare_question_text(title, content),
            EntityText::Answer { content } => prepare_answer_text(content),
            EntityText::Tag { name } => prepare_tag_text(name),
            EntityText::User {
                name,
                username,
                bio,
            } => prepare_user_text(name, username, bio.as_deref()),
        }
    }
}

/// A row selected for (re-)indexing.
///
/// `updated_at` is the version of the text that was read. It is written back
/// as `embedded_at`, so an edit landing while the provider call is in flight
/// leaves the row stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSource {
    pub id: i32,
    pub text: EntityText,
    pub updated_at: OffsetDateTime,
}

/// A freshly generated vector for one row, tagged with the text version it
/// was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingUpdate {
    pub id: i32,
    pub embedding: Vec<f32>,
    pub source_updated_at: OffsetDateTime,
}

/// Identifies one entity whose embedding should be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEvent {
    pub kind: EntityKind,
    pub id: i32,
}

impl IndexEvent {
    pub fn new(kind: EntityKind, id: i32) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for IndexEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Result of indexing a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Embedding generated and stored.
    Indexed,
    /// The row no longer exists.
    Missing,
    /// The row has no text worth embedding.
    Skipped,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuestionHit {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub author_name: String,
    pub author_image: Option<String>,
    pub upvotes: i32,
    pub answers: i32,
    pub views: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnswerHit {
    pub id: i32,
    pub content: String,
    pub question_id: i32,
    pub question_title: String,
    pub author_id: i32,
    pub author_name: String,
    pub author_image: Option<String>,
    pub upvotes: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TagHit {
    pub id: i32,
    pub name: String,
    pub questions_count: i32,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserHit {
    pub id: i32,
    pub name: String,
    pub username: String,
    pub image: Option<String>,
    pub reputation: i32,
    pub similarity: f64,
}

/// Per-type ranked candidates, highest similarity first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub questions: Vec<QuestionHit>,
    pub answers: Vec<AnswerHit>,
    pub tags: Vec<TagHit>,
    pub users: Vec<UserHit>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.questions.len() + self.answers.len() + self.tags.len() + self.users.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts from a backfill or stale re-index across all entity types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    pub questions: usize,
    pub answers: usize,
    pub tags: usize,
    pub users: usize,
    pub errors: usize,
}

impl BackfillStats {
    pub fn total_indexed(&self) -> usize {
        self.questions + self.answers + self.tags + self.users
    }

    pub fn record(&mut self, kind: EntityKind, count: usize) {
        match kind {
            EntityKind::Question => self.questions = count,
            EntityKind::Answer => self.answers = count,
            EntityKind::Tag => self.tags = count,
            EntityKind::User => self.users = count,
        }
    }
}

/// How much of one table is covered by embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCoverage {
    pub kind: EntityKind,
    pub total: i64,
    pub embedded: i64,
    pub stale: i64,
}
