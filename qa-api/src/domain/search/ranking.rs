//! Similarity floor and command-palette grouping of search results.

use serde::Serialize;

use super::types::{AnswerHit, EntityKind, QuestionHit, SearchResults, TagHit, UserHit};

/// Hits below this similarity are noise for interactive search.
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.3;

const SNIPPET_CHARS: usize = 120;

impl SearchResults {
    /// Drop every hit whose similarity is below `floor`.
    pub fn above(mut self, floor: f64) -> Self {
        self.questions.retain(|h| h.similarity >= floor);
        self.answers.retain(|h| h.similarity >= floor);
        self.tags.retain(|h| h.similarity >= floor);
        self.users.retain(|h| h.similarity >= floor);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    pub kind: EntityKind,
    pub id: i32,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub similarity: f64,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteGroup {
    pub kind: EntityKind,
    pub label: &'static str,
    pub entries: Vec<PaletteEntry>,
}

/// Group results for a command palette: questions, answers, tags, users,
/// in that order. Hits below `floor` are dropped and so are empty groups.
/// Within a group the ranking from the search is kept.
pub fn group_for_palette(results: SearchResults, floor: f64) -> Vec<PaletteGroup> {
    let results = results.above(floor);

    let groups = [
        (
            EntityKind::Question,
            "Questions",
            results.questions.into_iter().map(PaletteEntry::from).collect::<Vec<_>>(),
        ),
        (
            EntityKind::Answer,
            "Answers",
            results.answers.into_iter().map(PaletteEntry::from).collect(),
        ),
        (
            EntityKind::Tag,
            "Tags",
            results.tags.into_iter().map(PaletteEntry::from).collect(),
        ),
        (
            EntityKind::User,
            "Users",
            results.users.into_iter().map(PaletteEntry::from).collect(),
        ),
    ];

    groups
        .into_iter()
        .filter(|(_, _, entries)| !entries.is_empty())
        .map(|(kind, label, entries)| PaletteGroup {
            kind,
            label,
            entries,
        })
        .collect()
}

fn snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}…", &collapsed[..cut]),
        None => collapsed,
    }
}

impl From<QuestionHit> for PaletteEntry {
    fn from(hit: QuestionHit) -> Self {
        PaletteEntry {
            kind: EntityKind::Question,
            id: hit.id,
            href: format!("/questions/{}", hit.id),
            title: hit.title,
            subtitle: Some(format!("by {}", hit.author_name)),
            similarity: hit.similarity,
        }
    }
}

impl From<AnswerHit> for PaletteEntry {
    fn from(hit: AnswerHit) -> Self {
        PaletteEntry {
            kind: EntityKind::Answer,
            id: hit.id,
            href: format!("/questions/{}#answer-{}", hit.question_id, hit.id),
            title: hit.question_title,
            subtitle: Some(snippet(&hit.content)),
            similarity: hit.similarity,
        }
    }
}

impl From<TagHit> for PaletteEntry {
    fn from(hit: TagHit) -> Self {
        let subtitle = match hit.questions_count {
            1 => "1 question".to_string(),
            n => format!("{n} questions"),
        };

        PaletteEntry {
            kind: EntityKind::Tag,
            id: hit.id,
            href: format!("/tags/{}", hit.id),
            title: hit.name,
            subtitle: Some(subtitle),
            similarity: hit.similarity,
        }
    }
}

impl From<UserHit> for PaletteEntry {
    fn from(hit: UserHit) -> Self {
        PaletteEntry {
            kind: EntityKind::User,
            id: hit.id,
            href: format!("/profile/{}", hit.id),
            title: hit.name,
            subtitle: Some(format!("@{}", hit.username)),
            similarity: hit.similarity,
        }
    }
}
