//! Canonical text for each entity type, and the preprocessing applied before
//! text is sent to the embedding provider.
//!
//! Re-embedding the same content must always produce the same input string,
//! otherwise vectors from different indexing runs are not comparable.

/// Character budget kept below the embedding model's token ceiling.
pub const MAX_EMBEDDING_CHARS: usize = 32_000;

pub fn prepare_question_text(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}")
}

pub fn prepare_answer_text(content: &str) -> String {
    content.to_string()
}

/// Joins name, `@username` and bio with newlines. A missing or blank bio
/// contributes no line at all.
pub fn prepare_user_text(name: &str, username: &str, bio: Option<&str>) -> String {
    let mut parts = vec![name.to_string(), format!("@{username}")];

    if let Some(bio) = bio.filter(|b| !b.trim().is_empty()) {
        parts.push(bio.to_string());
    }

    parts.join("\n")
}

pub fn prepare_tag_text(name: &str) -> String {
    name.to_string()
}

/// Collapses whitespace runs to a single space, trims, and silently truncates
/// to [`MAX_EMBEDDING_CHARS`] characters.
pub fn preprocess(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    match collapsed.char_indices().nth(MAX_EMBEDDING_CHARS) {
        Some((cut, _)) => collapsed[..cut].to_string(),
        None => collapsed,
    }
}
