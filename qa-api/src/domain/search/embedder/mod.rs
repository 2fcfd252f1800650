//! Embedding generation implementations.

mod client;
mod openai;

pub use client::EmbeddingClient;
#[cfg(test)]
pub use mock::{KeywordEmbedder, MockEmbedder};
pub use openai::{OpenAiEmbedder, DEFAULT_DIMENSIONS, DEFAULT_MODEL};
