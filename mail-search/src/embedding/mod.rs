//! Embedding provider abstraction

use async_trait::async_trait;

use crate::error::Result;

pub mod mock;
pub mod ollama;

pub use mock::MockEmbedder;
pub use ollama::OllamaEmbedder;

/// Longest text, in characters, sent to a provider
pub const MAX_EMBEDDING_CHARS: usize = 2000;

/// Collapse whitespace runs to single spaces and cut the text to
/// [`MAX_EMBEDDING_CHARS`], marking a cut with `...`.
pub fn clean_text(text: &str) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");

    match cleaned.char_indices().nth(MAX_EMBEDDING_CHARS) {
        Some((cut, _)) => format!("{}...", &cleaned[..cut]),
        None => cleaned,
    }
}

/// Maps text to a fixed-length vector.
///
/// Repeated calls with the same text are not required to return the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get model name
    fn model_name(&self) -> &str;

    /// Length of the vectors this provider returns
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Budget\n\n review \t Q4  "), "Budget review Q4");
        assert_eq!(clean_text(" \n\t "), "");
    }

    #[test]
    fn test_clean_text_truncates_long_text() {
        let exact = "a".repeat(MAX_EMBEDDING_CHARS);
        assert_eq!(clean_text(&exact), exact);

        let long = "é".repeat(MAX_EMBEDDING_CHARS + 10);
        let cleaned = clean_text(&long);
        assert!(cleaned.ends_with("..."));
        assert_eq!(cleaned.chars().count(), MAX_EMBEDDING_CHARS + 3);
        assert!(cleaned.starts_with(&"é".repeat(MAX_EMBEDDING_CHARS)));
    }
}
