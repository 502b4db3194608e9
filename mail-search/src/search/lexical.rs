//! Keyword search against the message store

use std::sync::Arc;
use tracing::debug;

use super::types::{Provenance, SearchFilters, SearchResult};
use crate::error::Result;
use crate::store::MessageStore;

/// Subject matches weigh twice as much as snippet matches
const SUBJECT_WEIGHT: f64 = 2.0;
const SNIPPET_WEIGHT: f64 = 1.0;

/// Relevance of a message for a set of search terms.
///
/// Each term adds 2.0 for a subject hit and 1.0 for a snippet hit; the sum is
/// divided by the term count, giving a score in `[0, 3]`.
pub fn keyword_score(subject: &str, snippet: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let subject = subject.to_lowercase();
    let snippet = snippet.to_lowercase();

    let total: f64 = terms
        .iter()
        .map(|term| {
            let term = term.to_lowercase();
            let mut score = 0.0;
            if subject.contains(&term) {
                score += SUBJECT_WEIGHT;
            }
            if snippet.contains(&term) {
                score += SNIPPET_WEIGHT;
            }
            score
        })
        .sum();

    total / terms.len() as f64
}

/// Terms the keyword stage searches for: the parsed keywords, else the whole
/// cleaned query, else nothing (most-recent mode)
pub fn search_terms(filters: &SearchFilters, cleaned_query: &str) -> Vec<String> {
    if !filters.keywords.is_empty() {
        filters.keywords.clone()
    } else if !cleaned_query.is_empty() {
        vec![cleaned_query.to_string()]
    } else {
        Vec::new()
    }
}

/// Keyword retrieval stage
pub struct LexicalSearch {
    store: Arc<dyn MessageStore>,
}

impl LexicalSearch {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Search an account's messages, best score first
    pub async fn search(&self, account_id: i64, terms: &[String], cap: usize) -> Result<Vec<SearchResult>> {
        let messages = self.store.query_by_keywords(account_id, terms, cap).await?;

        let mut results: Vec<SearchResult> = messages
            .into_iter()
            .map(|message| {
                let score = keyword_score(&message.subject, &message.snippet, terms);
                SearchResult::from_message(message, score, Provenance::Keyword)
            })
            .collect();

        // stable: equal scores keep the store's newest-first order
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!("Keyword search for {:?} returned {} results", terms, results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_subject_and_snippet_weights() {
        assert_eq!(keyword_score("Budget review", "see attached budget", &terms(&["budget"])), 3.0);
        assert_eq!(keyword_score("Budget review", "nothing", &terms(&["budget"])), 2.0);
        assert_eq!(keyword_score("Hello", "the budget", &terms(&["budget"])), 1.0);
        assert_eq!(keyword_score("Hello", "world", &terms(&["budget"])), 0.0);
    }

    #[test]
    fn test_score_normalized_by_term_count() {
        let score = keyword_score("Budget review", "lunch", &terms(&["budget", "lunch", "absent"]));
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_terms_scores_zero() {
        assert_eq!(keyword_score("Budget", "budget", &[]), 0.0);
    }

    #[test]
    fn test_search_terms_fallbacks() {
        let mut filters = SearchFilters::default();
        assert!(search_terms(&filters, "").is_empty());
        assert_eq!(search_terms(&filters, "q4 ok"), terms(&["q4 ok"]));
        filters.keywords = terms(&["invoices"]);
        assert_eq!(search_terms(&filters, "invoices"), terms(&["invoices"]));
    }
}
