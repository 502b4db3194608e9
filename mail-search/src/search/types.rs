//! Search types and data structures

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::store::EmailMessage;

/// Kind of search selected for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Vector similarity only
    Semantic,
    /// Substring matching only, no embedding call
    Keyword,
    /// Keyword and vector retrieval fused
    Hybrid,
    /// Hybrid with sender/date/label constraints
    Filtered,
}

impl SearchType {
    /// Whether this search type runs the embedding and vector stages
    pub fn uses_vectors(&self) -> bool {
        !matches!(self, SearchType::Keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Semantic => "semantic",
            SearchType::Keyword => "keyword",
            SearchType::Hybrid => "hybrid",
            SearchType::Filtered => "filtered",
        }
    }
}

/// Which retrieval strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Keyword,
    Semantic,
    Hybrid,
}

/// Constraints extracted from a natural-language query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilters {
    /// Sender addresses, matched as case-insensitive substrings
    pub sender_emails: Vec<String>,
    /// Inclusive lower bound on the send date
    pub date_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the send date
    pub date_to: Option<DateTime<Utc>>,
    /// Canonical label tags (INBOX, SENT, ...)
    pub labels: Vec<String>,
    pub has_attachments: Option<bool>,
    pub is_important: Option<bool>,
    /// Residual keyword tokens, in query order
    pub keywords: Vec<String>,
}

impl SearchFilters {
    /// True when a sender, date or label constraint is present
    pub fn has_structured_filter(&self) -> bool {
        !self.sender_emails.is_empty() || self.date_from.is_some() || !self.labels.is_empty()
    }
}

/// A candidate match
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub message_id: i64,
    pub external_message_id: String,
    pub subject: String,
    pub snippet: String,
    pub sender_email: String,
    pub sender_name: String,
    pub date_sent: DateTime<Utc>,
    /// Un-normalized; keyword scores lie in [0, 3], cosine scores in [0, 1]
    pub relevance_score: f64,
    pub provenance: Provenance,
    pub labels: Vec<String>,
    pub has_attachments: bool,
}

impl SearchResult {
    pub fn from_message(message: EmailMessage, relevance_score: f64, provenance: Provenance) -> Self {
        Self {
            message_id: message.id,
            external_message_id: message.external_message_id,
            subject: message.subject,
            snippet: message.snippet,
            sender_email: message.sender_email,
            sender_name: message.sender_name,
            date_sent: message.date_sent,
            relevance_score,
            provenance,
            labels: message.labels,
            has_attachments: message.has_attachments,
        }
    }
}

/// Mutable record threaded through the search pipeline
#[derive(Debug)]
pub struct SearchState {
    pub query: String,
    pub account_id: i64,
    pub max_results: usize,

    pub search_type: SearchType,
    pub filters: SearchFilters,
    pub cleaned_query: String,
    pub query_vector: Vec<f32>,

    pub keyword_results: Vec<SearchResult>,
    pub semantic_results: Vec<SearchResult>,
    pub final_results: Vec<SearchResult>,

    pub total_keyword_matches: usize,
    pub total_semantic_matches: usize,
    pub total_final_results: usize,
    /// Seconds, set by the finalize stage
    pub processing_time: f64,
    /// Append-only
    pub errors: Vec<String>,
    pub started: Instant,
}

impl SearchState {
    pub fn new(query: impl Into<String>, account_id: i64, max_results: usize) -> Self {
        Self {
            query: query.into(),
            account_id,
            max_results,
            search_type: SearchType::Hybrid,
            filters: SearchFilters::default(),
            cleaned_query: String::new(),
            query_vector: Vec::new(),
            keyword_results: Vec::new(),
            semantic_results: Vec::new(),
            final_results: Vec::new(),
            total_keyword_matches: 0,
            total_semantic_matches: 0,
            total_final_results: 0,
            processing_time: 0.0,
            errors: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn record_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Project the finished state into the outward report
    pub fn into_report(self) -> SearchReport {
        let results: Vec<SearchResultItem> = self
            .final_results
            .into_iter()
            .map(SearchResultItem::from)
            .collect();

        SearchReport {
            success: self.errors.is_empty(),
            query: self.query,
            search_type: self.search_type,
            total_results: results.len(),
            results,
            processing_time: round3(self.processing_time),
            statistics: SearchStatistics {
                keyword_matches: self.total_keyword_matches,
                semantic_matches: self.total_semantic_matches,
                final_results: self.total_final_results,
            },
            errors: self.errors,
        }
    }
}

/// Serialized result entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub message_id: i64,
    pub external_message_id: String,
    pub subject: String,
    pub snippet: String,
    pub sender_email: String,
    pub sender_name: String,
    /// RFC 3339
    pub date_sent: String,
    pub relevance_score: f64,
    pub search_type: Provenance,
    pub has_attachments: bool,
}

impl From<SearchResult> for SearchResultItem {
    fn from(result: SearchResult) -> Self {
        Self {
            message_id: result.message_id,
            external_message_id: result.external_message_id,
            subject: result.subject,
            snippet: result.snippet,
            sender_email: result.sender_email,
            sender_name: result.sender_name,
            date_sent: result.date_sent.to_rfc3339_opts(SecondsFormat::Secs, true),
            relevance_score: round3(result.relevance_score),
            search_type: result.provenance,
            has_attachments: result.has_attachments,
        }
    }
}

/// Per-stage counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub keyword_matches: usize,
    pub semantic_matches: usize,
    pub final_results: usize,
}

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// True iff no stage recorded an error
    pub success: bool,
    pub query: String,
    pub search_type: SearchType,
    pub total_results: usize,
    pub results: Vec<SearchResultItem>,
    /// Seconds
    pub processing_time: f64,
    pub statistics: SearchStatistics,
    pub errors: Vec<String>,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_result(score: f64) -> SearchResult {
        SearchResult {
            message_id: 7,
            external_message_id: "ext-7".to_string(),
            subject: "Quarterly report".to_string(),
            snippet: "Numbers attached".to_string(),
            sender_email: "cfo@example.com".to_string(),
            sender_name: "CFO".to_string(),
            date_sent: Utc.with_ymd_and_hms(2024, 12, 3, 9, 30, 0).unwrap(),
            relevance_score: score,
            provenance: Provenance::Hybrid,
            labels: vec!["INBOX".to_string()],
            has_attachments: true,
        }
    }

    #[test]
    fn test_report_success_tracks_errors() {
        let mut state = SearchState::new("report", 1, 20);
        state.final_results.push(sample_result(1.23456));
        state.total_final_results = 1;
        let report = state.into_report();
        assert!(report.success);
        assert_eq!(report.total_results, 1);
        assert_eq!(report.results[0].relevance_score, 1.235);
        assert_eq!(report.results[0].date_sent, "2024-12-03T09:30:00Z");

        let mut failed = SearchState::new("report", 1, 20);
        failed.record_error("Semantic search failed: down".to_string());
        let report = failed.into_report();
        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_report_serializes_lowercase_tags() {
        let mut state = SearchState::new("report", 1, 20);
        state.search_type = SearchType::Filtered;
        state.final_results.push(sample_result(0.5));
        let json = serde_json::to_value(state.into_report()).unwrap();
        assert_eq!(json["search_type"], "filtered");
        assert_eq!(json["results"][0]["search_type"], "hybrid");
        assert_eq!(json["statistics"]["final_results"], 0);
    }

    #[test]
    fn test_keyword_type_skips_vectors() {
        assert!(!SearchType::Keyword.uses_vectors());
        assert!(SearchType::Hybrid.uses_vectors());
        assert!(SearchType::Filtered.uses_vectors());
    }
}
