//! Post-filter applied to fused results
//!
//! Every active constraint in [`SearchFilters`] must hold for a result to
//! survive. `date_to` is an exclusive upper bound, matching the half-open
//! ranges produced by the query parser.

use super::types::{SearchFilters, SearchResult};

const IMPORTANT_LABEL: &str = "IMPORTANT";

/// Whether `result` satisfies every active constraint in `filters`
pub fn matches_filters(result: &SearchResult, filters: &SearchFilters) -> bool {
    if !filters.sender_emails.is_empty() {
        let sender = result.sender_email.to_lowercase();
        if !filters
            .sender_emails
            .iter()
            .any(|wanted| sender.contains(&wanted.to_lowercase()))
        {
            return false;
        }
    }

    if let Some(from) = filters.date_from {
        if result.date_sent < from {
            return false;
        }
    }

    if let Some(to) = filters.date_to {
        if result.date_sent >= to {
            return false;
        }
    }

    if let Some(important) = filters.is_important {
        if result.labels.iter().any(|l| l == IMPORTANT_LABEL) != important {
            return false;
        }
    }

    if let Some(attachments) = filters.has_attachments {
        if result.has_attachments != attachments {
            return false;
        }
    }

    if !filters.labels.is_empty() && !result.labels.iter().any(|l| filters.labels.contains(l)) {
        return false;
    }

    true
}

/// Keep the results that satisfy `filters`, preserving order
pub fn apply_filters(results: Vec<SearchResult>, filters: &SearchFilters) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|result| matches_filters(result, filters))
        .collect()
}
