//! Natural-language query parser
//!
//! Turns a free-text query such as `"important invoices from december 2024"`
//! into [`SearchFilters`] plus a reduced keyword string. Each pass extracts
//! what it recognises and strips it from the working text, so later passes
//! only see the remainder.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use regex::{Captures, Regex};
use tracing::debug;

use super::types::{SearchFilters, SearchType};
use crate::error::Result;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Words that never name a sender after `from`; they start a date phrase
const DATE_WORDS: [&str; 4] = ["today", "yesterday", "last", "this"];

const LABELS: [(&str, &str); 5] = [
    ("inbox", "INBOX"),
    ("sent", "SENT"),
    ("draft", "DRAFT"),
    ("spam", "SPAM"),
    ("trash", "TRASH"),
];

/// Named relative date ranges, checked in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelativeRange {
    Today,
    Yesterday,
    LastWeek,
    ThisWeek,
    LastMonth,
    ThisMonth,
    LastYear,
}

impl RelativeRange {
    const ALL: [RelativeRange; 7] = [
        RelativeRange::Today,
        RelativeRange::Yesterday,
        RelativeRange::LastWeek,
        RelativeRange::ThisWeek,
        RelativeRange::LastMonth,
        RelativeRange::ThisMonth,
        RelativeRange::LastYear,
    ];

    fn pattern(&self) -> &'static str {
        match self {
            RelativeRange::Today => r"\btoday\b",
            RelativeRange::Yesterday => r"\byesterday\b",
            RelativeRange::LastWeek => r"\blast\s+week\b",
            RelativeRange::ThisWeek => r"\bthis\s+week\b",
            RelativeRange::LastMonth => r"\blast\s+month\b",
            RelativeRange::ThisMonth => r"\bthis\s+month\b",
            RelativeRange::LastYear => r"\blast\s+year\b",
        }
    }

    /// `(from, to)` relative to `now`; `to` is an exclusive bound
    fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = start_of_day(now);
        match self {
            RelativeRange::Today => (midnight, now),
            RelativeRange::Yesterday => (midnight - Duration::days(1), midnight),
            RelativeRange::LastWeek => (now - Duration::weeks(1), now),
            RelativeRange::ThisWeek => (
                now - Duration::days(i64::from(now.weekday().num_days_from_monday())),
                now,
            ),
            RelativeRange::LastMonth => (now - Duration::days(30), now),
            RelativeRange::ThisMonth => (now.with_day(1).unwrap_or(now), now),
            RelativeRange::LastYear => (now - Duration::days(365), now),
        }
    }
}

/// Output of [`QueryParser::parse`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub filters: SearchFilters,
    pub cleaned_query: String,
}

impl ParsedQuery {
    /// Pick the search strategy for this query.
    ///
    /// Near-empty queries run keyword-only so no embedding call is made.
    pub fn search_type(&self) -> SearchType {
        if self.cleaned_query.chars().count() > 3 {
            if self.filters.has_structured_filter() {
                SearchType::Filtered
            } else {
                SearchType::Hybrid
            }
        } else {
            SearchType::Keyword
        }
    }
}

/// Query parser with precompiled patterns
pub struct QueryParser {
    sender_email: Regex,
    sender_field: Regex,
    sender_name: Regex,
    relative: Vec<(RelativeRange, Regex)>,
    month_year: Regex,
    labels: Vec<(Regex, &'static str)>,
    whitespace: Regex,
    connectors: Regex,
    filler: Regex,
}

impl QueryParser {
    pub fn new() -> Result<Self> {
        let relative = RelativeRange::ALL
            .iter()
            .map(|range| -> Result<(RelativeRange, Regex)> { Ok((*range, Regex::new(range.pattern())?)) })
            .collect::<Result<Vec<_>>>()?;

        let labels = LABELS
            .iter()
            .map(|(word, tag)| -> Result<(Regex, &'static str)> {
                Ok((Regex::new(&format!(r"\b{}\b", word))?, *tag))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sender_email: Regex::new(r"\bfrom\s+([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})")?,
            sender_field: Regex::new(r"\bsender(?::\s*|\s+)([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})")?,
            sender_name: Regex::new(r"\bfrom\s+(\w+)")?,
            relative,
            month_year: Regex::new(&format!(r"\b({})\s+(\d{{4}})\b", MONTHS.join("|")))?,
            labels,
            whitespace: Regex::new(r"\s+")?,
            connectors: Regex::new(r"\b(?:about|regarding)\b|\b(?:re|fw):")?,
            filler: Regex::new(r"\b(?:from|emails?|mails?|messages?)\b")?,
        })
    }

    /// Parse a query relative to the current instant
    pub fn parse(&self, query: &str) -> ParsedQuery {
        self.parse_at(query, Utc::now())
    }

    /// Parse a query with relative dates resolved against `now`
    pub fn parse_at(&self, query: &str, now: DateTime<Utc>) -> ParsedQuery {
        let mut text = query.trim().to_lowercase();
        let mut filters = SearchFilters::default();

        self.extract_senders(&mut text, &mut filters);
        self.extract_relative_date(&mut text, &mut filters, now);
        self.extract_month_year(&mut text, &mut filters);
        Self::extract_flags(&mut text, &mut filters);
        self.extract_labels(&mut text, &mut filters);

        let text = self.whitespace.replace_all(&text, " ").into_owned();
        let text = self.connectors.replace_all(&text, " ");
        let text = self.filler.replace_all(&text, " ");
        let residual = self.whitespace.replace_all(&text, " ").trim().to_string();

        filters.keywords.extend(
            residual
                .split_whitespace()
                .filter(|word| word.chars().count() > 2)
                .map(str::to_string),
        );

        let cleaned_query = if filters.keywords.is_empty() {
            residual
        } else {
            filters.keywords.join(" ")
        };

        debug!(
            "Parsed query {:?}: cleaned={:?} senders={:?} dates={:?}..{:?} labels={:?}",
            query, cleaned_query, filters.sender_emails, filters.date_from, filters.date_to, filters.labels
        );

        ParsedQuery {
            filters,
            cleaned_query,
        }
    }

    fn extract_senders(&self, text: &mut String, filters: &mut SearchFilters) {
        for pattern in [&self.sender_email, &self.sender_field] {
            let found: Vec<String> = pattern
                .captures_iter(text)
                .map(|caps| caps[1].to_string())
                .collect();
            if !found.is_empty() {
                filters.sender_emails.extend(found);
                *text = pattern.replace_all(text, " ").into_owned();
            }
        }

        // Bare names are kept as keywords; nothing resolves them to an address
        let mut names = Vec::new();
        let replaced = self.sender_name.replace_all(text, |caps: &Captures| {
            let word = &caps[1];
            if is_date_word(word) {
                caps[0].to_string()
            } else {
                names.push(word.to_string());
                " ".to_string()
            }
        });
        *text = replaced.into_owned();
        filters.keywords.extend(names);
    }

    fn extract_relative_date(&self, text: &mut String, filters: &mut SearchFilters, now: DateTime<Utc>) {
        for (range, pattern) in &self.relative {
            if pattern.is_match(text) {
                let (from, to) = range.bounds(now);
                filters.date_from = Some(from);
                filters.date_to = Some(to);
                *text = pattern.replace_all(text, " ").into_owned();
                break;
            }
        }
    }

    fn extract_month_year(&self, text: &mut String, filters: &mut SearchFilters) {
        let Some(caps) = self.month_year.captures(text) else {
            return;
        };
        let matched = caps[0].to_string();
        let month = MONTHS.iter().position(|m| *m == &caps[1]).map(|i| i as u32 + 1);
        let year = caps[2].parse::<i32>().ok();

        if let (Some(month), Some(year)) = (month, year) {
            let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
            if let (Some(from), Some(to)) = (first_of_month(year, month), first_of_month(next_year, next_month)) {
                filters.date_from = Some(from);
                filters.date_to = Some(to);
                *text = text.replace(&matched, " ");
            }
        }
    }

    fn extract_flags(text: &mut String, filters: &mut SearchFilters) {
        if text.contains("important") {
            filters.is_important = Some(true);
            *text = text.replace("important", " ");
        }

        if text.contains("attachment") {
            filters.has_attachments = Some(true);
            *text = text.replace("attachments", " ").replace("attachment", " ");
        }
    }

    fn extract_labels(&self, text: &mut String, filters: &mut SearchFilters) {
        for (pattern, tag) in &self.labels {
            if pattern.is_match(text) {
                filters.labels.push(tag.to_string());
                *text = pattern.replace_all(text, " ").into_owned();
            }
        }
    }
}

fn is_date_word(word: &str) -> bool {
    DATE_WORDS.contains(&word) || MONTHS.contains(&word)
}

fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&instant.date_naive().and_time(chrono::NaiveTime::MIN))
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|date| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser {
        QueryParser::new().unwrap()
    }

    // Wednesday
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 15, 45, 10).unwrap()
    }

    #[test]
    fn test_sender_email_query() {
        let parsed = parser().parse_at("emails from sender0@example.com", fixed_now());
        assert_eq!(parsed.filters.sender_emails, vec!["sender0@example.com"]);
        assert_eq!(parsed.cleaned_query, "");
        assert!(parsed.filters.keywords.is_empty());
        assert_eq!(parsed.search_type(), SearchType::Keyword);
    }

    #[test]
    fn test_important_month_year_query() {
        let parsed = parser().parse_at("important invoices from december 2024", fixed_now());
        assert_eq!(parsed.filters.is_important, Some(true));
        assert_eq!(
            parsed.filters.date_from,
            Some(Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parsed.filters.date_to,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parsed.filters.keywords, vec!["invoices"]);
        assert_eq!(parsed.cleaned_query, "invoices");
        assert_eq!(parsed.search_type(), SearchType::Filtered);
    }

    #[test]
    fn test_last_week_query() {
        let now = fixed_now();
        let parsed = parser().parse_at("meetings last week", now);
        assert_eq!(parsed.filters.date_from, Some(now - Duration::weeks(1)));
        assert_eq!(parsed.filters.date_to, Some(now));
        assert_eq!(parsed.cleaned_query, "meetings");
        assert_eq!(parsed.search_type(), SearchType::Filtered);
    }

    #[test]
    fn test_plain_query_is_hybrid() {
        let parsed = parser().parse_at("project update", fixed_now());
        assert_eq!(parsed.filters.keywords, vec!["project", "update"]);
        assert_eq!(parsed.cleaned_query, "project update");
        assert_eq!(parsed.search_type(), SearchType::Hybrid);
        assert_eq!(parsed.filters.date_from, None);
    }

    #[test]
    fn test_bare_sender_name_becomes_keyword() {
        let parsed = parser().parse_at("from john about budget", fixed_now());
        assert!(parsed.filters.sender_emails.is_empty());
        assert_eq!(parsed.filters.keywords, vec!["john", "budget"]);
        assert_eq!(parsed.cleaned_query, "john budget");
    }

    #[test]
    fn test_from_must_start_a_word() {
        let parsed = parser().parse_at("wherefrom bob", fixed_now());
        assert!(parsed.filters.sender_emails.is_empty());
        assert_eq!(parsed.filters.keywords, vec!["wherefrom", "bob"]);
        assert_eq!(parsed.cleaned_query, "wherefrom bob");

        let parsed = parser().parse_at("wherefrom bob@example.com", fixed_now());
        assert!(parsed.filters.sender_emails.is_empty());
    }

    #[test]
    fn test_sender_field_syntax() {
        let parsed = parser().parse_at("Sender: Alice@Example.org contract", fixed_now());
        assert_eq!(parsed.filters.sender_emails, vec!["alice@example.org"]);
        assert_eq!(parsed.filters.keywords, vec!["contract"]);
    }

    #[test]
    fn test_yesterday_bounds() {
        let parsed = parser().parse_at("yesterday receipts", fixed_now());
        assert_eq!(
            parsed.filters.date_from,
            Some(Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parsed.filters.date_to,
            Some(Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_this_week_starts_on_monday() {
        let now = fixed_now();
        let parsed = parser().parse_at("this week standup", now);
        assert_eq!(parsed.filters.date_from, Some(now - Duration::days(2)));
    }

    #[test]
    fn test_first_relative_match_wins() {
        let now = fixed_now();
        let parsed = parser().parse_at("today or last year", now);
        assert_eq!(parsed.filters.date_from, Some(start_of_day(now)));
        // the unmatched phrase stays in the residual text
        assert!(parsed.filters.keywords.contains(&"last".to_string()));
    }

    #[test]
    fn test_month_year_overrides_relative() {
        let parsed = parser().parse_at("last month march 2023 taxes", fixed_now());
        assert_eq!(
            parsed.filters.date_from,
            Some(Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parsed.filters.date_to,
            Some(Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parsed.filters.keywords, vec!["taxes"]);
    }

    #[test]
    fn test_flags_and_labels() {
        let parsed = parser().parse_at("attachments in inbox and spam", fixed_now());
        assert_eq!(parsed.filters.has_attachments, Some(true));
        assert_eq!(parsed.filters.is_important, None);
        assert_eq!(parsed.filters.labels, vec!["INBOX", "SPAM"]);
        assert_eq!(parsed.filters.keywords, vec!["and"]);
        assert_eq!(parsed.search_type(), SearchType::Keyword);
    }

    #[test]
    fn test_connectors_removed() {
        let parsed = parser().parse_at("re: regarding the offsite", fixed_now());
        assert_eq!(parsed.filters.keywords, vec!["the", "offsite"]);
    }

    #[test]
    fn test_short_residual_kept_as_cleaned_query() {
        let parsed = parser().parse_at("  Q4  ok ", fixed_now());
        assert!(parsed.filters.keywords.is_empty());
        assert_eq!(parsed.cleaned_query, "q4 ok");
        assert_eq!(parsed.search_type(), SearchType::Hybrid);
    }

    #[test]
    fn test_empty_query() {
        let parsed = parser().parse_at("", fixed_now());
        assert_eq!(parsed.filters, SearchFilters::default());
        assert_eq!(parsed.cleaned_query, "");
        assert_eq!(parsed.search_type(), SearchType::Keyword);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = parser();
        let now = fixed_now();
        let queries = [
            "important invoices from december 2024",
            "from bob sent items last month",
            "attachment from carol@corp.io",
        ];
        for query in queries {
            assert_eq!(parser.parse_at(query, now), parser.parse_at(query, now));
        }
    }
}
