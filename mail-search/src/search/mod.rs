//! Hybrid email search
//!
//! Query parsing, keyword and vector retrieval, fusion, post-filtering and
//! the [`SearchWorkflow`] that runs them in order.

pub mod filter;
pub mod fusion;
pub mod lexical;
pub mod parser;
pub mod semantic;
pub mod types;
pub mod workflow;

pub use filter::{apply_filters, matches_filters};
pub use fusion::{fuse, FusionWeights};
pub use lexical::{keyword_score, LexicalSearch};
pub use parser::{ParsedQuery, QueryParser};
pub use semantic::VectorSearch;
pub use types::{
    Provenance, SearchFilters, SearchReport, SearchResult, SearchResultItem, SearchState,
    SearchStatistics, SearchType,
};
pub use workflow::{SearchSettings, SearchWorkflow, Stage, PIPELINE};
