//! Search orchestrator
//!
//! Runs a query through a fixed sequence of stages over one [`SearchState`]:
//!
//! ```text
//! Parse -> Embed -> Lexical -> Semantic -> Fuse -> Filter -> Finalize
//! ```
//!
//! A stage that fails appends a message to `state.errors` and leaves its
//! output empty; the following stages still run and `Finalize` is always
//! reached. Stages await one after another, never concurrently.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::filter::apply_filters;
use super::fusion::{fuse, FusionWeights};
use super::lexical::{search_terms, LexicalSearch};
use super::parser::QueryParser;
use super::semantic::VectorSearch;
use super::types::{SearchReport, SearchState};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::store::{MessageStore, VectorStore};

/// Tunables of the search pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    /// Minimum cosine similarity for a vector hit
    pub score_threshold: f32,
    pub weights: FusionWeights,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.3,
            weights: FusionWeights::default(),
        }
    }
}

/// One step of the search pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Embed,
    Lexical,
    Semantic,
    Fuse,
    Filter,
    Finalize,
}

/// Stages in execution order
pub const PIPELINE: [Stage; 7] = [
    Stage::Parse,
    Stage::Embed,
    Stage::Lexical,
    Stage::Semantic,
    Stage::Fuse,
    Stage::Filter,
    Stage::Finalize,
];

/// Hybrid email search over injected collaborators
pub struct SearchWorkflow {
    parser: QueryParser,
    lexical: LexicalSearch,
    semantic: VectorSearch,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: SearchSettings,
}

impl SearchWorkflow {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: SearchSettings,
    ) -> Result<Self> {
        let workflow = Self {
            parser: QueryParser::new()?,
            lexical: LexicalSearch::new(messages.clone()),
            semantic: VectorSearch::new(vectors, messages),
            embedder,
            settings,
        };
        info!(
            "Search workflow initialized (embedding model: {})",
            workflow.embedder.model_name()
        );
        Ok(workflow)
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Search an account's mail with a natural-language query.
    ///
    /// Never fails: collaborator errors are reported in
    /// [`SearchReport::errors`] next to whatever results were still found.
    pub async fn search_emails(&self, query: &str, account_id: i64, max_results: usize) -> SearchReport {
        info!("🔍 Starting search for '{}' (account {})", query, account_id);

        let mut state = SearchState::new(query, account_id, max_results);
        for stage in PIPELINE {
            self.run_stage(stage, &mut state).await;
        }
        state.into_report()
    }

    /// Run a single stage over `state`; failures land in `state.errors`
    pub async fn run_stage(&self, stage: Stage, state: &mut SearchState) {
        debug!("Running stage {:?}", stage);
        match stage {
            Stage::Parse => self.parse(state),
            Stage::Embed => self.embed(state).await,
            Stage::Lexical => self.keyword_search(state).await,
            Stage::Semantic => self.semantic_search(state).await,
            Stage::Fuse => self.fuse(state),
            Stage::Filter => self.filter(state),
            Stage::Finalize => self.finalize(state),
        }
    }

    fn parse(&self, state: &mut SearchState) {
        let parsed = self.parser.parse(&state.query);
        state.search_type = parsed.search_type();
        state.filters = parsed.filters;
        state.cleaned_query = parsed.cleaned_query;

        info!(
            "Parsed query: type={}, cleaned='{}', senders={:?}, keywords={:?}",
            state.search_type.as_str(),
            state.cleaned_query,
            state.filters.sender_emails,
            state.filters.keywords
        );
    }

    async fn embed(&self, state: &mut SearchState) {
        if !state.search_type.uses_vectors() || state.cleaned_query.is_empty() {
            debug!("Skipping vector generation");
            return;
        }

        match self.embedder.embed(&state.cleaned_query).await {
            Ok(vector) if vector.is_empty() => {
                let error = "Failed to generate vector: provider returned an empty vector".to_string();
                warn!("{}", error);
                state.record_error(error);
            }
            Ok(vector) => {
                debug!("Generated {}D query vector", vector.len());
                state.query_vector = vector;
            }
            Err(e) => {
                let error = format!("Vector generation error: {}", e);
                warn!("{}", error);
                state.record_error(error);
            }
        }
    }

    async fn keyword_search(&self, state: &mut SearchState) {
        let terms = search_terms(&state.filters, &state.cleaned_query);

        match self.lexical.search(state.account_id, &terms, state.max_results).await {
            Ok(results) => {
                state.total_keyword_matches = results.len();
                state.keyword_results = results;
                info!("Keyword search found {} results", state.total_keyword_matches);
            }
            Err(e) => {
                let error = format!("Keyword search failed: {}", e);
                error!("{}", error);
                state.record_error(error);
            }
        }
    }

    async fn semantic_search(&self, state: &mut SearchState) {
        if state.query_vector.is_empty() {
            debug!("Skipping semantic search (no query vector)");
            return;
        }

        match self
            .semantic
            .search(
                state.account_id,
                &state.query_vector,
                state.max_results,
                self.settings.score_threshold,
            )
            .await
        {
            Ok(results) => {
                state.total_semantic_matches = results.len();
                state.semantic_results = results;
                info!("Semantic search found {} results", state.total_semantic_matches);
            }
            Err(e) => {
                let error = format!("Semantic search failed: {}", e);
                warn!("{}", error);
                state.record_error(error);
            }
        }
    }

    fn fuse(&self, state: &mut SearchState) {
        state.final_results = fuse(
            &state.keyword_results,
            &state.semantic_results,
            state.max_results,
            self.settings.weights,
        );
        debug!("Fused results: {}", state.final_results.len());
    }

    fn filter(&self, state: &mut SearchState) {
        let fused = std::mem::take(&mut state.final_results);
        state.final_results = apply_filters(fused, &state.filters);
        debug!("Filters left {} results", state.final_results.len());
    }

    fn finalize(&self, state: &mut SearchState) {
        state.total_final_results = state.final_results.len();
        state.processing_time = state.started.elapsed().as_secs_f64();

        info!(
            "✅ Search complete: query='{}', type={}, keyword={}, semantic={}, final={}, time={:.3}s",
            state.query,
            state.search_type.as_str(),
            state.total_keyword_matches,
            state.total_semantic_matches,
            state.total_final_results,
            state.processing_time
        );

        if !state.errors.is_empty() {
            warn!("Search finished with {} errors", state.errors.len());
            for error in &state.errors {
                warn!("  - {}", error);
            }
        }
    }
}
