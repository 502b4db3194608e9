//! Search API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, EmbeddingProviderKind, SearchConfig, VectorStoreKind};
use crate::embedding::{EmbeddingProvider, MockEmbedder, OllamaEmbedder};
use crate::error::SearchError;
use crate::indexing::{EmbeddingSync, IndexStats, SyncReport};
use crate::search::{SearchReport, SearchWorkflow};
use crate::store::{MemoryVectorStore, SqliteMessageStore, SqliteVectorStore, VectorStore};
use tracing::info;

const DEFAULT_SYNC_LIMIT: usize = 100;
const MAX_SYNC_LIMIT: usize = 1000;

/// Shared handler state
pub struct AppState {
    pub workflow: Arc<SearchWorkflow>,
    pub sync: Arc<EmbeddingSync>,
    pub store: SqliteMessageStore,
    pub search: SearchConfig,
}

impl AppState {
    /// Open storage and build the search collaborators described by `config`
    pub async fn from_config(config: &Config) -> crate::error::Result<Self> {
        let store = SqliteMessageStore::connect(&config.storage.database_url).await?;

        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
            EmbeddingProviderKind::Ollama => Arc::new(
                OllamaEmbedder::new(config.embedding.model.clone(), config.embedding.dimensions)
                    .with_base_url(config.embedding.base_url.clone()),
            ),
            EmbeddingProviderKind::Mock => Arc::new(MockEmbedder::new(config.embedding.dimensions)),
        };

        let vectors: Arc<dyn VectorStore> = match config.storage.vector_store {
            VectorStoreKind::Sqlite => Arc::new(
                SqliteVectorStore::new(store.pool().clone(), config.embedding.dimensions).await?,
            ),
            VectorStoreKind::Memory => {
                // records from a previous run point at vectors that are gone
                let cleared = store.clear_embeddings().await?;
                if cleared > 0 {
                    info!("Cleared {} stale embedding records; run a sync to rebuild vectors", cleared);
                }
                Arc::new(MemoryVectorStore::new(config.embedding.dimensions))
            }
        };

        let workflow = SearchWorkflow::new(
            Arc::new(store.clone()),
            vectors.clone(),
            embedder.clone(),
            config.search_settings(),
        )?;
        let sync = EmbeddingSync::new(store.clone(), vectors, embedder);

        Ok(Self {
            workflow: Arc::new(workflow),
            sync: Arc::new(sync),
            store,
            search: config.search.clone(),
        })
    }
}

/// Search query parameters
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Natural-language query
    pub q: String,
    pub account_id: i64,
    /// Results limit (default from config)
    pub max_results: Option<usize>,
}

/// Search request body
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub account_id: i64,
    pub max_results: Option<usize>,
}

/// Embedding sync request body
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub account_id: i64,
    pub limit: Option<usize>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(error: SearchError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match error {
        SearchError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1").execute(state.store.pool()).await.is_ok();

    let (status_code, status) = if db_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "service": "mail-search",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Search emails (query string)
pub async fn search_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchReport> {
    run_search(&state, &params.q, params.account_id, params.max_results).await
}

/// Search emails (JSON body)
pub async fn search_post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<SearchReport> {
    run_search(&state, &request.query, request.account_id, request.max_results).await
}

async fn run_search(
    state: &AppState,
    query: &str,
    account_id: i64,
    max_results: Option<usize>,
) -> ApiResult<SearchReport> {
    if query.chars().count() > state.search.max_query_length {
        return Err(error_response(SearchError::InvalidQuery(format!(
            "query exceeds {} characters",
            state.search.max_query_length
        ))));
    }

    let max_results = state.search.clamp_max_results(max_results);
    let report = state.workflow.search_emails(query, account_id, max_results).await;
    Ok(Json(report))
}

/// Embed messages that have no vector yet
pub async fn index_sync(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> ApiResult<SyncReport> {
    let limit = request.limit.unwrap_or(DEFAULT_SYNC_LIMIT).clamp(1, MAX_SYNC_LIMIT);

    match state.sync.sync_account(request.account_id, limit).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            tracing::error!("Embedding sync error: {}", e);
            Err(error_response(e))
        }
    }
}

/// Vector index statistics
pub async fn index_stats(State(state): State<Arc<AppState>>) -> ApiResult<IndexStats> {
    state.sync.stats().await.map(Json).map_err(|e| {
        tracing::error!("Index stats error: {}", e);
        error_response(e)
    })
}
