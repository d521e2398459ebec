use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use smart_core::config::{BM25_B, BM25_K1};
use smart_core::persist::{load_ranker, IndexPaths};
use smart_core::{Bm25Params, CollectionStatistics, Error, Ranker, Scheme, SearchRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on `k` accepted over HTTP.
pub const MAX_K: usize = 1000;

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_scheme() -> String { Scheme::Ltn.as_str().to_string() }
fn default_k1() -> f64 { BM25_K1 }
fn default_b() -> f64 { BM25_B }
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct WeightParams {
    pub term: String,
    pub doc: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub scheme: String,
    pub terms: Vec<String>,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub doc_id: String,
    pub score: f64,
}

/// Shared handle to the current ranker.
///
/// Readers clone the inner `Arc` and score against it; a reload builds a new
/// ranker off to the side and swaps the pointer, so an in-flight query never
/// sees a half-replaced index.
#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    pub ranker: Arc<RwLock<Arc<Ranker>>>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(index_root: PathBuf, ranker: Ranker, admin_token: Option<String>) -> Self {
        Self { index_root, ranker: Arc::new(RwLock::new(Arc::new(ranker))), admin_token }
    }

    pub fn current(&self) -> Arc<Ranker> {
        self.ranker.read().clone()
    }
}

pub fn build_app(index_dir: String) -> Result<Router> {
    let root = PathBuf::from(&index_dir);
    let ranker = load_ranker(&IndexPaths::new(&root))?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState::new(root, ranker, admin_token)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/search", get(search_handler))
        .route("/weight", get(weight_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// `CORS_ALLOW_ORIGIN` holds a comma-separated origin list; unset or
/// unparsable means any origin.
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let allow = if origins.is_empty() { AllowOrigin::any() } else { AllowOrigin::list(origins) };
    CorsLayer::new().allow_origin(allow).allow_methods(Any).allow_headers(Any)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let ranker = state.current();
    let request = SearchRequest {
        query: params.q,
        scheme: params.scheme,
        k1: params.k1,
        b: params.b,
        top_k: params.k.min(MAX_K),
    };
    // scoring fans out over rayon and the first ltc query may touch disk
    let (request, terms, hits) = tokio::task::spawn_blocking(move || {
        let hits = ranker.execute(&request);
        let terms = ranker.query_terms(&request.query);
        (request, terms, hits)
    })
    .await
    .map_err(|e| server_error(e.to_string()))?;
    let hits = hits.map_err(client_error)?;
    let results: Vec<SearchHit> = hits
        .into_iter()
        .enumerate()
        .map(|(i, h)| SearchHit { rank: i + 1, doc_id: h.doc_id, score: h.score })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %request.query, hits = results.len(), took_s = elapsed.as_secs_f64(), "search");
    Ok(Json(SearchResponse {
        terms,
        query: request.query,
        scheme: request.scheme.trim().to_ascii_lowercase(),
        took_s: elapsed.as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn weight_handler(
    State(state): State<AppState>,
    Query(params): Query<WeightParams>,
) -> Result<Json<Value>, ApiError> {
    let ranker = state.current();
    let scheme: Scheme = params.scheme.parse().map_err(client_error)?;
    let bm25 = Bm25Params { k1: params.k1, b: params.b };
    let (term, doc) = (params.term.clone(), params.doc.clone());
    // the raw term goes through the index's own normalizer, like a query
    let weighed = tokio::task::spawn_blocking(move || {
        ranker
            .query_terms(&term)
            .into_iter()
            .map(|t| ranker.term_weight(&t, &doc, scheme, bm25).map(|w| (t, w)))
            .collect::<smart_core::Result<Vec<(String, f64)>>>()
    })
    .await
    .map_err(|e| server_error(e.to_string()))?
    .map_err(client_error)?;

    let total: f64 = weighed.iter().map(|(_, w)| w).sum();
    let weights: serde_json::Map<String, Value> = weighed.into_iter().map(|(t, w)| (t, json!(w))).collect();
    Ok(Json(json!({
        "term": params.term,
        "doc_id": params.doc,
        "scheme": scheme,
        "terms": weights,
        "weight": total,
    })))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<Value> {
    let ranker = state.current();
    let index = ranker.index();
    let config = index.normalizer().config();
    Json(json!({
        "fingerprint": index.fingerprint().to_string(),
        "stop_words": config.stop_words_enabled(),
        "stemming": config.stemming,
        "alphabet": config.alphabet.as_str(),
        "statistics": CollectionStatistics::from_index(index),
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let ranker = state.current();
    match ranker.index().document_length(&doc_id) {
        Some(length) => Ok(Json(json!({ "doc_id": doc_id, "length": length }))),
        None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))),
    }
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_root);
    let loaded = tokio::task::spawn_blocking(move || load_ranker(&paths))
        .await
        .map_err(|e| server_error(e.to_string()))?
        .map_err(|e| server_error(e.to_string()))?;

    let fingerprint = loaded.index().fingerprint();
    let num_docs = loaded.index().doc_count();
    *state.ranker.write() = Arc::new(loaded);
    tracing::info!(%fingerprint, num_docs, "index reloaded");
    Ok(Json(json!({ "fingerprint": fingerprint.to_string(), "num_docs": num_docs })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "ADMIN_TOKEN not set" })))),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid admin token" }))))
    }
}

/// Misconfiguration by the caller, reported apart from an empty result.
fn client_error(e: Error) -> ApiError {
    let code = match &e {
        Error::UnknownScheme(_) => "unknown_scheme",
        Error::InvalidParameter { .. } => "invalid_parameter",
        _ => return server_error(e.to_string()),
    };
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string(), "code": code })))
}

fn server_error(msg: String) -> ApiError {
    tracing::error!(error = %msg, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg })))
}
