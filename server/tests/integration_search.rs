use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{router, AppState};
use smart_core::persist::{load_ranker, save_all, IndexPaths};
use smart_core::{InvertedIndex, Normalizer};
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &Path, docs: &[(&str, &str)]) {
    let mut index = InvertedIndex::new(Normalizer::default());
    for (id, text) in docs {
        index.add_document(*id, text).unwrap();
    }
    save_all(&IndexPaths::new(dir), &index, "2024-01-01T00:00:00Z").unwrap();
}

fn app(dir: &Path, admin_token: Option<&str>) -> (Router, AppState) {
    let ranker = load_ranker(&IndexPaths::new(dir)).unwrap();
    let state = AppState::new(dir.to_path_buf(), ranker, admin_token.map(str::to_string));
    (router(state.clone()), state)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

const DOCS: &[(&str, &str)] = &[
    ("doc0", "Rust is great. rust rust systems programming."),
    ("doc1", "Learning rust."),
    ("doc2", "Gardening in spring."),
];

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, _) = app(dir.path(), None);

    let (status, json) = get(app, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], "doc0");
    assert_eq!(arr[0]["rank"], 1);
    assert_eq!(arr[1]["doc_id"], "doc1");
    assert_eq!(json["scheme"], "ltn");
}

#[tokio::test]
async fn every_scheme_is_served() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, _) = app(dir.path(), None);

    for scheme in ["ltn", "ltc", "bm25"] {
        let uri = format!("/search?q=rust+programming&scheme={scheme}&k1=1.5&b=0.5");
        let (status, json) = get(app.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK, "{scheme}");
        assert_eq!(json["results"][0]["doc_id"], "doc0", "{scheme}");
    }
}

#[tokio::test]
async fn unknown_scheme_is_a_client_error() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, _) = app(dir.path(), None);

    let (status, json) = get(app.clone(), "/search?q=rust&scheme=tfidf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "unknown_scheme");

    let (status, json) = get(app.clone(), "/search?q=zebra").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);

    // out-of-range BM25 params score nothing instead of failing
    let (status, json) = get(app, "/search?q=rust&scheme=bm25&b=1.5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn ltc_search_normalizes_query_and_persists_norms() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, state) = app(dir.path(), None);

    let (status, json) = get(app, "/search?q=Rust&scheme=ltc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["terms"][0], "rust");
    assert_eq!(json["results"][0]["doc_id"], "doc0");
    let fingerprint = state.current().index().fingerprint();
    assert!(IndexPaths::new(dir.path()).norm_cache().path_for(fingerprint).exists());
}

#[tokio::test]
async fn weight_probe_and_doc_lookup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, _) = app(dir.path(), None);

    let (status, json) = get(app.clone(), "/weight?term=rust&doc=doc1&scheme=ltn").await;
    assert_eq!(status, StatusCode::OK);
    let expected = (3f64 / 2f64).log10();
    assert!((json["weight"].as_f64().unwrap() - expected).abs() < 1e-12);

    // raw terms go through the index normalizer
    let (status, json) = get(app.clone(), "/weight?term=Rust&doc=doc1&scheme=ltn").await;
    assert_eq!(status, StatusCode::OK);
    assert!((json["weight"].as_f64().unwrap() - expected).abs() < 1e-12);
    assert!((json["terms"]["rust"].as_f64().unwrap() - expected).abs() < 1e-12);

    let (status, json) = get(app.clone(), "/weight?term=RUST+learning&doc=doc1&scheme=ltn").await;
    assert_eq!(status, StatusCode::OK);
    let both = expected + 3f64.log10();
    assert!((json["weight"].as_f64().unwrap() - both).abs() < 1e-12);

    let (status, json) = get(app.clone(), "/doc/doc1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["length"], 2);

    let (status, _) = get(app, "/doc/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_swaps_in_rebuilt_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, state) = app(dir.path(), Some("secret"));
    let before = state.current();

    let (status, _) = get(app.clone(), "/search?q=tulips").await;
    assert_eq!(status, StatusCode::OK);

    build_tiny_index(dir.path(), &[("a", "tulips in spring"), ("b", "rust")]);

    let denied = Request::post("/index/reload").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), denied).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let allowed = Request::post("/index/reload")
        .header("X-ADMIN-TOKEN", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, json) = call(app.clone(), allowed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 2);

    let (_, json) = get(app, "/search?q=tulips").await;
    assert_eq!(json["results"][0]["doc_id"], "a");
    assert_eq!(before.index().doc_count(), 3);
}

#[tokio::test]
async fn any_origin_allowed_by_default() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), DOCS);
    let (app, _) = app(dir.path(), None);

    let req = Request::get("/health").header("Origin", "http://example.org").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
