// tests/api_http.rs
//
// Router-level tests via tower::ServiceExt::oneshot; no sockets are opened.
mod common;

use std::sync::Arc;

use activity_digest::api::{self, AppState};
use activity_digest::digest::FixedClient;
use activity_digest::ingest::store::ArtifactStore;
use activity_digest::scheduler::ManualClock;
use activity_digest::{DigestPipeline, SourceKind, SubscriptionRegistry};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt as _;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router(dir: &std::path::Path) -> Router {
    let client = Arc::new(FixedClient::ok("## Summary\nAll quiet."));
    let pipeline = DigestPipeline::builder()
        .store(ArtifactStore::new(dir))
        .source(github_adapter(), generator(client.clone(), SourceKind::Github, dir))
        .source(hacker_news_adapter(), generator(client, SourceKind::HackerNews, dir))
        .build();
    api::router(AppState::new(
        dir.join("subscriptions.json"),
        Arc::new(pipeline),
        Arc::new(ManualClock::new(at())),
    ))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build POST")
}

async fn read_json(resp: axum::response::Response) -> Value {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = test_router(dir.path()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn subscriptions_add_list_remove() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let resp = app
        .clone()
        .oneshot(post_json("/subscriptions", json!({ "identifier": "octocat/hello-world" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = read_json(resp).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["subscriptions"], json!(["octocat/hello-world"]));

    let resp = app
        .clone()
        .oneshot(post_json("/subscriptions", json!({ "identifier": "octocat/hello-world" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "duplicate add is a no-op");
    assert_eq!(read_json(resp).await["changed"], false);

    let req = Request::builder().uri("/subscriptions").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(read_json(resp).await, json!(["octocat/hello-world"]));

    let del = |uri: &str| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };
    let resp = app.clone().oneshot(del("/subscriptions/octocat/hello-world")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["subscriptions"], json!([]));

    let resp = app.oneshot(del("/subscriptions/octocat/hello-world")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let on_disk = std::fs::read_to_string(dir.path().join("subscriptions.json")).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&on_disk).unwrap(), json!([]));
}

#[tokio::test]
async fn edits_made_outside_the_server_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let resp = app
        .clone()
        .oneshot(post_json("/subscriptions", json!({ "identifier": "octocat/hello-world" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // another process (the CLI) edits the same file while the server runs
    SubscriptionRegistry::open(dir.path().join("subscriptions.json"))
        .unwrap()
        .add("rust-lang/rust")
        .unwrap();

    let resp = app
        .clone()
        .oneshot(post_json("/subscriptions", json!({ "identifier": "tokio-rs/tokio" })))
        .await
        .unwrap();
    assert_eq!(
        read_json(resp).await["subscriptions"],
        json!(["octocat/hello-world", "rust-lang/rust", "tokio-rs/tokio"])
    );

    let req = Request::builder().uri("/subscriptions").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(read_json(resp).await.as_array().unwrap().len(), 3);

    let on_disk = std::fs::read_to_string(dir.path().join("subscriptions.json")).unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&on_disk).unwrap(),
        json!(["octocat/hello-world", "rust-lang/rust", "tokio-rs/tokio"])
    );
}

#[tokio::test]
async fn malformed_identifier_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(post_json("/subscriptions", json!({ "identifier": "not-a-repo" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(resp).await["error"].as_str().unwrap().contains("owner/repo"));
}

#[tokio::test]
async fn github_report_returns_content_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(post_json(
            "/reports/github",
            json!({ "identifier": "octocat/hello-world", "days": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = read_json(resp).await;
    assert_eq!(body["content"], "## Summary\nAll quiet.");
    assert_eq!(body["label"], "GitHub octocat/hello-world (2026-10-14 to 2026-10-16)");
    let path = body["path"].as_str().unwrap();
    assert!(path.ends_with("2026-10-14_2026-10-16_report.md"), "{path}");
    assert!(std::path::Path::new(path).exists());
}

#[tokio::test]
async fn github_report_rejects_out_of_range_days() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(post_json(
            "/reports/github",
            json!({ "identifier": "octocat/hello-world", "days": 8 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(resp).await["error"], "days must be between 1 and 7");
}

#[tokio::test]
async fn dry_run_report_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(post_json("/reports/hacker_news", json!({ "top": 2, "dry_run": true })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["content"], "DRY RUN");
    assert!(dir.path().join("prompt.txt").exists());
}

#[tokio::test]
async fn unregistered_source_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(post_json("/reports/reddit", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(read_json(resp).await["error"].as_str().unwrap().contains("not enabled"));
}
