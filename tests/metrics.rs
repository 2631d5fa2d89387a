// tests/metrics.rs
//
// Installs the global recorder, so this file holds a single test.
mod common;

use std::sync::Arc;

use activity_digest::digest::FixedClient;
use activity_digest::ingest::store::ArtifactStore;
use activity_digest::ingest::types::FetchRequest;
use activity_digest::metrics::Metrics;
use activity_digest::{DigestJob, DigestPipeline, SourceKind};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use common::*;
use tower::ServiceExt;

#[tokio::test]
async fn metrics_endpoint_contains_digest_series() {
    let metrics = Metrics::init().expect("recorder installs once");

    let dir = tempfile::tempdir().unwrap();
    let pipeline = DigestPipeline::builder()
        .store(ArtifactStore::new(dir.path()))
        .source(
            hacker_news_adapter(),
            generator(Arc::new(FixedClient::ok("digest")), SourceKind::HackerNews, dir.path()),
        )
        .build();
    let summary = pipeline
        .run_all(&[DigestJob::new(SourceKind::HackerNews, FetchRequest::now(at()))])
        .await;
    assert_eq!(summary.succeeded(), 1);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = metrics.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    for series in [
        "digest_jobs_total",
        "digest_reports_written_total",
        "digest_backend_ms",
        "digest_last_run_ts",
        "ingest_items_total",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
}
