// src/api.rs
//! On-demand front-end: subscription editing and report generation over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::digest::Report;
use crate::error::{PipelineError, RegistryError, ReportError, SourceError};
use crate::ingest::providers::github::validate_repo;
use crate::ingest::types::{FetchRequest, SourceKind};
use crate::ingest::window::TimeWindow;
use crate::pipeline::{DigestJob, DigestPipeline};
use crate::registry::SubscriptionRegistry;
use crate::scheduler::Clock;

/// Largest window the report endpoint accepts.
pub const MAX_REPORT_DAYS: u32 = 7;

/// The subscription file is re-read on every request so edits made by other
/// processes (the CLI) are never overwritten; the lock only orders this
/// server's own writes.
#[derive(Clone)]
pub struct AppState {
    pub subscriptions_file: PathBuf,
    pub pipeline: Arc<DigestPipeline>,
    pub clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        subscriptions_file: impl Into<PathBuf>,
        pipeline: Arc<DigestPipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscriptions_file: subscriptions_file.into(),
            pipeline,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn open_registry(&self) -> Result<SubscriptionRegistry, RegistryError> {
        SubscriptionRegistry::open(&self.subscriptions_file)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/subscriptions", get(list_subscriptions).post(add_subscription))
        .route("/subscriptions/{owner}/{repo}", delete(remove_subscription))
        .route("/reports/github", post(github_report))
        .route("/reports/hacker_news", post(hacker_news_report))
        .route("/reports/reddit", post(reddit_report))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// JSON `{"error": ...}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        let status = match &e {
            SourceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            SourceError::Empty { .. } => StatusCode::NOT_FOUND,
            SourceError::Http { .. } | SourceError::Status { .. } | SourceError::Parse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            SourceError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Source(se) => se.into(),
            PipelineError::Report(ReportError::Backend(be)) => {
                Self::new(StatusCode::BAD_GATEWAY, be.to_string())
            }
            PipelineError::Report(re) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, re.to_string())
            }
            PipelineError::UnknownKind(kind) => {
                Self::new(StatusCode::NOT_FOUND, format!("source {kind} is not enabled"))
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let status = match &e {
            RegistryError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

async fn list_subscriptions(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let reg = state.open_registry()?;
    Ok(Json(reg.list().to_vec()))
}

#[derive(Debug, Deserialize)]
struct SubscriptionReq {
    identifier: String,
}

#[derive(Debug, Serialize)]
struct SubscriptionResp {
    identifier: String,
    changed: bool,
    subscriptions: Vec<String>,
}

async fn add_subscription(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionReq>,
) -> Result<(StatusCode, Json<SubscriptionResp>), ApiError> {
    let identifier = validate_repo(Some(&body.identifier))?;
    let _guard = state.write_lock.lock().await;
    let mut reg = state.open_registry()?;
    let added = reg.add(&identifier)?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(SubscriptionResp {
            identifier,
            changed: added,
            subscriptions: reg.list().to_vec(),
        }),
    ))
}

async fn remove_subscription(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<SubscriptionResp>, ApiError> {
    let identifier = format!("{owner}/{repo}");
    let _guard = state.write_lock.lock().await;
    let mut reg = state.open_registry()?;
    if !reg.remove(&identifier)? {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("{identifier} is not subscribed"),
        ));
    }
    Ok(Json(SubscriptionResp {
        identifier,
        changed: true,
        subscriptions: reg.list().to_vec(),
    }))
}

#[derive(Debug, Serialize)]
struct ReportResp {
    label: String,
    path: String,
    content: String,
}

impl ReportResp {
    fn new(job: &DigestJob, report: Report) -> Self {
        Self {
            label: job.label(),
            path: report.path.display().to_string(),
            content: report.content,
        }
    }
}

fn default_days() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct GithubReportReq {
    identifier: String,
    #[serde(default = "default_days")]
    days: u32,
    #[serde(default)]
    dry_run: bool,
}

async fn github_report(
    State(state): State<AppState>,
    Json(body): Json<GithubReportReq>,
) -> Result<Json<ReportResp>, ApiError> {
    if !(1..=MAX_REPORT_DAYS).contains(&body.days) {
        return Err(ApiError::bad_request(format!(
            "days must be between 1 and {MAX_REPORT_DAYS}"
        )));
    }
    let repo = validate_repo(Some(&body.identifier))?;
    let now = state.clock.now();
    let window = TimeWindow::last_days(body.days, now.date())?;
    let job = DigestJob::new(SourceKind::Github, FetchRequest::window(repo, window, now));
    run(&state, job, body.dry_run).await
}

#[derive(Debug, Default, Deserialize)]
struct FeedReportReq {
    #[serde(default)]
    top: Option<usize>,
    /// Subreddit override; ignored by the front-page endpoint.
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    dry_run: bool,
}

async fn hacker_news_report(
    State(state): State<AppState>,
    Json(body): Json<FeedReportReq>,
) -> Result<Json<ReportResp>, ApiError> {
    let now = state.clock.now();
    let req = match body.top {
        Some(n) => FetchRequest::top(n, now),
        None => FetchRequest::now(now),
    };
    run(&state, DigestJob::new(SourceKind::HackerNews, req), body.dry_run).await
}

async fn reddit_report(
    State(state): State<AppState>,
    Json(body): Json<FeedReportReq>,
) -> Result<Json<ReportResp>, ApiError> {
    let now = state.clock.now();
    let mut req = match body.top {
        Some(n) => FetchRequest::top(n, now),
        None => FetchRequest::now(now),
    };
    req.identifier = body.subreddit.filter(|s| !s.trim().is_empty());
    run(&state, DigestJob::new(SourceKind::Reddit, req), body.dry_run).await
}

async fn run(
    state: &AppState,
    job: DigestJob,
    dry_run: bool,
) -> Result<Json<ReportResp>, ApiError> {
    tracing::info!(job = %job.label(), dry_run, "on-demand report requested");
    let report = state.pipeline.run_job_with(&job, dry_run).await?;
    Ok(Json(ReportResp::new(&job, report)))
}
