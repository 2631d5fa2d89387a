// src/pipeline.rs
//! Jobs in, reports out. Each job is export → generate → notify; one job
//! failing never stops the others.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use metrics::{counter, gauge};

use crate::config::AppConfig;
use crate::digest::{DigestBackend, PromptTemplate, Report, ReportGenerator, DRY_RUN_SENTINEL};
use crate::error::{ConfigError, PipelineError, SourceError};
use crate::ingest::fetch_and_persist;
use crate::ingest::providers::{
    github::GithubAdapter, hacker_news::HackerNewsAdapter, reddit::RedditAdapter,
};
use crate::ingest::store::ArtifactStore;
use crate::ingest::types::{FetchRequest, FetchScope, SourceAdapter, SourceKind};
use crate::ingest::window::TimeWindow;
use crate::notify::NotifierMux;
use crate::registry::SubscriptionRegistry;

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestJob {
    pub kind: SourceKind,
    pub request: FetchRequest,
}

impl DigestJob {
    pub fn new(kind: SourceKind, request: FetchRequest) -> Self {
        Self { kind, request }
    }

    /// Used in logs and notification subjects.
    pub fn label(&self) -> String {
        let at = self.request.at;
        let ident = self.request.identifier.as_deref();
        match (self.kind, &self.request.scope) {
            (SourceKind::Github, FetchScope::Window(w)) => {
                format!("GitHub {} ({} to {})", ident.unwrap_or("?"), w.start, w.last())
            }
            (SourceKind::HackerNews, _) => format!("Hacker News front page ({})", at.date()),
            (SourceKind::Reddit, _) => match ident {
                Some(sub) => format!(
                    "Reddit r/{} ({} {})",
                    sub.trim_start_matches("r/"),
                    at.date(),
                    at.format("%H:00")
                ),
                None => format!("Reddit hot feeds ({} {})", at.date(), at.format("%H:00")),
            },
            (kind, _) => format!("{kind} {}", ident.unwrap_or_default()),
        }
    }
}

/// Per-run counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<PathBuf>,
    /// Sources that had nothing to report.
    pub empty: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.len()
    }

    pub fn total(&self) -> usize {
        self.reports.len() + self.empty + self.failed
    }
}

struct Lane {
    adapter: Box<dyn SourceAdapter>,
    generator: ReportGenerator,
}

pub struct DigestPipeline {
    store: ArtifactStore,
    lanes: BTreeMap<SourceKind, Lane>,
    notifier: NotifierMux,
}

#[derive(Default)]
pub struct DigestPipelineBuilder {
    store: Option<ArtifactStore>,
    lanes: BTreeMap<SourceKind, Lane>,
    notifier: Option<NotifierMux>,
}

impl DigestPipelineBuilder {
    pub fn store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Registers the adapter under its own kind; a later registration replaces an earlier one.
    pub fn source(
        mut self,
        adapter: impl SourceAdapter + 'static,
        generator: ReportGenerator,
    ) -> Self {
        self.lanes.insert(
            adapter.kind(),
            Lane {
                adapter: Box::new(adapter),
                generator,
            },
        );
        self
    }

    pub fn notifier(mut self, notifier: NotifierMux) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> DigestPipeline {
        DigestPipeline {
            store: self.store.unwrap_or_else(|| ArtifactStore::new("data")),
            lanes: self.lanes,
            notifier: self.notifier.unwrap_or_default(),
        }
    }
}

impl DigestPipeline {
    pub fn builder() -> DigestPipelineBuilder {
        DigestPipelineBuilder::default()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.lanes.keys().copied()
    }

    pub fn has(&self, kind: SourceKind) -> bool {
        self.lanes.contains_key(&kind)
    }

    fn lane(&self, kind: SourceKind) -> Option<&Lane> {
        self.lanes.get(&kind)
    }

    /// Fetch and persist only.
    pub async fn export(
        &self,
        kind: SourceKind,
        request: &FetchRequest,
    ) -> Result<PathBuf, SourceError> {
        let lane = self.lane(kind).ok_or_else(|| SourceError::InvalidRequest {
            source_name: kind.as_str(),
            message: "source is not enabled".into(),
        })?;
        fetch_and_persist(lane.adapter.as_ref(), request, &self.store).await
    }

    /// Summarize an existing artifact with the generator registered for `kind`.
    pub async fn generate(
        &self,
        kind: SourceKind,
        raw: &Path,
        dry_run: bool,
    ) -> Result<Report, PipelineError> {
        let lane = self.lane(kind).ok_or(PipelineError::UnknownKind(kind.as_str()))?;
        Ok(lane.generator.generate_with(raw, dry_run).await?)
    }

    pub async fn run_job(&self, job: &DigestJob) -> Result<Report, PipelineError> {
        self.run_job_with(job, false).await
    }

    /// Export, generate, notify. Notification failures are logged by the mux only.
    pub async fn run_job_with(
        &self,
        job: &DigestJob,
        dry_run: bool,
    ) -> Result<Report, PipelineError> {
        crate::metrics::ensure_described();
        let kind = job.kind.as_str();
        if !self.has(job.kind) {
            return Err(PipelineError::UnknownKind(kind));
        }
        counter!("digest_jobs_total", "kind" => kind).increment(1);

        let raw = self.export(job.kind, &job.request).await.inspect_err(|e| {
            if !e.is_empty_result() {
                counter!("digest_source_errors_total", "kind" => kind).increment(1);
            }
        })?;
        let report = self.generate(job.kind, &raw, dry_run).await?;

        if report.content == DRY_RUN_SENTINEL {
            tracing::debug!(target: "digest", job = %job.label(), "dry run, not notifying");
        } else if !self.notifier.is_empty() {
            let subject = format!("[Digest] {}", job.label());
            self.notifier.notify(&subject, &report.content).await;
        }
        Ok(report)
    }

    /// Runs jobs one after another; every job is independently fallible.
    pub async fn run_all(&self, jobs: &[DigestJob]) -> RunSummary {
        let mut summary = RunSummary::default();
        for job in jobs {
            let label = job.label();
            match self.run_job(job).await {
                Ok(report) => {
                    tracing::info!(
                        target: "digest",
                        job = %label,
                        path = %report.path.display(),
                        "job done"
                    );
                    summary.reports.push(report.path);
                }
                Err(PipelineError::Source(e)) if e.is_empty_result() => {
                    tracing::warn!(target: "digest", job = %label, "nothing to report, skipped");
                    summary.empty += 1;
                }
                Err(e) => {
                    counter!("digest_job_failures_total", "kind" => job.kind.as_str()).increment(1);
                    tracing::error!(target: "digest", job = %label, error = %e, "job failed");
                    summary.failed += 1;
                }
            }
        }
        gauge!("digest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            target: "digest",
            succeeded = summary.succeeded(),
            empty = summary.empty,
            failed = summary.failed,
            "run finished"
        );
        summary
    }
}

/// One github job per subscription, one front-page job, one discussion-feed
/// job; kinds disabled in config are left out.
pub fn plan_jobs(
    registry: &SubscriptionRegistry,
    settings: &AppConfig,
    now: NaiveDateTime,
) -> Result<Vec<DigestJob>, SourceError> {
    let mut jobs = Vec::new();
    if settings.sources.github {
        let window = TimeWindow::last_days(settings.digest.window_days, now.date())?;
        jobs.extend(registry.list().iter().map(|repo| {
            DigestJob::new(SourceKind::Github, FetchRequest::window(repo.clone(), window, now))
        }));
    }
    if settings.sources.hacker_news {
        let req = match settings.hacker_news.top {
            Some(n) => FetchRequest::top(n, now),
            None => FetchRequest::now(now),
        };
        jobs.push(DigestJob::new(SourceKind::HackerNews, req));
    }
    if settings.sources.reddit {
        jobs.push(DigestJob::new(
            SourceKind::Reddit,
            FetchRequest::top(settings.reddit.limit, now),
        ));
    }
    Ok(jobs)
}

/// Wire adapters, generators and notifiers from config.
pub fn build_from_config(cfg: &AppConfig) -> Result<DigestPipeline, ConfigError> {
    let mode = cfg.digest.mode;
    let client = cfg.llm.build_client(mode)?;
    let inspect_path = cfg.digest.inspect_path();

    let generator = |kind: SourceKind| -> Result<ReportGenerator, ConfigError> {
        let template =
            PromptTemplate::load(&cfg.digest.prompts_dir, kind).map_err(|err| ConfigError::Read {
                path: cfg.digest.prompts_dir.clone(),
                err,
            })?;
        Ok(ReportGenerator::new(DigestBackend::new(
            client.clone(),
            template,
            mode,
            inspect_path.clone(),
        )))
    };
    let source_err = |e: SourceError| ConfigError::Invalid {
        key: "sources",
        message: e.to_string(),
    };

    let mut builder = DigestPipeline::builder().store(ArtifactStore::new(&cfg.digest.data_dir));
    if cfg.sources.github {
        let adapter = GithubAdapter::from_api(cfg.github.api_url.clone(), cfg.github.token.clone())
            .map_err(source_err)?;
        builder = builder.source(adapter, generator(SourceKind::Github)?);
    }
    if cfg.sources.hacker_news {
        let adapter = HackerNewsAdapter::from_url(&cfg.hacker_news.base_url).map_err(source_err)?;
        builder = builder.source(adapter, generator(SourceKind::HackerNews)?);
    }
    if cfg.sources.reddit {
        let adapter = RedditAdapter::from_http(
            &cfg.reddit.subreddit,
            cfg.reddit.api_base_url(),
            cfg.reddit.credentials(),
        )
        .map_err(source_err)?;
        builder = builder.source(adapter, generator(SourceKind::Reddit)?);
    }

    let pipeline = builder.notifier(NotifierMux::from_config(&cfg.notify)).build();
    tracing::info!(
        kinds = ?pipeline.kinds().collect::<Vec<_>>(),
        mode = ?mode,
        data_dir = %cfg.digest.data_dir.display(),
        "pipeline ready"
    );
    Ok(pipeline)
}
