//! activity-digest: scheduled and on-demand digests of repository, front-page
//! and discussion-feed activity.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use activity_digest::api::{self, AppState};
use activity_digest::config::AppConfig;
use activity_digest::digest::DigestMode;
use activity_digest::ingest::types::{FetchRequest, SourceKind};
use activity_digest::ingest::window::TimeWindow;
use activity_digest::metrics::Metrics;
use activity_digest::pipeline::{self, DigestJob, DigestPipeline};
use activity_digest::registry::SubscriptionRegistry;
use activity_digest::scheduler::{self, Clock, Daemon, DigestRun, SystemClock};
use activity_digest::telemetry;

#[derive(Parser)]
#[command(name = "activity-digest", version, about = "Multi-source activity digests")]
struct Cli {
    /// Config file; overrides $DIGEST_CONFIG_PATH and config/digest.toml
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily scheduler until SIGTERM/Ctrl-C
    Daemon,
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Edit the subscription list
    Subs {
        #[command(subcommand)]
        action: SubsAction,
    },
    /// Fetch and store a raw artifact without summarizing
    Export {
        #[arg(value_parser = parse_kind)]
        kind: SourceKind,
        /// owner/repo (github) or subreddit (reddit)
        #[arg(long)]
        repo: Option<String>,
        #[arg(long, default_value_t = 1)]
        days: u32,
        /// Keep only the first N items (front page, discussion feed)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Summarize an existing raw artifact
    Generate {
        #[arg(value_parser = parse_kind)]
        kind: SourceKind,
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Export, summarize and notify in one go
    Report {
        #[command(subcommand)]
        target: ReportTarget,
        #[arg(global = true, long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SubsAction {
    List,
    Add { identifier: String },
    Remove { identifier: String },
}

#[derive(Subcommand)]
enum ReportTarget {
    Github {
        repo: String,
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    HackerNews {
        #[arg(long)]
        top: Option<usize>,
    },
    Reddit {
        #[arg(long)]
        subreddit: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn parse_kind(s: &str) -> Result<SourceKind, String> {
    SourceKind::parse(s)
        .ok_or_else(|| format!("unknown source {s:?} (github, hacker_news, reddit)"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "exiting with error");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = match &cli.config {
        Some(p) => AppConfig::load_from_file(p)?,
        None => AppConfig::load_default()?,
    };

    match cli.command {
        Commands::Daemon => daemon(cfg).await,
        Commands::Serve { bind } => serve(cfg, bind).await,
        Commands::Subs { action } => subs(&cfg, action),
        Commands::Export { kind, repo, days, top } => export(cfg, kind, repo, days, top).await,
        Commands::Generate { kind, file, dry_run } => {
            let p = build_pipeline(&cfg, !dry_run)?;
            let report = p.generate(kind, &file, dry_run).await?;
            println!("{}", report.content);
            eprintln!("report written to {}", report.path.display());
            Ok(())
        }
        Commands::Report { target, dry_run } => report(cfg, target, dry_run).await,
    }
}

/// Commands that never call the backend build it in inspect mode so no API key is needed.
fn build_pipeline(cfg: &AppConfig, needs_backend: bool) -> Result<DigestPipeline> {
    let pipeline = if needs_backend {
        pipeline::build_from_config(cfg)?
    } else {
        let mut offline = cfg.clone();
        offline.digest.mode = DigestMode::Inspect;
        pipeline::build_from_config(&offline)?
    };
    Ok(pipeline)
}

async fn daemon(cfg: AppConfig) -> Result<()> {
    let cfg = Arc::new(cfg);
    let pipeline = Arc::new(build_pipeline(&cfg, true)?);
    let job = Arc::new(DigestRun::new(pipeline, cfg.clone()));
    let daemon = Daemon::from_config(&cfg, Arc::new(SystemClock), job)?;

    let (tx, rx) = watch::channel(false);
    scheduler::spawn_signal_listener(tx);
    daemon.run(rx).await?;
    Ok(())
}

async fn serve(cfg: AppConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| cfg.api.bind.clone());
    // fail at startup on an unreadable subscription file
    SubscriptionRegistry::open(&cfg.digest.subscriptions_file).context("opening subscriptions")?;
    let state = AppState::new(
        cfg.digest.subscriptions_file.clone(),
        Arc::new(build_pipeline(&cfg, true)?),
        Arc::new(SystemClock),
    );

    let mut app = api::router(state);
    match Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics disabled"),
    }

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "api listening");

    let (tx, mut rx) = watch::channel(false);
    scheduler::spawn_signal_listener(tx);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = rx.changed().await;
        })
        .await
        .context("api server")?;
    Ok(())
}

fn subs(cfg: &AppConfig, action: SubsAction) -> Result<()> {
    let mut reg = SubscriptionRegistry::open(&cfg.digest.subscriptions_file)?;
    match action {
        SubsAction::List => {
            for s in reg.list() {
                println!("{s}");
            }
        }
        SubsAction::Add { identifier } => {
            let repo =
                activity_digest::ingest::providers::github::validate_repo(Some(&identifier))?;
            if reg.add(&repo)? {
                println!("added {repo}");
            } else {
                println!("{repo} already subscribed");
            }
        }
        SubsAction::Remove { identifier } => {
            if reg.remove(&identifier)? {
                println!("removed {}", identifier.trim());
            } else {
                println!("{} was not subscribed", identifier.trim());
            }
        }
    }
    Ok(())
}

fn request_for(
    kind: SourceKind,
    identifier: Option<String>,
    days: u32,
    top: Option<usize>,
) -> Result<FetchRequest> {
    let now = SystemClock.now();
    let req = match kind {
        SourceKind::Github => {
            let repo = identifier.ok_or_else(|| anyhow!("github needs --repo owner/repo"))?;
            FetchRequest::window(repo, TimeWindow::last_days(days, now.date())?, now)
        }
        SourceKind::HackerNews | SourceKind::Reddit => {
            let mut req = match top {
                Some(n) => FetchRequest::top(n, now),
                None => FetchRequest::now(now),
            };
            req.identifier = identifier;
            req
        }
    };
    Ok(req)
}

async fn export(
    cfg: AppConfig,
    kind: SourceKind,
    repo: Option<String>,
    days: u32,
    top: Option<usize>,
) -> Result<()> {
    let p = build_pipeline(&cfg, false)?;
    let req = request_for(kind, repo, days, top)?;
    let path = p.export(kind, &req).await?;
    println!("{}", path.display());
    Ok(())
}

async fn report(cfg: AppConfig, target: ReportTarget, dry_run: bool) -> Result<()> {
    let (kind, req) = match target {
        ReportTarget::Github { repo, days } => (
            SourceKind::Github,
            request_for(SourceKind::Github, Some(repo), days, None)?,
        ),
        ReportTarget::HackerNews { top } => (
            SourceKind::HackerNews,
            request_for(SourceKind::HackerNews, None, 1, top)?,
        ),
        ReportTarget::Reddit { subreddit, limit } => {
            (SourceKind::Reddit, request_for(SourceKind::Reddit, subreddit, 1, limit)?)
        }
    };
    let p = build_pipeline(&cfg, !dry_run)?;
    let job = DigestJob::new(kind, req);
    let report = p.run_job_with(&job, dry_run).await?;
    println!("{}", report.content);
    eprintln!("{} -> {}", job.label(), report.path.display());
    Ok(())
}
