// tests/daemon_shutdown.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use activity_digest::digest::FixedClient;
use activity_digest::ingest::store::ArtifactStore;
use activity_digest::scheduler::{Daemon, DaemonState, DigestRun, ManualClock, ScheduledJob};
use activity_digest::{AppConfig, DigestPipeline, SourceKind, SubscriptionRegistry};
use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use common::*;
use tokio::sync::watch;

/// Requests shutdown as soon as it starts, then does the real work.
struct StopMidRun {
    inner: DigestRun,
    tx: watch::Sender<bool>,
}

#[async_trait]
impl ScheduledJob for StopMidRun {
    async fn run(&self, now: NaiveDateTime) -> anyhow::Result<()> {
        let _ = self.tx.send(true);
        self.inner.run(now).await
    }
}

#[tokio::test]
async fn in_flight_run_completes_before_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let subs = dir.path().join("subscriptions.json");
    SubscriptionRegistry::open(&subs)
        .unwrap()
        .add("octocat/hello-world")
        .unwrap();

    let mut cfg = AppConfig::default();
    cfg.digest.subscriptions_file = subs;
    cfg.digest.window_days = 2;
    cfg.sources.reddit = false;

    let client = Arc::new(FixedClient::ok("digest"));
    let pipeline = DigestPipeline::builder()
        .store(ArtifactStore::new(dir.path()))
        .source(github_adapter(), generator(client.clone(), SourceKind::Github, dir.path()))
        .source(
            hacker_news_adapter(),
            generator(client.clone(), SourceKind::HackerNews, dir.path()),
        )
        .build();

    let (tx, rx) = watch::channel(false);
    let job = StopMidRun {
        inner: DigestRun::new(Arc::new(pipeline), Arc::new(cfg)),
        tx,
    };
    let daemon = Daemon::new(
        Arc::new(ManualClock::new(at())),
        Arc::new(job),
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
    )
    .poll_interval(Duration::from_millis(10))
    .run_on_start(true);

    let state = tokio::time::timeout(Duration::from_secs(5), daemon.run(rx))
        .await
        .expect("daemon stops")
        .unwrap();

    assert_eq!(state, DaemonState::ShuttingDown);
    assert_eq!(client.calls(), 2, "github and front-page reports both generated");
    assert!(dir
        .path()
        .join("github/octocat_hello-world/2026-10-14_2026-10-16_report.md")
        .exists());
    assert!(dir.path().join("hacker_news/2026-10-16_report.md").exists());
}

#[tokio::test]
async fn failing_run_stops_the_daemon_with_error() {
    struct Broken;

    #[async_trait]
    impl ScheduledJob for Broken {
        async fn run(&self, _now: NaiveDateTime) -> anyhow::Result<()> {
            anyhow::bail!("registry unreadable")
        }
    }

    let (_tx, rx) = watch::channel(false);
    let err = Daemon::new(
        Arc::new(ManualClock::new(at())),
        Arc::new(Broken),
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
    )
    .run_on_start(true)
    .run(rx)
    .await
    .unwrap_err();
    assert_eq!(format!("{err:#}"), "scheduled run failed: registry unreadable");
}
