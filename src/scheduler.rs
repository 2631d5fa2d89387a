// src/scheduler.rs
//! Unattended daily runs. A sleep-poll loop that compares wall-clock time to
//! the next due time; shutdown requests are honoured between ticks only.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::pipeline::{plan_jobs, DigestPipeline};
use crate::registry::SubscriptionRegistry;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays.
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(Arc::new(Mutex::new(at)))
    }

    pub fn set(&self, at: NaiveDateTime) {
        if let Ok(mut g) = self.0.lock() {
            *g = at;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.0.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Fires once per calendar day at a fixed local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    next: NaiveDateTime,
}

impl DailySchedule {
    /// First run is today if `at` is still ahead, otherwise tomorrow.
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        Self {
            at,
            next: next_after(at, now),
        }
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next
    }

    /// Re-arm for the next calendar day after `now`.
    pub fn rearm(&mut self, now: NaiveDateTime) {
        self.next = next_after(self.at, now);
    }
}

fn next_after(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(at))
            .unwrap_or(NaiveDateTime::MAX)
    }
}

/// Work the daemon triggers. Errors escaping here stop the daemon.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run(&self, now: NaiveDateTime) -> Result<()>;
}

/// Plans jobs from the registry (re-read every run) and runs the pipeline.
pub struct DigestRun {
    pipeline: Arc<DigestPipeline>,
    config: Arc<AppConfig>,
}

impl DigestRun {
    pub fn new(pipeline: Arc<DigestPipeline>, config: Arc<AppConfig>) -> Self {
        Self { pipeline, config }
    }
}

#[async_trait]
impl ScheduledJob for DigestRun {
    async fn run(&self, now: NaiveDateTime) -> Result<()> {
        let registry = SubscriptionRegistry::open(&self.config.digest.subscriptions_file)
            .context("loading subscriptions")?;
        let jobs = plan_jobs(&registry, &self.config, now).context("planning jobs")?;
        tracing::info!(target: "daemon", jobs = jobs.len(), "starting digest run");
        self.pipeline.run_all(&jobs).await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Running,
    ShuttingDown,
}

pub struct Daemon {
    clock: Arc<dyn Clock>,
    job: Arc<dyn ScheduledJob>,
    exec_time: NaiveTime,
    poll_interval: Duration,
    run_on_start: bool,
}

impl Daemon {
    pub fn new(clock: Arc<dyn Clock>, job: Arc<dyn ScheduledJob>, exec_time: NaiveTime) -> Self {
        Self {
            clock,
            job,
            exec_time,
            poll_interval: Duration::from_secs(1),
            run_on_start: false,
        }
    }

    pub fn from_config(
        cfg: &AppConfig,
        clock: Arc<dyn Clock>,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<Self> {
        let exec_time = cfg.digest.exec_time()?;
        Ok(Self::new(clock, job, exec_time)
            .poll_interval(Duration::from_secs(cfg.digest.poll_interval_secs.max(1)))
            .run_on_start(cfg.digest.run_on_start))
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn run_on_start(mut self, yes: bool) -> Self {
        self.run_on_start = yes;
        self
    }

    /// Runs until `shutdown` turns true (or its sender is dropped). A job in
    /// progress always finishes first. A job error is returned as-is.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<DaemonState> {
        let mut state = DaemonState::Running;
        tracing::info!(target: "daemon", exec_time = %self.exec_time, "daemon started");

        if self.run_on_start {
            self.tick(self.clock.now()).await?;
        }
        let mut schedule = DailySchedule::new(self.exec_time, self.clock.now());
        tracing::info!(target: "daemon", next_run = %schedule.next_run(), "scheduled");

        while state == DaemonState::Running {
            if *shutdown.borrow_and_update() {
                state = DaemonState::ShuttingDown;
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        state = DaemonState::ShuttingDown;
                    }
                    continue;
                }
            }

            let now = self.clock.now();
            if schedule.is_due(now) {
                self.tick(now).await?;
                schedule.rearm(self.clock.now());
                tracing::info!(target: "daemon", next_run = %schedule.next_run(), "re-armed");
            }
        }

        tracing::info!(target: "daemon", "shutdown requested, daemon stopped");
        Ok(state)
    }

    async fn tick(&self, now: NaiveDateTime) -> Result<()> {
        let t0 = std::time::Instant::now();
        match self.job.run(now).await {
            Ok(()) => {
                tracing::info!(
                    target: "daemon",
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "tick finished"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target: "daemon",
                    error = %format!("{e:#}"),
                    "tick failed, stopping daemon"
                );
                Err(e.context("scheduled run failed"))
            }
        }
    }
}

/// Flip `tx` to true on SIGTERM or Ctrl-C.
pub fn spawn_signal_listener(tx: watch::Sender<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!(target: "daemon", "termination signal received");
        let _ = tx.send(true);
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = term.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn first_run_today_when_still_ahead() {
        let s = DailySchedule::new(eight(), dt(16, 7, 30));
        assert_eq!(s.next_run(), dt(16, 8, 0));
        assert!(!s.is_due(dt(16, 7, 59)));
        assert!(s.is_due(dt(16, 8, 0)));
    }

    #[test]
    fn first_run_tomorrow_when_passed() {
        let s = DailySchedule::new(eight(), dt(16, 8, 0));
        assert_eq!(s.next_run(), dt(17, 8, 0));
    }

    #[test]
    fn rearm_moves_to_next_day() {
        let mut s = DailySchedule::new(eight(), dt(16, 7, 0));
        s.rearm(dt(16, 8, 0));
        assert_eq!(s.next_run(), dt(17, 8, 0));
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl ScheduledJob for Counting {
        async fn run(&self, _now: NaiveDateTime) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_once_when_due_then_waits_for_tomorrow() {
        let clock = ManualClock::new(dt(16, 7, 59));
        let job = Arc::new(Counting::default());
        let (tx, rx) = watch::channel(false);
        let daemon = Daemon::new(Arc::new(clock.clone()), job.clone(), eight());
        let handle = tokio::spawn(daemon.run(rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(job.0.load(Ordering::SeqCst), 0);

        clock.set(dt(16, 8, 0));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(job.0.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(job.0.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        let state = handle.await.unwrap().unwrap();
        assert_eq!(state, DaemonState::ShuttingDown);
    }

    struct Failing;

    #[async_trait]
    impl ScheduledJob for Failing {
        async fn run(&self, _now: NaiveDateTime) -> Result<()> {
            anyhow::bail!("registry unreadable")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_error_stops_daemon_with_error() {
        let clock = ManualClock::new(dt(16, 9, 0));
        let (_tx, rx) = watch::channel(false);
        let daemon = Daemon::new(Arc::new(clock), Arc::new(Failing), eight()).run_on_start(true);
        let err = daemon.run(rx).await.unwrap_err();
        assert!(format!("{err:#}").contains("registry unreadable"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_counts_as_shutdown() {
        let clock = ManualClock::new(dt(16, 9, 0));
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let daemon = Daemon::new(Arc::new(clock), Arc::new(Counting::default()), eight());
        assert_eq!(daemon.run(rx).await.unwrap(), DaemonState::ShuttingDown);
    }
}
