// src/notify/mod.rs
//! Push delivery of finished reports. Failures are logged and counted, never
//! propagated: the report is already on disk when a notifier runs.

pub mod email;
pub mod slack;

use async_trait::async_trait;
use metrics::counter;

use crate::config::app::NotifyConfig;
use crate::error::DeliveryError;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs, e.g. "email".
    fn channel(&self) -> &'static str;

    async fn notify(&self, subject: &str, report: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Fans a report out to every configured channel.
#[derive(Default)]
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, n: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(n));
        self
    }

    pub fn push(&mut self, n: Box<dyn Notifier>) {
        self.notifiers.push(n);
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn channels(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    /// Build the channels enabled in config. A channel whose settings are
    /// incomplete is skipped with a warning.
    pub fn from_config(cfg: &NotifyConfig) -> Self {
        let mut mux = Self::new();
        if let Some(email_cfg) = &cfg.email {
            match email::EmailNotifier::from_config(email_cfg) {
                Ok(n) => mux.push(Box::new(n)),
                Err(e) => tracing::warn!(error = %e, "email notifications disabled"),
            }
        }
        if let Some(url) = cfg.slack_webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            mux.push(Box::new(slack::SlackNotifier::new(url.to_string())));
        }
        if mux.is_empty() {
            tracing::debug!("no notification channels configured");
        }
        mux
    }

    pub async fn notify(&self, subject: &str, report: &str) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome::default();
        for n in &self.notifiers {
            match n.notify(subject, report).await {
                Ok(()) => {
                    outcome.sent += 1;
                    tracing::info!(channel = n.channel(), subject, "notification sent");
                }
                Err(e) => {
                    outcome.failed += 1;
                    counter!("digest_delivery_failures_total", "channel" => n.channel())
                        .increment(1);
                    tracing::error!(channel = n.channel(), error = %e, "notification failed");
                }
            }
        }
        outcome
    }
}
