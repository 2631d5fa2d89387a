use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::Notifier;
use crate::error::DeliveryError;

const CHANNEL: &str = "slack";
/// Slack rejects message text beyond roughly 40k characters.
const MAX_TEXT_CHARS: usize = 39_000;

/// Incoming-webhook notifier (Slack or any endpoint accepting `{"text": ...}`).
pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            webhook_url: url,
            client,
        }
    }
}

fn payload(subject: &str, report: &str) -> serde_json::Value {
    let mut text = format!("*{subject}*\n\n{report}");
    if text.chars().count() > MAX_TEXT_CHARS {
        text = text.chars().take(MAX_TEXT_CHARS).collect();
        text.push('…');
    }
    serde_json::json!({ "text": text })
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn notify(&self, subject: &str, report: &str) -> Result<(), DeliveryError> {
        let transport = |message: String| DeliveryError::Transport {
            channel: CHANNEL,
            message,
        };
        self.client
            .post(&self.webhook_url)
            .json(&payload(subject, report))
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| transport(e.to_string()))?;
        Ok(())
    }
}
