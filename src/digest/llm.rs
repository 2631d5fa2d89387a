// src/digest/llm.rs
//! Text-generation clients. `OpenAiClient` talks to any OpenAI-compatible chat
//! completions endpoint; `FixedClient` answers from memory for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One system + one user message in, generated text out.
    async fn complete(&self, system: &str, user: &str) -> Result<String, BackendError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("activity-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.3,
        })
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(map_reqwest)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorEnvelope>(&bytes)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).chars().take(200).collect());
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Resp =
            serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(BackendError::EmptyCompletion);
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn map_reqwest(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Http(e.to_string())
    }
}

/// Answers every call with the same outcome and counts calls.
pub struct FixedClient {
    outcome: FixedOutcome,
    calls: AtomicUsize,
}

enum FixedOutcome {
    Text(String),
    Fail { status: u16, message: String },
}

impl FixedClient {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            outcome: FixedOutcome::Text(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            outcome: FixedOutcome::Fail {
                status,
                message: message.into(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FixedClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            FixedOutcome::Text(t) => Ok(t.clone()),
            FixedOutcome::Fail { status, message } => Err(BackendError::Api {
                status: *status,
                message: message.clone(),
            }),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}
