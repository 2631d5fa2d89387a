// src/config/llm.rs
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::digest::llm::{self, FixedClient, LlmClient, OpenAiClient};
use crate::digest::{DigestMode, DRY_RUN_SENTINEL};
use crate::error::ConfigError;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openai,
    /// Always answers with `fixed_text`; for local runs without an API key.
    Fixed,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    #[serde(default = "LlmConfig::default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "LlmConfig::default_api_key", skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub fixed_text: Option<String>,
}

impl LlmConfig {
    fn default_model() -> String {
        llm::DEFAULT_MODEL.into()
    }
    fn default_base_url() -> String {
        llm::DEFAULT_BASE_URL.into()
    }
    fn default_api_key() -> String {
        "ENV".into()
    }

    /// Replaces the "ENV" placeholder. Leaves it empty when the variable is unset.
    pub fn resolve_api_key(&mut self) {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(API_KEY_ENV).map(|v| v.trim().to_string()).unwrap_or_default();
        }
    }

    /// The API key is checked when the client is built, not here, so
    /// commands that never call the backend work without one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                key: "llm.temperature",
                message: format!("{} outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }

    fn needs_key(&self, mode: DigestMode) -> bool {
        self.provider == LlmProvider::Openai && mode == DigestMode::Live
    }

    fn has_key(&self) -> bool {
        let k = self.api_key.trim();
        !k.is_empty() && !k.eq_ignore_ascii_case("env")
    }

    /// In inspect mode the client is never called, so no key is required.
    pub fn build_client(&self, mode: DigestMode) -> Result<Arc<dyn LlmClient>, ConfigError> {
        match self.provider {
            LlmProvider::Fixed => {
                let text = self.fixed_text.clone().unwrap_or_else(|| DRY_RUN_SENTINEL.to_string());
                Ok(Arc::new(FixedClient::ok(text)))
            }
            LlmProvider::Openai if !self.has_key() => {
                if self.needs_key(mode) {
                    return Err(ConfigError::MissingCredential(API_KEY_ENV));
                }
                tracing::debug!("no api key; inspect mode uses a placeholder client");
                Ok(Arc::new(FixedClient::ok(DRY_RUN_SENTINEL)))
            }
            LlmProvider::Openai => {
                tracing::info!(
                    model = %self.model,
                    base_url = %self.base_url,
                    key_len = self.api_key.len(),
                    "openai client configured"
                );
                let client = OpenAiClient::new(
                    self.api_key.clone(),
                    self.base_url.clone(),
                    self.model.clone(),
                    Duration::from_secs(self.timeout_secs.max(1)),
                )
                .map_err(|e| ConfigError::Invalid {
                    key: "llm",
                    message: e.to_string(),
                })?
                .with_temperature(self.temperature);
                Ok(Arc::new(client))
            }
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Openai,
            model: Self::default_model(),
            base_url: Self::default_base_url(),
            api_key: Self::default_api_key(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            fixed_text: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &format_args!("<{} chars>", self.api_key.len()))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}
