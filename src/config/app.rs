// src/config/app.rs
use std::path::{Path, PathBuf};
use std::{env, fs};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::llm::LlmConfig;
use crate::digest::DigestMode;
use crate::error::ConfigError;
use crate::ingest::providers::{github, hacker_news, reddit};
use crate::ingest::types::SourceKind;

const ENV_PATH: &str = "DIGEST_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/digest.toml";

fn default_exec_time() -> String {
    "08:00".into()
}
fn default_window_days() -> u32 {
    1
}
fn default_poll_interval() -> u64 {
    1
}
fn default_true() -> bool {
    true
}
fn default_smtp_port() -> u16 {
    465
}
fn default_bind() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub digest: DigestSettings,
    pub sources: SourcesConfig,
    pub github: GithubConfig,
    pub hacker_news: HackerNewsConfig,
    pub reddit: RedditConfig,
    pub llm: LlmConfig,
    pub notify: NotifyConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSettings {
    /// Daily run time, "HH:MM" local time.
    #[serde(default = "default_exec_time")]
    pub exec_time: String,
    #[serde(default)]
    pub run_on_start: bool,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "DigestSettings::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "DigestSettings::default_prompts_dir")]
    pub prompts_dir: PathBuf,
    #[serde(default = "DigestSettings::default_subscriptions_file")]
    pub subscriptions_file: PathBuf,
    #[serde(default)]
    pub mode: DigestMode,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl DigestSettings {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }
    fn default_prompts_dir() -> PathBuf {
        PathBuf::from("prompts")
    }
    fn default_subscriptions_file() -> PathBuf {
        PathBuf::from("subscriptions.json")
    }

    /// Parsed `exec_time`. Only valid after [`AppConfig::validate`].
    pub fn exec_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.exec_time.trim(), "%H:%M").map_err(|e| ConfigError::Invalid {
            key: "digest.exec_time",
            message: format!("{:?} is not HH:MM ({e})", self.exec_time),
        })
    }

    /// Where inspect mode writes the would-be prompt.
    pub fn inspect_path(&self) -> PathBuf {
        self.data_dir.join("prompt.txt")
    }
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            exec_time: default_exec_time(),
            run_on_start: false,
            window_days: default_window_days(),
            data_dir: Self::default_data_dir(),
            prompts_dir: Self::default_prompts_dir(),
            subscriptions_file: Self::default_subscriptions_file(),
            mode: DigestMode::Live,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub github: bool,
    #[serde(default = "default_true")]
    pub hacker_news: bool,
    #[serde(default = "default_true")]
    pub reddit: bool,
}

impl SourcesConfig {
    pub fn enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Github => self.github,
            SourceKind::HackerNews => self.hacker_news,
            SourceKind::Reddit => self.reddit,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            github: true,
            hacker_news: true,
            reddit: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// Overridden by `GITHUB_TOKEN`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: github::DEFAULT_API_URL.into(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HackerNewsConfig {
    pub base_url: String,
    /// Keep only the first N front-page stories.
    pub top: Option<usize>,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            base_url: hacker_news::DEFAULT_BASE_URL.into(),
            top: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub subreddit: String,
    pub limit: usize,
    pub base_url: String,
    pub token_url: String,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
}

impl RedditConfig {
    pub fn credentials(&self) -> Option<reddit::RedditCredentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(reddit::RedditCredentials {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                    token_url: self.token_url.clone(),
                })
            }
            _ => None,
        }
    }

    /// Bearer tokens only work against the OAuth host, so the public default is swapped.
    pub fn api_base_url(&self) -> &str {
        if self.credentials().is_some() && self.base_url == reddit::PUBLIC_BASE_URL {
            reddit::OAUTH_BASE_URL
        } else {
            &self.base_url
        }
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddit: "programming".into(),
            limit: reddit::DEFAULT_LIMIT,
            base_url: reddit::PUBLIC_BASE_URL.into(),
            token_url: "https://www.reddit.com/api/v1/access_token".into(),
            client_id: None,
            client_secret: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub email: Option<EmailConfig>,
    #[serde(skip_serializing)]
    pub slack_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// STARTTLS on submission port instead of implicit TLS.
    #[serde(default)]
    pub starttls: bool,
    #[serde(default)]
    pub username: Option<String>,
    /// Filled from `SMTP_PASS`.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl AppConfig {
    /// Parse TOML without touching the environment.
    pub fn from_toml_str(s: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;
        let mut cfg = Self::from_toml_str(&data, path)?;
        cfg.apply_env();
        cfg.validate()?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) $DIGEST_CONFIG_PATH (must exist)
    /// 2) config/digest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::Invalid {
                    key: ENV_PATH,
                    message: format!("{} does not exist", pb.display()),
                });
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        tracing::info!("no config file found, using defaults");
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Secrets come from the environment and win over file values.
    pub fn apply_env(&mut self) {
        if let Some(t) = non_empty_env("GITHUB_TOKEN") {
            self.github.token = Some(t);
        }
        if let Some(id) = non_empty_env("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(id);
        }
        if let Some(secret) = non_empty_env("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(secret);
        }
        if let Some(url) = non_empty_env("SLACK_WEBHOOK_URL") {
            self.notify.slack_webhook_url = Some(url);
        }
        if let (Some(email), Some(pass)) =
            (self.notify.email.as_mut(), non_empty_env("SMTP_PASS"))
        {
            email.password = Some(pass);
        }
        self.llm.resolve_api_key();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.digest.exec_time()?;
        if self.digest.window_days < 1 {
            return Err(ConfigError::Invalid {
                key: "digest.window_days",
                message: "must be at least 1".into(),
            });
        }
        if self.digest.poll_interval_secs < 1 {
            return Err(ConfigError::Invalid {
                key: "digest.poll_interval_secs",
                message: "must be at least 1".into(),
            });
        }
        if self.reddit.limit == 0 {
            return Err(ConfigError::Invalid {
                key: "reddit.limit",
                message: "must be at least 1".into(),
            });
        }
        self.llm.validate()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = AppConfig::from_toml_str("", Path::new("x.toml")).unwrap();
        assert_eq!(cfg.digest.exec_time, "08:00");
        assert_eq!(cfg.digest.window_days, 1);
        assert_eq!(cfg.digest.poll_interval_secs, 1);
        assert!(cfg.sources.enabled(SourceKind::Reddit));
        assert_eq!(cfg.reddit.limit, reddit::DEFAULT_LIMIT);
        assert_eq!(cfg.digest.inspect_path(), PathBuf::from("data/prompt.txt"));
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
[digest]
exec_time = "06:30"
window_days = 3
mode = "inspect"

[sources]
reddit = false

[reddit]
subreddit = "rust"
"#,
            Path::new("x.toml"),
        )
        .unwrap();
        assert_eq!(cfg.digest.exec_time().unwrap(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(cfg.digest.window_days, 3);
        assert_eq!(cfg.digest.mode, DigestMode::Inspect);
        assert!(!cfg.sources.enabled(SourceKind::Reddit));
        assert!(cfg.sources.enabled(SourceKind::Github));
        assert_eq!(cfg.reddit.subreddit, "rust");
    }

    #[test]
    fn bad_exec_time_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.digest.exec_time = "25:99".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { key: "digest.exec_time", .. })
        ));
    }

    #[test]
    fn zero_window_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.digest.window_days = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { key: "digest.window_days", .. })
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            AppConfig::from_toml_str("[digest\nexec_time=", Path::new("bad.toml")),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn reddit_credentials_need_both_halves() {
        let mut r = RedditConfig::default();
        r.client_id = Some("id".into());
        assert!(r.credentials().is_none());
        r.client_secret = Some("secret".into());
        assert!(r.credentials().is_some());
    }

    #[test]
    fn reddit_oauth_host_only_with_credentials() {
        let mut r = RedditConfig::default();
        assert_eq!(r.api_base_url(), "https://www.reddit.com");
        r.client_id = Some("id".into());
        r.client_secret = Some("secret".into());
        assert_eq!(r.api_base_url(), "https://oauth.reddit.com");
        r.base_url = "http://127.0.0.1:9999".into();
        assert_eq!(r.api_base_url(), "http://127.0.0.1:9999");
    }
}
