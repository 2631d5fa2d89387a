// src/ingest/providers/reddit.rs
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;
use crate::ingest::store::{write_atomic, ArtifactStore};
use crate::ingest::types::{
    mismatched_listing, FeedPost, FetchRequest, FetchScope, HotFeed, Listing, SourceAdapter,
    SourceKind,
};
use crate::ingest::{normalize_block, normalize_text};

const NAME: &str = "reddit";
pub const PUBLIC_BASE_URL: &str = "https://www.reddit.com";
pub const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_LIMIT: usize = 5;
/// A subreddit can pin at most two posts; they are requested on top of the limit and skipped.
const MAX_STICKIED: usize = 2;
const PERMALINK_HOST: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct ApiListing {
    data: ApiListingData,
}

#[derive(Debug, Deserialize)]
struct ApiListingData {
    #[serde(default)]
    children: Vec<ApiChild>,
}

#[derive(Debug, Deserialize)]
struct ApiChild {
    data: ApiSubmission,
}

#[derive(Debug, Deserialize)]
struct ApiSubmission {
    title: String,
    subreddit: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    permalink: String,
    #[serde(default)]
    ups: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    stickied: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Script-app credentials for the OAuth client-credentials grant.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// e.g. `https://www.reddit.com/api/v1/access_token`
    pub token_url: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .finish()
    }
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        credentials: Option<RedditCredentials>,
        client: reqwest::Client,
    },
}

/// Hot submissions of one subreddit.
pub struct RedditAdapter {
    subreddit: String,
    mode: Mode,
}

impl RedditAdapter {
    pub fn from_fixture(subreddit: &str, listing_json: &str) -> Self {
        Self {
            subreddit: subreddit.to_string(),
            mode: Mode::Fixture(listing_json.to_string()),
        }
    }

    /// Without credentials the public JSON listing at `base_url` is used.
    pub fn from_http(
        subreddit: &str,
        base_url: &str,
        credentials: Option<RedditCredentials>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("activity-digest/", env!("CARGO_PKG_VERSION"), " (digest bot)"))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| http_err(&e))?;
        Ok(Self {
            subreddit: subreddit.to_string(),
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                credentials,
                client,
            },
        })
    }

    async fn load(&self, subreddit: &str, limit: usize) -> Result<String, SourceError> {
        let (base_url, credentials, client) = match &self.mode {
            Mode::Fixture(s) => return Ok(s.clone()),
            Mode::Http {
                base_url,
                credentials,
                client,
            } => (base_url, credentials, client),
        };

        let mut req = client
            .get(format!("{base_url}/r/{subreddit}/hot.json"))
            .query(&[
                ("limit", (limit + MAX_STICKIED).to_string()),
                ("raw_json", "1".to_string()),
            ]);
        if let Some(creds) = credentials {
            let token = fetch_token(client, creds).await?;
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| http_err(&e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_name: NAME,
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|e| http_err(&e))
    }
}

async fn fetch_token(
    client: &reqwest::Client,
    creds: &RedditCredentials,
) -> Result<String, SourceError> {
    let resp = client
        .post(&creds.token_url)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(|e| http_err(&e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            source_name: NAME,
            status: status.as_u16(),
        });
    }
    let token: TokenResponse = resp.json().await.map_err(|e| SourceError::Parse {
        source_name: NAME,
        message: format!("token response: {e}"),
    })?;
    Ok(token.access_token)
}

/// Extract the fields a digest needs; pinned (stickied) posts are skipped.
pub fn parse_feeds(body: &str, limit: usize) -> Result<Vec<FeedPost>, SourceError> {
    let listing: ApiListing = serde_json::from_str(body).map_err(|e| SourceError::Parse {
        source_name: NAME,
        message: e.to_string(),
    })?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| c.data)
        .filter(|s| !s.stickied)
        .take(limit)
        .map(|s| FeedPost {
            title: normalize_text(&s.title),
            group: s.subreddit,
            author: s.author.unwrap_or_else(|| "[deleted]".to_string()),
            text: normalize_block(&s.selftext),
            content_url: s.url,
            comment_url: format!("{PERMALINK_HOST}{}", s.permalink),
            up_votes: s.ups,
            num_comments: s.num_comments,
        })
        .collect())
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn fetch(&self, req: &FetchRequest) -> Result<Listing, SourceError> {
        let subreddit = req
            .identifier
            .as_deref()
            .map(|s| s.trim().trim_start_matches("r/").to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.subreddit.clone());
        validate_subreddit(&subreddit)?;
        let limit = match req.scope {
            FetchScope::Top(n) => n.max(1),
            _ => DEFAULT_LIMIT,
        };

        tracing::debug!(target: "ingest", subreddit = %subreddit, limit, "fetching hot feeds");
        let body = self.load(&subreddit, limit).await?;
        let feeds = parse_feeds(&body, limit)?;
        tracing::info!(
            target: "ingest",
            subreddit = %subreddit,
            count = feeds.len(),
            "hot feeds fetched"
        );

        Ok(Listing::Feed(HotFeed {
            at: req.at,
            subreddit,
            feeds,
        }))
    }

    /// Writes the Markdown rendering and a JSON backup; returns the Markdown path.
    fn persist(&self, listing: &Listing, store: &ArtifactStore) -> Result<PathBuf, SourceError> {
        let Listing::Feed(feed) = listing else {
            return Err(mismatched_listing(NAME, listing));
        };
        let (md_path, json_path) = store.reddit_paths(&feed.subreddit, feed.at);

        write_atomic(&md_path, render_markdown(feed).as_bytes()).map_err(|err| SourceError::Io {
            path: md_path.clone(),
            err,
        })?;

        let json = serde_json::to_vec_pretty(&feed.feeds).map_err(|e| SourceError::Parse {
            source_name: NAME,
            message: e.to_string(),
        })?;
        write_atomic(&json_path, &json).map_err(|err| SourceError::Io {
            path: json_path.clone(),
            err,
        })?;

        tracing::info!(target: "ingest", path = %md_path.display(), "reddit hot feeds exported");
        Ok(md_path)
    }
}

/// Subreddit names are ASCII letters, digits and underscores.
pub fn validate_subreddit(name: &str) -> Result<(), SourceError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(());
    }
    Err(SourceError::InvalidRequest {
        source_name: NAME,
        message: format!("invalid subreddit name {name:?}"),
    })
}

pub fn render_markdown(feed: &HotFeed) -> String {
    let mut out = format!(
        "# Reddit hot feeds ({} {}:00)\n\n",
        feed.at.format("%Y-%m-%d"),
        feed.at.format("%H")
    );
    for p in &feed.feeds {
        let mut lines = vec![
            format!("#### [{}]({})", p.title, p.comment_url),
            format!(
                "r/{} · u/{} · {} points · {} comments",
                p.group, p.author, p.up_votes, p.num_comments
            ),
        ];
        if !p.text.is_empty() {
            lines.push(p.text.clone());
        }
        if !p.content_url.is_empty() && p.content_url != p.comment_url {
            lines.push(format!("Link: {}", p.content_url));
        }
        out.push_str(&lines.join("\n"));
        out.push_str("\n\n");
    }
    out
}

fn http_err(e: &reqwest::Error) -> SourceError {
    SourceError::Http {
        source_name: NAME,
        message: e.to_string(),
    }
}
