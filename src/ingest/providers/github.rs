// src/ingest/providers/github.rs
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::SourceError;
use crate::ingest::normalize_text;
use crate::ingest::store::{write_atomic, ArtifactStore};
use crate::ingest::types::{
    mismatched_listing, CommitEntry, FetchRequest, FetchScope, IssueEntry, Listing, RepoActivity,
    SourceAdapter, SourceKind,
};
use crate::ingest::window::TimeWindow;

const NAME: &str = "github";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    author: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiGitAuthor>,
}

#[derive(Debug, Deserialize)]
struct ApiGitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    state: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
    /// Present when an "issue" is really a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

/// Raw API payloads for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct GithubFixture {
    pub commits: String,
    pub pulls: String,
    pub issues: String,
}

enum Mode {
    Fixture(GithubFixture),
    Http {
        base_url: String,
        token: Option<String>,
        client: reqwest::Client,
    },
}

/// Commits, pull requests and issues of one repository within a date window.
pub struct GithubAdapter {
    mode: Mode,
}

impl GithubAdapter {
    pub fn from_fixture(fixture: GithubFixture) -> Self {
        Self {
            mode: Mode::Fixture(fixture),
        }
    }

    pub fn from_api(
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("activity-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| http_err(&e))?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                token: token.filter(|t| !t.trim().is_empty()),
                client,
            },
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        let Mode::Http {
            base_url,
            token,
            client,
        } = &self.mode
        else {
            return Err(SourceError::InvalidRequest {
                source_name: NAME,
                message: "adapter has no http transport".into(),
            });
        };

        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        let mut req = client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(query);
        if let Some(t) = token {
            req = req.bearer_auth(t);
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

    async fn load_payloads(
        &self,
        repo: &str,
        window: &TimeWindow,
    ) -> Result<GithubFixture, SourceError> {
        if let Mode::Fixture(f) = &self.mode {
            return Ok(f.clone());
        }
        let since = iso(window.start_ts());
        let until = iso(window.end_ts());
        let per_page = ("per_page", "100".to_string());

        let commits = self
            .get_json(
                &format!("/repos/{repo}/commits"),
                &[("since", since.clone()), ("until", until), per_page.clone()],
            )
            .await?;
        let pulls = self
            .get_json(
                &format!("/repos/{repo}/pulls"),
                &[
                    ("state", "all".to_string()),
                    ("sort", "updated".to_string()),
                    ("direction", "desc".to_string()),
                    per_page.clone(),
                ],
            )
            .await?;
        let issues = self
            .get_json(
                &format!("/repos/{repo}/issues"),
                &[("state", "all".to_string()), ("since", since), per_page],
            )
            .await?;
        Ok(GithubFixture {
            commits,
            pulls,
            issues,
        })
    }
}

#[async_trait]
impl SourceAdapter for GithubAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    async fn fetch(&self, req: &FetchRequest) -> Result<Listing, SourceError> {
        let repo = validate_repo(req.identifier.as_deref())?;
        let FetchScope::Window(window) = req.scope else {
            return Err(SourceError::InvalidRequest {
                source_name: NAME,
                message: "github fetch needs a day window".into(),
            });
        };

        let payloads = self.load_payloads(&repo, &window).await?;
        let activity = parse_activity(&repo, window, &payloads)?;
        tracing::debug!(
            target: "ingest",
            repo = %repo,
            commits = activity.commits.len(),
            pulls = activity.pulls.len(),
            issues = activity.issues.len(),
            "github activity fetched"
        );
        Ok(Listing::Repo(activity))
    }

    fn persist(&self, listing: &Listing, store: &ArtifactStore) -> Result<PathBuf, SourceError> {
        let Listing::Repo(activity) = listing else {
            return Err(mismatched_listing(NAME, listing));
        };
        let path = store.github_path(&activity.repo, &activity.window);
        write_atomic(&path, render_markdown(activity).as_bytes()).map_err(|err| SourceError::Io {
            path: path.clone(),
            err,
        })?;
        Ok(path)
    }
}

/// `owner/repo` with exactly one slash and no empty halves.
pub fn validate_repo(identifier: Option<&str>) -> Result<String, SourceError> {
    let repo = identifier.map(str::trim).unwrap_or_default();
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Ok(repo.to_string())
        }
        _ => Err(SourceError::InvalidRequest {
            source_name: NAME,
            message: format!("expected owner/repo, got {repo:?}"),
        }),
    }
}

fn parse_activity(
    repo: &str,
    window: TimeWindow,
    p: &GithubFixture,
) -> Result<RepoActivity, SourceError> {
    let commits: Vec<ApiCommit> = parse_list(&p.commits, "commits")?;
    let pulls: Vec<ApiIssue> = parse_list(&p.pulls, "pulls")?;
    let issues: Vec<ApiIssue> = parse_list(&p.issues, "issues")?;

    let commits = commits
        .into_iter()
        .filter_map(|c| {
            let git_author = c.commit.author.as_ref();
            let date = git_author.and_then(|a| a.date)?.naive_utc();
            if !window.contains(date) {
                return None;
            }
            let author = c
                .author
                .map(|u| u.login)
                .or_else(|| git_author.and_then(|a| a.name.clone()))
                .unwrap_or_else(|| "unknown".to_string());
            Some(CommitEntry {
                sha: c.sha,
                message: c.commit.message,
                author,
                date,
            })
        })
        .collect();

    let to_entry = |i: ApiIssue| {
        let state = if i.merged_at.is_some() {
            "merged".to_string()
        } else {
            i.state
        };
        IssueEntry {
            number: i.number,
            title: normalize_text(&i.title),
            state,
            updated_at: i.updated_at.naive_utc(),
        }
    };

    let pulls = pulls
        .into_iter()
        .filter(|p| window.contains(p.updated_at.naive_utc()))
        .map(to_entry)
        .collect();

    let issues = issues
        .into_iter()
        .filter(|i| i.pull_request.is_none() && window.contains(i.updated_at.naive_utc()))
        .map(to_entry)
        .collect();

    Ok(RepoActivity {
        repo: repo.to_string(),
        window,
        commits,
        pulls,
        issues,
    })
}

fn parse_list<T: serde::de::DeserializeOwned>(
    body: &str,
    what: &str,
) -> Result<Vec<T>, SourceError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|e| SourceError::Parse {
        source_name: NAME,
        message: format!("{what}: {e}"),
    })
}

/// Markdown grouped by category; every category is present even when empty.
pub fn render_markdown(a: &RepoActivity) -> String {
    let mut out = format!(
        "# {} activity ({} to {})\n\n",
        a.repo,
        a.window.start.format("%Y-%m-%d"),
        a.window.last().format("%Y-%m-%d")
    );

    out.push_str("## Commits\n");
    if a.commits.is_empty() {
        out.push_str("- none\n");
    }
    for c in &a.commits {
        let subject = c.message.lines().next().unwrap_or_default().trim();
        let short: String = c.sha.chars().take(7).collect();
        out.push_str(&format!("- {subject} ({short}, {})\n", c.author));
    }

    for (title, items) in [("Pull Requests", &a.pulls), ("Issues", &a.issues)] {
        out.push_str(&format!("\n## {title}\n"));
        if items.is_empty() {
            out.push_str("- none\n");
        }
        for i in items {
            out.push_str(&format!("- #{} {} [{}]\n", i.number, i.title, i.state));
        }
    }
    out
}

fn iso(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn http_err(e: &reqwest::Error) -> SourceError {
    SourceError::Http {
        source_name: NAME,
        message: e.to_string(),
    }
}
