// src/ingest/types.rs
use std::fmt;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::ingest::store::ArtifactStore;
use crate::ingest::window::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Github,
    HackerNews,
    Reddit,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] =
        [SourceKind::Github, SourceKind::HackerNews, SourceKind::Reddit];

    /// Directory name under the data root and prompt file prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Github => "github",
            SourceKind::HackerNews => "hacker_news",
            SourceKind::Reddit => "reddit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "github" | "gh" => Some(SourceKind::Github),
            "hacker_news" | "hackernews" | "hn" => Some(SourceKind::HackerNews),
            "reddit" => Some(SourceKind::Reddit),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much activity a fetch should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    Window(TimeWindow),
    Top(usize),
    Now,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Source identifier, e.g. `owner/repo`. `None` for sources without one.
    pub identifier: Option<String>,
    pub scope: FetchScope,
    /// Local wall-clock time of the run; keys date/hour based artifacts.
    pub at: NaiveDateTime,
}

impl FetchRequest {
    pub fn window(identifier: impl Into<String>, window: TimeWindow, at: NaiveDateTime) -> Self {
        Self {
            identifier: Some(identifier.into()),
            scope: FetchScope::Window(window),
            at,
        }
    }

    pub fn top(count: usize, at: NaiveDateTime) -> Self {
        Self {
            identifier: None,
            scope: FetchScope::Top(count),
            at,
        }
    }

    pub fn now(at: NaiveDateTime) -> Self {
        Self {
            identifier: None,
            scope: FetchScope::Now,
            at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: NaiveDateTime,
}

/// A pull request or an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEntry {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoActivity {
    pub repo: String,
    pub window: TimeWindow,
    pub commits: Vec<CommitEntry>,
    pub pulls: Vec<IssueEntry>,
    pub issues: Vec<IssueEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontPage {
    pub date: NaiveDate,
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    pub title: String,
    pub group: String,
    pub author: String,
    pub text: String,
    pub content_url: String,
    pub comment_url: String,
    pub up_votes: i64,
    pub num_comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotFeed {
    pub at: NaiveDateTime,
    pub subreddit: String,
    pub feeds: Vec<FeedPost>,
}

/// Raw activity returned by an adapter, before it is written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Repo(RepoActivity),
    FrontPage(FrontPage),
    Feed(HotFeed),
}

impl Listing {
    pub fn kind(&self) -> SourceKind {
        match self {
            Listing::Repo(_) => SourceKind::Github,
            Listing::FrontPage(_) => SourceKind::HackerNews,
            Listing::Feed(_) => SourceKind::Reddit,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Listing::Repo(r) => r.commits.len() + r.pulls.len() + r.issues.len(),
            Listing::FrontPage(p) => p.stories.len(),
            Listing::Feed(f) => f.feeds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One implementation per source kind. Errors never escape as panics; callers
/// decide whether a failed source is skipped.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, req: &FetchRequest) -> Result<Listing, SourceError>;

    /// Write the listing under `store`, returning the primary artifact path.
    fn persist(&self, listing: &Listing, store: &ArtifactStore) -> Result<PathBuf, SourceError>;
}

pub(crate) fn mismatched_listing(source_name: &'static str, listing: &Listing) -> SourceError {
    SourceError::InvalidRequest {
        source_name,
        message: format!("cannot persist a {} listing", listing.kind()),
    }
}
