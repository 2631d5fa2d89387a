// tests/common/mod.rs
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use activity_digest::digest::{
    DigestBackend, DigestMode, FixedClient, PromptTemplate, ReportGenerator,
};
use activity_digest::ingest::providers::github::{GithubAdapter, GithubFixture};
use activity_digest::ingest::providers::hacker_news::HackerNewsAdapter;
use activity_digest::ingest::providers::reddit::RedditAdapter;
use activity_digest::SourceKind;
use chrono::{NaiveDate, NaiveDateTime};

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

/// 2026-10-16 08:30 local.
pub fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap()
}

pub fn github_adapter() -> GithubAdapter {
    GithubAdapter::from_fixture(GithubFixture {
        commits: fixture("github_commits.json"),
        pulls: fixture("github_pulls.json"),
        issues: fixture("github_issues.json"),
    })
}

pub fn hacker_news_adapter() -> HackerNewsAdapter {
    HackerNewsAdapter::from_fixture(&fixture("hn_rss.xml"))
}

pub fn reddit_adapter() -> RedditAdapter {
    RedditAdapter::from_fixture("rust", &fixture("reddit_hot.json"))
}

pub fn generator(client: Arc<FixedClient>, kind: SourceKind, data: &Path) -> ReportGenerator {
    generator_in_mode(client, kind, data, DigestMode::Live)
}

pub fn generator_in_mode(
    client: Arc<FixedClient>,
    kind: SourceKind,
    data: &Path,
    mode: DigestMode,
) -> ReportGenerator {
    ReportGenerator::new(DigestBackend::new(
        client,
        PromptTemplate::builtin(kind),
        mode,
        data.join("prompt.txt"),
    ))
}
