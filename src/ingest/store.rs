// src/ingest/store.rs
//! On-disk layout for raw artifacts and reports.
//!
//! ```text
//! {root}/github/{owner}_{repo}/{start}_{last}.md
//! {root}/hacker_news/{date}.json
//! {root}/reddit/{subreddit}/{date}/{HH}.md   (+ {HH}.json backup)
//! ```
//! Reports sit next to their artifact as `{stem}_report.md`. Names are derived
//! only from the key, so re-runs overwrite instead of duplicating.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::ingest::types::SourceKind;
use crate::ingest::window::TimeWindow;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: SourceKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    pub fn github_path(&self, repo: &str, window: &TimeWindow) -> PathBuf {
        self.kind_dir(SourceKind::Github)
            .join(repo_dir_name(repo))
            .join(format!("{}.md", window.key()))
    }

    pub fn hacker_news_path(&self, date: NaiveDate) -> PathBuf {
        self.kind_dir(SourceKind::HackerNews)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// (markdown, json backup). Subreddit names are case-insensitive.
    pub fn reddit_paths(&self, subreddit: &str, at: NaiveDateTime) -> (PathBuf, PathBuf) {
        let dir = self
            .kind_dir(SourceKind::Reddit)
            .join(subreddit.trim().to_ascii_lowercase())
            .join(at.format("%Y-%m-%d").to_string());
        let hour = at.format("%H").to_string();
        (dir.join(format!("{hour}.md")), dir.join(format!("{hour}.json")))
    }
}

/// Report path parallel to a raw artifact: same directory, `{stem}_report.md`.
pub fn report_path_for(raw: &Path) -> PathBuf {
    let stem = raw
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    raw.with_file_name(format!("{stem}_report.md"))
}

/// `owner/repo` -> `owner_repo`, lowercased so case variants share a directory.
pub fn repo_dir_name(repo: &str) -> String {
    repo.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Write via a sibling temp file and rename, so readers never observe a
/// half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    let result = fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(contents)?;
            f.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if result.is_err() && tmp.is_file() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_path_is_parallel_to_artifact() {
        let raw = Path::new("data/github/octocat_hello-world/2026-10-14_2026-10-16.md");
        assert_eq!(
            report_path_for(raw),
            Path::new("data/github/octocat_hello-world/2026-10-14_2026-10-16_report.md")
        );
        let hn = Path::new("data/hacker_news/2026-10-16.json");
        assert_eq!(
            report_path_for(hn),
            Path::new("data/hacker_news/2026-10-16_report.md")
        );
    }

    #[test]
    fn repo_dir_name_is_case_insensitive() {
        assert_eq!(repo_dir_name("Owner/Repo"), repo_dir_name("owner/repo"));
        assert_eq!(repo_dir_name("octocat/hello-world"), "octocat_hello-world");
    }

    #[test]
    fn reddit_paths_are_keyed_by_subreddit_date_and_hour() {
        let store = ArtifactStore::new("data");
        let at = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        let (md, json) = store.reddit_paths("Rust", at);
        assert_eq!(md, Path::new("data/reddit/rust/2026-10-16/08.md"));
        assert_eq!(json, Path::new("data/reddit/rust/2026-10-16/08.json"));

        let (other, _) = store.reddit_paths("golang", at);
        assert_ne!(md, other);
    }

    #[test]
    fn write_atomic_overwrites_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested").join("a.md");
        write_atomic(&p, b"one").unwrap();
        write_atomic(&p, b"two").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "two");
        let names: Vec<_> = fs::read_dir(p.parent().unwrap())
            .unwrap()
            .flatten()
            .map(|e| e.file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory at the target makes the final rename fail
        let target = dir.path().join("report.md");
        fs::create_dir_all(target.join("occupied")).unwrap();

        assert!(write_atomic(&target, b"data").is_err());
        assert!(!dir.path().join(".report.md.tmp").exists());
    }
}
