// src/digest/prompt.rs
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::ingest::types::SourceKind;

const GITHUB_PROMPT: &str = "You are a professional project assistant. \
From the project activity below, merge items of the same category and write a concise \
briefing for a status report. Include at least these sections: New Features, \
Main Improvements, Bug Fixes. Use Markdown headings and bullet points.";

const HACKER_NEWS_PROMPT: &str = "You are a technology trend analyst. \
From today's Hacker News front page titles and links below, identify the main technology \
themes, group related stories, and write a short Markdown briefing with a heading per theme \
and the notable stories (with links) under each.";

const REDDIT_PROMPT: &str = "You are a social media trend analyst. \
From the hot Reddit submissions below, summarize what people are discussing: the main topics, \
the communities involved and the overall mood. Write a short Markdown briefing and link \
each topic to its discussion.";

/// System instruction bound to one backend for its whole lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct PromptTemplate(Arc<str>);

impl PromptTemplate {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref().trim()))
    }

    pub fn builtin(kind: SourceKind) -> Self {
        Self::new(match kind {
            SourceKind::Github => GITHUB_PROMPT,
            SourceKind::HackerNews => HACKER_NEWS_PROMPT,
            SourceKind::Reddit => REDDIT_PROMPT,
        })
    }

    /// `{dir}/{kind}_prompt.txt` when present and non-empty, otherwise the built-in text.
    pub fn load(dir: &Path, kind: SourceKind) -> std::io::Result<Self> {
        let path = dir.join(format!("{}_prompt.txt", kind.as_str()));
        match std::fs::read_to_string(&path) {
            Ok(s) if !s.trim().is_empty() => {
                tracing::debug!(path = %path.display(), "prompt template loaded");
                Ok(Self::new(s))
            }
            Ok(_) => Ok(Self::builtin(kind)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::builtin(kind)),
            Err(e) => Err(e),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(40).collect();
        write!(f, "PromptTemplate({head:?}…)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_prefers_file_over_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reddit_prompt.txt"), "  Custom persona\n").unwrap();
        let t = PromptTemplate::load(dir.path(), SourceKind::Reddit).unwrap();
        assert_eq!(t.as_str(), "Custom persona");
    }

    #[test]
    fn missing_or_blank_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("github_prompt.txt"), "   ").unwrap();
        let gh = PromptTemplate::load(dir.path(), SourceKind::Github).unwrap();
        assert_eq!(gh, PromptTemplate::builtin(SourceKind::Github));
        let hn = PromptTemplate::load(dir.path(), SourceKind::HackerNews).unwrap();
        assert_eq!(hn, PromptTemplate::builtin(SourceKind::HackerNews));
    }
}
