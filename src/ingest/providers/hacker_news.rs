// src/ingest/providers/hacker_news.rs
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::SourceError;
use crate::ingest::normalize_text;
use crate::ingest::store::{write_atomic, ArtifactStore};
use crate::ingest::types::{
    mismatched_listing, FetchRequest, FetchScope, FrontPage, Listing, SourceAdapter, SourceKind,
    Story,
};

const NAME: &str = "hacker_news";
pub const DEFAULT_BASE_URL: &str = "https://news.ycombinator.com";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
}

enum Mode {
    // Own copy so tests can pass borrowed strings.
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
    },
}

/// Current front page of the link aggregator, in rank order. No time window.
pub struct HackerNewsAdapter {
    mode: Mode,
}

impl HackerNewsAdapter {
    pub fn from_fixture(rss: &str) -> Self {
        Self {
            mode: Mode::Fixture(rss.to_string()),
        }
    }

    pub fn from_url(base_url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("activity-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Http {
                source_name: NAME,
                message: e.to_string(),
            })?;
        Ok(Self {
            mode: Mode::Http {
                url: format!("{}/rss", base_url.trim_end_matches('/')),
                client,
            },
        })
    }

    async fn load(&self) -> Result<String, SourceError> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => {
                let resp = client.get(url).send().await.map_err(|e| SourceError::Http {
                    source_name: NAME,
                    message: e.to_string(),
                })?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(SourceError::Status {
                        source_name: NAME,
                        status: status.as_u16(),
                    });
                }
                resp.text().await.map_err(|e| SourceError::Http {
                    source_name: NAME,
                    message: e.to_string(),
                })
            }
        }
    }
}

pub fn parse_stories(xml: &str) -> Result<Vec<Story>, SourceError> {
    let rss: Rss = from_str(xml).map_err(|e| SourceError::Parse {
        source_name: NAME,
        message: e.to_string(),
    })?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| {
            let title = normalize_text(it.title.as_deref()?);
            let link = it.link?.trim().to_string();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(Story { title, link })
        })
        .collect())
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::HackerNews
    }

    async fn fetch(&self, req: &FetchRequest) -> Result<Listing, SourceError> {
        let body = self.load().await?;
        let mut stories = parse_stories(&body)?;
        if let FetchScope::Top(n) = req.scope {
            stories.truncate(n);
        }
        Ok(Listing::FrontPage(FrontPage {
            date: req.at.date(),
            stories,
        }))
    }

    fn persist(&self, listing: &Listing, store: &ArtifactStore) -> Result<PathBuf, SourceError> {
        let Listing::FrontPage(page) = listing else {
            return Err(mismatched_listing(NAME, listing));
        };
        let path = store.hacker_news_path(page.date);
        let json = serde_json::to_vec_pretty(&page.stories).map_err(|e| SourceError::Parse {
            source_name: NAME,
            message: e.to_string(),
        })?;
        write_atomic(&path, &json).map_err(|err| SourceError::Io {
            path: path.clone(),
            err,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>Hacker News</title><link>https://news.ycombinator.com/</link>
<item><title>Show HN: A tiny &amp; fast parser</title><link>https://example.com/a</link>
<comments>https://news.ycombinator.com/item?id=1</comments></item>
<item><title>Second story</title><link>https://example.com/b</link></item>
<item><title></title><link>https://example.com/empty</link></item>
</channel></rss>"#;

    #[test]
    fn parses_title_and_link_in_order() {
        let stories = parse_stories(RSS).unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title, "Show HN: A tiny & fast parser");
        assert_eq!(stories[0].link, "https://example.com/a");
        assert_eq!(stories[1].title, "Second story");
    }

    #[test]
    fn channel_without_items_is_empty_not_error() {
        let xml = r#"<rss><channel><title>x</title></channel></rss>"#;
        assert!(parse_stories(xml).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(parse_stories("<html>"), Err(SourceError::Parse { .. })));
    }
}
