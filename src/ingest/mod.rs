// src/ingest/mod.rs
pub mod providers;
pub mod store;
pub mod types;
pub mod window;

use std::path::PathBuf;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::error::SourceError;
use crate::ingest::store::ArtifactStore;
use crate::ingest::types::{FetchRequest, SourceAdapter};

/// Body text longer than this is truncated before it reaches the artifact.
pub const MAX_BODY_CHARS: usize = 4000;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items fetched from sources.");
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse/persist errors."
        );
        describe_counter!("ingest_artifacts_written_total", "Raw artifacts written.");
        describe_histogram!("ingest_fetch_ms", "Source fetch time in milliseconds.");
    });
}

/// Single-line text: entities decoded, tags stripped, whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    let out = decode_and_strip(s);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Multi-line text: like [`normalize_text`] per line, but paragraph breaks survive
/// and the result is capped at [`MAX_BODY_CHARS`].
pub fn normalize_block(s: &str) -> String {
    let decoded = decode_and_strip(s);

    static RE_HWS: OnceCell<regex::Regex> = OnceCell::new();
    let re_hws = RE_HWS.get_or_init(|| regex::Regex::new(r"[ \t\u{00A0}]+").expect("static regex"));

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let line = re_hws.replace_all(line, " ").trim().to_string();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    let mut out = paragraphs.join("\n\n");
    if out.chars().count() > MAX_BODY_CHARS {
        out = out.chars().take(MAX_BODY_CHARS).collect();
        out.push('…');
    }
    out
}

fn decode_and_strip(s: &str) -> String {
    let out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags =
        RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("static regex"));
    let out = re_tags.replace_all(&out, "").to_string();

    out.replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Fetch then persist through one adapter. Empty listings are reported as
/// [`SourceError::Empty`] so every source treats "nothing new" the same way.
pub async fn fetch_and_persist(
    adapter: &dyn SourceAdapter,
    req: &FetchRequest,
    store: &ArtifactStore,
) -> Result<PathBuf, SourceError> {
    ensure_metrics_described();
    let kind = adapter.kind();

    let t0 = std::time::Instant::now();
    let fetched = adapter.fetch(req).await;
    histogram!("ingest_fetch_ms", "kind" => kind.as_str())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);

    let result = fetched.and_then(|listing| {
        if listing.is_empty() {
            return Err(SourceError::Empty {
                source_name: kind.as_str(),
                what: describe_request(req),
            });
        }
        counter!("ingest_items_total", "kind" => kind.as_str()).increment(listing.len() as u64);
        adapter.persist(&listing, store)
    });

    match &result {
        Ok(path) => {
            counter!("ingest_artifacts_written_total", "kind" => kind.as_str()).increment(1);
            tracing::info!(
                target: "ingest",
                kind = %kind,
                path = %path.display(),
                "artifact written"
            );
        }
        Err(e) => {
            counter!("ingest_source_errors_total", "kind" => kind.as_str()).increment(1);
            if e.is_empty_result() {
                tracing::warn!(
                    target: "ingest",
                    kind = %kind,
                    error = %e,
                    "source returned nothing"
                );
            } else {
                tracing::warn!(target: "ingest", kind = %kind, error = %e, "source fetch failed");
            }
        }
    }
    result
}

fn describe_request(req: &FetchRequest) -> String {
    use crate::ingest::types::FetchScope;
    let ident = req.identifier.as_deref().unwrap_or("front page");
    match req.scope {
        FetchScope::Window(w) => format!("{ident} in {}", w.key()),
        FetchScope::Top(n) => format!("top {n} of {ident}"),
        FetchScope::Now => ident.to_string(),
    }
}
