//! Video source location over a harvested page snapshot.
//!
//! The browser session harvests the DOM facts once; the locator itself is a
//! pure ordered list of strategy functions over that snapshot, so the
//! preference order (explicit element source, then best-effort text scans)
//! is testable without a browser.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

/// File extensions accepted as evidence of a playable video URL.
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".m4v"];

/// Reserved prefix marking an ephemeral in-memory handle. Such a URL is only
/// resolvable inside the page session that created it.
pub const BLOB_PREFIX: &str = "blob:";

/// URLs in raw markup ending in a known video extension. Best-effort: there
/// is no guarantee a matched URL is reachable or belongs to the target post.
static MARKUP_VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'<>\\]+\.(?:mp4|webm|mov|m4v)"#).expect("valid pattern")
});

/// Where and how to obtain the video bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// A network-fetchable address.
    Direct(String),
    /// An ephemeral blob handle, resolvable only inside the page session.
    Blob(String),
}

/// DOM facts harvested from the loaded page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageSnapshot {
    /// Source of the primary video element, if any.
    pub primary_src: Option<String>,
    /// Sources of every video and nested source element, in document order.
    #[serde(default)]
    pub video_srcs: Vec<String>,
    /// Full rendered page markup.
    #[serde(default)]
    pub markup: String,
    /// Content attributes of every meta tag.
    #[serde(default)]
    pub meta_contents: Vec<String>,
}

impl PageSnapshot {
    /// Fill markup-derived fields from the rendered page source.
    pub fn with_markup(mut self, markup: String) -> Self {
        let document = Html::parse_document(&markup);
        if let Ok(selector) = Selector::parse("meta[content]") {
            self.meta_contents = document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::to_string)
                .collect();
        }
        self.markup = markup;
        self
    }
}

fn has_video_extension(url: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|ext| url.contains(ext))
}

fn primary_direct(snapshot: &PageSnapshot) -> Option<VideoSource> {
    let src = snapshot.primary_src.as_deref()?;
    if src.is_empty() || src.starts_with(BLOB_PREFIX) {
        return None;
    }
    Some(VideoSource::Direct(src.to_string()))
}

fn primary_blob(snapshot: &PageSnapshot) -> Option<VideoSource> {
    let src = snapshot.primary_src.as_deref()?;
    src.starts_with(BLOB_PREFIX)
        .then(|| VideoSource::Blob(src.to_string()))
}

fn source_scan(snapshot: &PageSnapshot) -> Option<VideoSource> {
    snapshot
        .video_srcs
        .iter()
        .find(|src| has_video_extension(src))
        .map(|src| VideoSource::Direct(src.clone()))
}

fn markup_scan(snapshot: &PageSnapshot) -> Option<VideoSource> {
    MARKUP_VIDEO_URL
        .find(&snapshot.markup)
        .map(|m| VideoSource::Direct(m.as_str().to_string()))
}

fn meta_scan(snapshot: &PageSnapshot) -> Option<VideoSource> {
    snapshot
        .meta_contents
        .iter()
        .find(|content| has_video_extension(content))
        .map(|content| VideoSource::Direct(content.clone()))
}

type Strategy = fn(&PageSnapshot) -> Option<VideoSource>;

/// Ordered strategies; explicit element sources win over text scanning.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("primary-direct", primary_direct),
    ("primary-blob", primary_blob),
    ("source-scan", source_scan),
    ("markup-scan", markup_scan),
    ("meta-scan", meta_scan),
];

/// Locate a playable video source in the snapshot. First match wins.
pub fn locate(snapshot: &PageSnapshot) -> Option<VideoSource> {
    for (name, strategy) in STRATEGIES {
        if let Some(source) = strategy(snapshot) {
            debug!(strategy = name, ?source, "video source located");
            return Some(source);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PageSnapshot {
        PageSnapshot::default()
    }

    #[test]
    fn primary_direct_source_wins() {
        let snap = PageSnapshot {
            primary_src: Some("https://cdn.example.com/clip.mp4".into()),
            video_srcs: vec!["https://cdn.example.com/other.mp4".into()],
            ..snapshot()
        };
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Direct("https://cdn.example.com/clip.mp4".into()))
        );
    }

    #[test]
    fn primary_direct_source_kept_without_extension() {
        // A primary src without a known extension is still an explicit signal.
        let snap = PageSnapshot {
            primary_src: Some("https://cdn.example.com/stream?id=9".into()),
            ..snapshot()
        };
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Direct("https://cdn.example.com/stream?id=9".into()))
        );
    }

    #[test]
    fn blob_source_tagged_ephemeral() {
        let snap = PageSnapshot {
            primary_src: Some("blob:https://social.example/34c1".into()),
            ..snapshot()
        };
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Blob("blob:https://social.example/34c1".into()))
        );
    }

    #[test]
    fn falls_back_to_secondary_sources() {
        let snap = PageSnapshot {
            primary_src: None,
            video_srcs: vec![
                "https://cdn.example.com/poster.jpg".into(),
                "https://cdn.example.com/clip.webm".into(),
            ],
            ..snapshot()
        };
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Direct("https://cdn.example.com/clip.webm".into()))
        );
    }

    #[test]
    fn falls_back_to_markup_scan() {
        let snap = PageSnapshot::default()
            .with_markup(r#"<html><script>var u = "https://v.example.com/a/b.mp4";</script></html>"#.into());
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Direct("https://v.example.com/a/b.mp4".into()))
        );
    }

    #[test]
    fn falls_back_to_meta_tags() {
        let snap = PageSnapshot::default().with_markup(
            r#"<html><head><meta property="og:video" content="//v.example.com/c.mp4"></head></html>"#
                .into(),
        );
        // No absolute markup URL, so the meta strategy picks it up.
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Direct("//v.example.com/c.mp4".into()))
        );
    }

    #[test]
    fn nothing_matches() {
        let snap = PageSnapshot::default()
            .with_markup("<html><body><p>no media here</p></body></html>".into());
        assert_eq!(locate(&snap), None);
    }

    #[test]
    fn empty_primary_src_ignored() {
        let snap = PageSnapshot {
            primary_src: Some(String::new()),
            video_srcs: vec!["https://cdn.example.com/clip.m4v".into()],
            ..snapshot()
        };
        assert_eq!(
            locate(&snap),
            Some(VideoSource::Direct("https://cdn.example.com/clip.m4v".into()))
        );
    }
}
