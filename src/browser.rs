//! Headless Chrome session over CDP.
//!
//! One session per run: launch, navigate, harvest, optionally resolve a blob
//! handle in the page context, close. The [`PageSession`] trait is the seam
//! the pipeline drives, so tests can substitute a scripted session.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, WINDOW_HEIGHT, WINDOW_WIDTH};
use crate::error::VidgrabError;
use crate::locate::PageSnapshot;

/// How often the navigator re-checks for a visible video element.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Tracks consecutive protocol failures during the visibility poll. A dead
/// CDP connection surfaces as a protocol error instead of burning the whole
/// timeout and masquerading as an absent video element.
struct PollHealth {
    consecutive_failures: usize,
}

impl PollHealth {
    const MAX_CONSECUTIVE: usize = 3;

    fn new() -> Self {
        Self {
            consecutive_failures: 0,
        }
    }

    fn succeeded(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a failed evaluate; true once the connection looks dead.
    fn failed(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures >= Self::MAX_CONSECUTIVE
    }
}

/// True once the page has a video element with a non-zero client rect.
const VIDEO_VISIBLE_JS: &str = r#"
    (function() {
        const video = document.querySelector('video');
        if (!video) {
            return false;
        }
        const rect = video.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    })()
"#;

/// Harvest the primary video source and every video/source element src.
const SNAPSHOT_JS: &str = r#"
    (function() {
        const primary = document.querySelector('video');
        const srcs = [];
        for (const el of document.querySelectorAll('video, video source')) {
            const src = el.currentSrc || el.src || el.getAttribute('src') || '';
            if (src) {
                srcs.push(src);
            }
        }
        return {
            primary_src: primary
                ? (primary.currentSrc || primary.src || primary.getAttribute('src') || null)
                : null,
            video_srcs: srcs,
        };
    })()
"#;

/// In-page routine that resolves a blob handle to base64-encoded bytes.
/// Resolves `{ data, size }` on success or `{ error }` on rejection; the
/// host never confuses a rejected fetch with an empty payload.
fn blob_fetch_script(handle: &str) -> String {
    // JSON-serialize the handle so page-controlled content cannot break out
    // of the string literal.
    let handle_js = serde_json::to_string(handle).unwrap_or_else(|_| String::from("\"\""));
    format!(
        r#"
        (async () => {{
            try {{
                const response = await fetch({handle_js});
                if (!response.ok) {{
                    return {{ error: `HTTP ${{response.status}}: ${{response.statusText}}` }};
                }}
                const buffer = await response.arrayBuffer();
                const bytes = new Uint8Array(buffer);
                let binary = '';
                const chunk = 0x8000;
                for (let i = 0; i < bytes.length; i += chunk) {{
                    binary += String.fromCharCode.apply(null, bytes.subarray(i, i + chunk));
                }}
                return {{ data: btoa(binary), size: bytes.length }};
            }} catch (e) {{
                return {{ error: e.toString() }};
            }}
        }})()
        "#
    )
}

/// Decode the value the in-page blob routine resolved.
pub fn decode_blob_payload(value: &serde_json::Value) -> Result<Vec<u8>, VidgrabError> {
    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(VidgrabError::BlobExtraction(format!(
            "in-page fetch rejected: {error}"
        )));
    }

    let encoded = value
        .get("data")
        .and_then(|d| d.as_str())
        .ok_or_else(|| VidgrabError::BlobExtraction("in-page fetch resolved no data".into()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| VidgrabError::BlobExtraction(format!("payload is not valid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(VidgrabError::BlobExtraction("decoded payload is empty".into()));
    }

    Ok(bytes)
}

/// The page-level operations the pipeline needs from a browser session.
#[async_trait]
pub trait PageSession: Send {
    /// Load the target page, waiting until a video element is visible.
    async fn goto(&mut self, url: &str) -> Result<(), VidgrabError>;

    /// Harvest the DOM facts the locator runs over.
    async fn snapshot(&mut self) -> Result<PageSnapshot, VidgrabError>;

    /// Resolve an ephemeral blob handle to its bytes in the page context.
    async fn fetch_blob(&mut self, handle: &str) -> Result<Vec<u8>, VidgrabError>;

    /// Tear the session down. Must be safe to call after any failure.
    async fn close(&mut self);
}

/// A launched Chrome/Chromium instance and (after `goto`) its page.
pub struct ChromeSession {
    config: SessionConfig,
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
}

impl ChromeSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    /// Find a Chrome executable, honoring an explicit config path first.
    fn resolve_chrome(config: &SessionConfig) -> Result<PathBuf, VidgrabError> {
        if let Some(binary) = &config.chrome_binary {
            if binary.exists() {
                return Ok(binary.clone());
            }
            return Err(VidgrabError::BrowserLaunch(format!(
                "configured chrome binary not found: {}",
                binary.display()
            )));
        }

        for path in Self::CHROME_PATHS {
            if Path::new(path).exists() {
                return Ok(PathBuf::from(path));
            }
        }

        for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(path) = which::which(cmd) {
                return Ok(path);
            }
        }

        Err(VidgrabError::BrowserLaunch(
            "Chrome/Chromium not found. Install it (e.g. apt install chromium-browser) \
             or pass --chrome with the binary path"
                .into(),
        ))
    }

    /// Launch a browser with the fixed session profile.
    pub async fn launch(config: &SessionConfig) -> Result<Self, VidgrabError> {
        let chrome = Self::resolve_chrome(config)?;
        info!(chrome = %chrome.display(), headless = config.headless, "launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome)
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        // with_head means NOT headless, confusingly
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = &config.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder.build().map_err(VidgrabError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| VidgrabError::BrowserLaunch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            config: config.clone(),
            browser,
            handler_task,
            page: None,
        })
    }

    fn page(&self) -> Result<&Page, VidgrabError> {
        self.page
            .as_ref()
            .ok_or_else(|| VidgrabError::Cdp("no page loaded".into()))
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), VidgrabError> {
        let page = self.browser.new_page("about:blank").await?;

        // Override the user agent before any navigation happens
        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent.clone(),
        ))
        .await?;

        info!(%url, "navigating");
        page.goto(url).await?;

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut health = PollHealth::new();
        loop {
            let visible = match page.evaluate(VIDEO_VISIBLE_JS.to_string()).await {
                Ok(result) => {
                    health.succeeded();
                    result.into_value::<bool>().unwrap_or(false)
                }
                Err(e) => {
                    if health.failed() {
                        self.page = Some(page);
                        return Err(VidgrabError::Cdp(format!(
                            "visibility poll kept failing: {e}"
                        )));
                    }
                    false
                }
            };

            if visible {
                break;
            }

            if Instant::now() >= deadline {
                // Keep the page around; close() tears everything down.
                self.page = Some(page);
                return Err(VidgrabError::VideoNotFound(format!(
                    "no video element became visible within {}s",
                    self.config.timeout_secs
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        debug!("video element visible");
        self.page = Some(page);
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, VidgrabError> {
        let page = self.page()?;

        let probe: PageSnapshot = page
            .evaluate(SNAPSHOT_JS.to_string())
            .await?
            .into_value()
            .map_err(|e| VidgrabError::Cdp(format!("unreadable page snapshot: {e}")))?;

        let markup = page.content().await?;
        Ok(probe.with_markup(markup))
    }

    async fn fetch_blob(&mut self, handle: &str) -> Result<Vec<u8>, VidgrabError> {
        let page = self.page()?;
        info!(%handle, "resolving blob handle in page context");

        let result: serde_json::Value = page
            .evaluate(blob_fetch_script(handle))
            .await?
            .into_value()
            .map_err(|e| VidgrabError::BlobExtraction(format!("unreadable fetch result: {e}")))?;

        decode_blob_payload(&result)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed: {e}");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_rejected_fetch_is_an_error() {
        let err = decode_blob_payload(&json!({"error": "TypeError: Failed to fetch"}))
            .expect_err("rejection must propagate");
        assert!(matches!(err, VidgrabError::BlobExtraction(_)));
        assert!(err.to_string().contains("Failed to fetch"));
    }

    #[test]
    fn decode_missing_data_is_an_error() {
        let err = decode_blob_payload(&json!({"size": 0})).expect_err("no data");
        assert!(matches!(err, VidgrabError::BlobExtraction(_)));
    }

    #[test]
    fn decode_empty_payload_is_an_error() {
        let err = decode_blob_payload(&json!({"data": "", "size": 0})).expect_err("empty");
        assert!(matches!(err, VidgrabError::BlobExtraction(_)));
    }

    #[test]
    fn decode_round_trips_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2, 255]);
        let bytes = decode_blob_payload(&json!({"data": encoded, "size": 4})).unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 255]);
    }

    #[test]
    fn blob_script_embeds_handle() {
        let script = blob_fetch_script("blob:https://social.example/abc");
        assert!(script.contains(r#"fetch("blob:https://social.example/abc")"#));
    }

    #[test]
    fn blob_script_escapes_hostile_handles() {
        let script = blob_fetch_script(r#"blob:x');fetch('https://evil.example"#);
        // The handle stays inside one JSON string literal.
        assert!(script.contains(r#"fetch("blob:x');fetch('https://evil.example")"#));
        assert!(!script.contains("fetch('blob:"));
    }

    #[test]
    fn poll_health_trips_after_consecutive_failures() {
        let mut health = PollHealth::new();
        assert!(!health.failed());
        assert!(!health.failed());
        assert!(health.failed());
    }

    #[test]
    fn poll_health_resets_on_success() {
        let mut health = PollHealth::new();
        assert!(!health.failed());
        assert!(!health.failed());
        health.succeeded();
        assert!(!health.failed());
        assert!(!health.failed());
        assert!(health.failed());
    }
}
