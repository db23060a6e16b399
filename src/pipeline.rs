//! Sequential scrape-and-download pipeline.
//!
//! One run owns one browser session: navigate, locate, fetch through
//! exactly one of the two download paths, persist, hand off. The session
//! is released on every exit path before any result is reported.

use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;

use crate::browser::{ChromeSession, PageSession};
use crate::config::SessionConfig;
use crate::download::{fetch_direct, save_artifact};
use crate::error::VidgrabError;
use crate::handoff::VideoProcessor;
use crate::locate::{locate, VideoSource};

/// Validate the target reference. Nothing else happens until this passes.
pub fn validate_url(raw: &str) -> Result<Url, VidgrabError> {
    let parsed = Url::parse(raw).map_err(|_| VidgrabError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(VidgrabError::InvalidUrl(raw.to_string())),
    }
}

/// Navigate, locate, and fetch the video bytes.
async fn acquire<S: PageSession>(
    session: &mut S,
    config: &SessionConfig,
    url: &str,
) -> Result<Vec<u8>, VidgrabError> {
    session.goto(url).await?;
    let snapshot = session.snapshot().await?;

    match locate(&snapshot) {
        Some(VideoSource::Blob(handle)) => session.fetch_blob(&handle).await,
        Some(VideoSource::Direct(address)) => {
            fetch_direct(&address, &config.user_agent).await
        }
        None => Err(VidgrabError::VideoNotFound(
            "page has no recognizable video source".into(),
        )),
    }
}

/// Drive a session through the full flow and persist the artifact.
///
/// The session is closed exactly once whichever way acquisition ends, and
/// nothing is written unless it succeeded.
pub async fn run_with_session<S: PageSession>(
    session: &mut S,
    config: &SessionConfig,
    url: &str,
    output_dir: &Path,
) -> Result<PathBuf, VidgrabError> {
    let acquired = acquire(session, config, url).await;
    session.close().await;

    save_artifact(&acquired?, output_dir)
}

/// Full run: validate, launch, scrape, save, hand off.
pub async fn run(
    config: &SessionConfig,
    raw_url: &str,
    output_dir: &Path,
    processor: &dyn VideoProcessor,
) -> Result<PathBuf, VidgrabError> {
    let url = validate_url(raw_url)?;

    let mut session = ChromeSession::launch(config).await?;
    let path = run_with_session(&mut session, config, url.as_str(), output_dir).await?;

    processor
        .process(&path)
        .await
        .map_err(VidgrabError::Handoff)?;

    info!(path = %path.display(), "run complete");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("http://example.com/post/1").is_ok());
        assert!(validate_url("https://example.com/post/1").is_ok());
    }

    #[test]
    fn rejects_missing_or_unknown_scheme() {
        for raw in ["example.com/post/1", "ftp://example.com/v.mp4", "not a url", ""] {
            let err = validate_url(raw).expect_err("must reject");
            assert!(matches!(err, VidgrabError::InvalidUrl(_)), "{raw:?}");
        }
    }
}
