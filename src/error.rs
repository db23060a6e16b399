//! Error taxonomy for the scrape-and-download flow.

use thiserror::Error;

/// Everything that can go wrong between argument parsing and the saved file.
#[derive(Debug, Error)]
pub enum VidgrabError {
    /// The input did not look like a web address. No browser or network
    /// action is performed when this is returned.
    #[error("invalid url {0:?}: expected an address starting with http:// or https://")]
    InvalidUrl(String),

    /// The browser binary is missing, incompatible, or refused to start.
    /// Fatal; there is nothing to retry.
    #[error("failed to launch browser: {0}")]
    BrowserLaunch(String),

    /// No playable video appeared within the timeout, or nothing on the page
    /// matched any locator strategy. Terminal for the run; never retried.
    #[error("no playable video found: {0}")]
    VideoNotFound(String),

    /// The in-page fetch of a blob handle rejected, or the payload it
    /// resolved was empty or undecodable.
    #[error("blob extraction failed: {0}")]
    BlobExtraction(String),

    /// Direct-address fetch failed.
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// CDP-level protocol failure while driving the page.
    #[error("browser protocol error: {0}")]
    Cdp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The downstream processing hook returned an error.
    #[error("video processing handoff failed: {0}")]
    Handoff(anyhow::Error),
}

impl From<chromiumoxide::error::CdpError> for VidgrabError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        VidgrabError::Cdp(err.to_string())
    }
}
