//! Direct-address fetching and artifact persistence.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::error::VidgrabError;

/// Connection budget for direct fetches. Only establishing the connection is
/// capped; the body transfer is not, since a large video may legitimately
/// take minutes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetch video bytes from a network-reachable address.
///
/// Uses the same user agent as the browser session so the CDN sees a
/// consistent client.
pub async fn fetch_direct(url: &str, user_agent: &str) -> Result<Vec<u8>, VidgrabError> {
    info!(%url, "downloading video");

    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;

    let progress = match response.content_length() {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let mut response = response;
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        bytes.extend_from_slice(&chunk);
        progress.inc(chunk.len() as u64);
    }
    progress.finish_and_clear();

    debug!(len = bytes.len(), "download complete");
    Ok(bytes)
}

/// Timestamp-derived artifact name, millisecond precision so back-to-back
/// runs get distinct files.
pub fn artifact_filename(now: DateTime<Utc>) -> String {
    format!("video_{}.mp4", now.timestamp_millis())
}

/// Write the artifact into `output_dir`, creating the directory if absent.
///
/// Bytes go to a temp file in the same directory first and are renamed into
/// place, so a failed write never leaves a partial artifact at the final
/// name.
pub fn save_artifact(bytes: &[u8], output_dir: &Path) -> Result<PathBuf, VidgrabError> {
    std::fs::create_dir_all(output_dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(output_dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;

    let dest = output_dir.join(artifact_filename(Utc::now()));
    tmp.persist(&dest).map_err(|e| VidgrabError::Io(e.error))?;

    info!(path = %dest.display(), len = bytes.len(), "saved video");
    Ok(dest)
}
