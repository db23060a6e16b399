//! Handoff of the downloaded artifact to an external AI service.
//!
//! Open integration point: the eventual transcription/translation backend
//! has no defined contract yet, so the capability is a single-method trait
//! that callers inject. The default does nothing beyond logging.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

/// A downstream consumer of a readable video file path.
#[async_trait]
pub trait VideoProcessor: Send + Sync {
    async fn process(&self, path: &Path) -> anyhow::Result<()>;
}

/// Placeholder processor until a real AI backend is wired up.
pub struct NoopProcessor;

#[async_trait]
impl VideoProcessor for NoopProcessor {
    async fn process(&self, path: &Path) -> anyhow::Result<()> {
        info!(path = %path.display(), "AI processing not configured; skipping");
        Ok(())
    }
}
