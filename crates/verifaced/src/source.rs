//! Spool-directory frame source.
//!
//! The camera/consent collaborator owns acquisition and writes encoded
//! frames into a spool directory once consent is granted; this source
//! hands the newest spooled frame to the session engine. Nothing here
//! touches a camera device, so the consent guarantee ("no frame before
//! consent") lives entirely with the collaborator.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use veriface_remote::capability::{CapturedFrame, FrameSource, FrameSourceError};

/// Frame source reading the most recent file from a spool directory.
pub struct SpoolFrameSource {
    dir: PathBuf,
    /// Dimensions the collaborator spools at, advertised alongside the dir.
    width: u32,
    height: u32,
}

impl SpoolFrameSource {
    pub fn new(dir: PathBuf, width: u32, height: u32) -> Self {
        Self { dir, width, height }
    }

    fn newest_frame(&self) -> Result<(PathBuf, i64), FrameSourceError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| FrameSourceError::Unavailable(format!("{}: {e}", self.dir.display())))?;

        let mut newest: Option<(PathBuf, i64)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            let ts_ms = modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            if newest.as_ref().map_or(true, |(_, best)| ts_ms > *best) {
                newest = Some((path, ts_ms));
            }
        }
        newest.ok_or_else(|| FrameSourceError::Unavailable("spool directory empty".into()))
    }
}

#[async_trait]
impl FrameSource for SpoolFrameSource {
    async fn next_frame(&self) -> Result<CapturedFrame, FrameSourceError> {
        let (path, timestamp_ms) = self.newest_frame()?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| FrameSourceError::Unavailable(format!("{}: {e}", path.display())))?;
        Ok(CapturedFrame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms,
        })
    }

    async fn release(&self) {
        // Signal the collaborator that capture ended by clearing the spool.
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    if let Err(e) = std::fs::remove_file(&path) {
                        tracing::warn!(path = %path.display(), error = %e, "spool cleanup failed");
                    }
                }
            }
        }
        tracing::debug!(dir = %self.dir.display(), "frame source released");
    }
}
