//! File-backed feed implementation using `tokio::fs`.

use crate::{FeedError, HazardProvider, RawBalloonFeed, RawHazardFeed, SnapshotProvider};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads the two feeds from JSON files on disk.
///
/// The files are re-read on every fetch, so a process that rewrites them
/// (a cron'd downloader, for instance) is picked up on the next refresh.
#[derive(Debug, Clone)]
pub struct JsonFileFeed {
    snapshot_path: PathBuf,
    hazard_path: PathBuf,
}

impl JsonFileFeed {
    /// Creates a file feed from the balloon and hazard document paths.
    pub fn new(snapshot_path: impl Into<PathBuf>, hazard_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            hazard_path: hazard_path.into(),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn hazard_path(&self) -> &Path {
        &self.hazard_path
    }
}

#[async_trait]
impl SnapshotProvider for JsonFileFeed {
    async fn fetch_snapshots(&self) -> Result<RawBalloonFeed, FeedError> {
        let bytes = tokio::fs::read(&self.snapshot_path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl HazardProvider for JsonFileFeed {
    async fn fetch_hazards(&self) -> Result<RawHazardFeed, FeedError> {
        let bytes = tokio::fs::read(&self.hazard_path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
