//! Provider traits the SkyWatch loader is built against.

use crate::{FeedError, RawBalloonFeed, RawHazardFeed};
use async_trait::async_trait;

/// Source of the hourly balloon snapshot feed.
///
/// # Implementations
///
/// - **Fixtures**: `StaticFeed` - serves a fixed in-memory document
/// - **Files**: `JsonFileFeed` - reads a JSON document from disk
///
/// A provider only fetches and decodes. It must not validate or repair
/// records; partial garbage is the loader's problem to count and skip.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetches one complete refresh of the balloon feed.
    async fn fetch_snapshots(&self) -> Result<RawBalloonFeed, FeedError>;
}

/// Source of the hazard (hotspot) detection feed.
#[async_trait]
pub trait HazardProvider: Send + Sync {
    /// Fetches the current list of hazard detections (records undecoded).
    async fn fetch_hazards(&self) -> Result<RawHazardFeed, FeedError>;
}
