//! In-memory feed implementation for fixtures and simulation.

use crate::{FeedError, HazardProvider, RawBalloonFeed, RawHazardFeed, SnapshotProvider};
use async_trait::async_trait;
use std::sync::Arc;

/// A provider that always serves the same decoded documents.
///
/// Cloning is cheap: both documents sit behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    snapshots: Option<Arc<RawBalloonFeed>>,
    hazards: Option<Arc<RawHazardFeed>>,
}

impl StaticFeed {
    /// Creates a feed serving both documents.
    ///
    /// `hazards` is either a typed `Vec<FireRecord>` or a raw document.
    pub fn new(snapshots: RawBalloonFeed, hazards: impl Into<RawHazardFeed>) -> Self {
        Self {
            snapshots: Some(Arc::new(snapshots)),
            hazards: Some(Arc::new(hazards.into())),
        }
    }

    /// Creates a feed with no documents; every fetch fails as unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotProvider for StaticFeed {
    async fn fetch_snapshots(&self) -> Result<RawBalloonFeed, FeedError> {
        self.snapshots
            .as_deref()
            .cloned()
            .ok_or_else(|| FeedError::unavailable("no snapshot document configured"))
    }
}

#[async_trait]
impl HazardProvider for StaticFeed {
    async fn fetch_hazards(&self) -> Result<RawHazardFeed, FeedError> {
        self.hazards
            .as_deref()
            .cloned()
            .ok_or_else(|| FeedError::unavailable("no hazard document configured"))
    }
}
