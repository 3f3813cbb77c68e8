//! SkyWatch Feed Abstraction Layer
//!
//! This crate separates the SkyWatch analytics core from the places its
//! data comes from. The core never performs I/O: a loader asks a
//! [`SnapshotProvider`] and a [`HazardProvider`] for already-decoded
//! documents and builds an immutable generation from them.
//!
//! # Implementations
//!
//! - **Fixtures / simulation**: [`StaticFeed`] - in-memory records
//! - **Files**: [`JsonFileFeed`] - JSON documents read with `tokio::fs`
//!
//! # Example
//!
//! ```ignore
//! use skywatch_env::{SnapshotProvider, HazardProvider, JsonFileFeed};
//!
//! async fn refresh<P: SnapshotProvider + HazardProvider>(feed: &P) {
//!     let balloons = feed.fetch_snapshots().await?;
//!     let fires = feed.fetch_hazards().await?;
//!     // hand both to skywatch_core::ingest
//! }
//! ```

mod error;
mod file_feed;
mod provider;
mod static_feed;
mod types;

pub use error::FeedError;
pub use file_feed::JsonFileFeed;
pub use provider::{HazardProvider, SnapshotProvider};
pub use static_feed::StaticFeed;
pub use types::{AcqTime, FireRecord, RawBalloonFeed, RawHazardFeed};
