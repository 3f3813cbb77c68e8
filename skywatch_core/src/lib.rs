//! SkyWatch Core - Geospatial analytics for hourly tracks and hazard proximity
//!
//! This library turns two feeds into everything a live map view needs:
//! 1. **Movement stats**: per-entity great-circle distance and peak altitude
//! 2. **Playback**: O(1) continuous-time interpolation between hourly snapshots
//! 3. **Hazard proximity**: a full-day path split into RED/ORANGE/YELLOW/NONE
//!    segments plus a deduplicated count of nearby hazards
//!
//! A store and an index built from the same refresh travel together as one
//! [`Engine`] generation, swapped atomically through an [`EngineHandle`].

pub mod geodesy;
pub mod skywatch_store;
pub mod skywatch_space;
pub mod skywatch_stats;
pub mod skywatch_motion;
pub mod skywatch_hazard;
pub mod ingest;
pub mod engine;
pub mod playback;

// Re-export key types for convenience
pub use engine::{Engine, EngineHandle, LoadError, LoadReport, Selection, SelectionTicket, SelectionTracker};
pub use ingest::IngestReport;
pub use playback::{Playback, PlaybackConfig};
pub use skywatch_hazard::{ClassifierConfig, ConfigError, HazardBucket, HazardClassification, PathSegment};
pub use skywatch_space::{HazardId, HazardPoint, NearestHazard, SpatialIndex};
pub use skywatch_stats::{EntityStats, RankMetric};
pub use skywatch_store::{EntityId, Snapshot, SnapshotStore, StoreError};
