//! The "HAZARD" Engine - proximity classification of a full-day path
//!
//! Pipeline for one entity:
//! 1. Collect present snapshots in hour order (gaps dropped)
//! 2. Continuity-normalize for rendering (unwrap longitude, clamp latitude)
//! 3. Subdivide every hop into short planar sub-segments
//! 4. Bucket each sub-segment by its nearest hazard, and union the ids of
//!    every hazard near any sub-segment into one path-wide set
//!
//! The normalized coordinates exist only for drawing and for choosing
//! query points. Distances reported anywhere else come from raw snapshots.

use crate::geodesy::clamp_render_lat;
use crate::skywatch_space::{HazardId, SpatialIndex};
use crate::skywatch_store::{EntityId, SnapshotStore};
use geo::Coord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Planar degrees-to-km factor used only to pick the subdivision step count.
pub const SUBDIVISION_KM_PER_DEGREE: f64 = 111.0;

/// Errors raised by [`ClassifierConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_segment_km must be positive and finite, got {0}")]
    InvalidSegmentLength(f64),

    #[error("bucket thresholds must be positive and ascending, got {red}/{orange}/{yellow} km")]
    InvalidThresholds { red: f64, orange: f64, yellow: f64 },
}

/// Configuration for the path classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Target sub-segment length (default: 10 km)
    pub max_segment_km: f64,

    /// Nearest hazard at or below this distance is RED (default: 5 km)
    pub red_km: f64,

    /// ... ORANGE (default: 20 km)
    pub orange_km: f64,

    /// ... YELLOW (default: 50 km). Also the search radius.
    pub yellow_km: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_segment_km: 10.0,
            red_km: 5.0,
            orange_km: 20.0,
            yellow_km: 50.0,
        }
    }
}

impl ClassifierConfig {
    /// Coarse subdivision (50 km steps) for zoomed-out views.
    pub fn coarse() -> Self {
        Self {
            max_segment_km: 50.0,
            ..Self::default()
        }
    }

    /// Checks that the step is positive and the thresholds ascend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_segment_km.is_finite() && self.max_segment_km > 0.0) {
            return Err(ConfigError::InvalidSegmentLength(self.max_segment_km));
        }
        let ascending = self.red_km > 0.0
            && self.red_km <= self.orange_km
            && self.orange_km <= self.yellow_km
            && self.yellow_km.is_finite();
        if !ascending {
            return Err(ConfigError::InvalidThresholds {
                red: self.red_km,
                orange: self.orange_km,
                yellow: self.yellow_km,
            });
        }
        Ok(())
    }

    /// Outer search radius for hazard queries.
    pub fn search_radius_km(&self) -> f64 {
        self.yellow_km
    }

    /// Buckets a nearest-hazard distance (`None` = nothing within range).
    pub fn bucket_for(&self, nearest_km: Option<f64>) -> HazardBucket {
        match nearest_km {
            Some(d) if d <= self.red_km => HazardBucket::Red,
            Some(d) if d <= self.orange_km => HazardBucket::Orange,
            Some(d) if d <= self.yellow_km => HazardBucket::Yellow,
            _ => HazardBucket::None,
        }
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Discrete proximity class of a path sub-segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardBucket {
    Red,
    Orange,
    Yellow,
    None,
}

impl HazardBucket {
    /// Display color used by the map layer.
    pub fn color_hex(self) -> &'static str {
        match self {
            HazardBucket::Red => "#ff0000",
            HazardBucket::Orange => "#ff9b20",
            HazardBucket::Yellow => "#fff93d",
            HazardBucket::None => "#00ff00",
        }
    }

    pub fn is_hazardous(self) -> bool {
        self != HazardBucket::None
    }
}

/// One drawable piece of a classified path. Coordinates are `(x = lon, y = lat)`
/// in continuity-normalized render space, so longitudes may leave `[-180, 180)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    pub bucket: HazardBucket,
}

/// Result of classifying one entity's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardClassification {
    pub entity_id: EntityId,

    /// Sub-segments in path order
    pub segments: Vec<PathSegment>,

    /// Distinct hazards within the search radius of any sub-segment
    pub unique_hazard_count: usize,
}

impl HazardClassification {
    /// The classification of a path with fewer than two points.
    pub fn empty(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            segments: Vec::new(),
            unique_hazard_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The most severe bucket on the path (`None` for an empty path).
    pub fn worst_bucket(&self) -> HazardBucket {
        let severity = |b: HazardBucket| match b {
            HazardBucket::Red => 3,
            HazardBucket::Orange => 2,
            HazardBucket::Yellow => 1,
            HazardBucket::None => 0,
        };
        self.segments
            .iter()
            .map(|s| s.bucket)
            .max_by_key(|&b| severity(b))
            .unwrap_or(HazardBucket::None)
    }
}

// ============================================================================
// PATH GEOMETRY
// ============================================================================

/// Makes a `(lon, lat)` sequence drawable as one continuous line.
///
/// Each longitude is shifted by whole turns until it is within 180 degrees
/// of the previous (already shifted) point; every latitude is clamped to
/// `[-85, 85]`.
pub fn continuity_normalize(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut adjusted: Vec<Coord<f64>> = Vec::with_capacity(coords.len());

    for c in coords {
        let mut lon = c.x;
        if let Some(prev) = adjusted.last() {
            let mut delta = lon - prev.x;
            while delta > 180.0 {
                lon -= 360.0;
                delta -= 360.0;
            }
            while delta < -180.0 {
                lon += 360.0;
                delta += 360.0;
            }
        }
        adjusted.push(Coord {
            x: lon,
            y: clamp_render_lat(c.y),
        });
    }

    adjusted
}

/// Splits `start -> end` into `steps + 1` evenly spaced points, where
/// `steps = max(1, ceil(planar_km / max_step_km))` and planar distance uses
/// a flat 111 km per degree.
pub fn subdivide(start: Coord<f64>, end: Coord<f64>, max_step_km: f64) -> Vec<Coord<f64>> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let approx_km = dx.hypot(dy) * SUBDIVISION_KM_PER_DEGREE;

    let steps = if approx_km.is_finite() && max_step_km > 0.0 {
        ((approx_km / max_step_km).ceil() as usize).max(1)
    } else {
        1
    };

    let mut points = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        let t = i as f64 / steps as f64;
        points.push(Coord {
            x: start.x + t * dx,
            y: start.y + t * dy,
        });
    }
    points.push(end);
    points
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Classifies the full-day path of `entity_id` against `index`.
///
/// Never fails: an absent entity or a one-point path yields the empty
/// classification, and an empty index yields all-`None` segments.
pub fn classify(
    store: &SnapshotStore,
    index: &SpatialIndex,
    entity_id: EntityId,
    config: &ClassifierConfig,
) -> HazardClassification {
    // Stage 1: present snapshots in hour order
    let raw: Vec<Coord<f64>> = store
        .track(entity_id)
        .iter()
        .map(|s| Coord { x: s.lon, y: s.lat })
        .collect();

    // Stage 2: render-space copy
    let path = continuity_normalize(&raw);
    if path.len() < 2 {
        return HazardClassification::empty(entity_id);
    }

    let radius_km = config.search_radius_km();
    let mut segments = Vec::new();
    let mut hazard_ids: HashSet<HazardId> = HashSet::new();

    for hop in path.windows(2) {
        // Stage 3: subdivide
        let points = subdivide(hop[0], hop[1], config.max_segment_km);

        for pair in points.windows(2) {
            let (start, end) = (pair[0], pair[1]);

            // Stage 4: classify by nearest hazard around the midpoint
            let bucket = if index.is_empty() {
                HazardBucket::None
            } else {
                let mid_lon = (start.x + end.x) / 2.0;
                let mid_lat = (start.y + end.y) / 2.0;

                let nearest = index.nearest_within(mid_lon, mid_lat, radius_km);
                hazard_ids.extend(index.all_within(mid_lon, mid_lat, radius_km));
                config.bucket_for(nearest.map(|n| n.distance_km))
            };

            segments.push(PathSegment { start, end, bucket });
        }
    }

    debug!(
        "classify: entity={} hops={} segments={} hazards={}",
        entity_id,
        path.len() - 1,
        segments.len(),
        hazard_ids.len()
    );

    HazardClassification {
        entity_id,
        segments,
        unique_hazard_count: hazard_ids.len(),
    }
}
