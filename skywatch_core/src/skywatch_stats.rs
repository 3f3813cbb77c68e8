//! Per-entity movement statistics (total great-circle distance, peak altitude).

use crate::geodesy::haversine_m;
use crate::skywatch_store::{EntityId, Snapshot, SnapshotStore, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Aggregates for one entity over one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    /// Sum of haversine distances between consecutive present hours (meters)
    pub total_distance_m: f64,

    /// Highest altitude seen in any present hour
    pub max_altitude: f64,

    /// Number of hours the entity was present
    pub hours_present: u8,
}

/// Leaderboard ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    TotalDistance,
    MaxAltitude,
}

impl RankMetric {
    fn value(self, stats: &EntityStats) -> f64 {
        match self {
            RankMetric::TotalDistance => stats.total_distance_m,
            RankMetric::MaxAltitude => stats.max_altitude,
        }
    }
}

/// Computes stats for every entity present in at least one hour.
///
/// Gaps are skipped: each present hour is compared against the last
/// *present* hour, not against the previous hour index.
pub fn compute_all(store: &SnapshotStore) -> BTreeMap<EntityId, EntityStats> {
    (0..store.entity_count())
        .filter_map(|id| entity_stats(store, id).map(|stats| (id, stats)))
        .collect()
}

/// Computes stats for a single entity, or `None` if it never appears.
pub fn entity_stats(store: &SnapshotStore, entity_id: EntityId) -> Option<EntityStats> {
    let mut previous: Option<Snapshot> = None;
    let mut total_distance_m = 0.0;
    let mut max_altitude = f64::NEG_INFINITY;
    let mut hours_present = 0u8;

    for hour in 0..HOURS_PER_DAY {
        let Some(current) = store.get(hour, entity_id) else {
            continue;
        };

        max_altitude = max_altitude.max(current.alt);
        hours_present += 1;

        if let Some(prev) = previous {
            total_distance_m += haversine_m(prev.lat, prev.lon, current.lat, current.lon);
        }
        previous = Some(current);
    }

    (hours_present > 0).then_some(EntityStats {
        total_distance_m,
        max_altitude,
        hours_present,
    })
}

/// Orders entities by `metric`, descending, keeping at most `limit`.
///
/// Equal values keep ascending id order.
pub fn rank(
    stats: &BTreeMap<EntityId, EntityStats>,
    metric: RankMetric,
    limit: usize,
) -> Vec<(EntityId, f64)> {
    let mut ranked: Vec<(EntityId, f64)> = stats
        .iter()
        .map(|(&id, s)| (id, metric.value(s)))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(limit);
    ranked
}
