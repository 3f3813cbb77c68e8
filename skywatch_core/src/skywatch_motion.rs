//! The "MOTION" Engine - continuous-time playback positions
//!
//! Maps a fractional hour onto the two bracketing hourly snapshots and
//! blends them. No search, no allocation for single lookups: this runs
//! once per entity per rendered frame.

use crate::geodesy::{normalize_lon, normalize_lon_delta};
use crate::skywatch_store::{EntityId, Snapshot, SnapshotStore, HOURS_PER_DAY};

/// The two hours surrounding a fractional time plus the blend factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub h1: usize,
    pub h2: usize,

    /// Position between `h1` and `h2`, in `[0, 1)`
    pub t: f64,
}

impl Bracket {
    /// Resolves the bracket for `fractional_hour`; values outside `[0, 24)`
    /// wrap. Returns `None` for NaN or infinite input.
    #[inline]
    pub fn at(fractional_hour: f64) -> Option<Self> {
        if !fractional_hour.is_finite() {
            return None;
        }
        let floor = fractional_hour.floor();
        let h1 = (floor.rem_euclid(HOURS_PER_DAY as f64) as usize) % HOURS_PER_DAY;
        Some(Self {
            h1,
            h2: (h1 + 1) % HOURS_PER_DAY,
            t: fractional_hour - floor,
        })
    }
}

/// Blends two snapshots of the same entity.
///
/// Latitude and altitude are linear; longitude follows the shorter arc
/// and is re-normalized into `[-180, 180)`. `t == 0` returns `a` exactly.
#[inline]
pub fn interpolate(a: &Snapshot, b: &Snapshot, t: f64) -> Snapshot {
    if t == 0.0 {
        return *a;
    }

    let d_lon = normalize_lon_delta(b.lon - a.lon);
    Snapshot {
        entity_id: a.entity_id,
        hour: a.hour,
        lat: a.lat + (b.lat - a.lat) * t,
        lon: normalize_lon(a.lon + d_lon * t),
        alt: a.alt + (b.alt - a.alt) * t,
    }
}

/// Interpolated position of one entity at `fractional_hour`.
///
/// Absent if either bracket snapshot is absent. At exact integer hours the
/// stored snapshot is returned unchanged and the following hour is not
/// consulted.
pub fn position_at(store: &SnapshotStore, entity_id: EntityId, fractional_hour: f64) -> Option<Snapshot> {
    let bracket = Bracket::at(fractional_hour)?;
    let a = store.get(bracket.h1, entity_id)?;
    if bracket.t == 0.0 {
        return Some(a);
    }
    let b = store.get(bracket.h2, entity_id)?;
    Some(interpolate(&a, &b, bracket.t))
}

/// Interpolated positions of every entity at `fractional_hour`, in id order.
///
/// Entities missing from either bracket hour are left out. At an integer
/// hour only that hour is consulted, so a frame there can hold entities
/// (those missing the next hour) that drop out of the fractional frames
/// just after it.
pub fn positions_at(store: &SnapshotStore, fractional_hour: f64) -> Vec<Snapshot> {
    let Some(bracket) = Bracket::at(fractional_hour) else {
        return Vec::new();
    };

    let first = store.hour_slots(bracket.h1);
    if bracket.t == 0.0 {
        return first.iter().flatten().copied().collect();
    }

    let second = store.hour_slots(bracket.h2);
    first
        .iter()
        .zip(second.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(interpolate(a, b, bracket.t)),
            _ => None,
        })
        .collect()
}
