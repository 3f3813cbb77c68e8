//! The "SPACE" Engine - static hazard index with geodesic radius queries
//!
//! Hazard points are bulk-loaded once into an R-tree keyed on planar
//! `(lon, lat)` degrees. A query turns its great-circle radius into one or
//! two planar candidate windows (two when the window straddles the
//! antimeridian), then confirms and ranks every candidate by haversine
//! distance. The planar index only prunes; it never decides.

use crate::geodesy::{haversine_km, normalize_lon, KM_PER_DEGREE_ARC};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier of a hazard point (position in the hazard feed).
pub type HazardId = u64;

/// Slack added to candidate windows so float rounding can't drop a boundary point.
const WINDOW_MARGIN_DEG: f64 = 1e-9;

/// A single hazard detection (e.g. a fire hotspot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardPoint {
    /// Unique identifier within one index
    pub id: HazardId,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,

    /// Acquisition time (Unix seconds, UTC)
    pub detected_at: i64,

    /// Upstream confidence label
    pub confidence: String,

    /// Radiative power (MW)
    pub power: f64,
}

/// Result of a nearest-hazard query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHazard<'a> {
    pub point: &'a HazardPoint,

    /// Great-circle distance from the query point (km)
    pub distance_km: f64,
}

/// R-tree entry: planar position plus the slot of the point in `SpatialIndex::points`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedHazard {
    slot: usize,
    lon: f64,
    lat: f64,
}

impl RTreeObject for IndexedHazard {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lon, self.lat])
    }
}

/// Immutable spatial index over one hazard-feed refresh.
///
/// Rebuilt wholesale on refresh; there is no insert or remove.
pub struct SpatialIndex {
    points: Vec<HazardPoint>,
    tree: RTree<IndexedHazard>,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("points", &self.points.len())
            .field("indexed", &self.tree.size())
            .finish()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl SpatialIndex {
    /// Creates an index with no points.
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            tree: RTree::new(),
        }
    }

    /// Bulk-loads an index over `points` in O(n log n).
    ///
    /// Points with non-finite coordinates are kept for id lookup but are
    /// not searchable.
    pub fn build(points: Vec<HazardPoint>) -> Self {
        let entries: Vec<IndexedHazard> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.lat.is_finite() && p.lon.is_finite())
            .map(|(slot, p)| IndexedHazard {
                slot,
                lon: normalize_lon(p.lon),
                lat: p.lat.clamp(-90.0, 90.0),
            })
            .collect();

        if entries.len() != points.len() {
            debug!(
                "SpatialIndex: {} of {} points have non-finite coordinates",
                points.len() - entries.len(),
                points.len()
            );
        }

        Self {
            tree: RTree::bulk_load(entries),
            points,
        }
    }

    /// Returns the geodesically nearest point within `max_radius_km`.
    ///
    /// Ties on distance resolve to the smallest hazard id, so the answer
    /// does not depend on the tree's internal layout.
    ///
    /// # Arguments
    /// * `lon`, `lat` - Query point in degrees (any longitude; it is normalized)
    /// * `max_radius_km` - Inclusive search radius
    pub fn nearest_within(&self, lon: f64, lat: f64, max_radius_km: f64) -> Option<NearestHazard<'_>> {
        let mut best: Option<NearestHazard<'_>> = None;

        self.for_each_within(lon, lat, max_radius_km, |point, distance_km| {
            let better = match best {
                None => true,
                Some(current) => {
                    distance_km < current.distance_km
                        || (distance_km == current.distance_km && point.id < current.point.id)
                }
            };
            if better {
                best = Some(NearestHazard { point, distance_km });
            }
        });

        best
    }

    /// Returns the id of every point within `radius_km` (unordered, no duplicates).
    pub fn all_within(&self, lon: f64, lat: f64, radius_km: f64) -> Vec<HazardId> {
        let mut ids = Vec::new();
        self.for_each_within(lon, lat, radius_km, |point, _| ids.push(point.id));

        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Looks up a point by id.
    pub fn get(&self, id: HazardId) -> Option<&HazardPoint> {
        // Loader-assigned ids are usually positional; fall back to a scan otherwise
        match self.points.get(id as usize) {
            Some(p) if p.id == id => Some(p),
            _ => self.points.iter().find(|p| p.id == id),
        }
    }

    /// All points in build order.
    pub fn points(&self) -> &[HazardPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Visits every point whose great-circle distance to the query is `<= radius_km`.
    fn for_each_within<'a, F>(&'a self, lon: f64, lat: f64, radius_km: f64, mut visit: F)
    where
        F: FnMut(&'a HazardPoint, f64),
    {
        if self.tree.size() == 0 || !lon.is_finite() || !lat.is_finite() || !(radius_km >= 0.0) {
            return;
        }

        let lon = normalize_lon(lon);
        let lat = lat.clamp(-90.0, 90.0);

        for window in candidate_windows(lon, lat, radius_km).into_iter().flatten() {
            for entry in self.tree.locate_in_envelope(&window) {
                let point = &self.points[entry.slot];
                let distance_km = haversine_km(lat, lon, entry.lat, entry.lon);
                if distance_km <= radius_km {
                    visit(point, distance_km);
                }
            }
        }
    }
}

/// Planar `(lon, lat)` windows guaranteed to contain every point within
/// `radius_km` of the query.
///
/// The longitude half-width is the exact spherical bound
/// `asin(sin(r / R) / cos(lat))`, which covers the whole band once the
/// circle reaches a pole. Windows never overlap, so no point is visited twice.
fn candidate_windows(lon: f64, lat: f64, radius_km: f64) -> [Option<AABB<[f64; 2]>>; 2] {
    let d_lat = radius_km / KM_PER_DEGREE_ARC + WINDOW_MARGIN_DEG;
    let lat_lo = (lat - d_lat).max(-90.0);
    let lat_hi = (lat + d_lat).min(90.0);

    let angular = radius_km / KM_PER_DEGREE_ARC;
    let cos_lat = lat.to_radians().cos();
    let reaches_pole = lat.abs() + d_lat >= 90.0;
    let ratio = if cos_lat > 0.0 {
        angular.to_radians().sin() / cos_lat
    } else {
        f64::INFINITY
    };

    let window = |lo: f64, hi: f64| Some(AABB::from_corners([lo, lat_lo], [hi, lat_hi]));

    if reaches_pole || angular >= 90.0 || ratio >= 1.0 {
        return [window(-180.0, 180.0), None];
    }

    let d_lon = ratio.asin().to_degrees() + WINDOW_MARGIN_DEG;
    let lon_lo = lon - d_lon;
    let lon_hi = lon + d_lon;

    if lon_lo < -180.0 {
        [window(-180.0, lon_hi), window(lon_lo + 360.0, 180.0)]
    } else if lon_hi >= 180.0 {
        [window(lon_lo, 180.0), window(-180.0, lon_hi - 360.0)]
    } else {
        [window(lon_lo, lon_hi), None]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hazard(id: HazardId, lat: f64, lon: f64) -> HazardPoint {
        HazardPoint {
            id,
            lat,
            lon,
            detected_at: 1_735_689_600,
            confidence: "n".to_string(),
            power: 1.0,
        }
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::build(Vec::new());

        assert!(index.is_empty());
        assert!(index.nearest_within(0.0, 0.0, 50.0).is_none());
        assert!(index.all_within(0.0, 0.0, 50.0).is_empty());
    }

    #[test]
    fn test_point_at_zero_distance() {
        let index = SpatialIndex::build(vec![hazard(0, 37.77, -122.42)]);

        let nearest = index.nearest_within(-122.42, 37.77, 50.0).unwrap();
        assert_eq!(nearest.point.id, 0);
        assert_eq!(nearest.distance_km, 0.0);
        assert_eq!(index.all_within(-122.42, 37.77, 50.0), vec![0]);
    }

    #[test]
    fn test_nearest_ranked_by_great_circle() {
        // At 60N one degree of longitude is ~55.6 km but one degree of
        // latitude is ~111 km: planar degrees would pick the wrong one.
        let index = SpatialIndex::build(vec![
            hazard(0, 60.3, 10.0), // ~33 km north
            hazard(1, 60.0, 10.4), // ~22 km east
        ]);

        let nearest = index.nearest_within(10.0, 60.0, 50.0).unwrap();
        assert_eq!(nearest.point.id, 1);
        assert_relative_eq!(
            nearest.distance_km,
            haversine_km(60.0, 10.0, 60.0, 10.4),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_ties_resolve_to_smallest_id() {
        let index = SpatialIndex::build(vec![
            hazard(7, 0.0, 0.1),
            hazard(3, 0.0, -0.1),
        ]);

        let nearest = index.nearest_within(0.0, 0.0, 50.0).unwrap();
        assert_eq!(nearest.point.id, 3);
    }

    #[test]
    fn test_radius_is_inclusive_and_geodesic() {
        let index = SpatialIndex::build(vec![hazard(0, 0.0, 1.0)]);
        let exact = haversine_km(0.0, 0.0, 0.0, 1.0);

        assert!(index.nearest_within(0.0, 0.0, exact).is_some());
        assert!(index.nearest_within(0.0, 0.0, exact - 1e-6).is_none());
    }

    #[test]
    fn test_query_across_antimeridian() {
        let index = SpatialIndex::build(vec![
            hazard(0, 10.0, -179.9),
            hazard(1, 10.0, 179.9),
            hazard(2, 10.0, 170.0),
        ]);

        let mut ids = index.all_within(179.95, 10.0, 50.0);
        ids.sort();
        assert_eq!(ids, vec![0, 1]);

        // Render-space longitudes beyond +-180 are normalized first
        let ids = index.all_within(180.1, 10.0, 50.0);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_query_near_pole_covers_all_longitudes() {
        let index = SpatialIndex::build(vec![hazard(0, 89.9, -100.0), hazard(1, 89.9, 80.0)]);

        let ids = index.all_within(0.0, 89.95, 50.0);
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_all_within_excludes_far_points() {
        let index = SpatialIndex::build(vec![
            hazard(0, 45.0, 7.0),
            hazard(1, 45.1, 7.1),
            hazard(2, 46.0, 7.0),
        ]);

        let mut ids = index.all_within(7.0, 45.0, 20.0);
        ids.sort();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_get_by_id() {
        let index = SpatialIndex::build(vec![hazard(0, 1.0, 1.0), hazard(10, 2.0, 2.0)]);

        assert_eq!(index.get(10).unwrap().lat, 2.0);
        assert!(index.get(5).is_none());
    }

    #[test]
    fn test_non_finite_points_not_searchable() {
        let index = SpatialIndex::build(vec![hazard(0, f64::NAN, 0.0), hazard(1, 0.0, 0.0)]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.all_within(0.0, 0.0, 1.0), vec![1]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_matches_brute_force(
                pts in proptest::collection::vec((-89.0..89.0_f64, -180.0..180.0_f64), 0..60),
                q_lat in -89.0..89.0_f64,
                q_lon in -180.0..180.0_f64,
                radius in 0.0..3000.0_f64,
            ) {
                let points: Vec<HazardPoint> = pts
                    .iter()
                    .enumerate()
                    .map(|(i, (lat, lon))| hazard(i as HazardId, *lat, *lon))
                    .collect();
                let index = SpatialIndex::build(points.clone());

                let mut expected: Vec<HazardId> = points
                    .iter()
                    .filter(|p| haversine_km(q_lat, q_lon, p.lat, p.lon) <= radius)
                    .map(|p| p.id)
                    .collect();
                expected.sort();

                let mut got = index.all_within(q_lon, q_lat, radius);
                got.sort();
                prop_assert_eq!(&got, &expected);

                let nearest = index.nearest_within(q_lon, q_lat, radius);
                prop_assert_eq!(nearest.is_some(), !expected.is_empty());
            }
        }
    }
}
