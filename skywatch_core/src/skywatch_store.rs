//! The "STORE" - immutable hour-by-entity table of positions
//!
//! Every other engine reads from here. The table is indexed by
//! `(hour, entity_id)` where the entity id is the row index the entity had
//! in the upstream feed. Missing rows are gaps (`None`), never zeros.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of hourly slots in one refresh.
pub const HOURS_PER_DAY: usize = 24;

/// Upper bound on entity ids a store accepts (slots are allocated densely).
pub const MAX_ENTITIES: usize = 1 << 20;

/// Stable per-refresh entity identifier (row index in the upstream feed).
pub type EntityId = usize;

/// One entity's position at one discrete hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Row index of the entity in the upstream feed
    pub entity_id: EntityId,

    /// Hour slot [0, 23]
    pub hour: u8,

    /// Latitude in degrees [-90, 90]
    pub lat: f64,

    /// Longitude in degrees [-180, 180)
    pub lon: f64,

    /// Altitude (feed units, >= 0)
    pub alt: f64,
}

impl Snapshot {
    pub fn new(entity_id: EntityId, hour: u8, lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            entity_id,
            hour,
            lat,
            lon,
            alt,
        }
    }
}

/// Errors raised while building a [`SnapshotStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Hour {hour} is outside 0..=23 (entity {entity_id})")]
    HourOutOfRange { hour: u8, entity_id: EntityId },

    #[error("Entity id {entity_id} exceeds the store limit of {limit}")]
    EntityIdOutOfRange { entity_id: EntityId, limit: usize },
}

/// Immutable per-hour table of entity positions.
///
/// Hours can be missing entirely and hours can have different lengths;
/// both are legal gaps. The store is `Send + Sync` and never mutated after
/// construction, so it can be shared freely between readers.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// hours[h][entity_id]
    hours: Vec<Vec<Option<Snapshot>>>,

    /// One past the largest entity id present in any hour
    entity_count: usize,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl SnapshotStore {
    /// Creates a store with no snapshots at all.
    pub fn empty() -> Self {
        Self {
            hours: vec![Vec::new(); HOURS_PER_DAY],
            entity_count: 0,
        }
    }

    /// Builds a store from a set of snapshots.
    ///
    /// Each snapshot lands in slot `(hour, entity_id)`. If two snapshots
    /// claim the same slot the later one wins.
    ///
    /// # Errors
    /// [`StoreError::HourOutOfRange`] if any snapshot has `hour > 23`,
    /// [`StoreError::EntityIdOutOfRange`] if any id is `>= MAX_ENTITIES`.
    pub fn new<I>(snapshots: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = Snapshot>,
    {
        let mut store = Self::empty();

        for snapshot in snapshots {
            let hour = snapshot.hour as usize;
            if hour >= HOURS_PER_DAY {
                return Err(StoreError::HourOutOfRange {
                    hour: snapshot.hour,
                    entity_id: snapshot.entity_id,
                });
            }

            let needed = snapshot
                .entity_id
                .checked_add(1)
                .filter(|&len| len <= MAX_ENTITIES)
                .ok_or(StoreError::EntityIdOutOfRange {
                    entity_id: snapshot.entity_id,
                    limit: MAX_ENTITIES,
                })?;

            let slots = &mut store.hours[hour];
            if slots.len() < needed {
                slots.resize(needed, None);
            }
            slots[snapshot.entity_id] = Some(snapshot);
        }

        // Trailing gaps carry no information
        for slots in &mut store.hours {
            while matches!(slots.last(), Some(None)) {
                slots.pop();
            }
        }

        store.entity_count = store.hours.iter().map(Vec::len).max().unwrap_or(0);
        Ok(store)
    }

    /// Returns the snapshot of `entity_id` at `hour`, if present.
    #[inline]
    pub fn get(&self, hour: usize, entity_id: EntityId) -> Option<Snapshot> {
        self.hours.get(hour)?.get(entity_id).copied().flatten()
    }

    /// One past the largest entity id present in any hour.
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// All slots of one hour (entity `i` at index `i`). Out-of-range hours are empty.
    pub fn hour_slots(&self, hour: usize) -> &[Option<Snapshot>] {
        self.hours.get(hour).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hours that contain at least one snapshot, ascending.
    pub fn hours_present(&self) -> Vec<u8> {
        (0..HOURS_PER_DAY)
            .filter(|&h| self.hours[h].iter().any(Option::is_some))
            .map(|h| h as u8)
            .collect()
    }

    /// The entity's present snapshots across hours 0..23, in hour order.
    pub fn track(&self, entity_id: EntityId) -> Vec<Snapshot> {
        (0..HOURS_PER_DAY)
            .filter_map(|h| self.get(h, entity_id))
            .collect()
    }

    /// Whether the entity is present in at least one hour.
    pub fn contains_entity(&self, entity_id: EntityId) -> bool {
        (0..HOURS_PER_DAY).any(|h| self.get(h, entity_id).is_some())
    }

    /// Total number of present snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.hours
            .iter()
            .map(|slots| slots.iter().filter(|s| s.is_some()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get() {
        let store = SnapshotStore::new(vec![
            Snapshot::new(0, 0, 10.0, 20.0, 15.0),
            Snapshot::new(1, 0, 11.0, 21.0, 16.0),
            Snapshot::new(0, 5, 12.0, 22.0, 17.0),
        ])
        .unwrap();

        assert_eq!(store.get(0, 1).unwrap().lat, 11.0);
        assert_eq!(store.get(5, 0).unwrap().alt, 17.0);
        assert!(store.get(5, 1).is_none());
        assert!(store.get(1, 0).is_none());
        assert!(store.get(24, 0).is_none());
        assert_eq!(store.entity_count(), 2);
        assert_eq!(store.snapshot_count(), 3);
    }

    #[test]
    fn test_hour_out_of_range_rejected() {
        let result = SnapshotStore::new(vec![Snapshot::new(3, 24, 0.0, 0.0, 0.0)]);

        assert_eq!(
            result.unwrap_err(),
            StoreError::HourOutOfRange {
                hour: 24,
                entity_id: 3
            }
        );
    }

    #[test]
    fn test_huge_entity_id_rejected() {
        for entity_id in [MAX_ENTITIES, usize::MAX] {
            let result = SnapshotStore::new(vec![Snapshot::new(entity_id, 0, 0.0, 0.0, 0.0)]);

            assert_eq!(
                result.unwrap_err(),
                StoreError::EntityIdOutOfRange {
                    entity_id,
                    limit: MAX_ENTITIES
                }
            );
        }
    }

    #[test]
    fn test_uneven_hours_are_gaps() {
        // Hour 1 only knows about entity 0; entity 2 is absent there, not an error
        let store = SnapshotStore::new(vec![
            Snapshot::new(0, 0, 0.0, 0.0, 1.0),
            Snapshot::new(2, 0, 0.0, 0.0, 1.0),
            Snapshot::new(0, 1, 0.0, 0.0, 1.0),
        ])
        .unwrap();

        assert_eq!(store.hour_slots(0).len(), 3);
        assert_eq!(store.hour_slots(1).len(), 1);
        assert!(store.get(0, 1).is_none());
        assert!(store.get(1, 2).is_none());
        assert_eq!(store.entity_count(), 3);
    }

    #[test]
    fn test_track_skips_gaps() {
        let store = SnapshotStore::new(vec![
            Snapshot::new(4, 2, 1.0, 1.0, 1.0),
            Snapshot::new(4, 9, 2.0, 2.0, 2.0),
            Snapshot::new(4, 23, 3.0, 3.0, 3.0),
        ])
        .unwrap();

        let track = store.track(4);
        let hours: Vec<u8> = track.iter().map(|s| s.hour).collect();
        assert_eq!(hours, vec![2, 9, 23]);
        assert!(store.contains_entity(4));
        assert!(!store.contains_entity(3));
        assert_eq!(store.hours_present(), vec![2, 9, 23]);
    }

    #[test]
    fn test_empty_store() {
        let store = SnapshotStore::empty();

        assert!(store.is_empty());
        assert!(store.track(0).is_empty());
        assert!(store.hours_present().is_empty());
    }
}
