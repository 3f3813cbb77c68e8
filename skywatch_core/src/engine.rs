//! Generations, the engine facade, and last-selection-wins bookkeeping.
//!
//! An [`Engine`] owns exactly one generation: a snapshot store and a
//! hazard index built from the same refresh. Queries go through the
//! engine, so a store can never be paired with an index from another
//! refresh. [`EngineHandle`] publishes new generations with a single
//! reference swap; readers holding an `Arc<Engine>` keep the old one alive
//! until they drop it.

use crate::ingest::{ingest_hazards, ingest_snapshots, IngestReport};
use crate::skywatch_hazard::{classify, ClassifierConfig, ConfigError, HazardClassification};
use crate::skywatch_motion::{position_at, positions_at};
use crate::skywatch_space::SpatialIndex;
use crate::skywatch_stats::{compute_all, EntityStats};
use crate::skywatch_store::{EntityId, Snapshot, SnapshotStore};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use skywatch_env::{FeedError, HazardProvider, SnapshotProvider};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while loading a generation.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A provider failed to fetch or decode its feed
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// The classifier configuration is invalid
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// What went into one loaded generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub snapshots: IngestReport,
    pub hazards: IngestReport,
}

// ============================================================================
// ENGINE
// ============================================================================

/// One immutable generation plus the classifier configuration.
#[derive(Debug, Clone)]
pub struct Engine {
    /// Assigned by `EngineHandle::publish` (0 = never published)
    generation: u64,
    store: Arc<SnapshotStore>,
    index: Arc<SpatialIndex>,
    config: ClassifierConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(SnapshotStore::empty(), SpatialIndex::empty())
    }
}

impl Engine {
    /// Bundles a store and an index built from the same refresh.
    pub fn new(store: SnapshotStore, index: SpatialIndex) -> Self {
        Self {
            generation: 0,
            store: Arc::new(store),
            index: Arc::new(index),
            config: ClassifierConfig::default(),
        }
    }

    /// Replaces the classifier configuration after validating it.
    pub fn with_config(mut self, config: ClassifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Fetches both feeds, ingests them and builds a new generation.
    ///
    /// Malformed records are dropped and counted in the returned report;
    /// only provider failures and a bad config are errors.
    pub async fn load<S, H>(
        snapshots: &S,
        hazards: &H,
        config: ClassifierConfig,
    ) -> Result<(Self, LoadReport), LoadError>
    where
        S: SnapshotProvider + ?Sized,
        H: HazardProvider + ?Sized,
    {
        config.validate()?;

        let raw_snapshots = snapshots.fetch_snapshots().await?;
        let raw_hazards = hazards.fetch_hazards().await?;

        let (store, snapshot_report) = ingest_snapshots(&raw_snapshots);
        let (points, hazard_report) = ingest_hazards(&raw_hazards);
        let index = SpatialIndex::build(points);

        let engine = Self {
            generation: 0,
            store: Arc::new(store),
            index: Arc::new(index),
            config,
        };
        let report = LoadReport {
            snapshots: snapshot_report,
            hazards: hazard_report,
        };
        Ok((engine, report))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Distance and peak altitude for every entity (call once per refresh).
    pub fn stats(&self) -> BTreeMap<EntityId, EntityStats> {
        compute_all(&self.store)
    }

    /// Interpolated position of one entity (call per frame).
    pub fn position_at(&self, entity_id: EntityId, fractional_hour: f64) -> Option<Snapshot> {
        position_at(&self.store, entity_id, fractional_hour)
    }

    /// Interpolated positions of all entities for one frame.
    pub fn positions_at(&self, fractional_hour: f64) -> Vec<Snapshot> {
        positions_at(&self.store, fractional_hour)
    }

    /// Hazard classification of one entity's full-day path.
    pub fn classify(&self, entity_id: EntityId) -> HazardClassification {
        classify(&self.store, &self.index, entity_id, &self.config)
    }

    /// Classifies whatever `ticket` selected; `None` when nothing is selected.
    pub fn classify_selection(&self, ticket: &SelectionTicket) -> Option<HazardClassification> {
        match ticket.selection() {
            Selection::None => None,
            Selection::Entity(id) => Some(self.classify(id)),
        }
    }
}

// ============================================================================
// GENERATION HANDLE
// ============================================================================

/// Shared, swappable reference to the current generation.
///
/// Readers call [`current`](Self::current) and work on the returned `Arc`
/// for as long as they like; a concurrent [`publish`](Self::publish) never
/// changes what they see.
#[derive(Debug)]
pub struct EngineHandle {
    current: RwLock<Arc<Engine>>,
    generation: AtomicU64,
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new(Engine::default())
    }
}

impl EngineHandle {
    /// Creates a handle and publishes `engine` as generation 1.
    pub fn new(engine: Engine) -> Self {
        let handle = Self {
            current: RwLock::new(Arc::new(Engine::default())),
            generation: AtomicU64::new(0),
        };
        handle.publish(engine);
        handle
    }

    /// Swaps in a new generation and returns its number.
    pub fn publish(&self, mut engine: Engine) -> u64 {
        let mut current = self.current.write();
        let generation = self.generation.load(Ordering::Acquire) + 1;
        engine.generation = generation;

        info!(
            "publish: generation {} ({} entities, {} hazards)",
            generation,
            engine.store.entity_count(),
            engine.index.len()
        );

        *current = Arc::new(engine);
        self.generation.store(generation, Ordering::Release);
        generation
    }

    /// The generation readers should use right now.
    pub fn current(&self) -> Arc<Engine> {
        Arc::clone(&self.current.read())
    }

    /// Number of the latest published generation (cheap to poll).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Loads a new generation with the current config and publishes it.
    ///
    /// On failure the previous generation stays in place.
    pub async fn refresh<S, H>(&self, snapshots: &S, hazards: &H) -> Result<(u64, LoadReport), LoadError>
    where
        S: SnapshotProvider + ?Sized,
        H: HazardProvider + ?Sized,
    {
        let config = *self.current().config();
        match Engine::load(snapshots, hazards, config).await {
            Ok((engine, report)) => Ok((self.publish(engine), report)),
            Err(e) => {
                warn!(
                    "refresh failed, keeping generation {}: {}",
                    self.generation(),
                    e
                );
                Err(e)
            }
        }
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// What the user currently has selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    None,
    Entity(EntityId),
}

/// Proof of which selection a piece of work was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    epoch: u64,
    selection: Selection,
}

impl SelectionTicket {
    pub fn selection(&self) -> Selection {
        self.selection
    }
}

/// Last-selection-wins gate for on-demand work.
///
/// Every `select` starts a new epoch. Results produced for an older epoch
/// are discarded by [`accept`](Self::accept), so a slow classification can
/// never overwrite the result for a newer selection.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    epoch: AtomicU64,
    current: Mutex<Selection>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new selection and returns the ticket for work started on it.
    pub fn select(&self, selection: Selection) -> SelectionTicket {
        let mut current = self.current.lock();
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        *current = selection;
        SelectionTicket { epoch, selection }
    }

    pub fn current(&self) -> Selection {
        *self.current.lock()
    }

    /// Whether `ticket` still belongs to the latest selection.
    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        self.epoch.load(Ordering::Acquire) == ticket.epoch
    }

    /// Returns `value` if the ticket is still current, otherwise drops it.
    pub fn accept<T>(&self, ticket: &SelectionTicket, value: T) -> Option<T> {
        self.is_current(ticket).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skywatch_hazard::HazardBucket;
    use skywatch_env::{AcqTime, FireRecord, RawBalloonFeed, StaticFeed};

    fn feed() -> StaticFeed {
        let mut balloons = RawBalloonFeed::new();
        balloons.insert_hour(0, vec![[0.0, 0.0, 10.0], [5.0, 5.0, 12.0]]);
        balloons.insert_hour(1, vec![[0.0, 1.0, 11.0], [5.0, 6.0, 13.0]]);

        let fires = vec![FireRecord {
            latitude: 0.0,
            longitude: 0.5,
            acq_date: "2025-06-01".to_string(),
            acq_time: AcqTime::Text("1405".to_string()),
            confidence: "h".to_string(),
            frp: 12.0,
        }];

        StaticFeed::new(balloons, fires)
    }

    #[tokio::test]
    async fn test_load_builds_generation() {
        let feed = feed();
        let (engine, report) = Engine::load(&feed, &feed, ClassifierConfig::default())
            .await
            .unwrap();

        assert_eq!(report.snapshots.accepted, 4);
        assert_eq!(report.hazards.accepted, 1);
        assert_eq!(engine.stats().len(), 2);
        assert_eq!(engine.classify(0).worst_bucket(), HazardBucket::Red);
        assert_eq!(engine.classify(1).unique_hazard_count, 0);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_config() {
        let feed = feed();
        let config = ClassifierConfig {
            red_km: -1.0,
            ..Default::default()
        };

        let result = Engine::load(&feed, &feed, config).await;
        assert!(matches!(result, Err(LoadError::Config(_))));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_generation() {
        let handle = EngineHandle::default();
        let feed = feed();

        let (generation, _) = handle.refresh(&feed, &feed).await.unwrap();
        assert_eq!(generation, 2);

        let before = handle.current();
        let broken = StaticFeed::unavailable();
        assert!(handle.refresh(&broken, &broken).await.is_err());

        assert_eq!(handle.generation(), 2);
        assert!(Arc::ptr_eq(&before, &handle.current()));
    }

    #[test]
    fn test_publish_swaps_whole_generation() {
        let handle = EngineHandle::new(Engine::default());
        assert_eq!(handle.generation(), 1);

        let old = handle.current();
        let store = SnapshotStore::new(vec![Snapshot::new(0, 0, 1.0, 1.0, 1.0)]).unwrap();
        let generation = handle.publish(Engine::new(store, SpatialIndex::empty()));

        assert_eq!(generation, 2);
        assert_eq!(handle.current().generation(), 2);
        assert_eq!(handle.current().store().entity_count(), 1);
        // Readers of the old generation are unaffected
        assert_eq!(old.generation(), 1);
        assert!(old.store().is_empty());
    }

    #[test]
    fn test_with_config_validates() {
        let engine = Engine::default();
        assert!(engine.clone().with_config(ClassifierConfig::coarse()).is_ok());

        let bad = ClassifierConfig {
            max_segment_km: f64::NAN,
            ..Default::default()
        };
        assert!(engine.with_config(bad).is_err());
    }

    #[test]
    fn test_stale_selection_discarded() {
        let tracker = SelectionTracker::new();
        let engine = Engine::default();

        let first = tracker.select(Selection::Entity(1));
        let second = tracker.select(Selection::Entity(2));

        let stale = engine.classify_selection(&first);
        assert!(tracker.accept(&first, stale).is_none());
        assert!(!tracker.is_current(&first));

        let fresh = engine.classify_selection(&second);
        assert!(tracker.accept(&second, fresh).is_some());
        assert_eq!(tracker.current(), Selection::Entity(2));
    }

    #[test]
    fn test_no_selection_classifies_nothing() {
        let tracker = SelectionTracker::new();
        let engine = Engine::default();

        let ticket = tracker.select(Selection::None);
        assert!(engine.classify_selection(&ticket).is_none());
    }

    #[test]
    fn test_engine_shared_across_threads() {
        let handle = Arc::new(EngineHandle::default());
        let store = SnapshotStore::new(vec![
            Snapshot::new(0, 0, 0.0, 0.0, 1.0),
            Snapshot::new(0, 1, 0.0, 1.0, 1.0),
        ])
        .unwrap();
        handle.publish(Engine::new(store, SpatialIndex::empty()));

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || {
                    let engine = handle.current();
                    engine.position_at(0, 0.25 * i as f64).is_some()
                })
            })
            .collect();

        for w in workers {
            assert!(w.join().unwrap());
        }
    }
}
