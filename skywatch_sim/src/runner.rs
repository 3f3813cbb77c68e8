//! Scenario runner - builds synthetic feeds, loads an engine and checks it.

use crate::oracle::{Drift, FeedOracle};
use crate::scenarios::ScenarioId;

use serde::{Deserialize, Serialize};
use skywatch_core::geodesy::{normalize_lon_delta, MAX_RENDER_LAT};
use skywatch_core::skywatch_store::HOURS_PER_DAY;
use skywatch_core::{ClassifierConfig, Engine, EngineHandle, LoadError, LoadReport};
use skywatch_env::StaticFeed;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a scenario run failed.
#[derive(Debug, Error)]
pub enum ScenarioFailure {
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Refresh failed: {0}")]
    Refresh(LoadError),

    /// An engine answer disagreed with ground truth
    #[error("{check} check: {detail}")]
    Check { check: &'static str, detail: String },
}

impl ScenarioFailure {
    pub fn check(check: &'static str, detail: impl Into<String>) -> Self {
        ScenarioFailure::Check {
            check,
            detail: detail.into(),
        }
    }
}

fn fail<T>(check: &'static str, detail: String) -> Result<T, ScenarioFailure> {
    Err(ScenarioFailure::check(check, detail))
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Background balloons spawned in addition to the target and control
    pub num_entities: usize,

    /// Hazards scattered away from the target and control
    pub scattered_hazards: usize,

    /// Frames sampled for the `positions_at` timing
    pub frame_samples: usize,

    /// Per-frame budget for `positions_at` (ms); overruns are reported, not failed
    pub frame_budget_ms: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_entities: 50,
            scattered_hazards: 200,
            frame_samples: 60,
            frame_budget_ms: 16.0,
        }
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    /// Entities with at least one snapshot
    pub entities: usize,

    pub snapshots_accepted: usize,
    pub snapshots_skipped: usize,
    pub hazards_indexed: usize,
    pub hazards_skipped: usize,

    /// Sub-segments in the target's classified path
    pub target_segments: usize,

    /// Unique hazards near the target's path
    pub target_hazards: usize,

    /// Mean and worst `positions_at` time per frame (microseconds)
    pub frame_avg_us: f64,
    pub frame_max_us: f64,
}

/// A scenario's feeds plus the facts the checks rely on.
pub struct ScenarioSetup {
    /// Ground truth
    pub oracle: FeedOracle,

    /// Balloon with hazards placed on its path
    pub target: usize,

    /// Balloon kept clear of every hazard
    pub control: usize,

    /// Hazard ids placed on the target's path
    pub placed: Vec<usize>,
}

impl ScenarioSetup {
    /// Builds the deterministic feeds for `scenario`.
    pub fn build(scenario: ScenarioId, config: &SimConfig) -> Self {
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut oracle = FeedOracle::new(physics_seed);
        let mut placed = Vec::new();

        let eastward = |lon_per_hour: f64| Drift {
            lat_per_hour: 0.0,
            lon_per_hour,
        };

        let (target, control) = match scenario {
            ScenarioId::Baseline | ScenarioId::Sparse | ScenarioId::CorruptFeed => (
                oracle.spawn_balloon(30.0, -40.0, 12.0, eastward(0.8)),
                oracle.spawn_balloon(-45.0, 100.0, 12.0, eastward(0.8)),
            ),
            ScenarioId::Dateline => (
                oracle.spawn_balloon(10.0, 172.0, 15.0, eastward(1.2)),
                oracle.spawn_balloon(-50.0, -60.0, 15.0, eastward(1.0)),
            ),
            ScenarioId::Polar => (
                oracle.spawn_balloon(82.0, 0.0, 15.0, eastward(3.0)),
                oracle.spawn_balloon(-40.0, 50.0, 15.0, eastward(1.0)),
            ),
            ScenarioId::FireCluster => (
                oracle.spawn_balloon(-20.0, 20.0, 18.0, eastward(0.6)),
                oracle.spawn_balloon(45.0, -120.0, 18.0, eastward(0.6)),
            ),
        };

        let band = match scenario {
            ScenarioId::Polar => (80.0, 89.5),
            _ => (-60.0, 60.0),
        };
        let background = oracle.spawn_random_balloons(config.num_entities, band);

        match scenario {
            ScenarioId::Baseline => {
                for hour in [4, 11, 18] {
                    placed.push(oracle.place_hazard_near(target, hour, 1.0));
                }
            }
            ScenarioId::Dateline => {
                for hour in 5..=8 {
                    placed.push(oracle.place_hazard_near(target, hour, 1.0));
                }
            }
            ScenarioId::Polar => {
                for hour in [5, 15] {
                    placed.push(oracle.place_hazard_near(target, hour, 1.0));
                }
            }
            ScenarioId::Sparse => {
                oracle.add_gaps(&background, 0.3);
                for hour in [6, 16] {
                    placed.push(oracle.place_hazard_near(target, hour, 1.0));
                }
            }
            ScenarioId::FireCluster => {
                for i in 0..25 {
                    let offset_km = 0.08 * i as f64;
                    placed.push(oracle.place_hazard_near(target, 12, offset_km));
                }
            }
            ScenarioId::CorruptFeed => {
                let rows = (background.len() * HOURS_PER_DAY / 10).max(1);
                oracle.corrupt_rows(&background, rows);
                oracle.inject_bad_hazards(6);
                placed.push(oracle.place_hazard_near(target, 9, 1.0));
            }
        }

        let scattered = oracle.scatter_hazards(config.scattered_hazards, &[target, control], 300.0);
        debug!(
            "setup {}: balloons={} placed={} scattered={}",
            scenario.name(),
            oracle.balloons().len(),
            placed.len(),
            scattered
        );

        Self {
            oracle,
            target,
            control,
            placed,
        }
    }

    /// A provider serving this setup's feeds.
    pub fn feed(&self) -> StaticFeed {
        StaticFeed::new(self.oracle.balloon_feed(), self.oracle.hazard_feed())
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_entities: usize) -> Self {
        Self::with_config(SimConfig {
            seed,
            num_entities,
            ..Default::default()
        })
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Sets how many hazards are scattered away from the target and control.
    pub fn with_hazards(mut self, scattered: usize) -> Self {
        self.config.scattered_hazards = scattered;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let setup = ScenarioSetup::build(scenario, &self.config);
        let mut metrics = ScenarioMetrics::default();
        let outcome = self.execute(scenario, &setup, &mut metrics);

        ScenarioResult {
            scenario,
            seed: self.config.seed,
            passed: outcome.is_ok(),
            failure_reason: outcome.err().map(|e| e.to_string()),
            metrics,
        }
    }

    fn execute(
        &self,
        scenario: ScenarioId,
        setup: &ScenarioSetup,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let feed = setup.feed();

        let (engine, report) = runtime.block_on(Engine::load(&feed, &feed, ClassifierConfig::default()))?;

        metrics.snapshots_accepted = report.snapshots.accepted;
        metrics.snapshots_skipped = report.snapshots.skipped;
        metrics.hazards_indexed = engine.index().len();
        metrics.hazards_skipped = report.hazards.skipped;

        check_ingest(setup, &report)?;
        check_stats(setup, &engine, metrics)?;
        check_interpolation(setup, &engine)?;
        check_tracked_pair(setup, &engine, metrics)?;

        match scenario {
            ScenarioId::Dateline => check_dateline(setup, &engine)?,
            ScenarioId::Polar => check_polar(&engine)?,
            ScenarioId::FireCluster => check_cluster(setup, &engine)?,
            _ => {}
        }

        check_generation_swap(&runtime, &engine, &feed)?;
        self.measure_frames(&engine, metrics);

        Ok(())
    }

    fn measure_frames(&self, engine: &Engine, metrics: &mut ScenarioMetrics) {
        let samples = self.config.frame_samples.max(1);
        let mut total_us = 0.0;
        let mut worst_us: f64 = 0.0;

        for i in 0..samples {
            let t = i as f64 * HOURS_PER_DAY as f64 / samples as f64;
            let started = Instant::now();
            let frame = engine.positions_at(t);
            let elapsed_us = started.elapsed().as_secs_f64() * 1e6;
            debug!("frame t={:.2} positions={} {:.1}us", t, frame.len(), elapsed_us);

            total_us += elapsed_us;
            worst_us = worst_us.max(elapsed_us);
        }

        metrics.frame_avg_us = total_us / samples as f64;
        metrics.frame_max_us = worst_us;

        if metrics.frame_avg_us > self.config.frame_budget_ms * 1000.0 {
            warn!(
                "positions_at averaged {:.0}us per frame, over the {:.1}ms budget",
                metrics.frame_avg_us, self.config.frame_budget_ms
            );
        }
    }
}

// ============================================================================
// CHECKS
// ============================================================================

fn check_ingest(setup: &ScenarioSetup, report: &LoadReport) -> Result<(), ScenarioFailure> {
    let expected = setup.oracle.expected_skipped_snapshots();
    if report.snapshots.skipped != expected {
        return fail("ingest", format!(
            "snapshot rows skipped: got {}, expected {}",
            report.snapshots.skipped, expected
        ));
    }

    let expected = setup.oracle.expected_skipped_hazards();
    if report.hazards.skipped != expected {
        return fail("ingest", format!(
            "hazard records skipped: got {}, expected {}",
            report.hazards.skipped, expected
        ));
    }
    Ok(())
}

/// Stats must follow the raw (unclamped) observed track, skipping gaps.
fn check_stats(setup: &ScenarioSetup, engine: &Engine, metrics: &mut ScenarioMetrics) -> Result<(), ScenarioFailure> {
    let stats = engine.stats();
    metrics.entities = stats.len();

    for balloon in setup.oracle.balloons() {
        let observed = setup.oracle.observed_track(balloon.id);
        let entry = stats.get(&balloon.id);

        let Some(entry) = entry else {
            if observed.is_empty() {
                continue;
            }
            return fail("stats", format!("entity {} has no stats", balloon.id));
        };

        if entry.hours_present as usize != observed.len() {
            return fail("stats", format!(
                "entity {} hours_present {} != {}",
                balloon.id,
                entry.hours_present,
                observed.len()
            ));
        }

        let reference = setup.oracle.reference_distance_m(balloon.id);
        if (entry.total_distance_m - reference).abs() > 1e-6 * reference.max(1.0) {
            return fail("stats", format!(
                "entity {} distance {:.3}m != reference {:.3}m",
                balloon.id, entry.total_distance_m, reference
            ));
        }

        let max_alt = observed.iter().map(|(_, p)| p[2]).fold(f64::NEG_INFINITY, f64::max);
        if entry.max_altitude != max_alt {
            return fail("stats", format!(
                "entity {} max altitude {} != {}",
                balloon.id, entry.max_altitude, max_alt
            ));
        }
    }
    Ok(())
}

/// Integer hours return stored snapshots exactly; half hours exist only
/// when both bracketing hours do.
fn check_interpolation(setup: &ScenarioSetup, engine: &Engine) -> Result<(), ScenarioFailure> {
    for balloon in setup.oracle.balloons() {
        let id = balloon.id;

        for hour in 0..HOURS_PER_DAY {
            let at_hour = engine.position_at(id, hour as f64);
            if setup.oracle.is_observed(hour, id) {
                let [lat, lon, alt] = balloon.track[hour];
                match at_hour {
                    Some(s) if s.lat == lat && s.lon == lon && s.alt == alt => {}
                    other => {
                        return fail("interpolation", format!(
                            "entity {} hour {}: expected exact snapshot, got {:?}",
                            id, hour, other
                        ))
                    }
                }
            } else if at_hour.is_some() {
                return fail("interpolation", format!("entity {} hour {}: position in a gap", id, hour));
            }

            let next = (hour + 1) % HOURS_PER_DAY;
            let bracketed = setup.oracle.is_observed(hour, id) && setup.oracle.is_observed(next, id);
            let halfway = engine.position_at(id, hour as f64 + 0.5);
            if halfway.is_some() != bracketed {
                return fail("interpolation", format!(
                    "entity {} hour {}.5: interpolation present={} but bracket complete={}",
                    id,
                    hour,
                    halfway.is_some(),
                    bracketed
                ));
            }
        }
    }
    Ok(())
}

/// The target sees exactly its placed hazards; the control sees none.
fn check_tracked_pair(setup: &ScenarioSetup, engine: &Engine, metrics: &mut ScenarioMetrics) -> Result<(), ScenarioFailure> {
    let target = engine.classify(setup.target);
    metrics.target_segments = target.segments.len();
    metrics.target_hazards = target.unique_hazard_count;

    if target.unique_hazard_count != setup.placed.len() {
        return fail("tracked_pair", format!(
            "target saw {} hazards, {} were placed on its path",
            target.unique_hazard_count,
            setup.placed.len()
        ));
    }
    if !setup.placed.is_empty() && !target.worst_bucket().is_hazardous() {
        return fail("tracked_pair", "target path has no hazardous segment".to_string());
    }

    let control = engine.classify(setup.control);
    if control.is_empty() {
        return fail("tracked_pair", "control path was not classified".to_string());
    }
    if control.unique_hazard_count != 0 || control.worst_bucket().is_hazardous() {
        return fail("tracked_pair", format!(
            "control saw {} hazards (worst {:?})",
            control.unique_hazard_count,
            control.worst_bucket()
        ));
    }
    Ok(())
}

/// The crossing path is continuous and interpolation takes the short way.
fn check_dateline(setup: &ScenarioSetup, engine: &Engine) -> Result<(), ScenarioFailure> {
    let classification = engine.classify(setup.target);

    for pair in classification.segments.windows(2) {
        if pair[0].end != pair[1].start {
            return fail("dateline", "path segments are not contiguous".to_string());
        }
    }
    if let Some(seg) = classification.segments.iter().find(|s| (s.end.x - s.start.x).abs() > 10.0) {
        return fail("dateline", format!("path jumps from {:?} to {:?}", seg.start, seg.end));
    }

    let track = &setup.oracle.balloons()[setup.target].track;
    for hour in 0..HOURS_PER_DAY - 1 {
        let Some(mid) = engine.position_at(setup.target, hour as f64 + 0.5) else {
            return fail("dateline", format!("target missing at {}.5", hour));
        };
        let step = normalize_lon_delta(track[hour + 1][1] - track[hour][1]).abs();
        let from_start = normalize_lon_delta(mid.lon - track[hour][1]).abs();
        if from_start > step {
            return fail("dateline", format!(
                "interpolation at {}.5 went the long way round (lon {})",
                hour, mid.lon
            ));
        }
    }
    Ok(())
}

/// Render paths stay inside the clamp even for tracks above it.
fn check_polar(engine: &Engine) -> Result<(), ScenarioFailure> {
    for id in 0..engine.store().entity_count() {
        let classification = engine.classify(id);
        let escaped = classification
            .segments
            .iter()
            .any(|s| s.start.y.abs() > MAX_RENDER_LAT || s.end.y.abs() > MAX_RENDER_LAT);
        if escaped {
            return fail("polar", format!("entity {} path leaves the render clamp", id));
        }
    }
    Ok(())
}

/// Every cluster hazard is indexed and found around the track point.
fn check_cluster(setup: &ScenarioSetup, engine: &Engine) -> Result<(), ScenarioFailure> {
    let [lat, lon, _] = setup.oracle.balloons()[setup.target].track[12];
    let found = engine.index().all_within(lon, lat, 5.0);

    for id in &setup.placed {
        if found.binary_search(&(*id as u64)).is_err() {
            return fail("cluster", format!("cluster hazard {} not found within 5 km", id));
        }
    }

    let nearest = engine
        .index()
        .nearest_within(lon, lat, 5.0)
        .ok_or_else(|| ScenarioFailure::check("cluster", "no nearest hazard around the cluster"))?;
    if nearest.distance_km > 0.01 {
        return fail("cluster", format!("nearest cluster hazard is {:.3} km away", nearest.distance_km));
    }
    Ok(())
}

/// Refreshing publishes a new generation; a failed refresh keeps it.
fn check_generation_swap(
    runtime: &tokio::runtime::Runtime,
    engine: &Engine,
    feed: &StaticFeed,
) -> Result<(), ScenarioFailure> {
    let handle = EngineHandle::new(engine.clone());
    let first = handle.generation();

    let (second, _) = runtime
        .block_on(handle.refresh(feed, feed))
        .map_err(ScenarioFailure::Refresh)?;
    if second <= first || handle.current().generation() != second {
        return fail("generation", format!("refresh published {} after {}", second, first));
    }

    let broken = StaticFeed::unavailable();
    if runtime.block_on(handle.refresh(&broken, &broken)).is_ok() {
        return fail("generation", "refresh from an unavailable feed succeeded".to_string());
    }
    if handle.generation() != second {
        return fail("generation", "failed refresh replaced the current generation".to_string());
    }
    if handle.current().store().snapshot_count() != engine.store().snapshot_count() {
        return fail("generation", "refreshed generation lost snapshots".to_string());
    }
    Ok(())
}
