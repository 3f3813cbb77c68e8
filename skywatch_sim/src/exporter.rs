//! JSON exporter for offline visualization.
//!
//! Samples interpolated positions across the day and attaches one entity's
//! hazard classification, so a plotting script can replay the run.

use serde::{Deserialize, Serialize};
use skywatch_core::geodesy::clamp_render_lat;
use skywatch_core::{Engine, EntityId, HazardClassification, Snapshot};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Fractional hour in `[0, 24)`
    pub time_hours: f64,

    /// Interpolated entity positions
    pub positions: Vec<EntityPosition>,
}

/// Position of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPosition {
    pub id: EntityId,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,

    /// Latitude as drawn on a Web Mercator map
    pub render_lat: f64,
}

impl From<Snapshot> for EntityPosition {
    fn from(s: Snapshot) -> Self {
        Self {
            id: s.entity_id,
            lat: s.lat,
            lon: s.lon,
            alt: s.alt,
            render_lat: clamp_render_lat(s.lat),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Classification of the highlighted entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<HazardClassification>,

    /// Final results
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            frames: Vec::new(),
            classification: None,
            passed: false,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    /// Samples `engine` every `step_hours` across the day.
    pub fn capture_day(&mut self, engine: &Engine, step_hours: f64) {
        if !(step_hours > 0.0) {
            return;
        }
        let mut t = 0.0;
        while t < 24.0 {
            self.add_frame(SimFrame {
                time_hours: t,
                positions: engine.positions_at(t).into_iter().map(EntityPosition::from).collect(),
            });
            t += step_hours;
        }
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, classification: Option<HazardClassification>) {
        self.passed = passed;
        self.classification = classification;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
