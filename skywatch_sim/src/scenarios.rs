//! Synthetic feed scenarios.

use std::fmt;
use std::str::FromStr;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Mid-latitude traffic with a few hazards on one balloon's path
    Baseline,

    /// A balloon crossing the antimeridian with hazards at the crossing
    Dateline,

    /// High-latitude tracks, including some above the render clamp
    Polar,

    /// Missing hours everywhere except the tracked pair
    Sparse,

    /// A dense cluster of hazards around one track point
    FireCluster,

    /// Garbage rows and unreadable hazard records
    CorruptFeed,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::Dateline,
            ScenarioId::Polar,
            ScenarioId::Sparse,
            ScenarioId::FireCluster,
            ScenarioId::CorruptFeed,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::Dateline => "dateline",
            ScenarioId::Polar => "polar",
            ScenarioId::Sparse => "sparse",
            ScenarioId::FireCluster => "fire_cluster",
            ScenarioId::CorruptFeed => "corrupt_feed",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Random mid-latitude balloons, scattered fires, 3 fires on the target path",
            ScenarioId::Dateline => "Target drifts east across 180°, fires placed on both sides of the seam",
            ScenarioId::Polar => "Tracks at 80-89°N; stats must use raw latitudes, paths stay clamped",
            ScenarioId::Sparse => "30% of hours missing for background balloons",
            ScenarioId::FireCluster => "25 fires within 2 km of one target position, counted once each",
            ScenarioId::CorruptFeed => "Garbage rows and bad hazard dates must be skipped, not fatal",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ScenarioId::all()
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| format!("unknown scenario: {}", s))
    }
}
