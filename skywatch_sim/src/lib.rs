//! SkyWatch deterministic simulation harness
//!
//! This crate builds synthetic upstream feeds from a single 64-bit seed,
//! loads them through the same provider seam production uses, and checks
//! the engine's answers against ground truth.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  RawBalloonFeed   ┌─────────────┐   Engine::load   ┌──────────┐
//! │  FeedOracle  │ ────────────────► │ StaticFeed  │ ───────────────► │  Engine  │
//! │ (ChaCha8Rng) │  RawHazardFeed    │ (providers) │                  └────┬─────┘
//! └──────┬───────┘                   └─────────────┘                       │
//!        │ ground truth                                                   │ answers
//!        └──────────────────────────► ScenarioRunner checks ◄────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use skywatch_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 50).run(ScenarioId::Dateline);
//! assert!(result.passed);
//! ```

pub mod exporter;
pub mod oracle;
pub mod runner;
pub mod scenarios;

pub use exporter::{EntityPosition, SimExport, SimFrame};
pub use oracle::{Drift, FeedOracle, GroundTruthBalloon};
pub use runner::{ScenarioFailure, ScenarioMetrics, ScenarioResult, ScenarioRunner, ScenarioSetup, SimConfig};
pub use scenarios::ScenarioId;
