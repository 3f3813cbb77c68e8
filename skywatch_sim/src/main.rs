//! SkyWatch Simulator CLI
//!
//! Run deterministic synthetic-feed scenarios against the engine.

use clap::Parser;
use skywatch_core::{ClassifierConfig, Engine};
use skywatch_sim::{ScenarioId, ScenarioResult, ScenarioRunner, ScenarioSetup, SimExport};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Frame spacing for `--export` (hours)
const EXPORT_STEP_HOURS: f64 = 0.25;

/// Runs `scenario`, then replays its engine into a JSON export.
fn run_with_export(runner: &ScenarioRunner, scenario: ScenarioId, export_path: &str) -> ScenarioResult {
    let result = runner.run(scenario);
    let setup = ScenarioSetup::build(scenario, runner.config());
    let feed = setup.feed();

    let loaded = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| e.to_string())
        .and_then(|rt| {
            rt.block_on(Engine::load(&feed, &feed, ClassifierConfig::default()))
                .map_err(|e| e.to_string())
        });

    match loaded {
        Ok((engine, _)) => {
            let mut export = SimExport::new(scenario.name(), runner.config().seed);
            export.capture_day(&engine, EXPORT_STEP_HOURS);
            export.finalize(result.passed, Some(engine.classify(setup.target)));

            if let Err(e) = export.write_to_file(export_path) {
                error!("Failed to write export: {:?}", e);
            } else {
                info!("Exported {} frames to {}", export.frames.len(), export_path);
            }
        }
        Err(e) => error!("Failed to load engine for export: {}", e),
    }

    result
}

/// SkyWatch deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "skywatch-sim")]
#[command(about = "Run deterministic synthetic-feed scenarios for SkyWatch", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of background balloons
    #[arg(short, long, default_value = "50")]
    entities: usize,

    /// Scenario to run (baseline, dateline, polar, sparse, fire_cluster, corrupt_feed, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export frames and the target classification to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("SkyWatch Simulator v{}", env!("CARGO_PKG_VERSION"));
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let runner = ScenarioRunner::new(base_seed, args.entities);
        let result = run_with_export(&runner, scenarios[0], export_path);

        if result.passed {
            info!("✓ {} (seed={}) PASSED - exported to {}", scenarios[0].name(), base_seed, export_path);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed, args.entities);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED | hazards={} frame={:.0}us",
                        scenario.name(),
                        seed,
                        result.metrics.target_hazards,
                        result.metrics.frame_avg_us
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            all_results.push(result);
        }
    }

    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else if failed_count == 0 {
        info!("✅ All {} scenario runs passed!", total);
    } else {
        error!("❌ {}/{} scenario runs failed!", failed_count, total);
        for result in all_results.iter().filter(|r| !r.passed) {
            error!(
                "  - {} seed={}: {}",
                result.scenario.name(),
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
