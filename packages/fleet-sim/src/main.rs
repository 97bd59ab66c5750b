//! main.rs: Offline fleet driver
//!
//! Seeds an in-memory fleet from a preset, a scenario file or an uploaded route
//! file, then steps the tick scheduler by hand with a seeded RNG and a manual
//! clock. Every tick prints one JSON line per vessel to stdout; the audit trail
//! follows at the end. Logs go to stderr.

mod scenarios;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use fleet_backend::ingest::{IngestError, UploadFormat};
use fleet_backend::{
    AuditLogger, FleetConfig, FleetEngine, FleetError, ManualClock, ManualTicks, MemoryStore,
    NewVessel, RandomSource, RouteInput, TickScheduler, VesselFilter, Waypoint,
};
use fleet_types::{Vessel, VesselStatus, VesselType};
use serde_json::json;
use tracing::{info, warn};

use scenarios::Scenario;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fleet-sim", about = "Step the fleet engine offline and print telemetry")]
struct Args {
    /// Preset fleet: coastal, mixed-fleet, patrol
    #[arg(short, long, default_value = "mixed-fleet")]
    scenario: String,
    /// TOML scenario file (overrides --scenario)
    #[arg(long)]
    scenario_file: Option<PathBuf>,
    /// JSON or CSV track for a single vessel (overrides both)
    #[arg(long)]
    route: Option<PathBuf>,
    /// Engine config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of ticks to run
    #[arg(short, long, default_value = "60")]
    ticks: u64,
    /// RNG seed
    #[arg(long, default_value = "7")]
    seed: u64,
    /// Interpolation steps per waypoint leg
    #[arg(long)]
    steps_per_leg: Option<usize>,
    /// Dock vessels as soon as they reach their destination
    #[arg(long)]
    dock: bool,
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_sim=info,fleet_backend=warn".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = FleetConfig::load(args.config.as_deref())?;
    config.simulation.seed = Some(args.seed);
    if let Some(steps) = args.steps_per_leg {
        config.simulation.steps_per_leg = steps;
    }
    config.validate()?;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = FleetEngine::new(
        MemoryStore::new(),
        AuditLogger::in_memory(),
        config.simulation.clone(),
    )
    .with_clock(clock.clone())
    .with_random_source(RandomSource::seeded(args.seed));

    let seeded = match &args.route {
        Some(path) => seed_from_route(&engine, path).await?,
        None => {
            let scenario = match &args.scenario_file {
                Some(path) => Scenario::load(path)?,
                None => match scenarios::preset(&args.scenario) {
                    Some(s) => s,
                    None => bail!(
                        "unknown scenario {:?} (expected one of {})",
                        args.scenario,
                        scenarios::PRESETS.join(", ")
                    ),
                },
            };
            seed_from_scenario(&engine, &scenario).await?
        }
    };

    info!(
        "🛥  Fleet sim: {seeded} vessels, {} ticks, seed {}",
        args.ticks, args.seed
    );

    let step = Duration::from_std(config.simulation.tick_interval())
        .context("tick interval out of range")?;
    let (source, trigger) = ManualTicks::new();
    let mut scheduler = TickScheduler::new(engine.clone(), source);
    scheduler.start();

    for tick in 1..=args.ticks {
        clock.advance(step);
        let Some(report) = trigger.tick().await else {
            bail!("scheduler stopped unexpectedly");
        };

        for vessel in engine.list_vessels(VesselFilter::All).await? {
            print_telemetry(tick, &vessel);
            if args.dock && should_dock(&vessel, engine.settings().position_tolerance_deg) {
                match engine
                    .request_status_transition(vessel.id, VesselStatus::Docked)
                    .await
                {
                    Ok(_) => info!("⚓ {} docked at tick {tick}", vessel.name),
                    Err(e) => warn!("Could not dock {}: {e}", vessel.name),
                }
            }
        }

        if report.advanced == 0 && report.failed == 0 {
            info!("🏁 Fleet idle after {tick} ticks");
            break;
        }
    }

    let stats = scheduler.stop().await;
    info!(
        "Done: {} ticks, {} advances, {} holds, {} failures",
        stats.ticks, stats.advanced, stats.holding, stats.failed
    );

    // Oldest first reads naturally at the end of a run.
    for record in engine.audit_log().await.into_iter().rev() {
        println!("{}", json!({ "kind": "audit", "record": record }));
    }
    Ok(())
}

// ── Seeding ───────────────────────────────────────────────────────────────────

async fn seed_from_scenario(engine: &FleetEngine, scenario: &Scenario) -> Result<usize> {
    for v in &scenario.vessels {
        let created = engine
            .create_vessel(
                NewVessel::new(&v.name, &v.registry, v.vessel_type).at(v.start.lat, v.start.lng),
            )
            .await?;
        if v.waypoints.is_empty() {
            continue;
        }
        let waypoints = v
            .waypoints
            .iter()
            .map(|p| Waypoint::new(p.lat, p.lng))
            .collect();
        engine
            .replace_route(created.id, &RouteInput::Waypoints(waypoints))
            .await?;
    }
    Ok(scenario.vessels.len())
}

async fn seed_from_route(engine: &FleetEngine, path: &Path) -> Result<usize> {
    let Some(format) = UploadFormat::from_path(path) else {
        return Err(FleetError::Upload(IngestError::Unsupported(path.display().to_string())).into());
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading route {}", path.display()))?;

    let vessel = engine
        .create_vessel(NewVessel::new("Route Runner", "SIM-ROUTE-1", VesselType::Cargo))
        .await?;
    let vessel = engine.upload_route(vessel.id, format, &bytes).await?;
    info!(
        "📍 Loaded {} track points from {}",
        vessel.route_history.len(),
        path.display()
    );
    Ok(1)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn should_dock(vessel: &Vessel, tolerance: f64) -> bool {
    vessel.status == VesselStatus::Active
        && vessel.route_history.len() > 1
        && vessel.at_destination(tolerance)
}

fn print_telemetry(tick: u64, v: &Vessel) {
    let engine = v.engine_metrics.last();
    println!(
        "{}",
        json!({
            "kind": "telemetry",
            "tick": tick,
            "id": v.id,
            "name": v.name,
            "type": v.vessel_type,
            "status": v.status,
            "cursor": v.route_cursor,
            "routeLength": v.route_history.len(),
            "location": v.location,
            "navigation": v.navigation,
            "weather": v.weather,
            "engine": engine,
            "depth": v.depth_logs.last().map(|d| d.depth),
        })
    );
}
