use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fleet_backend::config::Overrides;
use fleet_backend::{
    AuditLogger, FleetConfig, FleetEngine, IntervalTicks, MemoryStore, TickScheduler,
};

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fleet-backend", about = "Fleet simulation & telemetry engine")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Seconds between ticks
    #[arg(long)]
    tick_secs: Option<f64>,
    /// Interpolation steps per waypoint leg
    #[arg(long)]
    steps_per_leg: Option<usize>,
    /// Fuel percentage points burned per advanced tick
    #[arg(long)]
    fuel_burn: Option<f64>,
    /// Fixed RNG seed
    #[arg(long)]
    seed: Option<u64>,
    /// Fleet snapshot file
    #[arg(long)]
    state_file: Option<PathBuf>,
    /// Audit chain file (JSON lines)
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            tick_interval_secs: self.tick_secs,
            steps_per_leg: self.steps_per_leg,
            fuel_burn_per_step: self.fuel_burn,
            metrics_retention: None,
            seed: self.seed,
            state_file: self.state_file.clone(),
            audit_log: self.audit_log.clone(),
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_backend=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = FleetConfig::load(args.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    config.apply(args.overrides());
    config.validate()?;

    info!("🌊 Fleet engine starting...");

    let store = match &config.storage.state_file {
        Some(path) => MemoryStore::open(path).await,
        None => MemoryStore::new(),
    };
    let audit = match &config.storage.audit_log {
        Some(path) => AuditLogger::open(path)
            .await
            .with_context(|| format!("opening audit log {}", path.display()))?,
        None => AuditLogger::in_memory(),
    };

    let period = config.simulation.tick_interval();
    let engine = FleetEngine::new(store, audit, config.simulation.clone());
    let mut scheduler = TickScheduler::new(engine, IntervalTicks::new(period));
    scheduler.start();

    info!(
        "🚀 Advancing fleet every {:.1}s ({} steps per leg)",
        period.as_secs_f64(),
        config.simulation.steps_per_leg
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    let stats = scheduler.stop().await;
    info!(
        "👋 Stopped after {} ticks ({} advances, {} failures)",
        stats.ticks, stats.advanced, stats.failed
    );
    Ok(())
}
