//! # scheduler
//!
//! Background loop that calls `FleetEngine::advance_all_vessels` once per tick.
//!
//! Ticks never overlap: the loop awaits each tick's report before waiting for the
//! next one. Where ticks come from is pluggable: `IntervalTicks` for the service,
//! `ManualTicks` for tests and offline drivers.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::audit::AuditSink;
use crate::engine::{FleetEngine, TickReport};
use crate::persistence::VesselStore;

/// Summary log every N ticks; every tick is logged at debug.
const SUMMARY_EVERY: u64 = 6;

/// One tick. Manual ticks may ask for the report back.
#[derive(Debug, Default)]
pub struct Tick {
    reply: Option<oneshot::Sender<TickReport>>,
}

pub trait TickSource: Send + 'static {
    /// Next tick, or `None` once the source is exhausted.
    fn next_tick(&mut self) -> impl Future<Output = Option<Tick>> + Send;
}

// ─── Interval ticks ───────────────────────────────────────────────────────────

/// Fixed-period ticks. The first fires one period after creation; late ticks are
/// delayed rather than bursted.
pub struct IntervalTicks {
    interval: Interval,
}

impl IntervalTicks {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        self.interval.tick().await;
        Some(Tick::default())
    }
}

// ─── Manual ticks ─────────────────────────────────────────────────────────────

pub struct ManualTicks {
    rx: mpsc::Receiver<Tick>,
}

/// Handle that fires `ManualTicks`. Dropping every trigger ends the source.
#[derive(Clone)]
pub struct TickTrigger {
    tx: mpsc::Sender<Tick>,
}

impl ManualTicks {
    pub fn new() -> (Self, TickTrigger) {
        let (tx, rx) = mpsc::channel(16);
        (Self { rx }, TickTrigger { tx })
    }
}

impl TickSource for ManualTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }
}

impl TickTrigger {
    /// Fire one tick and wait for its report. `None` if the scheduler is gone.
    pub async fn tick(&self) -> Option<TickReport> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Tick { reply: Some(reply) }).await.ok()?;
        rx.await.ok()
    }

    /// Fire one tick without waiting.
    pub async fn fire(&self) -> bool {
        self.tx.send(Tick::default()).await.is_ok()
    }
}

// ─── Scheduler ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub advanced: usize,
    pub holding: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Ticks where the vessel list itself could not be read
    pub failed_ticks: u64,
}

impl SchedulerStats {
    fn absorb(&mut self, report: &TickReport) {
        self.advanced += report.advanced;
        self.holding += report.holding;
        self.skipped += report.skipped;
        self.failed += report.failed;
    }
}

pub struct TickScheduler<S, A, T> {
    engine: FleetEngine<S, A>,
    source: Option<T>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<SchedulerStats>>,
}

impl<S: VesselStore, A: AuditSink, T: TickSource> TickScheduler<S, A, T> {
    pub fn new(engine: FleetEngine<S, A>, source: T) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            engine,
            source: Some(source),
            stop_tx,
            task: None,
        }
    }

    /// Spawn the loop. Returns false if it was already started.
    pub fn start(&mut self) -> bool {
        let Some(source) = self.source.take() else {
            warn!("Scheduler already started");
            return false;
        };
        let stop_rx = self.stop_tx.subscribe();
        self.task = Some(tokio::spawn(run(self.engine.clone(), source, stop_rx)));
        info!("⏱️  Tick scheduler started");
        true
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the loop and wait for it. An in-flight tick finishes first.
    pub async fn stop(&mut self) -> SchedulerStats {
        self.stop_tx.send_replace(true);
        self.wait().await
    }

    /// Wait for the loop to end on its own (source exhausted).
    pub async fn wait(&mut self) -> SchedulerStats {
        let Some(task) = self.task.take() else {
            return SchedulerStats::default();
        };
        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Scheduler task failed: {e}");
                SchedulerStats::default()
            }
        }
    }
}

async fn run<S, A, T>(
    engine: FleetEngine<S, A>,
    mut source: T,
    mut stop_rx: watch::Receiver<bool>,
) -> SchedulerStats
where
    S: VesselStore,
    A: AuditSink,
    T: TickSource,
{
    let mut stats = SchedulerStats::default();

    loop {
        let tick = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            tick = source.next_tick() => match tick {
                Some(tick) => tick,
                None => break,
            },
        };

        stats.ticks += 1;
        let report = match engine.advance_all_vessels().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Tick {} could not list vessels: {e}", stats.ticks);
                stats.failed_ticks += 1;
                TickReport::default()
            }
        };
        stats.absorb(&report);

        if stats.ticks % SUMMARY_EVERY == 0 {
            info!(
                "📡 Tick {}: {} vessels, {} advanced, {} holding, {} skipped, {} failed",
                stats.ticks,
                report.total(),
                report.advanced,
                report.holding,
                report.skipped,
                report.failed
            );
        } else {
            debug!("Tick {}: {:?}", stats.ticks, report);
        }

        if let Some(reply) = tick.reply {
            let _ = reply.send(report);
        }
    }

    info!("⏹️  Tick scheduler stopped after {} ticks", stats.ticks);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::config::SimulationConfig;
    use crate::engine::NewVessel;
    use crate::persistence::{MemoryStore, StoreError, VesselFilter};
    use crate::route::{RouteInput, Waypoint};
    use crate::weather::RandomSource;
    use fleet_types::{Vessel, VesselId, VesselType};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Memory store whose listing can be switched off.
    #[derive(Clone, Default)]
    struct OutageStore {
        inner: MemoryStore,
        listing_down: Arc<AtomicBool>,
    }

    impl VesselStore for OutageStore {
        async fn find_all(&self, filter: VesselFilter) -> Result<Vec<Vessel>, StoreError> {
            if self.listing_down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("listing offline".into()));
            }
            self.inner.find_all(filter).await
        }

        async fn find_by_id(&self, id: VesselId) -> Result<Vessel, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, vessel: Vessel) -> Result<Vessel, StoreError> {
            self.inner.create(vessel).await
        }

        async fn update(&self, vessel: Vessel) -> Result<Vessel, StoreError> {
            self.inner.update(vessel).await
        }

        async fn delete(&self, id: VesselId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }
    }

    fn engine() -> FleetEngine {
        let settings = SimulationConfig {
            steps_per_leg: 3,
            ..SimulationConfig::default()
        };
        FleetEngine::new(MemoryStore::new(), AuditLogger::in_memory(), settings)
            .with_random_source(RandomSource::seeded(11))
    }

    #[tokio::test]
    async fn manual_ticks_run_exactly_as_requested() {
        let engine = engine();
        let v = engine
            .create_vessel(NewVessel::new("Petrel", "P-1", VesselType::Cargo).at(0.0, 0.0))
            .await
            .unwrap();
        engine
            .replace_route(v.id, &RouteInput::Waypoints(vec![Waypoint::new(0.0, 3.0)]))
            .await
            .unwrap();

        let (source, trigger) = ManualTicks::new();
        let mut scheduler = TickScheduler::new(engine.clone(), source);
        assert!(scheduler.start());
        assert!(!scheduler.start());

        for _ in 0..2 {
            let report = trigger.tick().await.unwrap();
            assert_eq!(report.advanced, 1);
        }

        let stats = scheduler.stop().await;
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.advanced, 2);
        assert!(!scheduler.is_running());
        assert_eq!(engine.get_vessel(v.id).await.unwrap().route_cursor, Some(2));

        // Scheduler is gone; further ticks are not processed.
        assert!(trigger.tick().await.is_none());
    }

    #[tokio::test]
    async fn exhausted_source_ends_the_loop() {
        let (source, trigger) = ManualTicks::new();
        let mut scheduler = TickScheduler::new(engine(), source);
        scheduler.start();
        assert!(trigger.fire().await);
        drop(trigger);

        let stats = scheduler.wait().await;
        assert_eq!(stats.ticks, 1);
    }

    #[tokio::test]
    async fn failed_listing_counts_and_loop_keeps_ticking() {
        let store = OutageStore::default();
        let engine = FleetEngine::new(
            store.clone(),
            AuditLogger::in_memory(),
            SimulationConfig::default(),
        )
        .with_random_source(RandomSource::seeded(5));
        let v = engine
            .create_vessel(NewVessel::new("Shearwater", "SW-1", VesselType::Tanker).at(0.0, 0.0))
            .await
            .unwrap();
        engine
            .replace_route(v.id, &RouteInput::Waypoints(vec![Waypoint::new(1.0, 0.0)]))
            .await
            .unwrap();

        let (source, trigger) = ManualTicks::new();
        let mut scheduler = TickScheduler::new(engine, source);
        scheduler.start();

        store.listing_down.store(true, Ordering::SeqCst);
        let report = trigger.tick().await.unwrap();
        assert_eq!(report, TickReport::default());
        assert!(scheduler.is_running());

        store.listing_down.store(false, Ordering::SeqCst);
        let report = trigger.tick().await.unwrap();
        assert_eq!(report.advanced, 1);
        assert_eq!(report.total(), 1);

        let stats = scheduler.stop().await;
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.failed_ticks, 1);
        assert_eq!(stats.advanced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_wait_one_period_first() {
        let mut ticks = IntervalTicks::new(Duration::from_secs(10));
        let started = Instant::now();
        ticks.next_tick().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        ticks.next_tick().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }
}
