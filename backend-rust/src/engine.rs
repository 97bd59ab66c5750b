//! # engine
//!
//! `FleetEngine` owns every read-modify-write on a vessel. Tick advances and
//! interactive edits run inside the same per-vessel exclusive section, and the
//! store's version check catches anything that slips past it.
//!
//! Status changes go through `lifecycle::authorize`; docking and decommission
//! write their audit record before the status change (or deletion) is committed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use fleet_types::{
    AuditAction, AuditLogEntry, LatLng, Navigation, RoutePoint, Vessel, VesselId, VesselStatus,
    VesselType, Weather,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditLogger, AuditRecord, AuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::SimulationConfig;
use crate::error::FleetError;
use crate::ingest::{self, UploadFormat};
use crate::lifecycle::{self, Action, Decision, Rejection};
use crate::metrics::{ManualMetrics, MetricsRecorder};
use crate::navigation::{self, NavigationModel, StepPlan};
use crate::persistence::{MemoryStore, StoreError, VesselFilter, VesselStore};
use crate::route::{self, Axis, Coordinate, RouteInput, Waypoint};
use crate::weather::{self, RandomSource};

/// Start position when a new vessel gives none.
pub const DEFAULT_START: LatLng = LatLng {
    lat: 13.0,
    lng: 80.0,
};

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVessel {
    pub name: String,
    #[serde(alias = "imoNumber")]
    pub registry_number: String,
    #[serde(rename = "type")]
    pub vessel_type: VesselType,
    #[serde(default, alias = "lat")]
    pub latitude: Option<Coordinate>,
    #[serde(default, alias = "lng")]
    pub longitude: Option<Coordinate>,
}

impl NewVessel {
    pub fn new(
        name: impl Into<String>,
        registry_number: impl Into<String>,
        vessel_type: VesselType,
    ) -> Self {
        Self {
            name: name.into(),
            registry_number: registry_number.into(),
            vessel_type,
            latitude: None,
            longitude: None,
        }
    }

    pub fn at(mut self, lat: impl Into<Coordinate>, lng: impl Into<Coordinate>) -> Self {
        self.latitude = Some(lat.into());
        self.longitude = Some(lng.into());
        self
    }

    fn start_position(&self) -> Result<LatLng, FleetError> {
        let parse = |c: &Option<Coordinate>, axis: Axis| match c {
            Some(c) => c.value(axis, 0),
            None => Ok(None),
        };
        Ok(LatLng::new(
            parse(&self.latitude, Axis::Latitude)?.unwrap_or(DEFAULT_START.lat),
            parse(&self.longitude, Axis::Longitude)?.unwrap_or(DEFAULT_START.lng),
        ))
    }
}

/// Combined edit. Applied in order: route, fields, status, manual metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub vessel_type: Option<VesselType>,
    pub status: Option<VesselStatus>,
    pub waypoints: Option<Vec<Waypoint>>,
    pub manual_metrics: Option<ManualMetrics>,
}

fn required(field: &str, value: &str) -> Result<String, FleetError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FleetError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

// ── Tick results ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Advanced { index: usize },
    /// At the final route point, nothing written
    Holding,
    /// Not allowed to move (docked, maintenance, decommissioned, no route)
    Skipped(Rejection),
    /// Deleted between listing and processing
    Gone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub advanced: usize,
    pub holding: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Advanced { .. } => self.advanced += 1,
            TickOutcome::Holding => self.holding += 1,
            TickOutcome::Skipped(_) | TickOutcome::Gone => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.advanced + self.holding + self.skipped + self.failed
    }
}

// ── Per-vessel locks ──────────────────────────────────────────────────────────

type LockTable = HashMap<VesselId, Arc<Mutex<()>>>;

/// One async mutex per vessel id. Entries live only while someone holds or
/// waits on them, so ids that never resolve leave nothing behind.
#[derive(Default)]
struct VesselLocks {
    table: std::sync::Mutex<LockTable>,
}

impl VesselLocks {
    fn table(&self) -> std::sync::MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(self: &Arc<Self>, id: VesselId) -> VesselGuard {
        let lock = self.table().entry(id).or_default().clone();
        VesselGuard {
            id,
            locks: self.clone(),
            _held: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

struct VesselGuard {
    id: VesselId,
    locks: Arc<VesselLocks>,
    _held: OwnedMutexGuard<()>,
}

impl Drop for VesselGuard {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        // Two references left: the table's and the one inside `_held`.
        if table
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            table.remove(&self.id);
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct FleetEngine<S = MemoryStore, A = AuditLogger> {
    store: Arc<S>,
    audit: Arc<A>,
    clock: Arc<dyn Clock>,
    rng: Arc<RandomSource>,
    locks: Arc<VesselLocks>,
    model: NavigationModel,
    metrics: MetricsRecorder,
    settings: SimulationConfig,
}

impl<S, A> Clone for FleetEngine<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            audit: self.audit.clone(),
            clock: self.clock.clone(),
            rng: self.rng.clone(),
            locks: self.locks.clone(),
            model: self.model,
            metrics: self.metrics,
            settings: self.settings.clone(),
        }
    }
}

impl<S: VesselStore, A: AuditSink> FleetEngine<S, A> {
    pub fn new(store: S, audit: A, settings: SimulationConfig) -> Self {
        Self {
            store: Arc::new(store),
            audit: Arc::new(audit),
            clock: Arc::new(SystemClock),
            rng: Arc::new(RandomSource::from_seed(settings.seed)),
            locks: Arc::default(),
            model: NavigationModel {
                fuel_burn_per_step: settings.fuel_burn_per_step,
                initial_fuel_level: settings.initial_fuel_level,
            },
            metrics: MetricsRecorder::new(settings.metrics_retention),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_random_source(mut self, rng: RandomSource) -> Self {
        self.rng = Arc::new(rng);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SimulationConfig {
        &self.settings
    }

    fn tolerance(&self) -> f64 {
        self.settings.position_tolerance_deg
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─── Reads ───────────────────────────────────────────────────────────────

    pub async fn get_vessel(&self, id: VesselId) -> Result<Vessel, FleetError> {
        Ok(self.store.find_by_id(id).await?)
    }

    pub async fn list_vessels(&self, filter: VesselFilter) -> Result<Vec<Vessel>, FleetError> {
        Ok(self.store.find_all(filter).await?)
    }

    /// Newest first.
    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit.list_records().await
    }

    // ─── Create / delete ─────────────────────────────────────────────────────

    pub async fn create_vessel(&self, req: NewVessel) -> Result<Vessel, FleetError> {
        let name = required("name", &req.name)?;
        let registry_number = required("registry number", &req.registry_number)?;
        let location = req.start_position()?;
        let now = self.now();

        let vessel = Vessel {
            id: Uuid::new_v4(),
            name,
            registry_number,
            vessel_type: req.vessel_type,
            status: VesselStatus::Active,
            location,
            navigation: Navigation::default(),
            weather: Weather::default(),
            route_history: vec![RoutePoint::new(location, now)],
            route_cursor: Some(0),
            engine_metrics: Vec::new(),
            depth_logs: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let created = self.store.create(vessel).await?;
        info!(
            "🚢 Registered {} {} ({}) at ({:.4}, {:.4})",
            created.vessel_type,
            created.name,
            created.registry_number,
            created.location.lat,
            created.location.lng
        );
        Ok(created)
    }

    /// Always allowed. Writes one Decommissioned record before the vessel is removed.
    pub async fn delete_vessel(&self, id: VesselId) -> Result<(), FleetError> {
        let _guard = self.locks.acquire(id).await;
        let vessel = self.store.find_by_id(id).await?;

        let entry = lifecycle::audit_entry(&vessel, AuditAction::Decommissioned, self.now());
        self.emit_audit(entry).await;

        self.store.delete(id).await?;
        info!("🗑️  Removed {} ({})", vessel.name, vessel.registry_number);
        Ok(())
    }

    // ─── Routes ──────────────────────────────────────────────────────────────

    /// Dense route for `vessel` without saving it.
    pub fn build_route(
        &self,
        vessel: &Vessel,
        input: &RouteInput,
    ) -> Result<Vec<RoutePoint>, FleetError> {
        Ok(route::build_route(
            vessel.location,
            input,
            self.settings.steps_per_leg,
            self.now(),
        )?)
    }

    pub async fn replace_route(&self, id: VesselId, input: &RouteInput) -> Result<Vessel, FleetError> {
        let _guard = self.locks.acquire(id).await;
        let mut vessel = self.store.find_by_id(id).await?;
        if vessel.status.is_terminal() {
            return Err(Rejection::Terminal.into());
        }
        let route = self.build_route(&vessel, input)?;
        apply_route(&mut vessel, route, input.is_track());
        vessel.updated_at = self.now();

        let saved = self.store.update(vessel).await?;
        info!(
            "🧭 Route for {} replaced ({} points)",
            saved.name,
            saved.route_history.len()
        );
        Ok(saved)
    }

    pub async fn upload_route(
        &self,
        id: VesselId,
        format: UploadFormat,
        bytes: &[u8],
    ) -> Result<Vessel, FleetError> {
        let track = ingest::parse_track(format, bytes)?;
        self.replace_route(id, &RouteInput::Track(track)).await
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    pub async fn request_status_transition(
        &self,
        id: VesselId,
        target: VesselStatus,
    ) -> Result<Vessel, FleetError> {
        let _guard = self.locks.acquire(id).await;
        let mut vessel = self.store.find_by_id(id).await?;

        let decision = lifecycle::authorize(&vessel, Action::Transition(target), self.tolerance())?;
        let now = self.now();
        self.commit_transition(&mut vessel, decision, now).await;
        vessel.updated_at = now;

        Ok(self.store.update(vessel).await?)
    }

    async fn commit_transition(&self, vessel: &mut Vessel, decision: Decision, now: DateTime<Utc>) {
        let Decision::Transition { from, to, audit } = decision else {
            return;
        };
        if let Some(action) = audit {
            self.emit_audit(lifecycle::audit_entry(vessel, action, now)).await;
        }
        vessel.status = to;
        info!("⚓ {} {} → {}", vessel.name, from, to);
    }

    /// Audit failures never undo the transition that triggered them.
    async fn emit_audit(&self, entry: AuditLogEntry) {
        let (name, action) = (entry.vessel_name.clone(), entry.action);
        if let Err(e) = self.audit.create_audit_record(entry).await {
            error!("AUDIT WRITE FAILED for {name} ({action}): {e}");
        }
    }

    // ─── Combined edit ───────────────────────────────────────────────────────

    pub async fn update_vessel(&self, id: VesselId, update: VesselUpdate) -> Result<Vessel, FleetError> {
        let name = update.name.as_deref().map(|n| required("name", n)).transpose()?;
        if let Some(manual) = &update.manual_metrics {
            manual.validate().map_err(FleetError::Validation)?;
        }

        let _guard = self.locks.acquire(id).await;
        let mut vessel = self.store.find_by_id(id).await?;
        if vessel.status.is_terminal() {
            return Err(Rejection::Terminal.into());
        }
        let now = self.now();

        if let Some(waypoints) = update.waypoints {
            let route = self.build_route(&vessel, &RouteInput::Waypoints(waypoints))?;
            apply_route(&mut vessel, route, false);
        }
        if let Some(name) = name {
            vessel.name = name;
        }
        if let Some(vessel_type) = update.vessel_type {
            vessel.vessel_type = vessel_type;
        }

        let decision = match update.status {
            Some(target) if target != vessel.status => Some(lifecycle::authorize(
                &vessel,
                Action::Transition(target),
                self.tolerance(),
            )?),
            _ => None,
        };

        if let Some(manual) = &update.manual_metrics {
            self.metrics.record_manual(&mut vessel, manual, now);
        }
        if let Some(decision) = decision {
            self.commit_transition(&mut vessel, decision, now).await;
        }
        vessel.updated_at = now;

        Ok(self.store.update(vessel).await?)
    }

    pub async fn record_manual_metrics(
        &self,
        id: VesselId,
        manual: ManualMetrics,
    ) -> Result<Vessel, FleetError> {
        manual.validate().map_err(FleetError::Validation)?;

        let _guard = self.locks.acquire(id).await;
        let mut vessel = self.store.find_by_id(id).await?;
        if vessel.status.is_terminal() {
            return Err(Rejection::Terminal.into());
        }
        let now = self.now();
        self.metrics.record_manual(&mut vessel, &manual, now);
        vessel.updated_at = now;

        Ok(self.store.update(vessel).await?)
    }

    // ─── Tick ────────────────────────────────────────────────────────────────

    /// Advance one vessel by one route point, if it is allowed to move.
    pub async fn advance_vessel(&self, id: VesselId) -> Result<TickOutcome, FleetError> {
        let _guard = self.locks.acquire(id).await;
        let mut vessel = match self.store.find_by_id(id).await {
            Ok(v) => v,
            Err(StoreError::NotFound(_)) => return Ok(TickOutcome::Gone),
            Err(e) => return Err(e.into()),
        };

        let tolerance = self.tolerance();
        if let Err(rejection) = lifecycle::authorize(&vessel, Action::Advance, tolerance) {
            return Ok(TickOutcome::Skipped(rejection));
        }
        let (from, to, next_index) = match navigation::plan_step(&vessel, tolerance) {
            StepPlan::Hold => return Ok(TickOutcome::Holding),
            StepPlan::Advance {
                from,
                to,
                next_index,
            } => (from, to, next_index),
        };

        let submarine = vessel.is_submarine();
        let draw = self.rng.with_rng(|rng| weather::draw_step(rng, submarine));
        let telemetry = self
            .model
            .step(from, to, &draw, vessel.latest_fuel_level());
        let now = self.now();

        vessel.location = telemetry.location;
        vessel.navigation = telemetry.navigation;
        vessel.weather = telemetry.weather;
        vessel.route_cursor = Some(next_index);
        vessel.updated_at = now;
        self.metrics.record_engine(&mut vessel, telemetry.engine, now);
        if let Some(depth) = telemetry.depth {
            self.metrics.record_depth(&mut vessel, depth, now);
        }

        let saved = self.store.update(vessel).await?;
        debug!(
            "{} → point {}/{} heading {:.1}° {:?}",
            saved.name,
            next_index,
            saved.route_history.len().saturating_sub(1),
            saved.navigation.heading,
            saved.weather.condition
        );
        Ok(TickOutcome::Advanced { index: next_index })
    }

    /// One scheduler tick. Vessels run concurrently; a failure on one is logged
    /// and counted, never propagated.
    pub async fn advance_all_vessels(&self) -> Result<TickReport, FleetError> {
        let vessels = self.store.find_all(VesselFilter::WithRoute).await?;

        let mut tasks = JoinSet::new();
        for vessel in vessels {
            let engine = self.clone();
            let (id, name) = (vessel.id, vessel.name);
            tasks.spawn(async move { (id, name, engine.advance_vessel(id).await) });
        }

        let mut report = TickReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(outcome))) => report.record(&outcome),
                Ok((id, name, Err(e))) => {
                    warn!("Tick failed for {name} ({id}): {e}");
                    report.failed += 1;
                }
                Err(e) => {
                    error!("Tick task panicked: {e}");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

/// Replace the route and put the vessel on its first point.
fn apply_route(vessel: &mut Vessel, route: Vec<RoutePoint>, relocate: bool) {
    if relocate {
        if let Some(first) = route.first() {
            vessel.location = first.position();
        }
    }
    vessel.route_history = route;
    vessel.route_cursor = Some(0);
}
