//! # fleet-backend
//!
//! Fleet simulation & telemetry engine. A periodic scheduler advances every active
//! vessel one point along its route per tick, sampling weather and engine telemetry,
//! while interactive callers edit routes, record metrics and drive the lifecycle
//! (docking, decommission) through the same per-vessel exclusive section.

pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod metrics;
pub mod navigation;
pub mod persistence;
pub mod route;
pub mod scheduler;
pub mod weather;

pub use audit::{AuditLogger, AuditRecord, AuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FleetConfig, SimulationConfig, StorageConfig};
pub use engine::{FleetEngine, NewVessel, TickOutcome, TickReport, VesselUpdate};
pub use error::FleetError;
pub use metrics::ManualMetrics;
pub use persistence::{MemoryStore, StoreError, VesselFilter, VesselStore};
pub use route::{Coordinate, RouteInput, TrackPoint, Waypoint};
pub use scheduler::{IntervalTicks, ManualTicks, SchedulerStats, TickScheduler, TickSource, TickTrigger};
pub use weather::RandomSource;
