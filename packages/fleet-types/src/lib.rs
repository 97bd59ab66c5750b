//! # fleet-types
//!
//! Shared vessel, telemetry and audit structures for the fleet simulation engine.
//!
//! These types are used by:
//! - `backend-rust`: the tick engine, lifecycle state machine and stores
//! - `fleet-sim`: the offline driver that prints telemetry as JSON lines
//!
//! ## Coordinate Conventions
//!
//! - All positions are WGS-84 decimal degrees.
//! - On the wire coordinates are `latitude` / `longitude`; `lat` / `lng` are accepted
//!   on input so dashboard payloads and uploaded tracks deserialize unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type VesselId = Uuid;

// ── Geographic Types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(rename = "latitude", alias = "lat")]
    pub lat: f64,
    #[serde(rename = "longitude", alias = "lng")]
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both axes are within `tolerance` degrees of `other`.
    pub fn within(&self, other: &LatLng, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() < tolerance && (self.lng - other.lng).abs() < tolerance
    }
}

/// One point of a vessel's route. Insertion order is traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    #[serde(rename = "latitude", alias = "lat")]
    pub lat: f64,
    #[serde(rename = "longitude", alias = "lng")]
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl RoutePoint {
    pub fn new(pos: LatLng, timestamp: DateTime<Utc>) -> Self {
        Self { lat: pos.lat, lng: pos.lng, timestamp }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

// ── Vessel Classification ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VesselType {
    Cargo,
    Tanker,
    Submarine,
    Frigate,
    Destroyer,
}

impl std::fmt::Display for VesselType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cargo => "Cargo",
            Self::Tanker => "Tanker",
            Self::Submarine => "Submarine",
            Self::Frigate => "Frigate",
            Self::Destroyer => "Destroyer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VesselStatus {
    #[default]
    Active,
    Maintenance,
    Docked,
    Decommissioned,
}

impl VesselStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Decommissioned)
    }
}

impl std::fmt::Display for VesselStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Maintenance => "Maintenance",
            Self::Docked => "Docked",
            Self::Decommissioned => "Decommissioned",
        };
        f.write_str(s)
    }
}

// ── Weather / Navigation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeatherCondition {
    #[default]
    Clear,
    Rain,
    Fog,
    Storm,
}

impl WeatherCondition {
    /// Hazard rating a condition carries.
    pub fn risk(&self) -> RiskLevel {
        match self {
            Self::Storm => RiskLevel::High,
            Self::Rain | Self::Fog => RiskLevel::Moderate,
            Self::Clear => RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// Knots
    pub speed: f64,
    /// Degrees, [0, 360)
    pub heading: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub condition: WeatherCondition,
    /// km/h
    pub wind_speed: f64,
    /// Celsius
    pub temperature: f64,
    /// Meters
    pub wave_height: f64,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            condition: WeatherCondition::Clear,
            wind_speed: 5.0,
            temperature: 25.0,
            wave_height: 0.5,
        }
    }
}

// ── Telemetry History ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMetric {
    pub temperature: f64,
    pub rpm: f64,
    /// Percent of capacity, never increases between successive entries
    pub fuel_level: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLog {
    /// Negative below the surface
    pub depth: f64,
    pub timestamp: DateTime<Utc>,
}

// ── Vessel ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vessel {
    pub id: VesselId,
    pub name: String,
    #[serde(alias = "imoNumber")]
    pub registry_number: String,
    #[serde(rename = "type")]
    pub vessel_type: VesselType,
    pub status: VesselStatus,
    pub location: LatLng,
    #[serde(default)]
    pub navigation: Navigation,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub route_history: Vec<RoutePoint>,
    /// Index into `route_history` the vessel currently occupies
    #[serde(default)]
    pub route_cursor: Option<usize>,
    #[serde(default)]
    pub engine_metrics: Vec<EngineMetric>,
    #[serde(default)]
    pub depth_logs: Vec<DepthLog>,
    /// Bumped by the store on every successful update
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vessel {
    pub fn is_submarine(&self) -> bool {
        self.vessel_type == VesselType::Submarine
    }

    /// Final point of the current route.
    pub fn destination(&self) -> Option<LatLng> {
        self.route_history.last().map(RoutePoint::position)
    }

    pub fn at_destination(&self, tolerance: f64) -> bool {
        self.destination()
            .is_some_and(|dest| self.location.within(&dest, tolerance))
    }

    pub fn latest_fuel_level(&self) -> Option<f64> {
        self.engine_metrics.last().map(|m| m.fuel_level)
    }
}

// ── Audit ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Docked,
    Decommissioned,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docked => f.write_str("Docked"),
            Self::Decommissioned => f.write_str("Decommissioned"),
        }
    }
}

/// Immutable record of a docking or decommission event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub vessel_name: String,
    pub vessel_type: VesselType,
    pub action: AuditAction,
    pub location: LatLng,
    pub timestamp: DateTime<Utc>,
}
