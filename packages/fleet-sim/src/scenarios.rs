//! scenarios.rs: Fleet presets for the offline driver
//!
//! A scenario is a list of vessels, each with a start position and sparse
//! waypoints. Presets cover the common cases; anything else can be loaded from a
//! TOML file with the same shape:
//!
//! ```toml
//! name = "harbour-run"
//!
//! [[vessels]]
//! name = "Pilot One"
//! registry = "PLT-1"
//! type = "Cargo"
//! start = { latitude = 13.08, longitude = 80.29 }
//! waypoints = [{ latitude = 13.2, longitude = 80.4 }]
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use fleet_types::{LatLng, VesselType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioVessel {
    pub name: String,
    pub registry: String,
    #[serde(rename = "type")]
    pub vessel_type: VesselType,
    pub start: LatLng,
    #[serde(default)]
    pub waypoints: Vec<LatLng>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub vessels: Vec<ScenarioVessel>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario: Scenario = toml::from_str(&raw)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        if scenario.vessels.is_empty() {
            bail!("scenario {} has no vessels", scenario.name);
        }
        Ok(scenario)
    }
}

fn vessel(
    name: &str,
    registry: &str,
    vessel_type: VesselType,
    start: (f64, f64),
    waypoints: &[(f64, f64)],
) -> ScenarioVessel {
    ScenarioVessel {
        name: name.into(),
        registry: registry.into(),
        vessel_type,
        start: LatLng::new(start.0, start.1),
        waypoints: waypoints
            .iter()
            .map(|&(lat, lng)| LatLng::new(lat, lng))
            .collect(),
    }
}

pub const PRESETS: [&str; 3] = ["coastal", "mixed-fleet", "patrol"];

/// Single cargo run, Chennai to Colombo.
pub fn preset_coastal() -> Scenario {
    Scenario {
        name: "coastal".into(),
        vessels: vec![vessel(
            "Coromandel Trader",
            "IMO-9300001",
            VesselType::Cargo,
            (13.0827, 80.2707),
            &[(6.9271, 79.8612)],
        )],
    }
}

/// One of each type, short legs around the Bay of Bengal.
pub fn preset_mixed_fleet() -> Scenario {
    Scenario {
        name: "mixed-fleet".into(),
        vessels: vec![
            vessel(
                "Bay Carrier",
                "IMO-9300011",
                VesselType::Cargo,
                (13.0, 80.3),
                &[(13.5, 81.0)],
            ),
            vessel(
                "Eastern Crude",
                "IMO-9300012",
                VesselType::Tanker,
                (17.7, 83.3),
                &[(16.0, 84.5), (15.0, 85.0)],
            ),
            vessel(
                "Silent Reef",
                "NAV-S-21",
                VesselType::Submarine,
                (11.5, 81.5),
                &[(10.5, 82.5)],
            ),
            vessel(
                "Vigilant",
                "NAV-F-07",
                VesselType::Frigate,
                (12.0, 80.5),
                &[(12.0, 82.0)],
            ),
            vessel(
                "Thunderer",
                "NAV-D-03",
                VesselType::Destroyer,
                (14.0, 80.8),
                &[(15.0, 82.0)],
            ),
        ],
    }
}

/// Destroyer walking a closed box; ends back at its start point.
pub fn preset_patrol() -> Scenario {
    Scenario {
        name: "patrol".into(),
        vessels: vec![vessel(
            "Sentinel",
            "NAV-D-11",
            VesselType::Destroyer,
            (9.0, 79.0),
            &[(9.0, 79.5), (9.5, 79.5), (9.5, 79.0), (9.0, 79.0)],
        )],
    }
}

pub fn preset(name: &str) -> Option<Scenario> {
    match name {
        "coastal" => Some(preset_coastal()),
        "mixed-fleet" => Some(preset_mixed_fleet()),
        "patrol" => Some(preset_patrol()),
        _ => None,
    }
}
