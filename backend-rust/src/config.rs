//! # config
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `FLEET_*` environment variables, then command-line flags.
//!
//! ```toml
//! [simulation]
//! tick_interval_secs = 10
//! steps_per_leg = 50
//! fuel_burn_per_step = 0.25
//!
//! [storage]
//! state_file = "fleet.json"
//! audit_log = "audit.jsonl"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::route::DEFAULT_STEPS_PER_LEG;

pub const DEFAULT_TICK_SECS: f64 = 10.0;
/// One day. Longer periods overflow timer arithmetic.
pub const MAX_TICK_SECS: f64 = 86_400.0;
pub const DEFAULT_TOLERANCE_DEG: f64 = 1e-4;
pub const DEFAULT_FUEL_BURN: f64 = 0.25;
pub const DEFAULT_INITIAL_FUEL: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_interval_secs: f64,
    pub steps_per_leg: usize,
    /// Per-axis match tolerance in degrees
    pub position_tolerance_deg: f64,
    /// Percentage points burned per advanced tick
    pub fuel_burn_per_step: f64,
    pub initial_fuel_level: f64,
    /// Cap on engine/depth history per vessel; unbounded when absent
    pub metrics_retention: Option<usize>,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_SECS,
            steps_per_leg: DEFAULT_STEPS_PER_LEG,
            position_tolerance_deg: DEFAULT_TOLERANCE_DEG,
            fuel_burn_per_step: DEFAULT_FUEL_BURN,
            initial_fuel_level: DEFAULT_INITIAL_FUEL,
            metrics_retention: None,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Falls back to the default period for a value `validate` would reject.
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.tick_interval_secs)
            .ok()
            .filter(|d| !d.is_zero() && d.as_secs_f64() <= MAX_TICK_SECS)
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TICK_SECS))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        let tick = self.tick_interval_secs;
        if !(tick > 0.0 && tick <= MAX_TICK_SECS) || Duration::try_from_secs_f64(tick).is_err() {
            return invalid("tick_interval_secs", "must be between 0 and 86400 seconds");
        }
        if self.steps_per_leg == 0 {
            return invalid("steps_per_leg", "must be at least 1");
        }
        if !(self.position_tolerance_deg.is_finite() && self.position_tolerance_deg > 0.0) {
            return invalid("position_tolerance_deg", "must be positive");
        }
        if !(0.1..=0.5).contains(&self.fuel_burn_per_step) {
            return invalid("fuel_burn_per_step", "must be between 0.1 and 0.5");
        }
        if !(self.initial_fuel_level.is_finite() && self.initial_fuel_level >= 0.0) {
            return invalid("initial_fuel_level", "must not be negative");
        }
        if self.metrics_retention == Some(0) {
            return invalid("metrics_retention", "must keep at least one entry");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot of the fleet; in-memory only when absent
    pub state_file: Option<PathBuf>,
    /// JSONL audit chain; in-memory only when absent
    pub audit_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub simulation: SimulationConfig,
    pub storage: StorageConfig,
}

/// Values supplied from outside the config file (env, CLI). `None` keeps the
/// current setting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub tick_interval_secs: Option<f64>,
    pub steps_per_leg: Option<usize>,
    pub fuel_burn_per_step: Option<f64>,
    pub metrics_retention: Option<usize>,
    pub seed: Option<u64>,
    pub state_file: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}

impl Overrides {
    /// Read `FLEET_*` variables through `lookup` (usually `std::env::var(..).ok()`).
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            tick_interval_secs: parse_var(&lookup, "FLEET_TICK_SECS"),
            steps_per_leg: parse_var(&lookup, "FLEET_STEPS_PER_LEG"),
            fuel_burn_per_step: parse_var(&lookup, "FLEET_FUEL_BURN"),
            metrics_retention: parse_var(&lookup, "FLEET_METRICS_RETENTION"),
            seed: parse_var(&lookup, "FLEET_SEED"),
            state_file: lookup("FLEET_STATE_FILE").map(PathBuf::from),
            audit_log: lookup("FLEET_AUDIT_LOG").map(PathBuf::from),
        }
    }
}

impl FleetConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Defaults, or the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.apply(Overrides::from_env(lookup));
    }

    pub fn apply(&mut self, o: Overrides) {
        let sim = &mut self.simulation;
        if let Some(v) = o.tick_interval_secs {
            sim.tick_interval_secs = v;
        }
        if let Some(v) = o.steps_per_leg {
            sim.steps_per_leg = v;
        }
        if let Some(v) = o.fuel_burn_per_step {
            sim.fuel_burn_per_step = v;
        }
        if o.metrics_retention.is_some() {
            sim.metrics_retention = o.metrics_retention;
        }
        if o.seed.is_some() {
            sim.seed = o.seed;
        }
        if o.state_file.is_some() {
            self.storage.state_file = o.state_file;
        }
        if o.audit_log.is_some() {
            self.storage.audit_log = o.audit_log;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let cfg = FleetConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.simulation.tick_interval(), Duration::from_secs(10));
        assert_eq!(cfg.simulation.steps_per_leg, 50);
        assert_eq!(cfg.simulation.position_tolerance_deg, 1e-4);
        assert_eq!(cfg.simulation.fuel_burn_per_step, 0.25);
        assert!(cfg.storage.state_file.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = FleetConfig::from_toml_str(
            r#"
            [simulation]
            steps_per_leg = 20
            seed = 42

            [storage]
            audit_log = "audit.jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.simulation.steps_per_leg, 20);
        assert_eq!(cfg.simulation.seed, Some(42));
        assert_eq!(cfg.simulation.tick_interval_secs, 10.0);
        assert_eq!(cfg.storage.audit_log, Some(PathBuf::from("audit.jsonl")));
    }

    #[test]
    fn env_overrides_file_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("FLEET_TICK_SECS", "2.5"),
            ("FLEET_FUEL_BURN", "lots"),
            ("FLEET_STATE_FILE", "/tmp/fleet.json"),
        ]
        .into_iter()
        .collect();

        let mut cfg = FleetConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.simulation.tick_interval(), Duration::from_millis(2500));
        assert_eq!(cfg.simulation.fuel_burn_per_step, 0.25);
        assert_eq!(cfg.storage.state_file, Some(PathBuf::from("/tmp/fleet.json")));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let cases: [fn(&mut SimulationConfig); 8] = [
            |s| s.tick_interval_secs = 0.0,
            |s| s.tick_interval_secs = f64::NAN,
            |s| s.tick_interval_secs = 1e20,
            |s| s.tick_interval_secs = MAX_TICK_SECS + 1.0,
            |s| s.steps_per_leg = 0,
            |s| s.position_tolerance_deg = -1.0,
            |s| s.fuel_burn_per_step = 0.6,
            |s| s.fuel_burn_per_step = 0.05,
        ];
        for mutate in cases {
            let mut sim = SimulationConfig::default();
            mutate(&mut sim);
            assert!(matches!(sim.validate(), Err(ConfigError::Invalid { .. })), "{sim:?}");
        }
    }

    #[test]
    fn oversized_tick_from_env_is_rejected_not_fatal() {
        let mut config = FleetConfig::default();
        config.apply_env(|key| (key == "FLEET_TICK_SECS").then(|| "1e20".to_string()));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tick_interval_secs", .. })
        ));
        assert_eq!(
            config.simulation.tick_interval(),
            Duration::from_secs_f64(DEFAULT_TICK_SECS)
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FleetConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
