//! # metrics
//!
//! Engine and depth history per vessel, from ticks and from manual entry.

use chrono::{DateTime, Utc};
use fleet_types::{DepthLog, EngineMetric, Vessel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::navigation::EngineReading;

/// Values an operator enters by hand. Missing engine values fall back to
/// temperature 80, rpm 0, fuel 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualMetrics {
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub rpm: Option<f64>,
    #[serde(default)]
    pub fuel: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
}

impl ManualMetrics {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("temp", self.temp),
            ("rpm", self.rpm),
            ("fuel", self.fuel),
            ("depth", self.depth),
        ];
        for (name, value) in fields {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(format!("manual metric {name} must be a finite number"));
            }
        }
        if self.rpm.is_some_and(|v| v < 0.0) {
            return Err("manual metric rpm must not be negative".into());
        }
        Ok(())
    }
}

/// Appends engine and depth history. Keeps fuel non-increasing and, when a
/// retention cap is set, drops the oldest entries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsRecorder {
    retention: Option<usize>,
}

impl MetricsRecorder {
    pub fn new(retention: Option<usize>) -> Self {
        Self { retention }
    }

    pub fn record_engine(
        &self,
        vessel: &mut Vessel,
        reading: EngineReading,
        at: DateTime<Utc>,
    ) -> EngineMetric {
        let ceiling = vessel.latest_fuel_level().unwrap_or(f64::INFINITY);
        let fuel_level = reading.fuel_level.min(ceiling).max(0.0);
        if fuel_level != reading.fuel_level {
            debug!(
                "Fuel for {} clamped {:.2} → {:.2}",
                vessel.name, reading.fuel_level, fuel_level
            );
        }
        let metric = EngineMetric {
            temperature: reading.temperature,
            rpm: reading.rpm,
            fuel_level,
            timestamp: at,
        };
        vessel.engine_metrics.push(metric);
        self.trim(&mut vessel.engine_metrics);
        metric
    }

    /// Returns false (and records nothing) for non-submarines.
    pub fn record_depth(&self, vessel: &mut Vessel, depth: f64, at: DateTime<Utc>) -> bool {
        if !vessel.is_submarine() {
            return false;
        }
        vessel.depth_logs.push(DepthLog {
            depth,
            timestamp: at,
        });
        self.trim(&mut vessel.depth_logs);
        true
    }

    pub fn record_manual(&self, vessel: &mut Vessel, manual: &ManualMetrics, at: DateTime<Utc>) {
        let reading = EngineReading {
            temperature: manual.temp.unwrap_or(80.0),
            rpm: manual.rpm.unwrap_or(0.0),
            fuel_level: manual.fuel.unwrap_or(100.0),
        };
        self.record_engine(vessel, reading, at);
        if let Some(depth) = manual.depth {
            self.record_depth(vessel, depth, at);
        }
    }

    fn trim<T>(&self, history: &mut Vec<T>) {
        if let Some(cap) = self.retention {
            if history.len() > cap {
                let excess = history.len() - cap;
                history.drain(..excess);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{LatLng, Navigation, VesselStatus, VesselType, Weather};
    use uuid::Uuid;

    fn vessel(vessel_type: VesselType) -> Vessel {
        let now = Utc::now();
        Vessel {
            id: Uuid::new_v4(),
            name: "Recorder".into(),
            registry_number: "R-1".into(),
            vessel_type,
            status: VesselStatus::Active,
            location: LatLng::default(),
            navigation: Navigation::default(),
            weather: Weather::default(),
            route_history: vec![],
            route_cursor: None,
            engine_metrics: vec![],
            depth_logs: vec![],
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn reading(fuel_level: f64) -> EngineReading {
        EngineReading {
            temperature: 83.0,
            rpm: 2500.0,
            fuel_level,
        }
    }

    #[test]
    fn fuel_is_clamped_to_previous_level() {
        let rec = MetricsRecorder::default();
        let mut v = vessel(VesselType::Cargo);
        rec.record_engine(&mut v, reading(90.0), Utc::now());
        let m = rec.record_engine(&mut v, reading(95.0), Utc::now());
        assert_eq!(m.fuel_level, 90.0);
        let m = rec.record_engine(&mut v, reading(-3.0), Utc::now());
        assert_eq!(m.fuel_level, 0.0);
        assert_eq!(v.engine_metrics.len(), 3);
    }

    #[test]
    fn depth_is_submarine_only() {
        let rec = MetricsRecorder::default();
        let mut sub = vessel(VesselType::Submarine);
        let mut frigate = vessel(VesselType::Frigate);
        assert!(rec.record_depth(&mut sub, -120.0, Utc::now()));
        assert!(!rec.record_depth(&mut frigate, -120.0, Utc::now()));
        assert_eq!(sub.depth_logs.len(), 1);
        assert!(frigate.depth_logs.is_empty());
    }

    #[test]
    fn manual_defaults_apply() {
        let rec = MetricsRecorder::default();
        let mut sub = vessel(VesselType::Submarine);
        rec.record_manual(
            &mut sub,
            &ManualMetrics {
                depth: Some(-75.0),
                ..Default::default()
            },
            Utc::now(),
        );
        let m = sub.engine_metrics[0];
        assert_eq!((m.temperature, m.rpm, m.fuel_level), (80.0, 0.0, 100.0));
        assert_eq!(sub.depth_logs[0].depth, -75.0);
    }

    #[test]
    fn retention_drops_oldest() {
        let rec = MetricsRecorder::new(Some(3));
        let mut v = vessel(VesselType::Tanker);
        for i in 0..5 {
            rec.record_engine(&mut v, reading(100.0 - i as f64), Utc::now());
        }
        let levels: Vec<_> = v.engine_metrics.iter().map(|m| m.fuel_level).collect();
        assert_eq!(levels, vec![98.0, 97.0, 96.0]);
    }

    #[test]
    fn manual_validation_rejects_non_finite() {
        let bad = ManualMetrics {
            fuel: Some(f64::NAN),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let negative_rpm = ManualMetrics {
            rpm: Some(-1.0),
            ..Default::default()
        };
        assert!(negative_rpm.validate().is_err());
        assert!(ManualMetrics::default().validate().is_ok());
    }
}
