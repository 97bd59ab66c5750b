//! navigation.rs: Bearing, speed and engine response for one route step
//!
//! Pure math over route points and a pre-drawn `StepDraw`; no I/O, no randomness
//! of its own.

use fleet_types::{LatLng, Navigation, Vessel, Weather, WeatherCondition};

use crate::weather::StepDraw;

// ── Bearing ───────────────────────────────────────────────────────────────────

/// Forward azimuth from `from` to `to`, degrees in [0, 360).
pub fn bearing(from: LatLng, to: LatLng) -> f64 {
    let (lat1, lon1) = (from.lat.to_radians(), from.lng.to_radians());
    let (lat2, lon2) = (to.lat.to_radians(), to.lng.to_radians());
    let d_lon = lon2 - lon1;

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let deg = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

// ── Engine response ───────────────────────────────────────────────────────────

/// Knots for a given condition.
pub fn cruising_speed(condition: WeatherCondition) -> f64 {
    match condition {
        WeatherCondition::Storm => 10.0,
        WeatherCondition::Rain => 18.0,
        _ => 25.0,
    }
}

/// Storm: 95–100 °C, otherwise 82–85 °C. `jitter` in [0, 1).
pub fn engine_temperature(condition: WeatherCondition, jitter: f64) -> f64 {
    match condition {
        WeatherCondition::Storm => 95.0 + jitter * 5.0,
        _ => 82.0 + jitter * 3.0,
    }
}

pub fn engine_rpm(speed: f64, jitter: f64) -> f64 {
    speed * 100.0 + jitter * 50.0
}

/// Next fuel level: previous (or `initial`) minus `burn`, floored at 0.
pub fn next_fuel_level(previous: Option<f64>, initial: f64, burn: f64) -> f64 {
    (previous.unwrap_or(initial) - burn).max(0.0)
}

// ── Route cursor ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cursor {
    /// Vessel sits on this route index
    At(usize),
    /// Location matches no route point; treated as before the start
    Detached,
}

/// Where on its route a vessel is. The stored cursor wins while it still agrees
/// with the location; otherwise fall back to the first point within tolerance.
pub fn resolve_cursor(vessel: &Vessel, tolerance: f64) -> Cursor {
    let route = &vessel.route_history;
    if let Some(i) = vessel.route_cursor {
        if route
            .get(i)
            .is_some_and(|p| p.position().within(&vessel.location, tolerance))
        {
            return Cursor::At(i);
        }
    }
    route
        .iter()
        .position(|p| p.position().within(&vessel.location, tolerance))
        .map_or(Cursor::Detached, Cursor::At)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepPlan {
    /// At the final point (or no route); wait for a dock order
    Hold,
    Advance {
        from: LatLng,
        to: LatLng,
        next_index: usize,
    },
}

pub fn plan_step(vessel: &Vessel, tolerance: f64) -> StepPlan {
    let route = &vessel.route_history;
    let Some(last) = route.len().checked_sub(1) else {
        return StepPlan::Hold;
    };
    let next_index = match resolve_cursor(vessel, tolerance) {
        Cursor::At(i) if i >= last => return StepPlan::Hold,
        Cursor::At(i) => i + 1,
        Cursor::Detached => 0,
    };
    StepPlan::Advance {
        from: vessel.location,
        to: route[next_index].position(),
        next_index,
    }
}

// ── Step model ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineReading {
    pub temperature: f64,
    pub rpm: f64,
    pub fuel_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTelemetry {
    pub location: LatLng,
    pub navigation: Navigation,
    pub weather: Weather,
    pub engine: EngineReading,
    pub depth: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationModel {
    pub fuel_burn_per_step: f64,
    pub initial_fuel_level: f64,
}

impl NavigationModel {
    pub fn step(
        &self,
        from: LatLng,
        to: LatLng,
        draw: &StepDraw,
        previous_fuel: Option<f64>,
    ) -> StepTelemetry {
        let condition = draw.weather.condition;
        let speed = cruising_speed(condition);
        StepTelemetry {
            location: to,
            navigation: Navigation {
                speed,
                heading: bearing(from, to),
                risk_level: draw.weather.risk,
            },
            weather: draw.weather.weather(),
            engine: EngineReading {
                temperature: engine_temperature(condition, draw.engine_jitter),
                rpm: engine_rpm(speed, draw.rpm_jitter),
                fuel_level: next_fuel_level(
                    previous_fuel,
                    self.initial_fuel_level,
                    self.fuel_burn_per_step,
                ),
            },
            depth: draw.depth,
        }
    }
}
