//! weather.rs: Stochastic weather, risk and depth sampling
//!
//! Condition table (probability, wind km/h, wave m, risk):
//!   Storm  15%   80–120   4–7      High
//!   Rain   20%   40–60    2–4      Moderate
//!   Fog    15%   10–20    1        Moderate
//!   Clear  50%   5–20     0.5–1.5  Low
//!
//! All draws go through a `RandomSource` so tests can pin outcomes with a seeded
//! or stepped generator.

use std::sync::{Mutex, PoisonError};

use fleet_types::{RiskLevel, Weather, WeatherCondition};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Uniform};
use serde::Serialize;

// ── Random source ─────────────────────────────────────────────────────────────

/// Shared, swappable random generator.
pub struct RandomSource {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl RandomSource {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Run `f` with exclusive access to the generator. Never held across an await.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        let mut guard = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard)
    }
}

impl std::fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSource").finish_non_exhaustive()
    }
}

// ── Samples ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherSample {
    pub condition: WeatherCondition,
    pub wind_speed: f64,
    pub wave_height: f64,
    pub temperature: f64,
    pub risk: RiskLevel,
}

impl WeatherSample {
    pub fn weather(&self) -> Weather {
        Weather {
            condition: self.condition,
            wind_speed: self.wind_speed,
            temperature: self.temperature,
            wave_height: self.wave_height,
        }
    }
}

/// Every random value one advanced tick needs, drawn in one go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDraw {
    pub weather: WeatherSample,
    /// [0, 1), scales the engine temperature band
    pub engine_jitter: f64,
    /// [0, 1), scales the rpm jitter
    pub rpm_jitter: f64,
    /// Present only for submarines
    pub depth: Option<f64>,
}

/// Map a uniform roll in [0, 1) onto the condition table.
pub fn condition_for_roll(roll: f64) -> WeatherCondition {
    if roll > 0.85 {
        WeatherCondition::Storm
    } else if roll > 0.65 {
        WeatherCondition::Rain
    } else if roll > 0.50 {
        WeatherCondition::Fog
    } else {
        WeatherCondition::Clear
    }
}

pub fn sample_weather<R: Rng + ?Sized>(rng: &mut R) -> WeatherSample {
    let condition = condition_for_roll(rng.gen::<f64>());
    let (wind_speed, wave_height) = match condition {
        WeatherCondition::Storm => (
            Uniform::new(80.0, 120.0).sample(rng),
            Uniform::new(4.0, 7.0).sample(rng),
        ),
        WeatherCondition::Rain => (
            Uniform::new(40.0, 60.0).sample(rng),
            Uniform::new(2.0, 4.0).sample(rng),
        ),
        WeatherCondition::Fog => (Uniform::new(10.0, 20.0).sample(rng), 1.0),
        WeatherCondition::Clear => (
            Uniform::new(5.0, 20.0).sample(rng),
            Uniform::new(0.5, 1.5).sample(rng),
        ),
    };
    let temperature = Uniform::new(20.0, 30.0).sample(rng);

    WeatherSample {
        condition,
        wind_speed,
        wave_height,
        temperature,
        risk: condition.risk(),
    }
}

/// Submarine depth reading, [-400, -50].
pub fn sample_depth<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    Uniform::new_inclusive(-400.0, -50.0).sample(rng)
}

pub fn draw_step<R: Rng + ?Sized>(rng: &mut R, submarine: bool) -> StepDraw {
    let weather = sample_weather(rng);
    let engine_jitter = rng.gen::<f64>();
    let rpm_jitter = rng.gen::<f64>();
    let depth = submarine.then(|| sample_depth(rng));
    StepDraw {
        weather,
        engine_jitter,
        rpm_jitter,
        depth,
    }
}
