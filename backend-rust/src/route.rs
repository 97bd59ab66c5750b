//! # route
//!
//! Turns operator input into the dense path a vessel follows, one point per tick.
//!
//! Two inputs are accepted:
//!   - sparse waypoints: each leg (start → waypoint) is linearly interpolated into
//!     `steps + 1` points including both ends, legs concatenated in order
//!   - a pre-dense track from an uploaded file: passed through after normalizing
//!     `lat`/`latitude` and `lng`/`longitude`, incomplete points dropped
//!
//! The result always replaces the vessel's route wholesale.

use chrono::{DateTime, Utc};
use fleet_types::{LatLng, RoutePoint};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STEPS_PER_LEG: usize = 50;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("route needs at least one waypoint")]
    NoWaypoints,

    #[error("track contains no point with both coordinates")]
    EmptyTrack,

    #[error("{axis} {value:?} at point {index} is not a number")]
    NotNumeric {
        index: usize,
        axis: Axis,
        value: String,
    },

    #[error("{axis} {value} at point {index} is out of range")]
    OutOfRange { index: usize, axis: Axis, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn limit(&self) -> f64 {
        match self {
            Self::Latitude => 90.0,
            Self::Longitude => 180.0,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latitude => f.write_str("latitude"),
            Self::Longitude => f.write_str("longitude"),
        }
    }
}

// ── Input Types ───────────────────────────────────────────────────────────────

/// A coordinate as it arrives from a form or file: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    /// Parsed degrees, or `None` for a blank string.
    pub fn value(&self, axis: Axis, index: usize) -> Result<Option<f64>, RouteError> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>().map_err(|_| RouteError::NotNumeric {
                    index,
                    axis,
                    value: s.to_string(),
                })?
            }
        };
        if !v.is_finite() {
            return Err(RouteError::NotNumeric {
                index,
                axis,
                value: v.to_string(),
            });
        }
        if v.abs() > axis.limit() {
            return Err(RouteError::OutOfRange { index, axis, value: v });
        }
        Ok(Some(v))
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Coordinate {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A sparse waypoint entered by an operator. Both coordinates are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(alias = "latitude")]
    pub lat: Coordinate,
    #[serde(alias = "longitude")]
    pub lng: Coordinate,
}

impl Waypoint {
    pub fn new(lat: impl Into<Coordinate>, lng: impl Into<Coordinate>) -> Self {
        Self {
            lat: lat.into(),
            lng: lng.into(),
        }
    }

    fn position(&self, index: usize) -> Result<LatLng, RouteError> {
        let lat = self.lat.value(Axis::Latitude, index)?;
        let lng = self.lng.value(Axis::Longitude, index)?;
        match (lat, lng) {
            (Some(lat), Some(lng)) => Ok(LatLng::new(lat, lng)),
            (None, _) => Err(RouteError::NotNumeric {
                index,
                axis: Axis::Latitude,
                value: String::new(),
            }),
            (_, None) => Err(RouteError::NotNumeric {
                index,
                axis: Axis::Longitude,
                value: String::new(),
            }),
        }
    }
}

/// One point of an uploaded track. Either coordinate may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    #[serde(default, alias = "lat")]
    pub latitude: Option<Coordinate>,
    #[serde(default, alias = "lng")]
    pub longitude: Option<Coordinate>,
}

impl TrackPoint {
    pub fn new(latitude: impl Into<Coordinate>, longitude: impl Into<Coordinate>) -> Self {
        Self {
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
        }
    }

    fn is_blank(c: &Option<Coordinate>) -> bool {
        match c {
            None => true,
            Some(Coordinate::Text(s)) => s.trim().is_empty(),
            Some(Coordinate::Number(_)) => false,
        }
    }

    /// Both coordinates present and non-blank.
    pub fn is_complete(&self) -> bool {
        !Self::is_blank(&self.latitude) && !Self::is_blank(&self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteInput {
    Waypoints(Vec<Waypoint>),
    Track(Vec<TrackPoint>),
}

impl RouteInput {
    pub fn is_track(&self) -> bool {
        matches!(self, Self::Track(_))
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Build a full route from `origin` (the vessel's current location).
/// Every point is stamped with `stamp`.
pub fn build_route(
    origin: LatLng,
    input: &RouteInput,
    steps_per_leg: usize,
    stamp: DateTime<Utc>,
) -> Result<Vec<RoutePoint>, RouteError> {
    let path = match input {
        RouteInput::Waypoints(waypoints) => {
            if waypoints.is_empty() {
                return Err(RouteError::NoWaypoints);
            }
            let targets = waypoints
                .iter()
                .enumerate()
                .map(|(i, wp)| wp.position(i))
                .collect::<Result<Vec<_>, _>>()?;
            interpolate(origin, &targets, steps_per_leg)
        }
        RouteInput::Track(points) => normalize_track(points)?,
    };

    Ok(path.into_iter().map(|p| RoutePoint::new(p, stamp)).collect())
}

/// Linear interpolation leg by leg. Each leg yields `steps + 1` points and ends
/// exactly on its waypoint.
pub fn interpolate(origin: LatLng, waypoints: &[LatLng], steps: usize) -> Vec<LatLng> {
    let steps = steps.max(1);
    let mut path = Vec::with_capacity(waypoints.len() * (steps + 1));
    let mut start = origin;

    for &end in waypoints {
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            path.push(LatLng::new(
                start.lat + (end.lat - start.lat) * t,
                start.lng + (end.lng - start.lng) * t,
            ));
        }
        path.push(end);
        start = end;
    }
    path
}

/// Drop incomplete points, validate the rest.
pub fn normalize_track(points: &[TrackPoint]) -> Result<Vec<LatLng>, RouteError> {
    let mut path = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        let (Some(lat), Some(lng)) = (&point.latitude, &point.longitude) else {
            continue;
        };
        match (
            lat.value(Axis::Latitude, index)?,
            lng.value(Axis::Longitude, index)?,
        ) {
            (Some(lat), Some(lng)) => path.push(LatLng::new(lat, lng)),
            _ => continue,
        }
    }
    if path.is_empty() {
        return Err(RouteError::EmptyTrack);
    }
    Ok(path)
}
