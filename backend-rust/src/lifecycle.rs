//! # lifecycle
//!
//! Vessel status state machine.
//!
//! ```text
//!   from \ to      Active  Maintenance  Docked   Decommissioned
//!   Active            -         ✓        guard        ✓
//!   Maintenance       ✓         -        guard        ✓
//!   Docked            ✓         ✓          -          ✓
//!   Decommissioned    terminal, nothing leaves it
//! ```
//!
//! `authorize` decides both whether a vessel may move this tick and whether a
//! status change is allowed. Docking requires the vessel to sit on its final
//! route point.

use chrono::{DateTime, Utc};
use fleet_types::{AuditAction, AuditLogEntry, LatLng, Vessel, VesselStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Scheduler wants to move the vessel one route point
    Advance,
    /// Operator requests a status change
    Transition(VesselStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Advance,
    Transition {
        from: VesselStatus,
        to: VesselStatus,
        audit: Option<AuditAction>,
    },
}

impl Decision {
    /// Audit record the decision requires before it is committed.
    pub fn audit(&self) -> Option<AuditAction> {
        match self {
            Self::Advance => None,
            Self::Transition { audit, .. } => *audit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("vessel is decommissioned")]
    Terminal,

    #[error("vessel is already {0}")]
    Unchanged(VesselStatus),

    #[error("{0} vessels do not move")]
    Stationary(VesselStatus),

    #[error("vessel has no route")]
    NoRoute,

    #[error("cannot change status from {from} to {to}")]
    NotPermitted { from: VesselStatus, to: VesselStatus },

    #[error(
        "vessel at ({:.5}, {:.5}) has not reached its destination",
        .location.lat,
        .location.lng
    )]
    NotAtDestination {
        location: LatLng,
        destination: Option<LatLng>,
    },
}

/// The transition table. Docking additionally requires `at_destination`.
pub fn permits(from: VesselStatus, to: VesselStatus) -> bool {
    use VesselStatus::*;
    matches!(
        (from, to),
        (Active, Maintenance | Docked | Decommissioned)
            | (Maintenance, Active | Docked | Decommissioned)
            | (Docked, Active | Maintenance | Decommissioned)
    )
}

fn audit_for(to: VesselStatus) -> Option<AuditAction> {
    match to {
        VesselStatus::Docked => Some(AuditAction::Docked),
        VesselStatus::Decommissioned => Some(AuditAction::Decommissioned),
        _ => None,
    }
}

pub fn authorize(vessel: &Vessel, action: Action, tolerance: f64) -> Result<Decision, Rejection> {
    let from = vessel.status;
    if from.is_terminal() {
        return Err(Rejection::Terminal);
    }

    match action {
        Action::Advance => {
            if from != VesselStatus::Active {
                return Err(Rejection::Stationary(from));
            }
            if vessel.route_history.is_empty() {
                return Err(Rejection::NoRoute);
            }
            Ok(Decision::Advance)
        }
        Action::Transition(to) => {
            if to == from {
                return Err(Rejection::Unchanged(from));
            }
            if !permits(from, to) {
                return Err(Rejection::NotPermitted { from, to });
            }
            if to == VesselStatus::Docked && !vessel.at_destination(tolerance) {
                return Err(Rejection::NotAtDestination {
                    location: vessel.location,
                    destination: vessel.destination(),
                });
            }
            Ok(Decision::Transition {
                from,
                to,
                audit: audit_for(to),
            })
        }
    }
}

/// Snapshot for the audit trail. Only the lifecycle creates these.
pub fn audit_entry(vessel: &Vessel, action: AuditAction, at: DateTime<Utc>) -> AuditLogEntry {
    AuditLogEntry {
        vessel_name: vessel.name.clone(),
        vessel_type: vessel.vessel_type,
        action,
        location: vessel.location,
        timestamp: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{Navigation, RoutePoint, VesselType, Weather};
    use uuid::Uuid;

    const TOL: f64 = 1e-4;

    fn vessel(status: VesselStatus, location: (f64, f64)) -> Vessel {
        let now = Utc::now();
        Vessel {
            id: Uuid::new_v4(),
            name: "Harbour Queen".into(),
            registry_number: "HQ-1".into(),
            vessel_type: VesselType::Frigate,
            status,
            location: LatLng::new(location.0, location.1),
            navigation: Navigation::default(),
            weather: Weather::default(),
            route_history: vec![
                RoutePoint::new(LatLng::new(0.0, 0.0), now),
                RoutePoint::new(LatLng::new(1.0, 1.0), now),
            ],
            route_cursor: None,
            engine_metrics: vec![],
            depth_logs: vec![],
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_active_vessels_advance() {
        let active = vessel(VesselStatus::Active, (0.0, 0.0));
        assert_eq!(authorize(&active, Action::Advance, TOL), Ok(Decision::Advance));

        for status in [VesselStatus::Docked, VesselStatus::Maintenance] {
            let v = vessel(status, (0.0, 0.0));
            assert_eq!(
                authorize(&v, Action::Advance, TOL),
                Err(Rejection::Stationary(status))
            );
        }

        let mut routeless = vessel(VesselStatus::Active, (0.0, 0.0));
        routeless.route_history.clear();
        assert_eq!(authorize(&routeless, Action::Advance, TOL), Err(Rejection::NoRoute));
    }

    #[test]
    fn decommissioned_rejects_everything() {
        let v = vessel(VesselStatus::Decommissioned, (1.0, 1.0));
        assert_eq!(authorize(&v, Action::Advance, TOL), Err(Rejection::Terminal));
        for to in [
            VesselStatus::Active,
            VesselStatus::Maintenance,
            VesselStatus::Docked,
            VesselStatus::Decommissioned,
        ] {
            assert_eq!(
                authorize(&v, Action::Transition(to), TOL),
                Err(Rejection::Terminal)
            );
        }
    }

    #[test]
    fn docking_requires_destination() {
        let away = vessel(VesselStatus::Active, (0.5, 0.5));
        assert!(matches!(
            authorize(&away, Action::Transition(VesselStatus::Docked), TOL),
            Err(Rejection::NotAtDestination { .. })
        ));

        let arrived = vessel(VesselStatus::Active, (1.00001, 0.99999));
        let decision = authorize(&arrived, Action::Transition(VesselStatus::Docked), TOL).unwrap();
        assert_eq!(decision.audit(), Some(AuditAction::Docked));
    }

    #[test]
    fn same_status_is_rejected() {
        let v = vessel(VesselStatus::Docked, (1.0, 1.0));
        assert_eq!(
            authorize(&v, Action::Transition(VesselStatus::Docked), TOL),
            Err(Rejection::Unchanged(VesselStatus::Docked))
        );
    }

    #[test]
    fn non_audited_transitions() {
        let v = vessel(VesselStatus::Docked, (1.0, 1.0));
        let d = authorize(&v, Action::Transition(VesselStatus::Active), TOL).unwrap();
        assert_eq!(d.audit(), None);

        let d = authorize(&v, Action::Transition(VesselStatus::Decommissioned), TOL).unwrap();
        assert_eq!(d.audit(), Some(AuditAction::Decommissioned));
    }

    #[test]
    fn table_is_closed_under_terminal() {
        for to in [
            VesselStatus::Active,
            VesselStatus::Maintenance,
            VesselStatus::Docked,
        ] {
            assert!(!permits(VesselStatus::Decommissioned, to));
            assert!(!permits(to, to));
        }
    }

    #[test]
    fn audit_entry_snapshots_vessel() {
        let v = vessel(VesselStatus::Active, (1.0, 1.0));
        let at = Utc::now();
        let e = audit_entry(&v, AuditAction::Docked, at);
        assert_eq!(e.vessel_name, "Harbour Queen");
        assert_eq!(e.vessel_type, VesselType::Frigate);
        assert_eq!(e.location, LatLng::new(1.0, 1.0));
        assert_eq!(e.timestamp, at);
    }
}
