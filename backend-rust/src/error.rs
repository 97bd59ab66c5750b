use fleet_types::VesselId;

use crate::ingest::IngestError;
use crate::lifecycle::Rejection;
use crate::persistence::StoreError;
use crate::route::RouteError;

/// Everything an engine entry point can fail with.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// Missing or malformed input. Raised before anything is written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid route: {0}")]
    Route(#[from] RouteError),

    #[error("invalid route upload: {0}")]
    Upload(#[from] IngestError),

    #[error("vessel not found: {0}")]
    NotFound(VesselId),

    /// Illegal lifecycle transition. No audit record is written.
    #[error("transition rejected: {0}")]
    Conflict(#[from] Rejection),

    /// Persistence failure for a single vessel.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl FleetError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Route(_) | Self::Upload(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<StoreError> for FleetError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::DuplicateRegistry(reg) => {
                Self::Validation(format!("registry number {reg} is already in use"))
            }
            other => Self::Store(other),
        }
    }
}
