//! # persistence
//!
//! Vessel store contract plus the in-memory implementation, optionally snapshotted
//! to a pretty-printed JSON file after every mutation.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleet_types::{Vessel, VesselId};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VesselFilter {
    #[default]
    All,
    /// Vessels with a non-empty route
    WithRoute,
}

impl VesselFilter {
    fn matches(&self, vessel: &Vessel) -> bool {
        match self {
            Self::All => true,
            Self::WithRoute => !vessel.route_history.is_empty(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vessel not found: {0}")]
    NotFound(VesselId),

    #[error("registry number {0} is already in use")]
    DuplicateRegistry(String),

    #[error("vessel {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        id: VesselId,
        expected: u64,
        found: u64,
    },

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend refused or dropped the operation; worth retrying on the next tick
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait VesselStore: Send + Sync + 'static {
    fn find_all(
        &self,
        filter: VesselFilter,
    ) -> impl Future<Output = Result<Vec<Vessel>, StoreError>> + Send;

    fn find_by_id(&self, id: VesselId) -> impl Future<Output = Result<Vessel, StoreError>> + Send;

    fn create(&self, vessel: Vessel) -> impl Future<Output = Result<Vessel, StoreError>> + Send;

    /// Replace the whole record. `vessel.version` must match the stored version;
    /// the stored copy comes back with the version bumped.
    fn update(&self, vessel: Vessel) -> impl Future<Output = Result<Vessel, StoreError>> + Send;

    fn delete(&self, id: VesselId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ─── Snapshot file ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    vessels: Vec<Vessel>,
}

/// Load a snapshot. Missing or corrupt files yield an empty fleet.
async fn load_snapshot(path: &Path) -> HashMap<VesselId, Vessel> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        info!("No fleet snapshot at {}, starting empty", path.display());
        return HashMap::new();
    }

    match fs::read_to_string(path).await {
        Ok(data) => match serde_json::from_str::<Snapshot>(&data) {
            Ok(snapshot) => {
                info!(
                    "Loaded {} vessels from {}",
                    snapshot.vessels.len(),
                    path.display()
                );
                snapshot.vessels.into_iter().map(|v| (v.id, v)).collect()
            }
            Err(e) => {
                warn!("Failed to parse {}: {e}, starting empty", path.display());
                HashMap::new()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {e}, starting empty", path.display());
            HashMap::new()
        }
    }
}

async fn save_snapshot(path: &Path, vessels: &HashMap<VesselId, Vessel>) -> Result<(), StoreError> {
    let mut list: Vec<&Vessel> = vessels.values().collect();
    list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let json = serde_json::to_string_pretty(&serde_json::json!({ "vessels": list }))?;
    fs::write(path, json).await?;
    debug!("Snapshot written ({} vessels)", list.len());
    Ok(())
}

// ─── Memory store ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryStore {
    vessels: Arc<RwLock<HashMap<VesselId, Vessel>>>,
    snapshot: Option<Arc<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let vessels = load_snapshot(&path).await;
        Self {
            vessels: Arc::new(RwLock::new(vessels)),
            snapshot: Some(Arc::new(path)),
        }
    }

    async fn persist(&self, vessels: &HashMap<VesselId, Vessel>) -> Result<(), StoreError> {
        match &self.snapshot {
            Some(path) => save_snapshot(path, vessels).await,
            None => Ok(()),
        }
    }
}

impl VesselStore for MemoryStore {
    async fn find_all(&self, filter: VesselFilter) -> Result<Vec<Vessel>, StoreError> {
        let vessels = self.vessels.read().await;
        let mut out: Vec<Vessel> = vessels
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn find_by_id(&self, id: VesselId) -> Result<Vessel, StoreError> {
        self.vessels
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, mut vessel: Vessel) -> Result<Vessel, StoreError> {
        let mut vessels = self.vessels.write().await;
        if vessels
            .values()
            .any(|v| v.registry_number == vessel.registry_number)
        {
            return Err(StoreError::DuplicateRegistry(vessel.registry_number));
        }
        vessel.version = 0;
        vessels.insert(vessel.id, vessel.clone());
        if let Err(e) = self.persist(&vessels).await {
            vessels.remove(&vessel.id);
            return Err(e);
        }
        Ok(vessel)
    }

    async fn update(&self, mut vessel: Vessel) -> Result<Vessel, StoreError> {
        let mut vessels = self.vessels.write().await;
        let current = vessels
            .get(&vessel.id)
            .ok_or(StoreError::NotFound(vessel.id))?;
        if current.version != vessel.version {
            return Err(StoreError::VersionConflict {
                id: vessel.id,
                expected: vessel.version,
                found: current.version,
            });
        }
        if vessels
            .values()
            .any(|v| v.id != vessel.id && v.registry_number == vessel.registry_number)
        {
            return Err(StoreError::DuplicateRegistry(vessel.registry_number));
        }

        vessel.version += 1;
        let previous = vessels.insert(vessel.id, vessel.clone());
        if let Err(e) = self.persist(&vessels).await {
            if let Some(previous) = previous {
                vessels.insert(previous.id, previous);
            }
            return Err(e);
        }
        Ok(vessel)
    }

    async fn delete(&self, id: VesselId) -> Result<(), StoreError> {
        let mut vessels = self.vessels.write().await;
        let removed = vessels.remove(&id).ok_or(StoreError::NotFound(id))?;
        if let Err(e) = self.persist(&vessels).await {
            vessels.insert(id, removed);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fleet_types::{LatLng, Navigation, RoutePoint, VesselStatus, VesselType, Weather};
    use uuid::Uuid;

    fn vessel(registry: &str, with_route: bool) -> Vessel {
        let now = Utc::now();
        Vessel {
            id: Uuid::new_v4(),
            name: format!("Vessel {registry}"),
            registry_number: registry.into(),
            vessel_type: VesselType::Cargo,
            status: VesselStatus::Active,
            location: LatLng::new(13.0, 80.0),
            navigation: Navigation::default(),
            weather: Weather::default(),
            route_history: if with_route {
                vec![RoutePoint::new(LatLng::new(13.0, 80.0), now)]
            } else {
                vec![]
            },
            route_cursor: None,
            engine_metrics: vec![],
            depth_logs: vec![],
            version: 7,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_registry() {
        let store = MemoryStore::new();
        let created = store.create(vessel("IMO-1", true)).await.unwrap();
        assert_eq!(created.version, 0);

        let err = store.create(vessel("IMO-1", true)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRegistry(r) if r == "IMO-1"));
    }

    #[tokio::test]
    async fn update_checks_and_bumps_version() {
        let store = MemoryStore::new();
        let v = store.create(vessel("IMO-2", true)).await.unwrap();

        let mut first = v.clone();
        first.name = "Renamed".into();
        let saved = store.update(first).await.unwrap();
        assert_eq!(saved.version, 1);

        // Second writer still holds version 0.
        let err = store.update(v).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 0, found: 1, .. }
        ));
        assert_eq!(store.find_by_id(saved.id).await.unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn filter_and_delete() {
        let store = MemoryStore::new();
        let routed = store.create(vessel("IMO-3", true)).await.unwrap();
        store.create(vessel("IMO-4", false)).await.unwrap();

        assert_eq!(store.find_all(VesselFilter::All).await.unwrap().len(), 2);
        let with_route = store.find_all(VesselFilter::WithRoute).await.unwrap();
        assert_eq!(with_route.len(), 1);
        assert_eq!(with_route[0].id, routed.id);

        store.delete(routed.id).await.unwrap();
        assert!(matches!(
            store.find_by_id(routed.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(routed.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");

        let store = MemoryStore::open(&path).await;
        let mut older = vessel("IMO-5", true);
        older.created_at -= Duration::minutes(5);
        let a = store.create(older).await.unwrap();
        let b = store.create(vessel("IMO-6", false)).await.unwrap();

        let reopened = MemoryStore::open(&path).await;
        let all = reopened.find_all(VesselFilter::All).await.unwrap();
        assert_eq!(all.iter().map(|v| v.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = MemoryStore::open(&path).await;
        assert!(store.find_all(VesselFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_snapshot_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // Writing to a directory path fails.
        let store = MemoryStore {
            vessels: Arc::default(),
            snapshot: Some(Arc::new(dir.path().to_path_buf())),
        };
        assert!(matches!(
            store.create(vessel("IMO-7", true)).await,
            Err(StoreError::Io(_))
        ));
        assert!(store.find_all(VesselFilter::All).await.unwrap().is_empty());
    }
}
