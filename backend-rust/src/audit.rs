//! # audit
//!
//! SHA-256 chained, append-only audit trail of docking and decommission events.
//!
//! Each record hashes the previous record's hash, so editing or dropping any line of
//! the JSONL file breaks the chain and `verify_chain` reports where.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleet_types::AuditLogEntry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit record could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Audit Record ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Position in the chain, starting at 0
    pub seq: u64,
    /// Hash of the previous record; `GENESIS_HASH` for the first one
    pub prev_hash: String,
    pub entry: AuditLogEntry,
    /// SHA-256 of (prev_hash || seq || timestamp_ms || entry json)
    pub hash: String,
}

impl AuditRecord {
    fn compute_hash(prev_hash: &str, seq: u64, entry: &AuditLogEntry) -> Result<String, AuditError> {
        let entry_json = serde_json::to_string(entry)?;
        let mut hasher = Sha256::new();
        hasher.update(prev_hash.as_bytes());
        hasher.update(seq.to_le_bytes());
        hasher.update(entry.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(entry_json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn new(seq: u64, prev_hash: String, entry: AuditLogEntry) -> Result<Self, AuditError> {
        let hash = Self::compute_hash(&prev_hash, seq, &entry)?;
        Ok(Self {
            seq,
            prev_hash,
            entry,
            hash,
        })
    }

    /// Hash is internally consistent with the record's contents.
    pub fn verify(&self) -> bool {
        Self::compute_hash(&self.prev_hash, self.seq, &self.entry)
            .is_ok_and(|expected| expected == self.hash)
    }
}

/// Index of the first record that breaks the chain, if any. Records are expected
/// oldest first.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), u64> {
    let mut prev = GENESIS_HASH;
    for (i, record) in records.iter().enumerate() {
        if record.seq != i as u64 || record.prev_hash != prev || !record.verify() {
            return Err(i as u64);
        }
        prev = &record.hash;
    }
    Ok(())
}

// ── Sink Contract ─────────────────────────────────────────────────────────────

pub trait AuditSink: Send + Sync + 'static {
    fn create_audit_record(
        &self,
        entry: AuditLogEntry,
    ) -> impl Future<Output = Result<AuditRecord, AuditError>> + Send;

    /// Newest first.
    fn list_records(&self) -> impl Future<Output = Vec<AuditRecord>> + Send;
}

// ── Audit Logger ──────────────────────────────────────────────────────────────

struct AuditState {
    records: Vec<AuditRecord>,
    last_hash: String,
}

impl Default for AuditState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            last_hash: GENESIS_HASH.to_string(),
        }
    }
}

/// Thread-safe, append-only chained audit log. Optionally mirrored to a JSONL file.
#[derive(Clone, Default)]
pub struct AuditLogger {
    state: Arc<RwLock<AuditState>>,
    path: Option<Arc<PathBuf>>,
}

impl AuditLogger {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create) a JSONL audit file and restore the chain from it.
    /// Unreadable lines are skipped with a warning; a broken chain is reported but
    /// new records still continue from the last hash on disk.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let mut state = AuditState::default();

        match fs::read_to_string(&path).await {
            Ok(data) => {
                for (n, line) in data.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<AuditRecord>(line) {
                        Ok(record) => state.records.push(record),
                        Err(e) => warn!("Audit: skipping line {} of {}: {e}", n + 1, path.display()),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No audit log at {}, starting a new chain", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(at) = verify_chain(&state.records) {
            warn!("Audit: chain in {} is broken at record {at}", path.display());
        }
        if let Some(last) = state.records.last() {
            state.last_hash = last.hash.clone();
        }
        info!(
            "📜 Audit log {} ({} records)",
            path.display(),
            state.records.len()
        );

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            path: Some(Arc::new(path)),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Verify the in-memory chain.
    pub async fn verify(&self) -> Result<(), u64> {
        verify_chain(&self.state.read().await.records)
    }

    async fn append_line(path: &Path, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl AuditSink for AuditLogger {
    /// The write lock is held across the file append so the chain on disk and in
    /// memory advance together. A failed append leaves the chain untouched.
    async fn create_audit_record(&self, entry: AuditLogEntry) -> Result<AuditRecord, AuditError> {
        let mut state = self.state.write().await;
        let seq = state.records.len() as u64;
        let record = AuditRecord::new(seq, state.last_hash.clone(), entry)?;

        if let Some(path) = &self.path {
            Self::append_line(path, &record).await?;
        }

        state.last_hash = record.hash.clone();
        state.records.push(record.clone());
        info!(
            "Audit[{}]: {} {} ({})",
            record.seq, record.entry.action, record.entry.vessel_name, record.entry.vessel_type
        );
        Ok(record)
    }

    async fn list_records(&self) -> Vec<AuditRecord> {
        let state = self.state.read().await;
        state.records.iter().rev().cloned().collect()
    }
}
