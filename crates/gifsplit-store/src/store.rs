//! The durable record table.
//!
//! All mutations follow one discipline: check-and-write under a single
//! write-lock critical section, then serialize the whole table and commit it
//! with a temp-file-then-rename step. Readers take the read lock only and are
//! never held up by an unrelated job's disk write.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use gifsplit_models::{
    is_safe_artifact_name, Clip, Fingerprint, Job, JobId, JobSummary, MergeResult,
};

use crate::error::{StoreError, StoreResult};
use crate::record::{CacheRecord, InsertOutcome};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    /// Fingerprint hex -> record. BTreeMap keeps the file diff-stable.
    records: BTreeMap<String, CacheRecord>,

    /// Job id -> fingerprint hex, rebuilt at load.
    #[serde(skip)]
    by_job: HashMap<String, String>,
}

impl StoreState {
    fn record_by_job(&self, id: &JobId) -> Option<&CacheRecord> {
        self.by_job
            .get(id.as_str())
            .and_then(|fp| self.records.get(fp))
    }

    fn record_by_job_mut(&mut self, id: &JobId) -> StoreResult<&mut CacheRecord> {
        let fp = self
            .by_job
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
        self.records
            .get_mut(&fp)
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))
    }
}

/// Durable mapping from fingerprint to job record.
pub struct CacheStore {
    state: RwLock<StoreState>,
    /// Serializes disk commits; snapshots are re-taken under it so a newer
    /// mutation can never be overwritten by an older snapshot.
    persist_lock: Mutex<()>,
    path: PathBuf,
    capacity: usize,
}

impl CacheStore {
    /// Open (or create) the store file at `path`.
    ///
    /// Unreadable files start the store empty; individual records that fail
    /// integrity checks are dropped with a warning; records left non-terminal
    /// by a previous process are finalized to `failed`.
    pub async fn open(path: impl AsRef<Path>, capacity: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = load_state(&path).await;
        let dirty = repair_state(&mut state);

        let store = Self {
            state: RwLock::new(state),
            persist_lock: Mutex::new(()),
            path,
            capacity,
        };
        if dirty {
            store.persist().await?;
        }
        Ok(store)
    }

    /// Look up a record by fingerprint.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheRecord> {
        self.state
            .read()
            .await
            .records
            .get(fingerprint.as_str())
            .cloned()
    }

    /// Look up a record by job id.
    pub async fn get_by_job(&self, id: &JobId) -> Option<CacheRecord> {
        self.state.read().await.record_by_job(id).cloned()
    }

    /// Insert a record unless its fingerprint is already taken.
    ///
    /// The existence check and the insert are one critical section, so two
    /// concurrent submissions of the same fingerprint can never both insert.
    /// Inserting past capacity evicts the oldest records by creation time.
    pub async fn insert_new(&self, fingerprint: Fingerprint, job: Job) -> StoreResult<InsertOutcome> {
        let outcome = {
            let mut state = self.state.write().await;
            if let Some(existing) = state.records.get(fingerprint.as_str()) {
                return Ok(InsertOutcome::Existing(existing.clone()));
            }

            let record = CacheRecord::new(fingerprint.clone(), job);
            state
                .by_job
                .insert(record.job.id.to_string(), fingerprint.as_str().to_string());
            state
                .records
                .insert(fingerprint.as_str().to_string(), record.clone());
            evict_past_capacity(&mut state, self.capacity);
            InsertOutcome::Inserted(record)
        };
        self.persist().await?;
        Ok(outcome)
    }

    /// Remove a whole record. Returns it if it existed.
    pub async fn remove_record(&self, fingerprint: &Fingerprint) -> StoreResult<Option<CacheRecord>> {
        let removed = {
            let mut state = self.state.write().await;
            let removed = state.records.remove(fingerprint.as_str());
            if let Some(record) = &removed {
                state.by_job.remove(record.job.id.as_str());
            }
            removed
        };
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Append a clip to a running job's record.
    pub async fn append_clip(&self, id: &JobId, clip: Clip) -> StoreResult<()> {
        self.update_job(id, |job| job.clips.push(clip)).await
    }

    /// Record a merge output.
    pub async fn record_merge(&self, id: &JobId, merge: MergeResult) -> StoreResult<()> {
        self.update_job(id, |job| job.merges.push(merge)).await
    }

    /// Drop one artifact (clip or merge output) from a record.
    pub async fn remove_artifact(&self, id: &JobId, filename: &str) -> StoreResult<()> {
        let outcome = {
            let mut state = self.state.write().await;
            let record = state.record_by_job_mut(id)?;
            let clips_before = record.job.clips.len();
            let merges_before = record.job.merges.len();
            record.job.clips.retain(|c| c.filename != filename);
            record.job.merges.retain(|m| m.filename != filename);

            if record.job.clips.len() == clips_before && record.job.merges.len() == merges_before {
                Err(StoreError::ArtifactNotFound {
                    job_id: id.to_string(),
                    filename: filename.to_string(),
                })
            } else {
                record.job.updated_at = chrono::Utc::now();
                Ok(())
            }
        };
        outcome?;
        self.persist().await
    }

    /// Transition a job to `running`.
    pub async fn mark_running(&self, id: &JobId) -> StoreResult<()> {
        self.update_job(id, |job| job.mark_running()).await
    }

    /// Transition a job to `completed`.
    pub async fn mark_completed(&self, id: &JobId) -> StoreResult<()> {
        self.update_job(id, |job| job.mark_completed()).await
    }

    /// Transition a job to `cancelled`.
    pub async fn mark_cancelled(&self, id: &JobId) -> StoreResult<()> {
        self.update_job(id, |job| job.mark_cancelled()).await
    }

    /// Transition a job to `failed` with a sanitized message.
    pub async fn mark_failed(&self, id: &JobId, error: &str) -> StoreResult<()> {
        self.update_job(id, |job| job.mark_failed(error)).await
    }

    /// Most recent records first, at most `n`.
    pub async fn list_recent(&self, n: usize) -> Vec<JobSummary> {
        let state = self.state.read().await;
        let mut summaries: Vec<JobSummary> =
            state.records.values().map(|r| JobSummary::from(&r.job)).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.0.cmp(&b.id.0)));
        summaries.truncate(n);
        summaries
    }

    /// Every record, for sweep passes.
    pub async fn all_records(&self) -> Vec<CacheRecord> {
        self.state.read().await.records.values().cloned().collect()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn update_job(&self, id: &JobId, apply: impl FnOnce(&mut Job)) -> StoreResult<()> {
        {
            let mut state = self.state.write().await;
            let record = state.record_by_job_mut(id)?;
            apply(&mut record.job);
        }
        self.persist().await
    }

    /// Commit the table to disk: serialize, write a sibling temp file, rename.
    async fn persist(&self) -> StoreResult<()> {
        let _guard = self.persist_lock.lock().await;

        let json = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn load_state(path: &Path) -> StoreState {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return StoreState::default(),
        Err(e) => {
            warn!("Cannot read store file {}: {e}; starting empty", path.display());
            return StoreState::default();
        }
    };

    match serde_json::from_slice::<StoreState>(&bytes) {
        Ok(state) => state,
        Err(e) => {
            warn!(
                "Store file {} is unreadable: {e}; starting empty",
                path.display()
            );
            StoreState::default()
        }
    }
}

/// Drop records that fail integrity checks, finalize records a previous
/// process left non-terminal, and rebuild the job index. Returns whether
/// anything changed.
fn repair_state(state: &mut StoreState) -> bool {
    let mut dirty = false;

    state.records.retain(|key, record| {
        let job = &record.job;
        let intact = record.fingerprint.as_str() == key
            && JobId::parse(job.id.as_str()).is_some()
            && job.clips.iter().all(|c| is_safe_artifact_name(&c.filename))
            && job.merges.iter().all(|m| is_safe_artifact_name(&m.filename));
        if !intact {
            warn!(job_id = %job.id, "Dropping corrupt store record");
            dirty = true;
        }
        intact
    });

    for record in state.records.values_mut() {
        if !record.job.status.is_terminal() {
            info!(
                job_id = %record.job.id,
                status = %record.job.status,
                "Finalizing job interrupted by restart"
            );
            record.job.mark_failed("interrupted by restart");
            dirty = true;
        }
        state
            .by_job
            .insert(record.job.id.to_string(), record.fingerprint.to_string());
    }

    dirty
}

/// Evict oldest records by creation time until within capacity.
fn evict_past_capacity(state: &mut StoreState, capacity: usize) {
    while state.records.len() > capacity {
        let oldest = state
            .records
            .values()
            .min_by(|a, b| {
                a.job
                    .created_at
                    .cmp(&b.job.created_at)
                    .then(a.job.id.0.cmp(&b.job.id.0))
            })
            .map(|r| r.fingerprint.to_string());

        let Some(key) = oldest else { break };
        if let Some(removed) = state.records.remove(&key) {
            state.by_job.remove(removed.job.id.as_str());
            info!(job_id = %removed.job.id, "Evicted oldest cache record");
        }
    }
}
