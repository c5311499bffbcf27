//! Operations on a finished job's stored artifacts: merge, recolor, delete.
//!
//! All three validate against the stored record before touching the
//! filesystem, and the two that render do so into a staging path that is
//! renamed into place only on success.

use std::path::PathBuf;

use tracing::{debug, info};

use gifsplit_models::{
    is_safe_artifact_name, merge_filename, recolor_filename, Clip, JobId, MergeResult,
};
use gifsplit_store::StoreError;

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::Engine;

impl Engine {
    /// Concatenate an ordered selection of a job's clips into a new artifact.
    /// The selection order is the playback order.
    pub async fn merge(&self, id: &JobId, filenames: Vec<String>) -> EngineResult<MergeResult> {
        let record = self
            .store
            .get_by_job(id)
            .await
            .ok_or_else(|| EngineError::not_found(format!("job {id}")))?;

        let count = filenames.len();
        if count < 2 || count > self.config.max_merge_gifs {
            return Err(EngineError::invalid_selection(format!(
                "a merge takes between 2 and {} clips, got {count}",
                self.config.max_merge_gifs
            )));
        }
        for name in &filenames {
            if !is_safe_artifact_name(name) || !record.job.has_clip(name) {
                return Err(EngineError::invalid_selection(format!(
                    "{name} is not a clip of job {id}"
                )));
            }
        }

        let inputs: Vec<PathBuf> = filenames
            .iter()
            .map(|name| self.config.artifact_path(id, name))
            .collect();
        for (input, name) in inputs.iter().zip(&filenames) {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                return Err(EngineError::corruption(format!(
                    "clip {name} of job {id} is missing on disk"
                )));
            }
        }

        let filename = merge_filename(record.job.merges.len() + 1);
        let target = self.config.artifact_path(id, &filename);
        let staging = target.with_extension("part");

        if let Err(e) = self
            .encoder
            .concat(&inputs, record.job.settings.width, &staging)
            .await
        {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(EngineError::encoding_failed(format!("merge failed: {e}")));
        }
        tokio::fs::rename(&staging, &target).await?;

        let size_bytes = tokio::fs::metadata(&target).await?.len();
        let merge = MergeResult {
            filename,
            sources: filenames,
            size_bytes,
        };
        self.store.record_merge(id, merge.clone()).await?;
        info!(
            job_id = %id,
            file = %merge.filename,
            sources = merge.sources.len(),
            "Merged clips"
        );
        Ok(merge)
    }

    /// Render a grayscale variant of one clip. Recoloring the same clip
    /// twice overwrites the file without duplicating the record entry.
    pub async fn recolor(&self, id: &JobId, filename: &str) -> EngineResult<Clip> {
        let record = self
            .store
            .get_by_job(id)
            .await
            .ok_or_else(|| EngineError::not_found(format!("job {id}")))?;
        if !is_safe_artifact_name(filename) {
            return Err(EngineError::not_found(format!("clip {filename}")));
        }
        let source_clip = record
            .job
            .clips
            .iter()
            .find(|clip| clip.filename == filename)
            .ok_or_else(|| EngineError::not_found(format!("clip {filename} of job {id}")))?;

        let gray_name = recolor_filename(filename)
            .ok_or_else(|| EngineError::invalid_input(format!("{filename} cannot be recolored")))?;

        let input = self.config.artifact_path(id, filename);
        if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
            return Err(EngineError::corruption(format!(
                "clip {filename} of job {id} is missing on disk"
            )));
        }

        let target = self.config.artifact_path(id, &gray_name);
        let staging = target.with_extension("part");
        if let Err(e) = self.encoder.recolor(&input, &staging).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(EngineError::encoding_failed(format!("recolor failed: {e}")));
        }
        tokio::fs::rename(&staging, &target).await?;

        let size_bytes = tokio::fs::metadata(&target).await?.len();
        let clip = Clip {
            filename: gray_name.clone(),
            size_bytes,
            range: source_clip.range,
        };
        if !record.job.has_clip(&gray_name) {
            self.store.append_clip(id, clip.clone()).await?;
        }
        info!(job_id = %id, file = %clip.filename, "Recolored clip");
        Ok(clip)
    }

    /// Remove one artifact: record entry first, then the file.
    pub async fn delete_artifact(&self, id: &JobId, filename: &str) -> EngineResult<()> {
        if !is_safe_artifact_name(filename) {
            return Err(EngineError::not_found(format!("artifact {filename}")));
        }
        match self.store.remove_artifact(id, filename).await {
            Ok(()) => {}
            Err(StoreError::RecordNotFound(_)) => {
                return Err(EngineError::not_found(format!("job {id}")));
            }
            Err(StoreError::ArtifactNotFound { .. }) => {
                return Err(EngineError::not_found(format!(
                    "artifact {filename} of job {id}"
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let _ = tokio::fs::remove_file(self.config.artifact_path(id, filename)).await;
        debug!(job_id = %id, file = filename, "Deleted artifact");
        Ok(())
    }
}
