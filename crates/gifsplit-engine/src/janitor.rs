//! Background expiry sweep for aged-out jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use gifsplit_store::CacheStore;

use crate::config::EngineConfig;

/// How often the sweep re-runs once the service is up.
const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Removes terminal jobs older than the configured expiry window: the cache
/// record, the artifact directory, and the retained source file.
///
/// Runs one sweep at startup, then on a fixed interval until shutdown.
/// In-flight jobs are never touched, whatever their age.
pub struct Janitor {
    config: EngineConfig,
    store: Arc<CacheStore>,
    shutdown: watch::Receiver<bool>,
}

impl Janitor {
    pub fn new(
        config: EngineConfig,
        store: Arc<CacheStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            store,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(
            expiry_hours = self.config.job_expiry_hours,
            "Expiry janitor started"
        );
        self.sweep().await;

        let mut shutdown = self.shutdown.clone();
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        // The first tick fires immediately; the startup sweep already ran.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Expiry janitor stopped");
                        break;
                    }
                }
                _ = interval.tick() => self.sweep().await,
            }
        }
    }

    /// One pass over the store. Public so a sweep can be driven directly.
    pub async fn sweep(&self) {
        let hours = self.config.job_expiry_hours;
        if hours == 0 {
            return;
        }
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);

        let mut removed = 0usize;
        for record in self.store.all_records().await {
            let job = &record.job;
            if !job.status.is_terminal() {
                continue;
            }
            let finished = job.completed_at.unwrap_or(job.created_at);
            if finished >= cutoff {
                continue;
            }

            if let Err(e) = self.store.remove_record(&record.fingerprint).await {
                warn!(job_id = %job.id, error = %e, "Could not expire record");
                continue;
            }
            let _ = tokio::fs::remove_dir_all(self.config.job_dir(&job.id)).await;
            let _ = tokio::fs::remove_file(self.config.source_path(&job.id)).await;
            info!(job_id = %job.id, "Expired job");
            removed += 1;
        }
        if removed > 0 {
            info!(removed, "Expiry sweep finished");
        } else {
            debug!("Expiry sweep found nothing to remove");
        }
    }
}
