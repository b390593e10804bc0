//! Job registry, task spawning and eviction.

use crate::error::{JobError, Result};
use crate::fetcher::InvoiceFetcher;
use crate::job::Job;
use crate::solver::JobSolver;
use futures::FutureExt;
use nfce_core::{AccessKey, CoreError, JobId, JobsConfig};
use nfce_scraper::CaptchaSolver;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Owns every live job.
///
/// The registry lock only guards membership; each job carries its own lock.
pub struct JobManager {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    fetcher: Arc<dyn InvoiceFetcher>,
    config: JobsConfig,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new(fetcher: Arc<dyn InvoiceFetcher>, config: JobsConfig) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            fetcher,
            config,
        }
    }

    /// Register a job for `raw_key` without starting it.
    pub fn create(&self, raw_key: &str) -> Result<Arc<Job>> {
        let key = AccessKey::parse(raw_key).map_err(|e| match e {
            CoreError::InvalidAccessKey(reason) => JobError::InvalidAccessKey(reason),
            other => JobError::InvalidAccessKey(other.to_string()),
        })?;

        let job = Arc::new(Job::new(key));
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id().clone(), Arc::clone(&job));

        tracing::info!("Created job {} for {}", job.id(), job.access_key().formatted());
        Ok(job)
    }

    /// Move `job` to `Running` and spawn its task.
    ///
    /// The status changes before this returns. Starting a job twice is a
    /// no-op.
    pub fn start(&self, job: &Arc<Job>) {
        if !job.mark_running() {
            tracing::warn!("Job {} was already started", job.id());
            return;
        }

        let job = Arc::clone(job);
        let fetcher = Arc::clone(&self.fetcher);
        let deadline = self.config.deadline();
        tokio::spawn(run_job(job, fetcher, deadline));
    }

    /// Create and start a job.
    pub fn submit(&self, raw_key: &str) -> Result<Arc<Job>> {
        let job = self.create(raw_key)?;
        self.start(&job);
        Ok(job)
    }

    /// Look a job up. Records past the retention window are absent even
    /// before the janitor's next tick, and are evicted on the spot.
    #[must_use]
    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        let job = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()?;

        if job.age() > self.config.retention() {
            let removed = self
                .jobs
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(id);
            if let Some(job) = removed {
                retire(&job);
            }
            return None;
        }
        Some(job)
    }

    /// Hand a captcha answer to job `id`.
    pub fn submit_captcha(&self, id: &JobId, solution: &str) -> Result<()> {
        let job = self
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        job.submit_captcha(solution)
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no job is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every job older than the retention window, whatever its
    /// status. Jobs still running are cancelled. Returns how many were
    /// removed.
    pub fn evict_expired(&self) -> usize {
        let retention = self.config.retention();
        let expired: Vec<Arc<Job>> = {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<JobId> = jobs
                .iter()
                .filter(|(_, job)| job.age() > retention)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &expired {
            retire(job);
        }

        if !expired.is_empty() {
            tracing::debug!("Evicted {} expired jobs", expired.len());
        }
        expired.len()
    }

    /// Evict expired jobs on the configured interval until the manager is
    /// dropped.
    pub fn spawn_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.janitor_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.evict_expired();
            }
        })
    }
}

/// Cancel an evicted job whose task may still be running.
fn retire(job: &Job) {
    if !job.status().is_terminal() {
        tracing::info!("Cancelling expired job {}", job.id());
        job.cancel();
    }
}

/// Drive one job to `Completed` or `Failed`.
async fn run_job(job: Arc<Job>, fetcher: Arc<dyn InvoiceFetcher>, deadline: Duration) {
    tracing::info!("Job {} started", job.id());

    let solver: Arc<dyn CaptchaSolver> = Arc::new(JobSolver::new(Arc::clone(&job)));
    let key = job.access_key().clone();
    let fetch = AssertUnwindSafe(fetcher.fetch(&key, solver)).catch_unwind();

    let outcome = tokio::select! {
        () = job.cancellation().cancelled() => Err("job cancelled".to_string()),
        finished = tokio::time::timeout(deadline, fetch) => match finished {
            Err(_) => Err(format!("job exceeded its {}s deadline", deadline.as_secs())),
            Ok(Err(panic)) => Err(format!("job panicked: {}", panic_message(panic.as_ref()))),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Ok(Ok(receipt))) => Ok(receipt),
        },
    };

    match outcome {
        Ok(receipt) => {
            tracing::info!(
                "Job {} completed with {} items, total {}",
                job.id(),
                receipt.items.len(),
                receipt.total
            );
            job.complete(receipt);
        }
        Err(message) => {
            tracing::error!("Job {} failed: {}", job.id(), message);
            job.fail(message);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
