//! A single retrieval job and its lifecycle.

use crate::error::{JobError, Result};
use chrono::{DateTime, Utc};
use nfce_core::{AccessKey, JobId, Receipt};
use nfce_scraper::CaptchaChallenge;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a job.
///
/// `Created -> Running -> (WaitingCaptcha -> Running)* -> Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, task not started
    Created,
    /// Task is talking to the portal
    Running,
    /// Task is parked until a captcha answer arrives
    WaitingCaptcha,
    /// Receipt available
    Completed,
    /// Error message available
    Failed,
}

impl JobStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::WaitingCaptcha => "waiting_captcha",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// True once the job can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a job record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    /// Job id
    pub id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Key being retrieved
    pub access_key: AccessKey,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Receipt, once completed
    pub result: Option<Receipt>,
    /// Error message, once failed
    pub error: Option<String>,
    /// Pending challenge, while waiting for an answer
    pub captcha: Option<CaptchaChallenge>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    result: Option<Receipt>,
    error: Option<String>,
    captcha: Option<CaptchaChallenge>,
    answer: Option<oneshot::Sender<String>>,
}

/// A registered retrieval.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    access_key: AccessKey,
    created_at: DateTime<Utc>,
    registered: Instant,
    cancel: CancellationToken,
    state: Mutex<JobState>,
}

impl Job {
    /// New job in `Created`.
    #[must_use]
    pub fn new(access_key: AccessKey) -> Self {
        Self {
            id: JobId::generate(),
            access_key,
            created_at: Utc::now(),
            registered: Instant::now(),
            cancel: CancellationToken::new(),
            state: Mutex::new(JobState {
                status: JobStatus::Created,
                result: None,
                error: None,
                captcha: None,
                answer: None,
            }),
        }
    }

    /// Job id.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Key being retrieved.
    #[must_use]
    pub fn access_key(&self) -> &AccessKey {
        &self.access_key
    }

    /// Registration time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since registration, on the runtime clock.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.registered.elapsed()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    /// Copy of the whole record.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock();
        JobSnapshot {
            id: self.id.clone(),
            status: state.status,
            access_key: self.access_key.clone(),
            created_at: self.created_at,
            result: state.result.clone(),
            error: state.error.clone(),
            captcha: state.captcha.clone(),
        }
    }

    /// Hand a captcha answer to the waiting task.
    ///
    /// Never blocks. Rejected without any state change unless the job is
    /// `WaitingCaptcha`.
    pub fn submit_captcha(&self, solution: &str) -> Result<()> {
        let mut state = self.lock();
        if state.status != JobStatus::WaitingCaptcha {
            return Err(JobError::NotWaitingForCaptcha {
                status: state.status,
            });
        }

        let sender = state.answer.take().ok_or(JobError::HandoffFailed)?;
        sender
            .send(solution.to_string())
            .map_err(|_| JobError::HandoffFailed)?;

        state.status = JobStatus::Running;
        state.captcha = None;
        tracing::debug!("Job {} received a captcha answer", self.id);
        Ok(())
    }

    /// Ask the task to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once [`Job::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `Created -> Running`. False if the job was already started.
    pub(crate) fn mark_running(&self) -> bool {
        let mut state = self.lock();
        if state.status != JobStatus::Created {
            return false;
        }
        state.status = JobStatus::Running;
        true
    }

    /// Publish a challenge and park a mailbox for its answer.
    pub(crate) fn await_captcha(&self, challenge: CaptchaChallenge) -> oneshot::Receiver<String> {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.lock();
        if !state.status.is_terminal() {
            state.status = JobStatus::WaitingCaptcha;
            state.captcha = Some(challenge);
            state.answer = Some(sender);
        }
        receiver
    }

    pub(crate) fn complete(&self, receipt: Receipt) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        state.status = JobStatus::Completed;
        state.result = Some(receipt);
        state.captcha = None;
        state.answer = None;
    }

    pub(crate) fn fail(&self, error: String) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        state.status = JobStatus::Failed;
        state.error = Some(error);
        state.captcha = None;
        state.answer = None;
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
