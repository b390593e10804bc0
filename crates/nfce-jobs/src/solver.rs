//! Captcha solver bound to a job's mailbox.

use crate::job::Job;
use async_trait::async_trait;
use nfce_scraper::{CaptchaChallenge, CaptchaSolution, CaptchaSolver, SolverError};
use std::sync::Arc;

/// Publishes each challenge on the job and waits for
/// [`Job::submit_captcha`] or cancellation.
#[derive(Debug, Clone)]
pub struct JobSolver {
    job: Arc<Job>,
}

impl JobSolver {
    /// Solver for `job`.
    #[must_use]
    pub fn new(job: Arc<Job>) -> Self {
        Self { job }
    }
}

#[async_trait]
impl CaptchaSolver for JobSolver {
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<CaptchaSolution, SolverError> {
        let answer = self.job.await_captcha(challenge.clone());
        tracing::info!("Job {} is waiting for a captcha answer", self.job.id());

        tokio::select! {
            () = self.job.cancellation().cancelled() => Err(SolverError::Cancelled),
            text = answer => text
                .map(|text| CaptchaSolution::new(text.trim(), challenge.id.clone()))
                .map_err(|_| SolverError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use nfce_core::AccessKey;

    fn challenge() -> CaptchaChallenge {
        CaptchaChallenge {
            id: "42".to_string(),
            image: vec![0x47],
            content_type: "image/gif".to_string(),
        }
    }

    fn running_job() -> Arc<Job> {
        let job = Arc::new(Job::new(
            AccessKey::parse("29250306057223031484650140003829591141073162").expect("valid key"),
        ));
        job.mark_running();
        job
    }

    #[tokio::test]
    async fn test_solve_waits_for_submission() {
        let job = running_job();
        let solver = JobSolver::new(Arc::clone(&job));

        let task = tokio::spawn(async move { solver.solve(&challenge()).await });
        while job.status() != JobStatus::WaitingCaptcha {
            tokio::task::yield_now().await;
        }
        job.submit_captcha(" ab12 ").expect("handoff");

        let solution = task.await.expect("join").expect("solution");
        assert_eq!(solution, CaptchaSolution::new("ab12", "42"));
    }

    #[tokio::test]
    async fn test_cancel_releases_waiting_solver() {
        let job = running_job();
        let solver = JobSolver::new(Arc::clone(&job));

        let task = tokio::spawn(async move { solver.solve(&challenge()).await });
        while job.status() != JobStatus::WaitingCaptcha {
            tokio::task::yield_now().await;
        }
        job.cancel();

        let err = task.await.expect("join").unwrap_err();
        assert!(matches!(err, SolverError::Cancelled));
    }
}
