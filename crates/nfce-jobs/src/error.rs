//! Error types for job management.

use crate::job::JobStatus;
use thiserror::Error;

/// Errors returned to callers of the job API.
#[derive(Debug, Error)]
pub enum JobError {
    /// The key given for a new job failed validation
    #[error("invalid access key: {0}")]
    InvalidAccessKey(String),

    /// No job with this id is registered
    #[error("job not found: {0}")]
    NotFound(String),

    /// A captcha answer arrived while the job was not waiting for one
    #[error("job is {status}, not waiting for a captcha")]
    NotWaitingForCaptcha {
        /// Status at the time of the submission
        status: JobStatus,
    },

    /// The waiting task could not receive the answer
    #[error("captcha answer could not be delivered")]
    HandoffFailed,
}

/// Result type alias for job operations
pub type Result<T> = std::result::Result<T, JobError>;
