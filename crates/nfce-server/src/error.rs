//! Error types for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nfce_jobs::{JobError, JobStatus};
use serde::Serialize;
use thiserror::Error;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code (e.g. `JOB_NOT_FOUND`)
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request body
    #[error("{0}")]
    BadRequest(String),

    /// The access key failed validation
    #[error("invalid access key: {0}")]
    InvalidAccessKey(String),

    /// No job with this id
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Captcha answer sent to a job that is not waiting for one
    #[error("job is {0}, not waiting for a captcha")]
    NotWaitingForCaptcha(JobStatus),

    /// The answer could not be handed to the job task
    #[error("captcha answer could not be delivered")]
    HandoffFailed,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidAccessKey(_) | Self::NotWaitingForCaptcha(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::JobNotFound(_) => StatusCode::NOT_FOUND,
            Self::HandoffFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Code placed in [`ErrorBody::code`].
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidAccessKey(_) => "INVALID_ACCESS_KEY",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::NotWaitingForCaptcha(_) => "NOT_WAITING_FOR_CAPTCHA",
            Self::HandoffFailed => "HANDOFF_FAILED",
        }
    }

    /// Serializable body.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidAccessKey(reason) => Self::InvalidAccessKey(reason),
            JobError::NotFound(id) => Self::JobNotFound(id),
            JobError::NotWaitingForCaptcha { status } => Self::NotWaitingForCaptcha(status),
            JobError::HandoffFailed => Self::HandoffFailed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listen address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying failure
        source: std::io::Error,
    },

    /// The server loop failed
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
