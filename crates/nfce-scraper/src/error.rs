//! Error types for portal retrieval.

use crate::captcha::SolverError;
use crate::engine::Step;
use crate::form::FormError;
use crate::transport::TransportError;
use nfce_parser::ParseError;
use thiserror::Error;

/// Errors that end a retrieval run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The key failed local validation or was rejected by the portal
    #[error("invalid access key: {0}")]
    InvalidAccessKey(String),

    /// A captcha had to be solved but no solver is configured
    #[error("no captcha solver configured")]
    NoCaptchaSolver,

    /// The portal rejected the captcha answer
    #[error("captcha answer was rejected")]
    CaptchaInvalid,

    /// Every allowed captcha attempt was rejected
    #[error("captcha rejected {attempts} times")]
    CaptchaAttemptsExhausted {
        /// Attempts made
        attempts: u32,
    },

    /// No receipt exists for the key
    #[error("NFC-e not found")]
    InvoiceNotFound,

    /// The server session expired mid-run
    #[error("portal session expired")]
    SessionExpired,

    /// The portal answered with something the run cannot continue from
    #[error("unexpected response at {step}: {detail}")]
    UnexpectedResponse {
        /// Step that received the response
        step: Step,
        /// What was wrong with it
        detail: String,
    },

    /// Required page structure was missing
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A request timed out
    #[error("timed out at {step}")]
    Timeout {
        /// Step that timed out
        step: Step,
    },

    /// The caller cancelled the run
    #[error("retrieval cancelled")]
    Cancelled,

    /// A request failed
    #[error("{step} failed: {source}")]
    Transport {
        /// Step that issued the request
        step: Step,
        /// Underlying failure
        source: TransportError,
    },

    /// Postback tokens could not be read
    #[error("{step} failed: {source}")]
    FormState {
        /// Step that decoded the page
        step: Step,
        /// Underlying failure
        source: FormError,
    },

    /// The solver produced no answer
    #[error(transparent)]
    Solver(SolverError),
}

impl ScrapeError {
    /// Wrap a transport failure, surfacing timeouts as [`ScrapeError::Timeout`].
    #[must_use]
    pub fn transport(step: Step, source: TransportError) -> Self {
        match source {
            TransportError::Timeout { .. } => Self::Timeout { step },
            source => Self::Transport { step, source },
        }
    }

    /// Wrap a form-state failure.
    #[must_use]
    pub fn form_state(step: Step, source: FormError) -> Self {
        Self::FormState { step, source }
    }

    /// True for errors that a fresh captcha can recover from.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CaptchaInvalid)
    }

    /// True for errors caused by the caller's input.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidAccessKey(_) | Self::InvoiceNotFound)
    }
}

impl From<SolverError> for ScrapeError {
    fn from(error: SolverError) -> Self {
        match error {
            SolverError::Cancelled => Self::Cancelled,
            other => Self::Solver(other),
        }
    }
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_timeout_surfaces_as_timeout() {
        let err = ScrapeError::transport(
            Step::Submit,
            TransportError::Timeout {
                url: "https://x".to_string(),
            },
        );
        assert!(matches!(err, ScrapeError::Timeout { step: Step::Submit }));
        assert_eq!(err.to_string(), "timed out at submit");
    }

    #[test]
    fn test_step_wrapped_message() {
        let err = ScrapeError::form_state(Step::LoadAccessKeyPage, FormError::MissingViewState);
        assert_eq!(
            err.to_string(),
            "load_access_key_page failed: page has no __VIEWSTATE token"
        );
    }

    #[test]
    fn test_solver_cancel_maps_to_cancelled() {
        assert!(matches!(
            ScrapeError::from(SolverError::Cancelled),
            ScrapeError::Cancelled
        ));
        assert!(matches!(
            ScrapeError::from(SolverError::Failed("x".to_string())),
            ScrapeError::Solver(_)
        ));
        assert!(ScrapeError::CaptchaInvalid.is_retryable());
        assert!(!ScrapeError::SessionExpired.is_retryable());
    }
}
