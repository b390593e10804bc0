//! Captcha challenge/solution types and the solver capability.

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// An image captcha issued by the portal.
///
/// Valid for exactly one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    /// Millisecond timestamp used to request the image
    pub id: String,
    /// Image bytes
    pub image: Vec<u8>,
    /// Image content type, e.g. `image/gif`
    pub content_type: String,
}

impl CaptchaChallenge {
    /// File extension matching the content type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.content_type.split(';').next().map(str::trim) {
            Some("image/png") => "png",
            Some("image/jpeg" | "image/jpg") => "jpg",
            Some("image/gif") => "gif",
            _ => "bin",
        }
    }
}

/// Answer to a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaSolution {
    /// Text read from the image
    pub text: String,
    /// Id of the challenge this answers
    pub challenge_id: String,
}

impl CaptchaSolution {
    /// Answer `challenge` with `text`.
    #[must_use]
    pub fn new(text: impl Into<String>, challenge_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            challenge_id: challenge_id.into(),
        }
    }
}

/// Why a solver produced no answer.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The caller gave up waiting
    #[error("captcha solving was cancelled")]
    Cancelled,

    /// The solver could not produce an answer
    #[error("captcha solver failed: {0}")]
    Failed(String),
}

/// Produces an answer for a challenge, usually by asking a human.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve `challenge`.
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<CaptchaSolution, SolverError>;
}

/// Solver backed by an async closure returning the answer text.
pub struct CallbackSolver<F> {
    callback: F,
}

impl<F, Fut> CallbackSolver<F>
where
    F: Fn(CaptchaChallenge) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, SolverError>> + Send,
{
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F, Fut> CaptchaSolver for CallbackSolver<F>
where
    F: Fn(CaptchaChallenge) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, SolverError>> + Send,
{
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<CaptchaSolution, SolverError> {
        let text = (self.callback)(challenge.clone()).await?;
        Ok(CaptchaSolution::new(text.trim(), challenge.id.clone()))
    }
}
