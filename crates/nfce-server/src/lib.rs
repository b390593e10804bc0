//! NFC-e Server - HTTP API over retrieval jobs.
//!
//! Routes:
//!
//! - `POST /jobs` `{"accessKey"}` starts a job, `202 {"jobId"}`
//! - `GET /jobs/:id` returns the job record, with the pending captcha image
//!   base64-encoded while the job waits for an answer
//! - `POST /jobs/:id/captcha` `{"solution"}` hands an answer to the job
//! - `GET /healthz`
//!
//! Errors are `{"code", "message"}` bodies. Every response carries
//! permissive CORS headers.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = nfce_core::AppConfig::load_with_env()?;
//! nfce_server::run(&config).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cors;
pub mod error;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use nfce_core::AppConfig;
use nfce_jobs::{JobManager, PortalFetcher};
use std::sync::Arc;

// Re-export commonly used types
pub use error::{ApiError, ErrorBody, ServerError};
pub use routes::{CaptchaResponse, CreateJobResponse, JobResponse, SubmitCaptchaResponse};

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Job registry
    pub jobs: Arc<JobManager>,
}

impl AppState {
    /// State over `jobs`.
    #[must_use]
    pub fn new(jobs: Arc<JobManager>) -> Self {
        Self { jobs }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/jobs", post(routes::create_job))
        .route("/jobs/:id", get(routes::get_job))
        .route("/jobs/:id/captcha", post(routes::submit_captcha))
        .layer(axum::middleware::from_fn(cors::cors))
        .with_state(state)
}

/// Start the janitor and serve on `config.server.bind` until the process
/// stops.
pub async fn run(config: &AppConfig) -> Result<(), ServerError> {
    let fetcher = Arc::new(PortalFetcher::new(config));
    let jobs = Arc::new(JobManager::new(fetcher, config.jobs.clone()));
    let _janitor = jobs.spawn_janitor();

    let addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, router(AppState::new(jobs))).await?;
    Ok(())
}
