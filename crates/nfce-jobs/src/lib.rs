//! NFC-e Jobs - background retrieval with captcha handoff.
//!
//! A retrieval needs a human to read a captcha halfway through, so it cannot
//! be a single request. This crate turns it into a job:
//!
//! - [`JobManager`] registers jobs, spawns one task per job, and evicts old
//!   records from a janitor task
//! - [`Job`] holds the lifecycle (`created`, `running`, `waiting_captcha`,
//!   `completed`, `failed`) behind its own lock
//! - [`JobSolver`] parks the task until an answer is handed over through
//!   [`Job::submit_captcha`]
//! - [`InvoiceFetcher`] is the retrieval capability; [`PortalFetcher`] runs
//!   the real protocol engine
//!
//! # Example
//!
//! ```rust,ignore
//! use nfce_jobs::{JobManager, PortalFetcher};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(JobManager::new(Arc::new(PortalFetcher::new(&config)), config.jobs.clone()));
//! manager.spawn_janitor();
//!
//! let job = manager.submit("2925 0306 ...")?;
//! // later, once the job is waiting for a captcha
//! manager.submit_captcha(job.id(), "x7k2p")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod fetcher;
pub mod job;
pub mod manager;
pub mod solver;

// Re-export commonly used types
pub use error::{JobError, Result};
pub use fetcher::{InvoiceFetcher, PortalFetcher};
pub use job::{Job, JobSnapshot, JobStatus};
pub use manager::JobManager;
pub use solver::JobSolver;
