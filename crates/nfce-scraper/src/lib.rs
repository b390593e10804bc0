//! NFC-e Scraper - stateful retrieval from the SEFAZ-BA portal.
//!
//! The portal is a legacy web-forms application: every page carries hidden
//! postback tokens that must be echoed on the next submission, the session
//! lives in a cookie, and the lookup is gated by an image captcha.
//!
//! This crate provides:
//!
//! - [`form`] - decoding and re-encoding of the hidden postback tokens
//! - [`transport`] - the [`PortalTransport`] capability and its reqwest implementation
//! - [`captcha`] - challenge/solution types and the [`CaptchaSolver`] capability
//! - [`classify`] - mapping of portal error pages to error kinds
//! - [`engine`] - the [`ScrapeEngine`] that drives the page sequence
//!
//! # Example
//!
//! ```rust,ignore
//! use nfce_scraper::{CallbackSolver, HttpTransport, ScrapeEngine};
//! use std::sync::Arc;
//!
//! let transport = HttpTransport::new(&config.portal)?;
//! let solver = CallbackSolver::new(|challenge| async move { ask_user(challenge).await });
//! let mut engine = ScrapeEngine::new(transport).with_solver(Arc::new(solver));
//!
//! let result = engine.fetch_by_access_key("2925 0306 ...").await?;
//! println!("{}", result.receipt.total);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

/// Cached CSS selector for a literal.
macro_rules! selector {
    ($css:literal) => {{
        static SELECTOR: std::sync::OnceLock<scraper::Selector> = std::sync::OnceLock::new();
        SELECTOR.get_or_init(|| scraper::Selector::parse($css).expect("valid selector"))
    }};
}

pub mod captcha;
pub mod classify;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod form;
pub mod transport;

// Re-export commonly used types
pub use captcha::{CallbackSolver, CaptchaChallenge, CaptchaSolution, CaptchaSolver, SolverError};
pub use classify::{classify, PortalErrorKind};
pub use endpoints::Tab;
pub use engine::{ScrapeEngine, ScrapeResult, ScrapeState, ScrapedPages, Step};
pub use error::{Result, ScrapeError};
pub use form::{FormBuilder, FormError, FormState};
pub use transport::{HttpTransport, Page, PortalTransport, TransportError};
