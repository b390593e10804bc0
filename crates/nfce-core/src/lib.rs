//! NFC-e Core - Foundation crate for NFC-e invoice retrieval.
//!
//! This crate provides the shared domain types, fixed-point currency,
//! error handling and configuration that every other crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Identifier newtypes (`AccessKey`, `JobId`) and the `Portal` enum
//! - [`money`] - `Brl`, a cents-based currency value with Brazilian formatting
//! - [`receipt`] - Normalized invoice records (`Receipt`, `Item`, `Taxes`)
//!
//! # Example
//!
//! ```rust
//! use nfce_core::{AccessKey, Brl};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = AccessKey::parse("2925 0306 0572 2303 1484 6501 4000 3829 5911 4107 3162")?;
//! assert_eq!(key.as_str().len(), 44);
//!
//! let total: Brl = "R$ 1.234,56".parse()?;
//! assert_eq!(total.cents(), 123_456);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod money;
pub mod receipt;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, JobsConfig, PortalConfig, ScrapingConfig, ServerConfig};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use money::Brl;
pub use receipt::{Address, Consumer, Issuer, Item, Receipt, TaxKind, TaxLine, Taxes, Unit};
pub use types::{is_valid_access_key, normalize_access_key, AccessKey, JobId, Portal};
