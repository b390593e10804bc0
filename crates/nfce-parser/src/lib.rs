//! NFC-e Parser - structured extraction from SEFAZ portal pages.
//!
//! The BA portal renders receipts as deeply nested tables where each
//! field is a `<label>` followed by a `<span>`. This crate indexes those
//! pairs by section, then maps them onto the records in [`nfce_core`].
//!
//! Extraction is best-effort: a missing field becomes an empty or zero
//! value. Only a missing tab anchor (`#NFe`, `#Prod`) is an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use nfce_core::Portal;
//! use nfce_parser::ParserRegistry;
//!
//! let registry = ParserRegistry::with_defaults();
//! let receipt = registry.parse(Portal::Ba, &html)?;
//! println!("{} items, total {}", receipt.items.len(), receipt.total);
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

pub mod error;
pub mod nfe_tab;
pub mod products_tab;
pub mod registry;
pub mod section;
pub mod text;

// Re-export commonly used types
pub use error::{ParseError, Result};
pub use nfe_tab::parse_nfe_tab;
pub use products_tab::parse_products_tab;
pub use registry::{BahiaParser, ParserRegistry, ReceiptParser};
pub use section::{collect_label_values, Labels, SectionIndex};
