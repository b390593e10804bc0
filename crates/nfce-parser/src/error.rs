//! Parser error types.

use thiserror::Error;

/// Errors raised while extracting a receipt.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A required anchor element is missing from the page
    #[error("page structure not found: missing {anchor}")]
    StructureNotFound {
        /// CSS selector of the missing anchor
        anchor: &'static str,
    },

    /// No parser is registered for the requested portal
    #[error("no parser registered for portal {0}")]
    UnsupportedPortal(String),
}

/// Result type alias using `ParseError`.
pub type Result<T> = std::result::Result<T, ParseError>;
