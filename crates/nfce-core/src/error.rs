//! Core error types for NFC-e retrieval.
//!
//! Domain validation failures (access keys, money values, portals) live in
//! [`CoreError`]; configuration loading has its own [`ConfigError`].

use thiserror::Error;

/// Central error type for core domain operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Access key failed normalization, length, or checksum validation
    #[error("invalid access key: {0}")]
    InvalidAccessKey(String),

    /// Money value could not be parsed in Brazilian notation
    #[error("invalid BRL value {input:?}: {reason}")]
    InvalidMoney {
        /// The raw input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Portal code is not supported
    #[error("unsupported portal: {0}")]
    UnsupportedPortal(String),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
