//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    ReadError {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the config schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// File path.
        path: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A field holds an invalid value.
    #[error("invalid config field {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
