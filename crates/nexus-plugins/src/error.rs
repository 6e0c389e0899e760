//! Plugin error types.

use std::path::PathBuf;

use nexus_core::ProviderError;

/// Errors from plugin discovery, loading and installation.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Failed to parse a plugin manifest file.
    #[error("failed to parse {path}: {message}")]
    ManifestParseError {
        /// Path to the manifest file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// A manifest exists but could not be read.
    #[error("failed to read {path}: {source}")]
    ManifestReadError {
        /// Path to the manifest file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Two manifests resolve to the same qualified tool name.
    #[error("duplicate plugin tool name: {name}")]
    DuplicateTool {
        /// The colliding qualified name.
        name: String,
    },

    /// The install source is not usable.
    #[error("invalid install source: {0}")]
    InvalidSource(String),

    /// Download of a remote bundle failed.
    #[error("download failed: {message}")]
    DownloadFailed {
        /// Description of the failure.
        message: String,
    },

    /// Archive extraction failure.
    #[error("extraction error: {message}")]
    ExtractionError {
        /// Description of the extraction failure.
        message: String,
    },

    /// Unsafe entry type in archive (e.g. symlink, hardlink, device node).
    #[error("unsafe archive entry type '{entry_type}' at {path}")]
    UnsafeEntryType {
        /// The entry type that was rejected.
        entry_type: String,
        /// The path of the entry.
        path: String,
    },

    /// Path traversal detected in archive entry.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path.
        path: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PluginError> for ProviderError {
    fn from(e: PluginError) -> Self {
        match e {
            PluginError::Io(io) => Self::Io(io),
            other => Self::InitFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
