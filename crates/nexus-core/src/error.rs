//! Provider error types.

use thiserror::Error;

/// Unexpected failures raised by a provider.
///
/// Expected domain failures are returned as [`ToolResult::error`] instead.
///
/// [`ToolResult::error`]: crate::ToolResult::error
#[derive(Debug, Error)]
pub enum ProviderError {
    /// One-time initialization failed.
    #[error("initialization failed: {message}")]
    InitFailed {
        /// What went wrong.
        message: String,
    },

    /// The provider does not own the requested tool.
    #[error("unknown tool: {tool}")]
    UnknownTool {
        /// The requested tool name.
        tool: String,
    },

    /// The provider was called before `init` completed.
    #[error("module {module} is not initialized")]
    NotInitialized {
        /// Module name.
        module: String,
    },

    /// The call was cancelled by the caller.
    #[error("call cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other internal fault.
    #[error("{0}")]
    Internal(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
