//! Gateway error types.

use nexus_core::ProviderError;
use thiserror::Error;

/// Errors raised while assembling or serving the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Two providers were registered under the same module name.
    #[error("module already registered: {name}")]
    DuplicateModule {
        /// The module name.
        name: String,
    },

    /// A provider's one-time `init` failed.
    #[error("failed to init module {name}: {message}")]
    ModuleInit {
        /// The module name.
        name: String,
        /// The provider's error.
        message: String,
    },

    /// Two active providers expose the same tool name.
    #[error("duplicate tool {tool} exposed by modules {first} and {second}")]
    DuplicateTool {
        /// The tool name.
        tool: String,
        /// The module registered first.
        first: String,
        /// The module that collided.
        second: String,
    },

    /// No active provider owns the requested tool.
    #[error("unknown tool: {tool}")]
    UnknownTool {
        /// The requested tool name.
        tool: String,
    },

    /// A provider failed unexpectedly.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
