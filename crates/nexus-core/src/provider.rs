//! The capability provider contract.

use async_trait::async_trait;
use nexus_config::Config;
use tokio_util::sync::CancellationToken;

use crate::Arguments;
use crate::error::ProviderResult;
use crate::tool::{ToolDescriptor, ToolResult};

/// Per-call context handed to providers.
///
/// Carries the cancellation token of the originating request. Providers
/// must stop work and release child processes once it fires.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    /// Create a context bound to the given token.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// The request's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the request is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// A capability provider exposing a named set of tools.
///
/// Providers are shared across concurrent calls, so all per-run state set
/// up by [`Provider::init`] must be behind interior mutability and treated
/// as read-only afterwards.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable module identifier used in policy matching.
    fn name(&self) -> &str;

    /// Whether this provider participates under `config`.
    fn enabled(&self, config: &Config) -> bool;

    /// One-time setup. Called at most once per process.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot start; this aborts startup.
    fn init(&self, config: &Config) -> ProviderResult<()>;

    /// Tools valid for the current configuration. Empty before `init`.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Execute one of this provider's tools.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected faults; domain failures are
    /// reported through [`ToolResult::error`].
    async fn handle_call(
        &self,
        ctx: &CallContext,
        tool: &str,
        args: &Arguments,
    ) -> ProviderResult<ToolResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_context_cancellation() {
        let token = CancellationToken::new();
        let ctx = CallContext::new(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_default_context_not_cancelled() {
        assert!(!CallContext::default().is_cancelled());
    }
}
