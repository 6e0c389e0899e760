//! Policy-gated tool advertisement and invocation.
//!
//! Policy is evaluated again on every call. A decision made while listing
//! tools never authorizes a later invocation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use nexus_approval::{Confirmation, ConfirmationHandler, Decision, Policy};
use nexus_config::DEFAULT_CONFIRM_TIMEOUT_SECS;
use nexus_core::{Arguments, CallContext, Provider, ProviderError, ToolDescriptor, ToolResult};
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};

/// One tool of an active provider together with its current decision.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    /// Owning module.
    pub module: String,
    /// The tool's descriptor.
    pub descriptor: ToolDescriptor,
    /// Policy decision at the time the entry was built.
    pub decision: Decision,
}

/// Routes tool calls from the transport to the owning provider.
pub struct Dispatcher {
    providers: Vec<Arc<dyn Provider>>,
    routes: BTreeMap<String, Arc<dyn Provider>>,
    policy: Policy,
    confirmer: Arc<dyn ConfirmationHandler>,
    confirm_timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.routes.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Build a dispatcher over the active providers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateTool`] if two providers expose the
    /// same tool name.
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        policy: Policy,
        confirmer: Arc<dyn ConfirmationHandler>,
    ) -> GatewayResult<Self> {
        let mut routes: BTreeMap<String, Arc<dyn Provider>> = BTreeMap::new();
        for provider in &providers {
            for tool in provider.tools() {
                if let Some(owner) = routes.get(&tool.name) {
                    return Err(GatewayError::DuplicateTool {
                        tool: tool.name,
                        first: owner.name().to_string(),
                        second: provider.name().to_string(),
                    });
                }
                routes.insert(tool.name, Arc::clone(provider));
            }
        }
        Ok(Self {
            providers,
            routes,
            policy,
            confirmer,
            confirm_timeout: Duration::from_secs(DEFAULT_CONFIRM_TIMEOUT_SECS),
        })
    }

    /// Bound how long a confirmation prompt may wait for an answer.
    #[must_use]
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// The policy in force.
    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Every tool of every active provider, with a fresh policy decision.
    #[must_use]
    pub fn catalog(&self) -> Vec<ToolEntry> {
        self.providers
            .iter()
            .flat_map(|provider| {
                let module = provider.name().to_string();
                provider.tools().into_iter().map(move |descriptor| ToolEntry {
                    decision: self.policy.evaluate(&module, &descriptor.name),
                    module: module.clone(),
                    descriptor,
                })
            })
            .collect()
    }

    /// Tools the remote caller may see. Denied tools are dropped.
    #[must_use]
    pub fn advertised_tools(&self) -> Vec<ToolDescriptor> {
        self.catalog()
            .into_iter()
            .filter_map(|entry| {
                if entry.decision == Decision::Deny {
                    warn!(module = %entry.module, tool = %entry.descriptor.name, "tool blocked by policy");
                    None
                } else {
                    Some(entry.descriptor)
                }
            })
            .collect()
    }

    /// Run `tool` after policy and, when required, human confirmation.
    ///
    /// Refusals come back as error results. Only provider faults and
    /// unknown tools are `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownTool`] when no active provider owns
    /// `tool`, and [`GatewayError::Provider`] when the provider faults or
    /// the call is cancelled.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        tool: &str,
        args: Option<Arguments>,
    ) -> GatewayResult<ToolResult> {
        let provider = self
            .routes
            .get(tool)
            .ok_or_else(|| GatewayError::UnknownTool {
                tool: tool.to_string(),
            })?;
        let module = provider.name();

        let evaluation = self.policy.explain(module, tool);
        match evaluation.decision {
            Decision::Deny => {
                warn!(module = %module, tool = %tool, "tool blocked by policy");
                let reason = evaluation
                    .reason
                    .map(|r| format!(" ({r})"))
                    .unwrap_or_default();
                return Ok(ToolResult::error(format!(
                    "tool blocked by policy: {module}/{tool}{reason}"
                )));
            },
            Decision::Confirm => {
                let outcome = self.confirm(ctx, module, tool).await?;
                if !outcome.is_approved() {
                    warn!(module = %module, tool = %tool, outcome = ?outcome, "tool execution denied by user");
                    return Ok(ToolResult::error(format!(
                        "tool execution denied by user: {module}/{tool}"
                    )));
                }
            },
            Decision::Allow => {},
        }

        info!(module = %module, tool = %tool, "forwarding tool call");
        let args = args.unwrap_or_default();
        Ok(provider.handle_call(ctx, tool, &args).await?)
    }

    async fn confirm(
        &self,
        ctx: &CallContext,
        module: &str,
        tool: &str,
    ) -> GatewayResult<Confirmation> {
        tokio::select! {
            () = ctx.cancelled() => Err(ProviderError::Cancelled.into()),
            outcome = tokio::time::timeout(self.confirm_timeout, self.confirmer.confirm(module, tool)) => {
                Ok(outcome.unwrap_or_else(|_| {
                    warn!(module = %module, tool = %tool, "confirmation timed out");
                    Confirmation::Unavailable
                }))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use nexus_approval::StaticConfirmation;
    use nexus_config::PolicySection;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::test_support::{ECHO, FAULT, HANG, REPORT_ERROR, StubProvider};

    fn stub() -> Arc<StubProvider> {
        Arc::new(
            StubProvider::new("stub")
                .with_tool(ECHO)
                .with_tool(REPORT_ERROR)
                .with_tool(FAULT)
                .with_tool(HANG),
        )
    }

    fn dispatcher(
        provider: &Arc<StubProvider>,
        section: PolicySection,
        confirmer: impl ConfirmationHandler + 'static,
    ) -> Dispatcher {
        Dispatcher::new(
            vec![Arc::clone(provider) as Arc<dyn Provider>],
            Policy::new(&section, false),
            Arc::new(confirmer),
        )
        .unwrap()
    }

    fn patterns(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    struct NeverAnswers;

    #[async_trait]
    impl ConfirmationHandler for NeverAnswers {
        async fn confirm(&self, _module: &str, _tool: &str) -> Confirmation {
            std::future::pending().await
        }
    }

    // ---- Construction ----

    #[test]
    fn test_duplicate_tool_across_providers() {
        let result = Dispatcher::new(
            vec![
                StubProvider::new("a").with_tool("shared").shared(),
                StubProvider::new("b").with_tool("shared").shared(),
            ],
            Policy::default(),
            Arc::new(StaticConfirmation::approve()),
        );
        match result {
            Err(GatewayError::DuplicateTool { tool, first, second }) => {
                assert_eq!(tool, "shared");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            },
            other => panic!("expected duplicate tool error, got {other:?}"),
        }
    }

    // ---- Advertisement ----

    #[test]
    fn test_denied_tools_not_advertised() {
        let provider = stub();
        let section = PolicySection {
            deny_tools: patterns(&["stub/fault", HANG]),
            confirm_tools: patterns(&[REPORT_ERROR]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, StaticConfirmation::approve());

        let names: Vec<_> = dispatcher
            .advertised_tools()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, [ECHO, REPORT_ERROR]);
    }

    #[test]
    fn test_catalog_keeps_denied_with_status() {
        let provider = stub();
        let section = PolicySection {
            deny_tools: patterns(&[FAULT]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, StaticConfirmation::approve());
        let catalog = dispatcher.catalog();
        assert_eq!(catalog.len(), 4);
        let fault = catalog
            .iter()
            .find(|e| e.descriptor.name == FAULT)
            .unwrap();
        assert_eq!(fault.decision, Decision::Deny);
        assert_eq!(fault.module, "stub");
    }

    // ---- Invocation ----

    #[tokio::test]
    async fn test_allowed_call_forwards_arguments() {
        let provider = stub();
        let dispatcher = dispatcher(&provider, PolicySection::default(), StaticConfirmation::decline());
        let args = json!({"namespace": "default"}).as_object().cloned();

        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, args)
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text_content(), r#"{"namespace":"default"}"#);
    }

    #[tokio::test]
    async fn test_missing_arguments_default_to_empty() {
        let provider = stub();
        let dispatcher = dispatcher(&provider, PolicySection::default(), StaticConfirmation::approve());
        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, None)
            .await
            .unwrap();
        assert_eq!(result.text_content(), "{}");
    }

    #[tokio::test]
    async fn test_denied_call_never_reaches_provider() {
        let provider = stub();
        let section = PolicySection {
            deny_modules: patterns(&["st*"]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, StaticConfirmation::approve());

        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, None)
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.text_content(),
            "tool blocked by policy: stub/echo (module is denied)"
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_declined_confirmation() {
        let provider = stub();
        let section = PolicySection {
            confirm_tools: patterns(&["stub/echo"]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, StaticConfirmation::decline());

        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, None)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text_content().starts_with("tool execution denied by user"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_confirmation_is_refusal() {
        let provider = stub();
        let section = PolicySection {
            confirm_tools: patterns(&[ECHO]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(
            &provider,
            section,
            StaticConfirmation(Confirmation::Unavailable),
        );

        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, None)
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_approved_confirmation_runs_tool() {
        let provider = stub();
        let section = PolicySection {
            confirm_tools: patterns(&[ECHO]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, StaticConfirmation::approve());

        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, None)
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_refusal() {
        let provider = stub();
        let section = PolicySection {
            confirm_tools: patterns(&[ECHO]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, NeverAnswers)
            .with_confirm_timeout(Duration::from_millis(20));

        let result = dispatcher
            .invoke(&CallContext::default(), ECHO, None)
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_confirming() {
        let provider = stub();
        let section = PolicySection {
            confirm_tools: patterns(&[ECHO]),
            ..PolicySection::default()
        };
        let dispatcher = dispatcher(&provider, section, NeverAnswers);
        let token = CancellationToken::new();
        token.cancel();

        let result = dispatcher
            .invoke(&CallContext::new(token), ECHO, None)
            .await;
        assert!(matches!(
            result,
            Err(GatewayError::Provider(ProviderError::Cancelled))
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_error_is_result_not_fault() {
        let provider = stub();
        let dispatcher = dispatcher(&provider, PolicySection::default(), StaticConfirmation::approve());
        let result = dispatcher
            .invoke(&CallContext::default(), REPORT_ERROR, None)
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.text_content(), "namespace not found");
    }

    #[tokio::test]
    async fn test_provider_fault_propagates() {
        let provider = stub();
        let dispatcher = dispatcher(&provider, PolicySection::default(), StaticConfirmation::approve());
        let result = dispatcher
            .invoke(&CallContext::default(), FAULT, None)
            .await;
        assert!(matches!(result, Err(GatewayError::Provider(ProviderError::Internal(_)))));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let provider = stub();
        let dispatcher = dispatcher(&provider, PolicySection::default(), StaticConfirmation::approve());
        let result = dispatcher
            .invoke(&CallContext::default(), "missing", None)
            .await;
        assert!(matches!(result, Err(GatewayError::UnknownTool { ref tool }) if tool == "missing"));
    }

    #[tokio::test]
    async fn test_safe_mode_blocks_mutating_tool() {
        let provider = Arc::new(StubProvider::new("stub").with_tool("delete_things"));
        let dispatcher = Dispatcher::new(
            vec![Arc::clone(&provider) as Arc<dyn Provider>],
            Policy::new(&PolicySection::default(), true),
            Arc::new(StaticConfirmation::approve()),
        )
        .unwrap();

        assert!(dispatcher.advertised_tools().is_empty());
        let result = dispatcher
            .invoke(&CallContext::default(), "delete_things", None)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text_content().starts_with("tool blocked by policy: stub/delete_things"));
        assert_eq!(provider.call_count(), 0);
    }
}
