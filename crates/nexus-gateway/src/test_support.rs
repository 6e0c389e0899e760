//! In-memory providers for gateway tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nexus_config::Config;
use nexus_core::{
    Arguments, CallContext, Provider, ProviderError, ProviderResult, ToolDescriptor, ToolResult,
};

/// Stub tool that echoes its arguments as JSON.
pub(crate) const ECHO: &str = "echo";
/// Stub tool that returns a structured tool error.
pub(crate) const REPORT_ERROR: &str = "report_error";
/// Stub tool that fails with a provider fault.
pub(crate) const FAULT: &str = "fault";
/// Stub tool that runs until cancelled.
pub(crate) const HANG: &str = "hang";

#[derive(Debug, Clone, Copy)]
enum Enablement {
    Always,
    Never,
    Module(&'static str),
}

#[derive(Debug)]
pub(crate) struct StubProvider {
    name: String,
    tools: Vec<ToolDescriptor>,
    enablement: Enablement,
    fail_init: bool,
    init_count: AtomicUsize,
    call_count: AtomicUsize,
}

impl StubProvider {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            enablement: Enablement::Always,
            fail_init: false,
            init_count: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_tool(mut self, tool: &str) -> Self {
        self.tools
            .push(ToolDescriptor::read_only(tool, format!("stub tool {tool}")));
        self
    }

    pub(crate) fn disabled(mut self) -> Self {
        self.enablement = Enablement::Never;
        self
    }

    /// Enabled only while the named built-in module section is enabled.
    pub(crate) fn enabled_when(mut self, module: &'static str) -> Self {
        self.enablement = Enablement::Module(module);
        self
    }

    pub(crate) fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub(crate) fn shared(self) -> Arc<dyn Provider> {
        Arc::new(self)
    }

    pub(crate) fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    pub(crate) fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self, config: &Config) -> bool {
        match self.enablement {
            Enablement::Always => true,
            Enablement::Never => false,
            Enablement::Module(module) => match module {
                "kubernetes" => config.modules.kubernetes.enabled,
                "prometheus" => config.modules.prometheus.enabled,
                "docker" => config.modules.docker.enabled,
                "logs" => config.modules.logs.enabled,
                "plugins" => config.modules.plugins.enabled,
                _ => false,
            },
        }
    }

    fn init(&self, _config: &Config) -> ProviderResult<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(ProviderError::InitFailed {
                message: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    async fn handle_call(
        &self,
        ctx: &CallContext,
        tool: &str,
        args: &Arguments,
    ) -> ProviderResult<ToolResult> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match tool {
            ECHO => Ok(ToolResult::text(serde_json::to_string(args)?)),
            REPORT_ERROR => Ok(ToolResult::error("namespace not found")),
            FAULT => Err(ProviderError::Internal("stub fault".to_string())),
            HANG => {
                tokio::select! {
                    () = ctx.cancelled() => Err(ProviderError::Cancelled),
                    () = tokio::time::sleep(Duration::from_secs(30)) => {
                        Ok(ToolResult::text("finished"))
                    }
                }
            },
            _ => Err(ProviderError::UnknownTool {
                tool: tool.to_string(),
            }),
        }
    }
}
