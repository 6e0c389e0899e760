//! Container inspection through the `docker` CLI.

use std::sync::OnceLock;

use async_trait::async_trait;
use nexus_config::Config;
use nexus_core::args::{clamp, get_bool, get_int, get_string};
use nexus_core::{
    ArgSchema, ArgType, Arguments, CallContext, Provider, ProviderError, ProviderResult,
    ToolDescriptor, ToolResult,
};
use tracing::info;

use crate::command::{check_cli, run_cli};

/// Module name.
pub const MODULE_NAME: &str = "docker";

const LIST_CONTAINERS: &str = "docker_list_containers";
const INSPECT_CONTAINER: &str = "docker_inspect_container";
const CONTAINER_LOGS: &str = "docker_get_logs";

const PS_FORMAT: &str = "{{.ID}} {{.Image}} {{.Status}} {{.Names}}";

#[derive(Debug)]
struct DockerSettings {
    cli: String,
    max_lines: i64,
}

/// Lists, inspects and reads logs of local containers.
#[derive(Debug, Default)]
pub struct DockerProvider {
    settings: OnceLock<DockerSettings>,
}

impl DockerProvider {
    /// Create an uninitialized provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> ProviderResult<&DockerSettings> {
        self.settings.get().ok_or_else(|| ProviderError::NotInitialized {
            module: MODULE_NAME.to_string(),
        })
    }

    async fn docker(
        &self,
        ctx: &CallContext,
        command: &str,
        args: Vec<String>,
    ) -> ProviderResult<Result<String, ToolResult>> {
        let settings = self.settings()?;
        Ok(run_cli(ctx, &settings.cli, &args)
            .await?
            .map(|out| out.combined())
            .map_err(|e| ToolResult::error(format!("docker {command} failed: {e}"))))
    }

    async fn list(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let mut argv = vec!["ps".to_string(), "--format".to_string(), PS_FORMAT.to_string()];
        if get_bool(args, "all", false) {
            argv.push("-a".to_string());
        }
        Ok(match self.docker(ctx, "ps", argv).await? {
            Ok(out) if out.is_empty() => ToolResult::text("(no containers found)"),
            Ok(out) => ToolResult::text(out),
            Err(result) => result,
        })
    }

    async fn inspect(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let Some(id) = get_string(args, "id") else {
            return Ok(ToolResult::error("id is required"));
        };
        Ok(
            match self.docker(ctx, "inspect", vec!["inspect".to_string(), id]).await? {
                Ok(out) => ToolResult::text(out),
                Err(result) => result,
            },
        )
    }

    async fn logs(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let Some(id) = get_string(args, "id") else {
            return Ok(ToolResult::error("id is required"));
        };
        let settings = self.settings()?;
        let argv = logs_argv(
            &id,
            clamp(get_int(args, "tail_lines", 200), 1, settings.max_lines),
            get_int(args, "since_seconds", 0),
            get_bool(args, "timestamps", false),
        );
        Ok(match self.docker(ctx, "logs", argv).await? {
            Ok(out) if out.is_empty() => ToolResult::text("(no log lines)"),
            Ok(out) => ToolResult::text(out),
            Err(result) => result,
        })
    }
}

fn logs_argv(id: &str, tail_lines: i64, since_seconds: i64, timestamps: bool) -> Vec<String> {
    let mut argv = vec![
        "logs".to_string(),
        "--tail".to_string(),
        tail_lines.to_string(),
    ];
    if since_seconds > 0 {
        argv.push("--since".to_string());
        argv.push(format!("{since_seconds}s"));
    }
    if timestamps {
        argv.push("--timestamps".to_string());
    }
    argv.push(id.to_string());
    argv
}

#[async_trait]
impl Provider for DockerProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.modules.docker.enabled
    }

    fn init(&self, config: &Config) -> ProviderResult<()> {
        let section = &config.modules.docker;
        check_cli(MODULE_NAME, &section.cli);
        info!(cli = %section.cli, "docker module initialized");
        self.settings
            .set(DockerSettings {
                cli: section.cli.clone(),
                max_lines: section.max_lines,
            })
            .map_err(|_| ProviderError::InitFailed {
                message: "docker module initialized twice".to_string(),
            })
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        if self.settings.get().is_none() {
            return Vec::new();
        }
        vec![
            ToolDescriptor::read_only(LIST_CONTAINERS, "List running Docker containers.").with_arg(
                ArgSchema::optional("all", ArgType::Boolean, "Include stopped containers."),
            ),
            ToolDescriptor::read_only(INSPECT_CONTAINER, "Inspect a Docker container.").with_arg(
                ArgSchema::required("id", ArgType::String, "Container ID or name."),
            ),
            ToolDescriptor::read_only(CONTAINER_LOGS, "Fetch Docker container logs.")
                .with_arg(ArgSchema::required("id", ArgType::String, "Container ID or name."))
                .with_arg(ArgSchema::optional(
                    "tail_lines",
                    ArgType::Number,
                    "Max log lines to return (default 200).",
                ))
                .with_arg(ArgSchema::optional(
                    "since_seconds",
                    ArgType::Number,
                    "Only return logs newer than this many seconds.",
                ))
                .with_arg(ArgSchema::optional(
                    "timestamps",
                    ArgType::Boolean,
                    "Include timestamps in log output.",
                )),
        ]
    }

    async fn handle_call(
        &self,
        ctx: &CallContext,
        tool: &str,
        args: &Arguments,
    ) -> ProviderResult<ToolResult> {
        match tool {
            LIST_CONTAINERS => self.list(ctx, args).await,
            INSPECT_CONTAINER => self.inspect(ctx, args).await,
            CONTAINER_LOGS => self.logs(ctx, args).await,
            _ => Err(ProviderError::UnknownTool {
                tool: tool.to_string(),
            }),
        }
    }
}
