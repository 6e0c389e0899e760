//! The plugin provider: manifest tools backed by child processes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use nexus_config::{Config, expand_home};
use nexus_core::{
    Arguments, CallContext, Provider, ProviderError, ProviderResult, ToolDescriptor, ToolResult,
    truncate_output,
};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::discovery::{DiscoveredPlugin, load_manifests};
use crate::error::{PluginError, PluginResult};
use crate::manifest::{PluginManifest, ToolSpec};

/// Module name used in policy matching.
pub const MODULE_NAME: &str = "plugins";

/// Flag appended to every plugin invocation.
pub const PLUGIN_MARKER_FLAG: &str = "--nexus-plugin";

/// Qualified name of a plugin tool.
#[must_use]
pub fn qualified_tool_name(plugin: &str, tool: &str) -> String {
    format!("plugin/{plugin}/{tool}")
}

/// One entry of the tool table.
#[derive(Debug)]
struct PluginTool {
    plugin_dir: PathBuf,
    manifest: Arc<PluginManifest>,
    spec: ToolSpec,
}

/// Settings and tool table captured by `init`.
#[derive(Debug)]
struct PluginState {
    safe_mode: bool,
    max_bytes: usize,
    env: Vec<(String, String)>,
    tools: BTreeMap<String, PluginTool>,
}

/// Exposes manifest-declared tools and runs them as child processes.
#[derive(Debug, Default)]
pub struct PluginProvider {
    state: OnceLock<PluginState>,
}

impl PluginProvider {
    /// Create an uninitialized provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> ProviderResult<&PluginState> {
        self.state.get().ok_or_else(|| ProviderError::NotInitialized {
            module: MODULE_NAME.to_string(),
        })
    }
}

/// Build the qualified tool table, rejecting collisions.
fn build_tool_table(plugins: Vec<DiscoveredPlugin>) -> PluginResult<BTreeMap<String, PluginTool>> {
    let mut tools = BTreeMap::new();
    for plugin in plugins {
        let manifest = Arc::new(plugin.manifest);
        for spec in &manifest.spec.capabilities.tools {
            let name = qualified_tool_name(&manifest.metadata.name, &spec.name);
            if tools.contains_key(&name) {
                return Err(PluginError::DuplicateTool { name });
            }
            tools.insert(
                name,
                PluginTool {
                    plugin_dir: plugin.dir.clone(),
                    manifest: Arc::clone(&manifest),
                    spec: spec.clone(),
                },
            );
        }
    }
    Ok(tools)
}

/// Resolve configured `KEY=VALUE` / bare `KEY` entries.
fn resolve_env(entries: &[String]) -> Vec<(String, String)> {
    entries
        .iter()
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Some((key.to_string(), value.to_string())),
            Some(_) => None,
            None => std::env::var(entry)
                .ok()
                .map(|value| (entry.clone(), value)),
        })
        .collect()
}

#[async_trait]
impl Provider for PluginProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.modules.plugins.enabled
    }

    fn init(&self, config: &Config) -> ProviderResult<()> {
        let section = &config.modules.plugins;
        let dir = expand_home(&section.dir);

        let plugins = match load_manifests(&dir) {
            Ok(plugins) => plugins,
            Err(PluginError::Io(e)) => {
                warn!(dir = %dir.display(), error = %e, "plugins directory unreadable, no plugins loaded");
                Vec::new()
            },
            Err(e) => return Err(e.into()),
        };
        let plugin_count = plugins.len();
        let tools = build_tool_table(plugins)?;

        let state = PluginState {
            safe_mode: config.server.safe_mode,
            max_bytes: usize::try_from(section.max_bytes).unwrap_or(0),
            env: resolve_env(&section.env),
            tools,
        };
        info!(
            plugins = plugin_count,
            tools = state.tools.len(),
            "loaded plugin manifests"
        );

        self.state.set(state).map_err(|_| ProviderError::InitFailed {
            message: "plugins module initialized twice".to_string(),
        })
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.state.get().map_or_else(Vec::new, |state| {
            state
                .tools
                .iter()
                .map(|(name, tool)| tool.spec.to_descriptor(name.clone()))
                .collect()
        })
    }

    async fn handle_call(
        &self,
        ctx: &CallContext,
        tool: &str,
        args: &Arguments,
    ) -> ProviderResult<ToolResult> {
        let state = self.state()?;
        let Some(entry) = state.tools.get(tool) else {
            return Err(ProviderError::UnknownTool {
                tool: tool.to_string(),
            });
        };

        if state.safe_mode && !entry.spec.read_only {
            return Ok(ToolResult::error(format!(
                "tool blocked in safe mode: {tool} is not read-only"
            )));
        }

        let manifest = &entry.manifest;
        if manifest.spec.command.trim().is_empty() {
            return Ok(ToolResult::error("plugin command not configured"));
        }
        let command = {
            let path = Path::new(&manifest.spec.command);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                entry.plugin_dir.join(path)
            }
        };

        let payload = serde_json::to_vec(&json!({
            "tool": entry.spec.name,
            "args": args,
        }))?;

        let mut cmd = Command::new(&command);
        cmd.args(&manifest.spec.args)
            .arg(PLUGIN_MARKER_FLAG)
            .env_clear()
            .envs(state.env.iter().map(|(k, v)| (k, v)))
            .envs(&manifest.spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool, command = %command.display(), "spawning plugin");
        let outcome = tokio::select! {
            () = ctx.cancelled() => {
                warn!(tool, "plugin call cancelled, terminating process");
                return Err(ProviderError::Cancelled);
            },
            outcome = run_plugin(cmd, payload, state.max_bytes) => outcome,
        };

        match outcome {
            Ok(PluginOutput { status, output }) if status.success() => {
                Ok(ToolResult::text(truncate_output(&output, state.max_bytes)))
            },
            Ok(PluginOutput { status, output }) => Ok(ToolResult::error(format!(
                "plugin error: {status}: {}",
                truncate_output(&output, state.max_bytes).trim()
            ))),
            Err(e) => Ok(ToolResult::error(format!("plugin error: {e}"))),
        }
    }
}

/// Exit status and combined stdout/stderr of a plugin run.
struct PluginOutput {
    status: ExitStatus,
    output: String,
}

/// Spawn the plugin, feed it `payload` and collect combined output.
///
/// At most `max_bytes + 1` bytes are kept (unbounded when `max_bytes` is
/// zero); the pipes are drained to EOF regardless so the child never
/// blocks on a full pipe.
async fn run_plugin(
    mut cmd: Command,
    payload: Vec<u8>,
    max_bytes: usize,
) -> std::io::Result<PluginOutput> {
    let mut child = cmd.spawn()?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let write = async move {
        if let Some(mut stdin) = stdin {
            // A plugin that exits without reading its input is not an error.
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        }
    };
    let limit = if max_bytes == 0 {
        usize::MAX
    } else {
        max_bytes.saturating_add(1)
    };
    let ((), combined) = tokio::join!(write, collect_combined(stdout, stderr, limit));
    let status = child.wait().await?;

    Ok(PluginOutput {
        status,
        output: String::from_utf8_lossy(&combined?).into_owned(),
    })
}

/// Interleave two output streams into one buffer in arrival order.
async fn collect_combined<A, B>(
    stdout: Option<A>,
    stderr: Option<B>,
    limit: usize,
) -> std::io::Result<Vec<u8>>
where
    A: AsyncRead + Unpin,
    B: AsyncRead + Unpin,
{
    let mut combined = Vec::new();
    let mut out = stdout;
    let mut err = stderr;
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];

    while out.is_some() || err.is_some() {
        let (n, from_stdout) = tokio::select! {
            read = async { out.as_mut()?.read(&mut out_buf).await.ok() }, if out.is_some() => {
                (read.unwrap_or(0), true)
            },
            read = async { err.as_mut()?.read(&mut err_buf).await.ok() }, if err.is_some() => {
                (read.unwrap_or(0), false)
            },
        };

        if n == 0 {
            if from_stdout {
                out = None;
            } else {
                err = None;
            }
            continue;
        }

        let chunk = if from_stdout { &out_buf[..n] } else { &err_buf[..n] };
        let room = limit.saturating_sub(combined.len());
        combined.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(combined)
}
