//! Local log file access, restricted to configured directory roots.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use nexus_config::Config;
use nexus_core::args::{clamp_count, get_bool, get_int, get_string};
use nexus_core::{
    ArgSchema, ArgType, Arguments, CallContext, Provider, ProviderError, ProviderResult,
    ToolDescriptor, ToolResult,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::filter::LineFilter;

/// Module name.
pub const MODULE_NAME: &str = "logs";

const TAIL_TOOL: &str = "logs_tail";
const GREP_TOOL: &str = "logs_grep";

/// Lines scanned per requested grep match.
const GREP_SCAN_FACTOR: usize = 10;

const NO_MATCHES: &str = "(no matching log lines)";

#[derive(Debug)]
struct LogsSettings {
    allow_paths: Vec<String>,
    max_bytes: u64,
    max_lines: i64,
}

/// Tails and searches log files under `allow_paths`.
#[derive(Debug, Default)]
pub struct LogsProvider {
    settings: OnceLock<LogsSettings>,
}

impl LogsProvider {
    /// Create an uninitialized provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> ProviderResult<&LogsSettings> {
        self.settings.get().ok_or_else(|| ProviderError::NotInitialized {
            module: MODULE_NAME.to_string(),
        })
    }

    async fn tail(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let settings = self.settings()?;
        let Some(path) = get_string(args, "path") else {
            return Ok(ToolResult::error("path is required"));
        };
        let path = match validate_path(&settings.allow_paths, &path).await {
            Ok(path) => path,
            Err(message) => return Ok(ToolResult::error(message)),
        };

        let tail_lines = clamp_count(get_int(args, "tail_lines", 200), 1, settings.max_lines);
        let filter = LineFilter::new()
            .containing(&get_string(args, "contains").unwrap_or_default(), false)
            .error_only(get_bool(args, "error_only", true))
            .limit(tail_lines);

        let content = match read_cancellable(ctx, &path, tail_lines, settings.max_bytes).await? {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::error(format!("failed to read logs: {e}"))),
        };
        Ok(non_empty(filter.apply(&content)))
    }

    async fn grep(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let settings = self.settings()?;
        let Some(path) = get_string(args, "path") else {
            return Ok(ToolResult::error("path is required"));
        };
        let Some(query) = get_string(args, "query") else {
            return Ok(ToolResult::error("query is required"));
        };
        let path = match validate_path(&settings.allow_paths, &path).await {
            Ok(path) => path,
            Err(message) => return Ok(ToolResult::error(message)),
        };

        let max_lines = clamp_count(get_int(args, "max_lines", 200), 1, settings.max_lines);
        let filter = LineFilter::new()
            .containing(&query, get_bool(args, "case_sensitive", false))
            .limit(max_lines);

        let scan = max_lines.saturating_mul(GREP_SCAN_FACTOR);
        let content = match read_cancellable(ctx, &path, scan, settings.max_bytes).await? {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::error(format!("failed to read logs: {e}"))),
        };
        Ok(non_empty(filter.apply(&content)))
    }
}

fn non_empty(content: String) -> ToolResult {
    if content.is_empty() {
        ToolResult::text(NO_MATCHES)
    } else {
        ToolResult::text(content)
    }
}

/// Resolve `input` and check it lies under one of the allowed roots.
///
/// Both sides are canonicalized, so symlinks pointing outside a root are
/// rejected. Roots that do not exist are skipped.
async fn validate_path(allow_paths: &[String], input: &str) -> Result<PathBuf, String> {
    if allow_paths.is_empty() {
        return Err("log access denied: allow_paths is empty".to_string());
    }
    let resolved = tokio::fs::canonicalize(input)
        .await
        .map_err(|e| format!("invalid path: {e}"))?;

    for root in allow_paths {
        let Ok(root) = tokio::fs::canonicalize(root).await else {
            debug!(root = %root, "skipping unresolvable allow path");
            continue;
        };
        if resolved.starts_with(&root) {
            return Ok(resolved);
        }
    }
    Err(format!("log path not allowed: {}", resolved.display()))
}

async fn read_cancellable(
    ctx: &CallContext,
    path: &Path,
    tail_lines: usize,
    max_bytes: u64,
) -> ProviderResult<std::io::Result<String>> {
    tokio::select! {
        () = ctx.cancelled() => Err(ProviderError::Cancelled),
        content = read_tail(path, tail_lines, max_bytes) => Ok(content),
    }
}

/// Last `tail_lines` lines within the last `max_bytes` bytes of a file.
///
/// When the read starts mid-file the leading partial line is dropped.
async fn read_tail(path: &Path, tail_lines: usize, max_bytes: u64) -> std::io::Result<String> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_dir() {
        return Err(std::io::Error::other("path is a directory"));
    }

    let start = metadata.len().saturating_sub(max_bytes);
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).await?;

    let text = String::from_utf8_lossy(&data);
    let mut lines: Vec<&str> = text.lines().collect();
    if start > 0 && !lines.is_empty() {
        lines.remove(0);
    }
    let skip = lines.len().saturating_sub(tail_lines);
    Ok(lines[skip..].join("\n"))
}

#[async_trait]
impl Provider for LogsProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.modules.logs.enabled
    }

    fn init(&self, config: &Config) -> ProviderResult<()> {
        let section = &config.modules.logs;
        info!(roots = section.allow_paths.len(), "logs module initialized");
        self.settings
            .set(LogsSettings {
                allow_paths: section.allow_paths.clone(),
                max_bytes: u64::try_from(section.max_bytes).unwrap_or(0),
                max_lines: section.max_lines,
            })
            .map_err(|_| ProviderError::InitFailed {
                message: "logs module initialized twice".to_string(),
            })
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        if self.settings.get().is_none() {
            return Vec::new();
        }
        vec![
            ToolDescriptor::read_only(
                TAIL_TOOL,
                "Tail logs from a local file path (allowlisted paths only).",
            )
            .with_arg(ArgSchema::required("path", ArgType::String, "Log file path."))
            .with_arg(ArgSchema::optional(
                "tail_lines",
                ArgType::Number,
                "Number of lines to return (default 200).",
            ))
            .with_arg(ArgSchema::optional(
                "contains",
                ArgType::String,
                "Filter lines containing this substring (case-insensitive).",
            ))
            .with_arg(ArgSchema::optional(
                "error_only",
                ArgType::Boolean,
                "Only include common error patterns (default true).",
            )),
            ToolDescriptor::read_only(
                GREP_TOOL,
                "Search logs from a local file path (allowlisted paths only).",
            )
            .with_arg(ArgSchema::required("path", ArgType::String, "Log file path."))
            .with_arg(ArgSchema::required("query", ArgType::String, "Search substring."))
            .with_arg(ArgSchema::optional(
                "max_lines",
                ArgType::Number,
                "Max matching lines to return (default 200).",
            ))
            .with_arg(ArgSchema::optional(
                "case_sensitive",
                ArgType::Boolean,
                "Case-sensitive search (default false).",
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
            TAIL_TOOL => self.tail(ctx, args).await,
            GREP_TOOL => self.grep(ctx, args).await,
            _ => Err(ProviderError::UnknownTool {
                tool: tool.to_string(),
            }),
        }
    }
}
