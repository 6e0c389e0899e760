//! Cancellable CLI subprocess execution shared by the CLI-backed providers.

use std::process::Stdio;

use nexus_core::{CallContext, ProviderError, ProviderResult};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured output of a successful CLI run.
#[derive(Debug, Clone, Default)]
pub(crate) struct CliOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl CliOutput {
    /// Stdout followed by stderr, trimmed.
    pub(crate) fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Warn at init when a module's CLI cannot be found on `PATH`.
///
/// Calls still go ahead and fail individually with a tool error.
pub(crate) fn check_cli(module: &str, program: &str) {
    match which::which(program) {
        Ok(path) => debug!(module, program, path = %path.display(), "resolved CLI"),
        Err(e) => warn!(module, program, error = %e, "CLI not found; tool calls will fail"),
    }
}

/// Run `program args..` bound to the call's cancellation.
///
/// The inner `Err` carries a one-line failure message (exit status or spawn
/// error plus trimmed output) meant for a tool error result. Cancellation
/// kills the child and yields [`ProviderError::Cancelled`].
pub(crate) async fn run_cli(
    ctx: &CallContext,
    program: &str,
    args: &[String],
) -> ProviderResult<Result<CliOutput, String>> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, ?args, "running cli");
    let output = tokio::select! {
        () = ctx.cancelled() => {
            warn!(program, "cli call cancelled, terminating process");
            return Err(ProviderError::Cancelled);
        },
        output = cmd.output() => output,
    };

    let output = match output {
        Ok(output) => output,
        Err(e) => return Ok(Err(format!("{program}: {e}"))),
    };
    let captured = CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if output.status.success() {
        Ok(Ok(captured))
    } else {
        Ok(Err(format!("{}: {}", output.status, captured.combined())))
    }
}
