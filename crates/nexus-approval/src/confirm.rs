//! Interactive confirmation for tools whose policy decision is `Confirm`.
//!
//! Stdin and stdout carry the remote protocol, so the prompt goes through
//! the controlling terminal (`/dev/tty`) instead. When no terminal is
//! available the outcome is [`Confirmation::Unavailable`], which callers
//! must treat as a refusal.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The human approved the call.
    Approved,
    /// The human declined the call.
    Declined,
    /// No one could be asked.
    Unavailable,
}

impl Confirmation {
    /// Whether the call may proceed.
    #[must_use]
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Side channel that asks a human whether a tool call may run.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// Ask whether `module/tool` may run.
    async fn confirm(&self, module: &str, tool: &str) -> Confirmation;
}

/// Fixed answer, for tests and non-interactive deployments.
#[derive(Debug, Clone, Copy)]
pub struct StaticConfirmation(pub Confirmation);

impl StaticConfirmation {
    /// Approve every request.
    #[must_use]
    pub fn approve() -> Self {
        Self(Confirmation::Approved)
    }

    /// Decline every request.
    #[must_use]
    pub fn decline() -> Self {
        Self(Confirmation::Declined)
    }
}

#[async_trait]
impl ConfirmationHandler for StaticConfirmation {
    async fn confirm(&self, _module: &str, _tool: &str) -> Confirmation {
        self.0
    }
}

/// Prompts `Confirm execution of module/tool?` on the controlling terminal.
///
/// The prompt blocks a thread from the blocking pool. Callers bound it
/// with their own timeout and cancellation; an abandoned prompt keeps its
/// thread until the terminal answers or closes.
///
/// Only one prompt owns the terminal at a time, and clones share that
/// exclusion. A prompt abandoned by its caller keeps the terminal until it
/// is answered, so a keystroke always goes to the prompt showing on screen.
#[derive(Debug, Clone, Default)]
pub struct TtyConfirmation {
    tty_path: Option<std::path::PathBuf>,
    prompt_lock: Arc<Mutex<()>>,
}

impl TtyConfirmation {
    /// Prompt on `/dev/tty`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt on a specific terminal device.
    #[must_use]
    pub fn with_tty_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            tty_path: Some(path.into()),
            ..Self::default()
        }
    }

    fn tty_path(&self) -> std::path::PathBuf {
        self.tty_path
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("/dev/tty"))
    }

    /// Run `prompt` on the blocking pool once no other prompt holds the
    /// terminal. The lock travels with the blocking task, not the caller.
    async fn exclusive<F>(&self, module: &str, tool: &str, prompt: F) -> Confirmation
    where
        F: FnOnce() -> Confirmation + Send + 'static,
    {
        let guard = Arc::clone(&self.prompt_lock).lock_owned().await;
        debug!(module, tool, "terminal acquired for confirmation");
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            prompt()
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "confirmation prompt task failed");
                Confirmation::Unavailable
            },
        }
    }
}

#[async_trait]
impl ConfirmationHandler for TtyConfirmation {
    async fn confirm(&self, module: &str, tool: &str) -> Confirmation {
        let prompt = format!("Confirm execution of {module}/{tool}?");
        let path = self.tty_path();
        self.exclusive(module, tool, move || prompt_on_tty(&path, &prompt))
            .await
    }
}

#[cfg(unix)]
fn prompt_on_tty(path: &std::path::Path, prompt: &str) -> Confirmation {
    use dialoguer::Confirm;
    use dialoguer::console::Term;

    let open = || {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
    };
    let (reader, writer) = match (open(), open()) {
        (Ok(r), Ok(w)) => (r, w),
        (Err(e), _) | (_, Err(e)) => {
            warn!(path = %path.display(), error = %e, "confirmation unavailable: no terminal");
            return Confirmation::Unavailable;
        },
    };
    let term = Term::read_write_pair(reader, writer);

    match Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact_on_opt(&term)
    {
        Ok(Some(true)) => Confirmation::Approved,
        Ok(Some(false) | None) => Confirmation::Declined,
        Err(e) => {
            debug!(error = %e, "confirmation prompt failed");
            Confirmation::Unavailable
        },
    }
}

#[cfg(not(unix))]
fn prompt_on_tty(path: &std::path::Path, _prompt: &str) -> Confirmation {
    warn!(path = %path.display(), "confirmation unavailable on this platform");
    Confirmation::Unavailable
}
