//! CLI theme and styling.
//!
//! Stdout carries the protocol while serving, so the banner goes to stderr.

use colored::Colorize;
use nexus_config::Config;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }
}

/// Print the startup banner to stderr.
pub(crate) fn print_banner(config: &Config) {
    eprintln!(
        "{}",
        r"
 _   _
| \ | | _____  ___   _ ___
|  \| |/ _ \ \/ / | | / __|
| |\  |  __/>  <| |_| \__ \
|_| \_|\___/_/\_\\__,_|___/
"
        .cyan()
    );
    eprintln!(
        "{} {}",
        config.server.name.bold(),
        config.server.version.dimmed()
    );
    if config.server.safe_mode {
        eprintln!("{}", Theme::warning("safe mode: mutating tools are blocked"));
    }
    eprintln!();
}
