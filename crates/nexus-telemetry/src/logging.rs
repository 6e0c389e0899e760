//! Logging configuration and setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{TelemetryError, TelemetryResult};

fn init_err<E: std::fmt::Display>(e: E) -> TelemetryError {
    TelemetryError::InitError(e.to_string())
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug").
    pub level: String,
    /// Log format.
    pub format: LogFormat,
    /// Whether to use ANSI colors.
    pub ansi: bool,
    /// Directive overrides (e.g., `nexus_gateway=debug`).
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            ansi: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create a log config from a user-facing level name.
    ///
    /// See [`normalize_level`] for accepted spellings.
    #[must_use]
    pub fn from_level_name(name: &str) -> Self {
        Self {
            level: normalize_level(name).to_string(),
            ..Default::default()
        }
    }

    /// Set the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a directive override.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Disable ANSI colors.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;

        for directive in &self.directives {
            filter = filter.add_directive(directive.parse().map_err(
                |e: tracing_subscriber::filter::ParseError| {
                    TelemetryError::ConfigError(e.to_string())
                },
            )?);
        }

        Ok(filter)
    }
}

/// Map a configured level name onto a tracing level.
///
/// `debug`, `trace`, `warn`/`warning` and `error` are recognized
/// case-insensitively; everything else is `info`.
#[must_use]
pub fn normalize_level(name: &str) -> &'static str {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if a directive is invalid or a subscriber is already set.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(init_err),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(config.ansi)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(init_err),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_ansi(config.ansi)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(init_err),
    }
}
