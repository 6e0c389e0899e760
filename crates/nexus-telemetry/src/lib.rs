//! Nexus Telemetry - Logging for the Nexus tool gateway.
//!
//! Stdout carries the tool protocol, so every log line goes to stderr.
//!
//! # Example
//!
//! ```rust,no_run
//! use nexus_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), nexus_telemetry::TelemetryError> {
//! let config = LogConfig::from_level_name("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("nexus_plugins=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, normalize_level, setup_logging};
