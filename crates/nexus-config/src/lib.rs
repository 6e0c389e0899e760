#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Configuration for the Nexus tool gateway.
//!
//! A single YAML file (by default `nexus.yaml`) with three sections:
//!
//! - `server`: identity, log level and safe mode
//! - `policy`: allow/deny/confirm glob patterns
//! - `modules`: per-provider enable flags and settings
//!
//! Every section implements [`Default`], so a partial file only overrides
//! what it names. Empty strings and non-positive limits are replaced by
//! their defaults after parsing.
//!
//! # Usage
//!
//! ```rust,no_run
//! use nexus_config::Config;
//!
//! let config = Config::load_file(std::path::Path::new("nexus.yaml")).unwrap();
//! println!("safe mode: {}", config.server.safe_mode);
//! ```

/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing, unreadable,
    /// malformed or fails validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Load a configuration file, falling back to defaults on failure.
    ///
    /// The error, if any, is returned alongside the defaults so the caller
    /// can report it and keep running.
    #[must_use]
    pub fn load_or_default(path: &std::path::Path) -> (Self, Option<ConfigError>) {
        loader::load_or_default(path)
    }
}

/// Expand a leading `~/` to the current user's home directory.
///
/// Paths without the prefix, and paths where no home directory can be
/// determined, are returned unchanged.
#[must_use]
pub fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(dirs) = directories::BaseDirs::new()
    {
        return dirs.home_dir().join(rest);
    }
    std::path::PathBuf::from(path)
}
