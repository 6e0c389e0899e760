#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Manifest-driven plugins for the Nexus tool gateway.
//!
//! A plugin is a directory under the configured plugins directory holding a
//! [`MANIFEST_NAME`] file and an executable. Each tool the manifest declares
//! becomes `plugin/<plugin>/<tool>`. A call spawns the executable with the
//! manifest's arguments plus [`PLUGIN_MARKER_FLAG`], writes
//! `{"tool": ..., "args": ...}` to its stdin and returns its combined output.
//!
//! - [`discovery`] reads manifests from disk
//! - [`PluginProvider`] turns them into tools and runs them
//! - [`installer`] unpacks plugin bundles into the plugins directory

pub mod discovery;
pub mod installer;
pub mod manifest;

mod error;
mod provider;

pub use discovery::{MANIFEST_NAME, load_manifests};
pub use error::{PluginError, PluginResult};
pub use installer::install;
pub use manifest::{ArgSpec, Capabilities, Metadata, PluginManifest, PluginSpec, ToolSpec};
pub use provider::{MODULE_NAME, PLUGIN_MARKER_FLAG, PluginProvider, qualified_tool_name};
