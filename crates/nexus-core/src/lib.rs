#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Core types for the Nexus tool gateway.
//!
//! Every capability provider (the built-in kubernetes, prometheus, docker
//! and logs providers as well as the manifest-driven plugin provider)
//! implements the [`Provider`] trait defined here. The gateway only ever
//! talks to providers through this contract.
//!
//! # Tool results vs. errors
//!
//! A provider call has two failure channels:
//!
//! - [`ToolResult::error`] for expected domain failures ("namespace not
//!   found", a subprocess exiting nonzero). These reach the remote caller
//!   as a normal result flagged `is_error`.
//! - [`ProviderError`] for faults that indicate a bug or an aborted call.
//!   These surface as transport-level errors.

pub mod args;

mod error;
mod provider;
mod tool;
mod truncate;

pub use error::{ProviderError, ProviderResult};
pub use provider::{CallContext, Provider};
pub use tool::{ArgSchema, ArgType, ToolContent, ToolDescriptor, ToolResult};
pub use truncate::{TRUNCATION_MARKER, truncate_output};

/// Tool argument bag as received from the transport.
pub type Arguments = serde_json::Map<String, serde_json::Value>;
