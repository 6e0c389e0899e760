#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Registry, dispatcher and transport of the Nexus tool gateway.
//!
//! Startup runs in this order:
//!
//! 1. The composition root builds a [`Registry`] from every provider instance.
//! 2. [`Registry::load_modules`] initializes the enabled providers once and
//!    returns the active set.
//! 3. A [`Dispatcher`] indexes the active tools and gates every call through
//!    the policy and, for `confirm` tools, a human.
//! 4. [`Server`] speaks line-framed JSON-RPC on stdio.

pub mod dispatcher;
pub mod inventory;
pub mod registry;
pub mod server;

mod error;
#[cfg(test)]
mod test_support;

pub use dispatcher::{Dispatcher, ToolEntry};
pub use error::{GatewayError, GatewayResult};
pub use inventory::{InventoryEntry, TRANSPORT, ToolInventory};
pub use registry::Registry;
pub use server::{PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS, Server};
