#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Tool policy and human confirmation for the Nexus tool gateway.
//!
//! - [`Policy`] maps a `(module, tool)` pair to a [`Decision`]. It is a
//!   pure function of its configuration and is evaluated again on every
//!   advertisement and every call.
//! - [`ConfirmationHandler`] is the side channel used when a decision is
//!   [`Decision::Confirm`]. The terminal implementation prompts on the
//!   controlling tty; tests inject [`StaticConfirmation`].

pub mod confirm;
pub mod policy;

pub use confirm::{Confirmation, ConfirmationHandler, StaticConfirmation, TtyConfirmation};
pub use policy::{Decision, DenyReason, Evaluation, MUTATING_KEYWORDS, Policy};
