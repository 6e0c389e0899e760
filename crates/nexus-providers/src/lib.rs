#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Built-in capability providers for the Nexus tool gateway.
//!
//! | Module | Backend | Tools |
//! |--------|---------|-------|
//! | `kubernetes` | `kubectl ... -o json` | namespaces, pods, workload logs and events |
//! | `prometheus` | HTTP query API | instant PromQL queries |
//! | `docker` | `docker` CLI | containers, inspect, logs |
//! | `logs` | local files under `allow_paths` | tail, grep |
//!
//! Every provider captures its module section at `init` and is read-only
//! afterwards, so one instance serves concurrent calls.

mod command;
mod filter;

pub mod docker;
pub mod kubernetes;
pub mod logs;
pub mod prometheus;

use std::sync::Arc;

use nexus_core::Provider;

pub use docker::DockerProvider;
pub use kubernetes::KubernetesProvider;
pub use logs::LogsProvider;
pub use prometheus::PrometheusProvider;

/// One fresh instance of every built-in provider.
#[must_use]
pub fn builtin_providers() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(KubernetesProvider::new()),
        Arc::new(PrometheusProvider::new()),
        Arc::new(DockerProvider::new()),
        Arc::new(LogsProvider::new()),
    ]
}
