//! Subcommand implementations.

pub(crate) mod install;
pub(crate) mod serve;
pub(crate) mod tools;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nexus_approval::{ConfirmationHandler, Policy, TtyConfirmation};
use nexus_config::Config;
use nexus_core::Provider;
use nexus_gateway::{Dispatcher, Registry};
use nexus_plugins::PluginProvider;

/// Every provider this binary ships: the built-ins plus plugins.
fn all_providers() -> Vec<Arc<dyn Provider>> {
    let mut providers = nexus_providers::builtin_providers();
    providers.push(Arc::new(PluginProvider::new()));
    providers
}

/// Composition root: registry, one-time module init and dispatcher.
pub(crate) fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let registry = Registry::with_providers(all_providers())?;
    let active = registry
        .load_modules(config)
        .context("failed to load modules")?;
    let confirmer: Arc<dyn ConfirmationHandler> = Arc::new(TtyConfirmation::new());
    let dispatcher = Dispatcher::new(active, Policy::from_config(config), confirmer)?
        .with_confirm_timeout(Duration::from_secs(config.server.confirm_timeout_secs));
    Ok(dispatcher)
}
