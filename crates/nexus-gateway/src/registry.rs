//! Provider registry and the one-time module initialization pass.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use nexus_config::Config;
use nexus_core::Provider;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

type InitOutcome = Result<BTreeSet<String>, (String, String)>;

/// Process-wide collection of capability providers, keyed by module name.
///
/// Built once by the composition root. [`Registry::load_modules`] runs
/// every enabled provider's `init` on its first call only; the outcome,
/// including a failure, is remembered for the lifetime of the registry.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<BTreeMap<String, Arc<dyn Provider>>>,
    initialized: OnceLock<InitOutcome>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.module_names())
            .field("initialized", &self.initialized.get().is_some())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a fixed set of providers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateModule`] if two providers share a name.
    pub fn with_providers(
        providers: impl IntoIterator<Item = Arc<dyn Provider>>,
    ) -> GatewayResult<Self> {
        let registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    /// Add a provider under its module name.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateModule`] if the name is taken.
    pub fn register(&self, provider: Arc<dyn Provider>) -> GatewayResult<()> {
        let name = provider.name().to_string();
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if providers.contains_key(&name) {
            return Err(GatewayError::DuplicateModule { name });
        }
        if self.initialized.get().is_some() {
            warn!(module = %name, "module registered after initialization; it will stay inactive");
        }
        debug!(module = %name, "registered module");
        providers.insert(name, provider);
        Ok(())
    }

    /// Registered module names, sorted.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Initialize enabled providers (first call only) and return the active set.
    ///
    /// A provider is active when it is enabled under `config` and its `init`
    /// has run. Providers enabled only after the first call are skipped with
    /// a warning, since they never ran `init`. The result is sorted by
    /// module name.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ModuleInit`] if any provider failed `init`.
    /// The failure is sticky: later calls return the same error.
    pub fn load_modules(&self, config: &Config) -> GatewayResult<Vec<Arc<dyn Provider>>> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let initialized = self
            .initialized
            .get_or_init(|| init_enabled(&providers, config))
            .as_ref()
            .map_err(|(name, message)| GatewayError::ModuleInit {
                name: name.clone(),
                message: message.clone(),
            })?;

        let mut active = Vec::new();
        for (name, provider) in providers.iter() {
            if !provider.enabled(config) {
                continue;
            }
            if !initialized.contains(name) {
                warn!(module = %name, "module enabled after startup; restart to activate it");
                continue;
            }
            active.push(Arc::clone(provider));
        }
        Ok(active)
    }
}

fn init_enabled(providers: &BTreeMap<String, Arc<dyn Provider>>, config: &Config) -> InitOutcome {
    let mut initialized = BTreeSet::new();
    for (name, provider) in providers {
        if !provider.enabled(config) {
            debug!(module = %name, "module disabled");
            continue;
        }
        provider
            .init(config)
            .map_err(|e| (name.clone(), e.to_string()))?;
        info!(module = %name, "module initialized");
        initialized.insert(name.clone());
    }
    Ok(initialized)
}
