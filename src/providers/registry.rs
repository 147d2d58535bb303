//! Provider adapter registry
//!
//! Lookup table from [`ProviderKind`] to adapter implementation, built once
//! at startup and passed explicitly to each component. There is no global
//! registry instance; tests construct their own with whatever doubles they
//! need.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;

use super::adapter::ProviderAdapter;
use super::{KintoneAdapter, MockAdapter, ProviderError, ProviderKind};

/// Registry of provider adapters keyed by the closed provider enumeration.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Build the registry for the given configuration.
    ///
    /// With `use_mock_oauth` every provider kind resolves to the mock
    /// adapter, so the rest of the system never branches on mock-vs-real.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();

        if config.use_mock_oauth {
            let mock: Arc<dyn ProviderAdapter> = Arc::new(MockAdapter);
            for kind in ProviderKind::all() {
                registry.adapters.insert(*kind, mock.clone());
            }
            return registry;
        }

        registry.register(Arc::new(KintoneAdapter::new()));
        registry.register(Arc::new(MockAdapter));
        registry
    }

    /// Register an adapter under its own kind.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// Resolve the adapter for a provider.
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or(ProviderError::UnknownProvider {
                slug: kind.as_str().to_string(),
            })
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
