use std::sync::Arc;

use indexmap::IndexMap;

use crate::adapters::builtin_adapters;
use crate::catalog;
use crate::core::error::RoutingError;
use crate::core::traits::MediaAdapter;
use crate::core::types::ModelCatalog;

/// Model id to adapter lookup, kept in registration order.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: IndexMap<String, Arc<dyn MediaAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        for adapter in builtin_adapters() {
            registry.register(adapter);
        }
        registry
    }

    /// Registers `adapter` under its model id, replacing any adapter already
    /// registered for that id in place.
    pub fn register(&mut self, adapter: Arc<dyn MediaAdapter>) {
        let model_id = normalize_model_id(adapter.model_id()).to_string();
        self.adapters.insert(model_id, adapter);
    }

    pub fn resolve(&self, model_id: &str) -> Result<Arc<dyn MediaAdapter>, RoutingError> {
        self.adapters
            .get(normalize_model_id(model_id))
            .map(Arc::clone)
            .ok_or_else(|| RoutingError::ModelNotRegistered {
                model: model_id.to_string(),
            })
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.adapters.contains_key(normalize_model_id(model_id))
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn catalog(&self) -> ModelCatalog {
        catalog::catalog_from_adapters(self.adapters.values())
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("models", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize_model_id(model_id: &str) -> &str {
    model_id.trim().trim_start_matches('/')
}
