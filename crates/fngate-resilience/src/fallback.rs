//! Registry of fallback providers keyed by route.

use std::collections::HashMap;
use std::sync::Arc;

use fngate_kernel::gateway::{FallbackProvider, GatewayError};

/// At most one [`FallbackProvider`] per route, looked up by exact key.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    providers: HashMap<String, Arc<dyn FallbackProvider>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `providers`, failing on the first duplicate route.
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn FallbackProvider>>,
    ) -> Result<Self, GatewayError> {
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn FallbackProvider>) -> Result<(), GatewayError> {
        let route = provider.route().to_string();
        if self.providers.contains_key(&route) {
            return Err(GatewayError::DuplicateFallback(route));
        }
        self.providers.insert(route, provider);
        Ok(())
    }

    pub fn get(&self, route: &str) -> Option<Arc<dyn FallbackProvider>> {
        self.providers.get(route).cloned()
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRegistry")
            .field("routes", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
