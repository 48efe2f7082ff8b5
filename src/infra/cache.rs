//! Cache runtime assembly from loaded settings.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{
    CacheOrchestrator, GraphRegistry, InMemoryStore, Interceptor, RegistryError, StoreConfig,
};
use crate::config::Settings;

/// Registry, store and interceptor sharing one configuration.
#[derive(Clone)]
pub struct CacheRuntime {
    pub registry: Arc<GraphRegistry>,
    pub store: Arc<InMemoryStore>,
    pub interceptor: Interceptor,
}

impl CacheRuntime {
    /// Build the registry from the declared entities and wire it to an
    /// in-memory store.
    pub fn from_settings(settings: &Settings) -> Result<Self, RegistryError> {
        let registry = GraphRegistry::builder()
            .declarations(settings.declarations.iter().cloned())
            .subtypes(settings.hierarchy.iter().cloned())
            .build()?;
        let registry = Arc::new(registry);

        let store = Arc::new(InMemoryStore::new(StoreConfig::from(&settings.store)));
        if !settings.store.create_missing_regions {
            warn_unbacked_types(&registry, &store);
        }

        let orchestrator = CacheOrchestrator::with_template_keys(registry.clone(), store.clone());

        info!(
            domains = registry.domain_count(),
            regions = store.region_names().len(),
            region_capacity = settings.store.region_capacity.get(),
            "Cache runtime ready"
        );

        Ok(Self {
            registry,
            store,
            interceptor: Interceptor::new(Arc::new(orchestrator)),
        })
    }
}

fn warn_unbacked_types(registry: &GraphRegistry, store: &InMemoryStore) {
    let regions = store.region_names();
    for domain in registry.domains() {
        let Some(graph) = registry.graph(domain) else {
            continue;
        };
        for node in graph.nodes() {
            if regions.binary_search(node).is_err() {
                warn!(
                    domain,
                    entity = %node,
                    "Cacheable entity type has no region; reads bypass the cache"
                );
            }
        }
    }
}
