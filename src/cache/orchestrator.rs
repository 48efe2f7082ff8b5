//! Read-through and eviction decisions.
//!
//! The orchestrator holds no mutable state of its own: it consults the
//! [`GraphRegistry`] and the [`KeyGenerator`] and talks to the
//! [`CacheStore`]. Every cache-side problem other than a failing key
//! expression degrades to "run the call uncached" or "evict nothing".

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::types::{EntityType, Value};

use super::keys::{CacheKey, KeyError, KeyGenerator, TemplateKeyGenerator};
use super::operation::{CallContext, EvictConfig, ReadConfig};
use super::registry::GraphRegistry;
use super::store::CacheStore;

/// Result of a read-through call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub value: Value,
    /// False when the value came from the cache and the delegate never ran.
    pub proceeded: bool,
}

/// What an eviction actually touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictOutcome {
    /// No cacheable type or no region; nothing evicted.
    Skipped,
    /// A single named key was evicted and the eviction was atomic.
    KeyEvicted { region: EntityType, key: CacheKey },
    /// The resolved region alone was cleared.
    RegionCleared { region: EntityType },
    /// Every resolvable region of the dependency closure was cleared.
    Cascaded {
        regions: Vec<EntityType>,
        evicted_key: Option<CacheKey>,
    },
}

#[derive(Debug, Error)]
pub enum InvocationError<E> {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("wrapped call failed: {0}")]
    Call(E),
}

impl<E> InvocationError<E> {
    /// The delegate's own error, if that is what failed.
    pub fn into_call_error(self) -> Option<E> {
        match self {
            Self::Call(error) => Some(error),
            Self::Key(_) => None,
        }
    }
}

pub struct CacheOrchestrator {
    registry: Arc<GraphRegistry>,
    keys: Arc<dyn KeyGenerator>,
    store: Arc<dyn CacheStore>,
}

impl CacheOrchestrator {
    pub fn new(
        registry: Arc<GraphRegistry>,
        keys: Arc<dyn KeyGenerator>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            registry,
            keys,
            store,
        }
    }

    /// Orchestrator using [`TemplateKeyGenerator`] for key expressions.
    pub fn with_template_keys(registry: Arc<GraphRegistry>, store: Arc<dyn CacheStore>) -> Self {
        Self::new(registry, Arc::new(TemplateKeyGenerator), store)
    }

    /// Serve `call` from its entity region, running `proceed` on a miss.
    ///
    /// The delegate runs at most once. Its error is returned as
    /// [`InvocationError::Call`] and nothing is cached.
    #[instrument(skip_all, fields(call = %call.name, domain = %config.domain))]
    pub fn handle_read<F, E>(
        &self,
        call: &CallContext,
        config: &ReadConfig,
        proceed: F,
    ) -> Result<ReadOutcome, InvocationError<E>>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        let Some(entity_type) = call.returns.entity_type() else {
            debug!(outcome = "bypass", reason = "unresolved_type", "Result type unknown");
            return run_uncached(proceed);
        };

        if !self.registry.is_cacheable(entity_type, &config.domain) {
            debug!(
                outcome = "bypass",
                reason = "not_cacheable",
                entity = %entity_type,
                "Entity type not cacheable in domain"
            );
            return run_uncached(proceed);
        }

        let Some(key) = self.keys.generate_key(&config.key, call)? else {
            debug!(outcome = "bypass", reason = "no_key", "No cache key for call");
            return run_uncached(proceed);
        };

        let Some(region) = self.store.region(entity_type) else {
            debug!(
                outcome = "bypass",
                reason = "no_region",
                region = %entity_type,
                "No cache region configured"
            );
            return run_uncached(proceed);
        };

        if let Some(cached) = region.get(&key) {
            debug!(outcome = "hit", region = %entity_type, key = %key, "Cache hit");
            return Ok(ReadOutcome {
                value: cached,
                proceeded: false,
            });
        }

        debug!(outcome = "miss", region = %entity_type, key = %key, "Cache miss");
        let value = proceed().map_err(InvocationError::Call)?;

        if self.should_store(&value, entity_type, &config.domain) {
            region.put(key.clone(), value.clone());
            debug!(region = %entity_type, key = %key, "Cached result");
        } else {
            debug!(region = %entity_type, key = %key, "Result not cacheable; returned uncached");
        }

        Ok(ReadOutcome {
            value,
            proceeded: true,
        })
    }

    /// Evict after a successful write whose result is `result`.
    ///
    /// Only a failing key expression is reported as an error.
    #[instrument(skip_all, fields(call = %call.name, domain = %config.domain, atomic = config.atomic))]
    pub fn handle_evict(
        &self,
        call: &CallContext,
        config: &EvictConfig,
        result: &Value,
    ) -> Result<EvictOutcome, KeyError> {
        let Some(entity_type) = self.resolve_evict_type(call, config, result) else {
            debug!(outcome = "skipped", reason = "no_cacheable_type", "Nothing to evict");
            return Ok(EvictOutcome::Skipped);
        };

        let Some(region) = self.store.region(&entity_type) else {
            debug!(
                outcome = "skipped",
                reason = "no_region",
                region = %entity_type,
                "No cache region configured"
            );
            return Ok(EvictOutcome::Skipped);
        };

        let mut evicted_key = None;
        if !config.key.trim().is_empty()
            && let Some(key) = self.keys.generate_key(&config.key, call)?
        {
            region.evict(&key);
            debug!(region = %entity_type, key = %key, "Evicted named key");
            if config.atomic {
                return Ok(EvictOutcome::KeyEvicted {
                    region: entity_type,
                    key,
                });
            }
            evicted_key = Some(key);
        }

        if config.atomic {
            region.clear();
            debug!(region = %entity_type, "Atomically cleared region");
            return Ok(EvictOutcome::RegionCleared {
                region: entity_type,
            });
        }

        let affected = self.registry.affected_types(&entity_type, &config.domain);
        let mut cleared = Vec::with_capacity(affected.len());
        for dependant in affected.iter() {
            match self.store.region(dependant) {
                Some(region) => {
                    region.clear();
                    debug!(region = %dependant, "Cleared region through dependency graph");
                    cleared.push(dependant.clone());
                }
                None => debug!(region = %dependant, "No cache region for dependant; skipped"),
            }
        }

        Ok(EvictOutcome::Cascaded {
            regions: cleared,
            evicted_key,
        })
    }

    /// Explicit type, then the result's runtime type, then the first
    /// argument with a cacheable runtime type.
    fn resolve_evict_type(
        &self,
        call: &CallContext,
        config: &EvictConfig,
        result: &Value,
    ) -> Option<EntityType> {
        let domain = config.domain.as_str();
        let cacheable = |entity: &&EntityType| self.registry.is_cacheable(entity, domain);

        config
            .entity_type
            .as_ref()
            .filter(cacheable)
            .or_else(|| result.runtime_type().filter(cacheable))
            .or_else(|| {
                call.args
                    .iter()
                    .filter_map(Value::runtime_type)
                    .find(cacheable)
            })
            .cloned()
    }

    fn should_store(&self, value: &Value, expected: &EntityType, domain: &str) -> bool {
        let runtime = match value {
            Value::Entity(entity) => &entity.entity_type,
            Value::Collection(items) => match items.first() {
                Some(Value::Entity(first)) => &first.entity_type,
                _ => return false,
            },
            Value::Null | Value::Scalar(_) => return false,
        };

        self.registry.is_assignable(runtime, expected) && self.registry.is_cacheable(runtime, domain)
    }
}

fn run_uncached<F, E>(proceed: F) -> Result<ReadOutcome, InvocationError<E>>
where
    F: FnOnce() -> Result<Value, E>,
{
    let value = proceed().map_err(InvocationError::Call)?;
    Ok(ReadOutcome {
        value,
        proceeded: true,
    })
}
