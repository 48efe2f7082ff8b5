//! Call interception.
//!
//! [`Interceptor`] wraps a delegate with the cache behavior selected by its
//! configuration: read-through for reads, evict-after-success for writes.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::types::Value;

use super::operation::{CacheOperation, CallContext, EvictConfig, ReadConfig};
use super::orchestrator::{CacheOrchestrator, EvictOutcome, InvocationError};

/// Shared interception state, cheap to clone into every call site.
#[derive(Clone)]
pub struct Interceptor {
    orchestrator: Arc<CacheOrchestrator>,
}

impl Interceptor {
    pub fn new(orchestrator: Arc<CacheOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Read-through around `delegate`.
    pub fn read<F, E>(
        &self,
        call: &CallContext,
        config: &ReadConfig,
        delegate: F,
    ) -> Result<Value, InvocationError<E>>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        self.orchestrator
            .handle_read(call, config, delegate)
            .map(|outcome| outcome.value)
    }

    /// Run `delegate`, then evict on success.
    ///
    /// A failed delegate evicts nothing. A key expression that cannot be
    /// evaluated after a successful write is returned as
    /// [`InvocationError::Key`]; the write itself has already happened.
    #[instrument(skip_all, fields(call = %call.name))]
    pub fn write<F, E>(
        &self,
        call: &CallContext,
        config: &EvictConfig,
        delegate: F,
    ) -> Result<Value, InvocationError<E>>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        let value = delegate().map_err(InvocationError::Call)?;

        match self.orchestrator.handle_evict(call, config, &value) {
            Ok(EvictOutcome::Skipped) => debug!("Write completed without eviction"),
            Ok(outcome) => debug!(?outcome, "Write completed with eviction"),
            Err(error) => {
                warn!(
                    error = %error,
                    "Eviction key could not be evaluated after successful write"
                );
                return Err(InvocationError::Key(error));
            }
        }

        Ok(value)
    }

    /// Dispatch on a combined operation configuration.
    pub fn invoke<F, E>(
        &self,
        call: &CallContext,
        operation: &CacheOperation,
        delegate: F,
    ) -> Result<Value, InvocationError<E>>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        match operation {
            CacheOperation::Read(config) => self.read(call, config, delegate),
            CacheOperation::Evict(config) => self.write(call, config, delegate),
        }
    }
}
