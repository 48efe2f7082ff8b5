//! Domain-scoped cache orchestration.
//!
//! Entity types are declared per domain together with the types depending on
//! them. Reads of a cacheable type go through its region; writes evict either
//! a single region or everything reachable in the domain's dependency graph.
//!
//! ## Declarations
//!
//! ```toml
//! [[entities]]
//! type = "Invoice"
//! domain = "billing"
//! dependants = ["LineItem", "Customer"]
//!
//! [[hierarchy]]
//! type = "SpecialOrder"
//! extends = "Order"
//! ```

mod config;
mod graph;
mod intercept;
mod keys;
mod lock;
mod operation;
mod orchestrator;
mod registry;
mod store;

pub use config::StoreConfig;
pub use graph::{Closure, EntityTypeGraph};
pub use intercept::Interceptor;
pub use keys::{CacheKey, KeyError, KeyGenerator, TemplateKeyGenerator, default_key};
pub use operation::{CacheOperation, CallContext, EvictConfig, ReadConfig, ReturnShape};
pub use orchestrator::{CacheOrchestrator, EvictOutcome, InvocationError, ReadOutcome};
pub use registry::{
    DEFAULT_DOMAIN, Declaration, GraphRegistry, GraphRegistryBuilder, RegistryError, Subtype,
};
pub use store::{CacheRegion, CacheStore, InMemoryStore, LruRegion};
