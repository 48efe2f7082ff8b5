//! Domain-scoped, dependency-graph-aware cache orchestration.
//!
//! Entity types are declared per domain along with the types that depend on
//! them. Reads of cacheable types are served read-through from a region per
//! entity type; writes evict a single region or cascade across the domain's
//! dependency graph.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
