//! Domain graph registry.
//!
//! Owns one [`EntityTypeGraph`] per domain, built once from a list of
//! declarations, and answers the cacheability and eviction-closure queries
//! the orchestrator needs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::types::{EntityType, TypeHierarchy};

use super::graph::{Closure, EntityTypeGraph};

pub const DEFAULT_DOMAIN: &str = "default";

/// One cacheable entity type and its direct dependants within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub dependants: Vec<EntityType>,
}

impl Declaration {
    pub fn new(
        entity_type: impl Into<EntityType>,
        domain: impl Into<String>,
        dependants: impl IntoIterator<Item = impl Into<EntityType>>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            domain: domain.into(),
            dependants: dependants.into_iter().map(Into::into).collect(),
        }
    }
}

/// A declared `subtype extends supertype` relation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subtype {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub extends: EntityType,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no cacheable entity declarations configured")]
    NoDeclarations,
    #[error("invalid declaration: {reason}")]
    InvalidDeclaration { reason: String },
}

impl RegistryError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            reason: reason.into(),
        }
    }
}

#[derive(Default)]
struct PendingGraph {
    direct: HashMap<EntityType, Vec<EntityType>>,
    nodes: HashSet<EntityType>,
}

/// Collects declarations for every domain before any closure is computed.
#[derive(Default)]
pub struct GraphRegistryBuilder {
    declarations: Vec<Declaration>,
    hierarchy: TypeHierarchy,
}

impl GraphRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn declarations(mut self, declarations: impl IntoIterator<Item = Declaration>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    pub fn subtype(mut self, subtype: impl Into<EntityType>, supertype: impl Into<EntityType>) -> Self {
        self.hierarchy.declare(subtype.into(), supertype.into());
        self
    }

    pub fn subtypes(mut self, subtypes: impl IntoIterator<Item = Subtype>) -> Self {
        for Subtype {
            entity_type,
            extends,
        } in subtypes
        {
            self.hierarchy.declare(entity_type, extends);
        }
        self
    }

    /// Freeze all declarations into per-domain graphs and warm every closure.
    pub fn build(self) -> Result<GraphRegistry, RegistryError> {
        if self.declarations.is_empty() {
            return Err(RegistryError::NoDeclarations);
        }

        // First pass: every edge of every domain.
        let mut pending: BTreeMap<String, PendingGraph> = BTreeMap::new();
        for declaration in self.declarations {
            validate(&declaration)?;
            let Declaration {
                entity_type,
                domain,
                dependants,
            } = declaration;

            let graph = pending.entry(domain).or_default();
            graph.nodes.insert(entity_type.clone());
            graph.nodes.extend(dependants.iter().cloned());

            let edges = graph.direct.entry(entity_type).or_default();
            for dependant in dependants {
                if !edges.contains(&dependant) {
                    edges.push(dependant);
                }
            }
        }

        let domains: HashMap<String, Arc<EntityTypeGraph>> = pending
            .into_iter()
            .map(|(domain, graph)| {
                let graph = EntityTypeGraph::new(domain.clone(), graph.direct, graph.nodes);
                (domain, Arc::new(graph))
            })
            .collect();

        // Second pass: closures over the complete graphs.
        for (domain, graph) in &domains {
            for node in graph.nodes() {
                graph.closure(node);
            }
            info!(
                domain = %domain,
                entity_types = graph.node_count(),
                "Domain cache graph initialized"
            );
        }

        Ok(GraphRegistry {
            domains,
            hierarchy: self.hierarchy,
        })
    }
}

fn validate(declaration: &Declaration) -> Result<(), RegistryError> {
    if declaration.domain.trim().is_empty() {
        return Err(RegistryError::invalid(format!(
            "entity `{}` has an empty domain name",
            declaration.entity_type
        )));
    }
    if declaration.entity_type.as_str().trim().is_empty() {
        return Err(RegistryError::invalid(format!(
            "empty entity type name in domain `{}`",
            declaration.domain
        )));
    }
    if let Some(blank) = declaration
        .dependants
        .iter()
        .find(|dependant| dependant.as_str().trim().is_empty())
    {
        return Err(RegistryError::invalid(format!(
            "entity `{}` declares an empty dependant `{blank}`",
            declaration.entity_type
        )));
    }
    Ok(())
}

/// Immutable set of per-domain entity graphs.
///
/// Shared read-only across all callers; only closure memoization mutates,
/// and that happens inside concurrent maps.
#[derive(Debug)]
pub struct GraphRegistry {
    domains: HashMap<String, Arc<EntityTypeGraph>>,
    hierarchy: TypeHierarchy,
}

impl GraphRegistry {
    pub fn builder() -> GraphRegistryBuilder {
        GraphRegistryBuilder::new()
    }

    /// Build a registry straight from declarations without subtypes.
    pub fn from_declarations(
        declarations: impl IntoIterator<Item = Declaration>,
    ) -> Result<Self, RegistryError> {
        Self::builder().declarations(declarations).build()
    }

    /// True iff `domain` exists and `entity` is one of its nodes.
    pub fn is_cacheable(&self, entity: &EntityType, domain: &str) -> bool {
        self.domains
            .get(domain)
            .is_some_and(|graph| graph.contains(entity))
    }

    /// Every entity type whose cache must be cleared when `entity` changes,
    /// `entity` included.
    ///
    /// Unknown domains yield the singleton `{entity}`.
    pub fn affected_types(&self, entity: &EntityType, domain: &str) -> Arc<Closure> {
        match self.domains.get(domain) {
            Some(graph) => graph.closure(entity),
            None => {
                debug!(domain, entity = %entity, "Unknown cache domain; closure is the type itself");
                Arc::new(Closure::singleton(entity.clone()))
            }
        }
    }

    pub fn direct_dependants(&self, entity: &EntityType, domain: &str) -> Vec<EntityType> {
        self.domains
            .get(domain)
            .map(|graph| graph.direct_dependants(entity).to_vec())
            .unwrap_or_default()
    }

    /// True when a value of runtime type `from` may be cached as `to`.
    pub fn is_assignable(&self, from: &EntityType, to: &EntityType) -> bool {
        self.hierarchy.is_assignable(from, to)
    }

    pub fn graph(&self, domain: &str) -> Option<&Arc<EntityTypeGraph>> {
        self.domains.get(domain)
    }

    /// Domain names, sorted.
    pub fn domains(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.domains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn entity(name: &str) -> EntityType {
        EntityType::new(name)
    }

    fn billing_registry() -> GraphRegistry {
        GraphRegistry::from_declarations([
            Declaration::new("Invoice", "billing", ["LineItem", "Customer"]),
            Declaration::new("LineItem", "billing", ["Product"]),
            Declaration::new("Order", "orders", Vec::<&str>::new()),
        ])
        .expect("registry builds")
    }

    #[test]
    fn empty_declarations_fail_loudly() {
        let error = GraphRegistry::from_declarations(Vec::<Declaration>::new()).expect_err("must fail");
        assert!(matches!(error, RegistryError::NoDeclarations));
    }

    #[test]
    fn blank_domain_is_rejected() {
        let error = GraphRegistry::from_declarations([Declaration::new(
            "Invoice",
            "  ",
            Vec::<&str>::new(),
        )])
        .expect_err("must fail");
        assert!(matches!(error, RegistryError::InvalidDeclaration { .. }));
    }

    #[test]
    fn cacheability_is_scoped_to_domain() {
        let registry = billing_registry();

        assert!(registry.is_cacheable(&entity("Invoice"), "billing"));
        assert!(registry.is_cacheable(&entity("Product"), "billing"));
        assert!(!registry.is_cacheable(&entity("Order"), "billing"));
        assert!(registry.is_cacheable(&entity("Order"), "orders"));
        assert!(!registry.is_cacheable(&entity("Invoice"), "missing"));
    }

    #[test]
    fn affected_types_follow_transitive_edges() {
        let registry = billing_registry();

        let closure = registry.affected_types(&entity("Invoice"), "billing");
        let expected: HashSet<_> = ["Invoice", "LineItem", "Product", "Customer"]
            .into_iter()
            .map(entity)
            .collect();
        assert_eq!(closure.to_set(), expected);
    }

    #[test]
    fn unknown_domain_yields_singleton() {
        let registry = billing_registry();
        let closure = registry.affected_types(&entity("Invoice"), "elsewhere");
        assert_eq!(closure.len(), 1);
        assert!(closure.contains(&entity("Invoice")));
    }

    #[test]
    fn declarations_for_same_entity_accumulate() {
        let registry = GraphRegistry::from_declarations([
            Declaration::new("Invoice", "billing", ["LineItem"]),
            Declaration::new("Invoice", "billing", ["Customer", "LineItem"]),
        ])
        .expect("registry builds");

        assert_eq!(
            registry.direct_dependants(&entity("Invoice"), "billing"),
            vec![entity("LineItem"), entity("Customer")]
        );
    }

    #[test]
    fn build_warms_every_closure() {
        let registry = billing_registry();
        let graph = registry.graph("billing").expect("billing graph");
        assert_eq!(graph.memoized(), graph.node_count());
        assert_eq!(registry.domains(), ["billing", "orders"]);
    }

    #[test]
    fn subtypes_drive_assignability() {
        let registry = GraphRegistry::builder()
            .declare(Declaration::new("Order", "orders", Vec::<&str>::new()))
            .subtype("SpecialOrder", "Order")
            .build()
            .expect("registry builds");

        assert!(registry.is_assignable(&entity("SpecialOrder"), &entity("Order")));
        assert!(!registry.is_assignable(&entity("Order"), &entity("SpecialOrder")));
    }

    #[test]
    fn concurrent_lookups_agree() {
        let registry = GraphRegistry::from_declarations([
            Declaration::new("A", "cyclic", ["B"]),
            Declaration::new("B", "cyclic", ["C"]),
            Declaration::new("C", "cyclic", ["A"]),
        ])
        .expect("registry builds");

        let results: Vec<HashSet<EntityType>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.affected_types(&entity("A"), "cyclic").to_set()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("lookup thread"))
                .collect()
        });

        for result in &results {
            assert_eq!(result, &results[0]);
            assert_eq!(result.len(), 3);
        }
    }
}
