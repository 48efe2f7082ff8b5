//! Human-readable views of a built registry.

use std::fmt;

use crate::cache::GraphRegistry;
use crate::config::Settings;
use crate::domain::types::EntityType;

/// Every domain, its entity types, their direct dependants and eviction
/// closures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectReport {
    pub domains: Vec<DomainView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainView {
    pub name: String,
    pub nodes: Vec<NodeView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub entity: EntityType,
    pub dependants: Vec<EntityType>,
    pub evicts: Vec<EntityType>,
}

impl InspectReport {
    pub fn from_registry(registry: &GraphRegistry) -> Self {
        let domains = registry
            .domains()
            .into_iter()
            .filter_map(|domain| registry.graph(domain))
            .map(|graph| DomainView {
                name: graph.domain().to_string(),
                nodes: graph
                    .nodes()
                    .into_iter()
                    .map(|node| NodeView {
                        entity: node.clone(),
                        dependants: graph.direct_dependants(node).to_vec(),
                        evicts: graph.closure(node).iter().cloned().collect(),
                    })
                    .collect(),
            })
            .collect();

        Self { domains }
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for domain in &self.domains {
            writeln!(f, "domain {} ({} entity types)", domain.name, domain.nodes.len())?;
            for node in &domain.nodes {
                writeln!(f, "  {}", node.entity)?;
                if !node.dependants.is_empty() {
                    writeln!(f, "    dependants: {}", join(&node.dependants))?;
                }
                writeln!(f, "    evicts: {}", join(&node.evicts))?;
            }
        }
        Ok(())
    }
}

/// Eviction closure of one entity type in one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedReport {
    pub entity: EntityType,
    pub domain: String,
    pub cacheable: bool,
    pub known_domain: bool,
    pub types: Vec<EntityType>,
}

impl AffectedReport {
    pub fn from_registry(registry: &GraphRegistry, entity: EntityType, domain: &str) -> Self {
        let types = registry
            .affected_types(&entity, domain)
            .iter()
            .cloned()
            .collect();

        Self {
            cacheable: registry.is_cacheable(&entity, domain),
            known_domain: registry.graph(domain).is_some(),
            domain: domain.to_string(),
            entity,
            types,
        }
    }
}

impl fmt::Display for AffectedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.known_domain {
            writeln!(f, "note: domain `{}` is not declared", self.domain)?;
        } else if !self.cacheable {
            writeln!(
                f,
                "note: `{}` is not cacheable in domain `{}`",
                self.entity, self.domain
            )?;
        }
        writeln!(
            f,
            "writing {} in {} evicts: {}",
            self.entity,
            self.domain,
            join(&self.types)
        )
    }
}

/// Summary printed after a successful configuration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckReport {
    pub declarations: usize,
    pub domains: usize,
    pub entity_types: usize,
    pub subtypes: usize,
    pub region_capacity: usize,
}

impl CheckReport {
    pub fn new(settings: &Settings, registry: &GraphRegistry) -> Self {
        let entity_types = registry
            .domains()
            .into_iter()
            .filter_map(|domain| registry.graph(domain))
            .map(|graph| graph.node_count())
            .sum();

        Self {
            declarations: settings.declarations.len(),
            domains: registry.domain_count(),
            entity_types,
            subtypes: registry.hierarchy().len(),
            region_capacity: settings.store.region_capacity.get(),
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "configuration ok: {} declarations, {} domains, {} entity types, {} subtype relations, region capacity {}",
            self.declarations, self.domains, self.entity_types, self.subtypes, self.region_capacity
        )
    }
}

fn join(types: &[EntityType]) -> String {
    types
        .iter()
        .map(EntityType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
