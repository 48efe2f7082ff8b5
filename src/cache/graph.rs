//! Per-domain entity dependency graph.
//!
//! Holds the declared `entity -> dependants` edges of one domain and lazily
//! computes, then memoizes, the transitive closure used for cascading
//! eviction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::domain::types::EntityType;

/// Transitive closure of one entity type: itself plus every type reachable
/// through declared dependant edges.
///
/// Iteration follows depth-first pre-order of the declared edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    order: Vec<EntityType>,
    members: HashSet<EntityType>,
}

impl Closure {
    pub(crate) fn singleton(entity: EntityType) -> Self {
        let mut closure = Self {
            order: Vec::with_capacity(1),
            members: HashSet::with_capacity(1),
        };
        closure.push(entity);
        closure
    }

    fn push(&mut self, entity: EntityType) -> bool {
        if self.members.insert(entity.clone()) {
            self.order.push(entity);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, entity: &EntityType) -> bool {
        self.members.contains(entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityType> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Members as an unordered set, convenient for comparisons.
    pub fn to_set(&self) -> HashSet<EntityType> {
        self.members.clone()
    }
}

impl<'a> IntoIterator for &'a Closure {
    type Item = &'a EntityType;
    type IntoIter = std::slice::Iter<'a, EntityType>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

/// Directed graph of entity types for a single domain.
///
/// Edges and nodes are frozen at construction. Closures are memoized in a
/// concurrent map; two callers racing on the same first lookup both compute
/// the same closure and one insert wins.
#[derive(Debug)]
pub struct EntityTypeGraph {
    domain: String,
    direct: HashMap<EntityType, Vec<EntityType>>,
    nodes: HashSet<EntityType>,
    closures: DashMap<EntityType, Arc<Closure>>,
}

impl EntityTypeGraph {
    pub(crate) fn new(
        domain: String,
        direct: HashMap<EntityType, Vec<EntityType>>,
        nodes: HashSet<EntityType>,
    ) -> Self {
        Self {
            domain,
            direct,
            nodes,
            closures: DashMap::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn contains(&self, entity: &EntityType) -> bool {
        self.nodes.contains(entity)
    }

    /// Every declared entity and dependant, sorted by name.
    pub fn nodes(&self) -> Vec<&EntityType> {
        let mut nodes: Vec<_> = self.nodes.iter().collect();
        nodes.sort();
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declared dependants of `entity`, in declaration order.
    pub fn direct_dependants(&self, entity: &EntityType) -> &[EntityType] {
        self.direct.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Memoized transitive closure of `entity`.
    ///
    /// Types that are not nodes of this graph get a singleton closure which
    /// is not memoized.
    pub fn closure(&self, entity: &EntityType) -> Arc<Closure> {
        if let Some(cached) = self.closures.get(entity) {
            return Arc::clone(cached.value());
        }

        let computed = Arc::new(self.compute_closure(entity));
        if !self.nodes.contains(entity) {
            return computed;
        }

        Arc::clone(
            self.closures
                .entry(entity.clone())
                .or_insert(computed)
                .value(),
        )
    }

    /// Number of closures currently memoized.
    pub fn memoized(&self) -> usize {
        self.closures.len()
    }

    fn compute_closure(&self, entity: &EntityType) -> Closure {
        let mut closure = Closure::singleton(entity.clone());
        let mut visiting = HashSet::new();
        visiting.insert(entity.clone());
        self.visit(entity, &mut closure, &mut visiting);
        closure
    }

    fn visit(
        &self,
        entity: &EntityType,
        closure: &mut Closure,
        visiting: &mut HashSet<EntityType>,
    ) {
        for dependant in self.direct_dependants(entity) {
            if visiting.contains(dependant) {
                warn!(
                    domain = %self.domain,
                    from = %entity,
                    to = %dependant,
                    "Dependency cycle detected; skipping edge"
                );
                continue;
            }

            // Already reached through another path; its subtree is in.
            if !closure.push(dependant.clone()) {
                continue;
            }

            visiting.insert(dependant.clone());
            self.visit(dependant, closure, visiting);
            visiting.remove(dependant);
        }
    }
}
