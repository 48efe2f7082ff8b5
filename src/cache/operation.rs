//! Call metadata and per-call cache configuration.
//!
//! The calling layer describes each wrapped call with a [`CallContext`] and
//! says what the cache should do with a [`ReadConfig`], an [`EvictConfig`]
//! or the combined [`CacheOperation`].

use serde::Deserialize;

use crate::domain::types::{EntityType, Value};

use super::registry::DEFAULT_DOMAIN;

/// Declared result shape of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// A single value of the given type.
    Single(EntityType),
    /// An ordered or unordered collection of the given element type.
    Collection(EntityType),
    /// The result type is not known statically.
    Unresolved,
}

impl ReturnShape {
    /// Entity type the call is expected to produce.
    pub fn entity_type(&self) -> Option<&EntityType> {
        match self {
            Self::Single(entity) | Self::Collection(entity) => Some(entity),
            Self::Unresolved => None,
        }
    }
}

/// Identity, arguments and declared result shape of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub name: String,
    pub args: Vec<Value>,
    pub returns: ReturnShape,
}

impl CallContext {
    pub fn new(name: impl Into<String>, args: Vec<Value>, returns: ReturnShape) -> Self {
        Self {
            name: name.into(),
            args,
            returns,
        }
    }

    pub fn returning(name: impl Into<String>, entity: impl Into<EntityType>) -> Self {
        Self::new(name, Vec::new(), ReturnShape::Single(entity.into()))
    }

    pub fn returning_many(name: impl Into<String>, entity: impl Into<EntityType>) -> Self {
        Self::new(name, Vec::new(), ReturnShape::Collection(entity.into()))
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.args.push(arg);
        self
    }
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

/// Read-through configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadConfig {
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Key expression; empty selects the default key.
    #[serde(default)]
    pub key: String,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            key: String::new(),
        }
    }
}

impl ReadConfig {
    pub fn in_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

/// Eviction configuration applied after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvictConfig {
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Explicit entity type to evict, tried before any inference.
    #[serde(default, rename = "type")]
    pub entity_type: Option<EntityType>,
    /// Stop at the entity's own region instead of cascading.
    #[serde(default)]
    pub atomic: bool,
    /// Expression naming a single key to evict; empty means none.
    #[serde(default)]
    pub key: String,
}

impl Default for EvictConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            entity_type: None,
            atomic: false,
            key: String::new(),
        }
    }
}

impl EvictConfig {
    pub fn in_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn of_type(mut self, entity: impl Into<EntityType>) -> Self {
        self.entity_type = Some(entity.into());
        self
    }

    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

/// Single configuration surface selecting the read or the write path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum CacheOperation {
    Read(ReadConfig),
    Evict(EvictConfig),
}

impl CacheOperation {
    pub fn domain(&self) -> &str {
        match self {
            Self::Read(config) => &config.domain,
            Self::Evict(config) => &config.domain,
        }
    }
}
