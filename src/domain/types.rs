//! Entity type identifiers and the runtime value shapes the cache inspects.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a cacheable kind of value.
///
/// Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// A value tagged with its concrete runtime entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub payload: serde_json::Value,
}

/// Runtime shape of call arguments and results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    /// Plain data with no entity type (ids, flags, strings).
    Scalar(serde_json::Value),
    Entity(Entity),
    Collection(Vec<Value>),
}

impl Value {
    pub fn scalar(value: impl Into<serde_json::Value>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn entity(entity_type: impl Into<EntityType>, payload: serde_json::Value) -> Self {
        Self::Entity(Entity {
            entity_type: entity_type.into(),
            payload,
        })
    }

    pub fn collection(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Collection(items.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Concrete entity type carried by this value.
    ///
    /// A non-empty collection reports the type of its first element.
    pub fn runtime_type(&self) -> Option<&EntityType> {
        match self {
            Self::Entity(entity) => Some(&entity.entity_type),
            Self::Collection(items) => items.first().and_then(Value::runtime_type),
            Self::Null | Self::Scalar(_) => None,
        }
    }

    /// Resolve a dotted field path against the JSON body of this value.
    ///
    /// An empty path yields the value itself. Returns `None` when a segment
    /// does not exist.
    pub fn field(&self, path: &[&str]) -> Option<Value> {
        if path.is_empty() {
            return Some(self.clone());
        }

        let root = match self {
            Self::Entity(entity) => &entity.payload,
            Self::Scalar(json) => json,
            Self::Null | Self::Collection(_) => return None,
        };

        let mut current = root;
        for segment in path {
            current = match current {
                serde_json::Value::Object(map) => map.get(*segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(match current {
            serde_json::Value::Null => Self::Null,
            other => Self::Scalar(other.clone()),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Scalar(serde_json::Value::String(text)) => f.write_str(text),
            Self::Scalar(json) => write!(f, "{json}"),
            Self::Entity(entity) => write!(f, "{}({})", entity.entity_type, entity.payload),
            Self::Collection(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Self::Entity(value)
    }
}

/// Declared subtype relation between entity types.
///
/// The relation is global: it does not depend on the domain a type is
/// cached in.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    supertypes: HashMap<EntityType, Vec<EntityType>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `subtype` extends `supertype`.
    pub fn declare(&mut self, subtype: EntityType, supertype: EntityType) {
        let parents = self.supertypes.entry(subtype).or_default();
        if !parents.contains(&supertype) {
            parents.push(supertype);
        }
    }

    /// True when a value of type `from` may stand in for `to`.
    pub fn is_assignable(&self, from: &EntityType, to: &EntityType) -> bool {
        if from == to {
            return true;
        }

        let mut seen = HashSet::new();
        let mut pending = vec![from];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            for parent in self.supertypes.get(current).into_iter().flatten() {
                if parent == to {
                    return true;
                }
                pending.push(parent);
            }
        }

        false
    }

    pub fn len(&self) -> usize {
        self.supertypes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }
}
