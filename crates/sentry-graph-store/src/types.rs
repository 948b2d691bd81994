use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub type EntityKey = String;

/// Builds the deduplication key for a provider resource, e.g.
/// `sentry-team-10`.
pub fn entity_key(prefix: &str, provider_id: &str) -> EntityKey {
    format!("{prefix}-{provider_id}")
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipClass {
    Has,
    Assigned,
}

impl RelationshipClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Has => "HAS",
            Self::Assigned => "ASSIGNED",
        }
    }
}

impl fmt::Display for RelationshipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized graph node. `raw_source` keeps the provider record as it was
/// received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub class: Vec<String>,
    pub attributes: BTreeMap<String, AttrValue>,
    pub raw_source: Value,
}

impl Entity {
    pub fn new<I, S>(
        key: impl Into<EntityKey>,
        entity_type: impl Into<String>,
        class: I,
        raw_source: Value,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            entity_type: entity_type.into(),
            class: class.into_iter().map(Into::into).collect(),
            attributes: BTreeMap::new(),
            raw_source,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_optional_attribute<V: Into<AttrValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_attribute(name, value),
            None => self,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttrValue::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class.iter().any(|value| value == class)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipIdentity {
    pub relationship_type: String,
    pub from_key: EntityKey,
    pub to_key: EntityKey,
}

impl fmt::Display for RelationshipIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {})",
            self.relationship_type, self.from_key, self.to_key
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub class: RelationshipClass,
    pub from_key: EntityKey,
    pub to_key: EntityKey,
}

impl Relationship {
    pub fn new(
        relationship_type: impl Into<String>,
        class: RelationshipClass,
        from_key: impl Into<EntityKey>,
        to_key: impl Into<EntityKey>,
    ) -> Self {
        Self {
            relationship_type: relationship_type.into(),
            class,
            from_key: from_key.into(),
            to_key: to_key.into(),
        }
    }

    pub fn between(
        relationship_type: impl Into<String>,
        class: RelationshipClass,
        from: &Entity,
        to: &Entity,
    ) -> Self {
        Self::new(relationship_type, class, from.key.clone(), to.key.clone())
    }

    pub fn identity(&self) -> RelationshipIdentity {
        RelationshipIdentity {
            relationship_type: self.relationship_type.clone(),
            from_key: self.from_key.clone(),
            to_key: self.to_key.clone(),
        }
    }
}

/// A relationship whose endpoints did not all resolve to stored entities by
/// the end of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingRelationship {
    pub relationship: Relationship,
    pub missing_keys: Vec<EntityKey>,
}

impl fmt::Display for DanglingRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dangling relationship {}: unresolved {}",
            self.relationship.identity(),
            self.missing_keys.join(", ")
        )
    }
}

/// Everything a run produced, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedGraph {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl CollectedGraph {
    pub fn entity(&self, key: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.key == key)
    }

    pub fn entities_of_type<'a>(
        &'a self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .iter()
            .filter(move |entity| entity.entity_type == entity_type)
    }

    pub fn relationships_of_type<'a>(
        &'a self,
        relationship_type: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .iter()
            .filter(move |relationship| relationship.relationship_type == relationship_type)
    }

    pub fn contains_relationship(&self, relationship_type: &str, from_key: &str, to_key: &str) -> bool {
        self.relationships.iter().any(|relationship| {
            relationship.relationship_type == relationship_type
                && relationship.from_key == from_key
                && relationship.to_key == to_key
        })
    }
}
