use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{EntitySchema, EntityType};

/// A snapshot of one entity as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RemoteEntity {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        RemoteEntity {
            entity_type,
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter, mostly for fixtures.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.entity_type.schema()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self.attributes.get(name) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    /// The attribute rendered as text for pattern matching.
    ///
    /// Missing attributes read as the empty string.
    pub fn attribute_text(&self, name: &str) -> Cow<'_, str> {
        match self.attribute(name) {
            None => Cow::Borrowed(""),
            Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }

    /// The first cloud IP mapped to this entity, if any.
    pub fn primary_cloud_ip(&self) -> Option<&Map<String, Value>> {
        self.attribute("cloud_ips")?
            .as_array()?
            .first()?
            .as_object()
    }
}
