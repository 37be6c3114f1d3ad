//! Partial update requests.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::RemoteEntity;
use crate::error::Result;
use crate::field::{
    assign_bool, assign_encoded, assign_int, assign_string, assign_string_set, Assignment,
    DesiredState,
};
use crate::schema::{EntityType, FieldKind};

/// One present slot of a [`MutationTarget`].
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    SetTo(Value),
    /// Clear the field to the zero value of its kind.
    ClearToDefault(FieldKind),
}

impl Slot {
    fn from_assignment<T: Into<Value>>(kind: FieldKind, a: Assignment<T>) -> Option<Slot> {
        match a {
            Assignment::Omit => None,
            Assignment::ClearToDefault => Some(Slot::ClearToDefault(kind)),
            Assignment::SetTo(v) => Some(Slot::SetTo(v.into())),
        }
    }

    /// The value that goes on the wire.
    pub fn value(&self) -> Value {
        match self {
            Slot::SetTo(v) => v.clone(),
            Slot::ClearToDefault(kind) => zero_value(*kind),
        }
    }
}

fn zero_value(kind: FieldKind) -> Value {
    match kind {
        FieldKind::String | FieldKind::EncodedText => Value::String(String::new()),
        FieldKind::Int => Value::from(0),
        FieldKind::Bool => Value::Bool(false),
        FieldKind::StringSet => Value::Array(Vec::new()),
    }
}

/// The changed subset of an entity's attributes.
///
/// A field is present here only if the desired state differs from the
/// last-known snapshot for that field. Serializes to the JSON body of the
/// partial update request.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationTarget {
    entity_type: EntityType,
    slots: BTreeMap<&'static str, Slot>,
}

impl MutationTarget {
    pub fn new(entity_type: EntityType) -> Self {
        MutationTarget {
            entity_type,
            slots: BTreeMap::new(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, field: &str) -> Option<&Slot> {
        self.slots.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    fn insert<T: Into<Value>>(&mut self, field: &'static str, kind: FieldKind, a: Assignment<T>) {
        if let Some(slot) = Slot::from_assignment(kind, a) {
            self.slots.insert(field, slot);
        }
    }

    /// The request body: field name to wire value.
    pub fn to_body(&self) -> Map<String, Value> {
        self.slots
            .iter()
            .map(|(k, s)| (k.to_string(), s.value()))
            .collect()
    }
}

impl Serialize for MutationTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (k, s) in &self.slots {
            map.serialize_entry(k, &s.value())?;
        }
        map.end()
    }
}

/// Build the partial update that moves `last_known` toward `desired`.
///
/// Every mutable field in the schema of `last_known`'s type is assigned
/// independently. An empty result means there is nothing to send.
pub fn build_update(desired: &DesiredState, last_known: &RemoteEntity) -> Result<MutationTarget> {
    let schema = last_known.schema();
    let mut target = MutationTarget::new(schema.entity_type);
    for field in schema.mutable_fields {
        let name = field.name;
        match field.kind {
            FieldKind::String => {
                target.insert(name, field.kind, assign_string(desired, last_known, name)?)
            }
            FieldKind::Int => {
                target.insert(name, field.kind, assign_int(desired, last_known, name)?)
            }
            FieldKind::Bool => {
                target.insert(name, field.kind, assign_bool(desired, last_known, name)?)
            }
            FieldKind::StringSet => target.insert(
                name,
                field.kind,
                assign_string_set(desired, last_known, name)?,
            ),
            FieldKind::EncodedText => {
                target.insert(name, field.kind, assign_encoded(desired, last_known, name)?)
            }
        }
    }
    debug!(
        entity_type = %schema.entity_type,
        id = %last_known.id,
        fields = ?target.fields().collect::<Vec<_>>(),
        "computed partial update"
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DATABASE_SERVER;
    use proptest::prelude::*;
    use serde_json::json;

    fn database_server() -> RemoteEntity {
        RemoteEntity::new(EntityType::DatabaseServer, "dbs-123ab")
            .with("name", "db")
            .with("description", "primary")
            .with("maintenance_weekday", 2)
            .with("maintenance_hour", 6)
            .with("allow_access", json!(["srv-lv426"]))
            .with("snapshots_schedule", "0 2 * * *")
    }

    fn matching_desired() -> DesiredState {
        DesiredState::new()
            .with("name", "db")
            .with("description", "primary")
            .with("maintenance_weekday", 2)
            .with("maintenance_hour", 6)
            .with("allow_access", json!(["srv-lv426"]))
    }

    #[test]
    fn agreeing_states_build_empty_update() {
        let target = build_update(&matching_desired(), &database_server()).unwrap();
        assert!(target.is_empty());
        assert_eq!(serde_json::to_value(&target).unwrap(), json!({}));
    }

    #[test]
    fn only_changed_fields_are_present() {
        let desired = matching_desired()
            .with("name", "db-renamed")
            .with("allow_access", json!(["srv-lv426", "grp-98v4n"]));
        let target = build_update(&desired, &database_server()).unwrap();
        assert_eq!(target.fields().collect::<Vec<_>>(), vec!["allow_access", "name"]);
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({
                "name": "db-renamed",
                "allow_access": ["srv-lv426", "grp-98v4n"],
            })
        );
    }

    #[test]
    fn cleared_fields_carry_zero_values() {
        let desired = DesiredState::new()
            .with("name", "db")
            .with("allow_access", json!(["srv-lv426"]));
        let target = build_update(&desired, &database_server()).unwrap();
        assert_eq!(
            target.get("description"),
            Some(&Slot::ClearToDefault(FieldKind::String))
        );
        assert_eq!(
            target.to_body(),
            json!({
                "description": "",
                "maintenance_weekday": 0,
                "maintenance_hour": 0,
            })
            .as_object()
            .unwrap()
            .clone()
        );
        // computed, so left alone
        assert!(target.get("snapshots_schedule").is_none());
    }

    #[test]
    fn read_only_types_never_mutate() {
        let last = RemoteEntity::new(EntityType::DatabaseServerType, "dbt-12345")
            .with("name", "small");
        let desired = DesiredState::new().with("name", "large");
        assert!(build_update(&desired, &last).unwrap().is_empty());
    }

    #[test]
    fn server_user_data_is_encoded_once() {
        let last = RemoteEntity::new(EntityType::Server, "srv-lv426").with("name", "web");
        let desired = DesiredState::new()
            .with("name", "web")
            .with("user_data", "hello");
        let target = build_update(&desired, &last).unwrap();
        assert_eq!(target.to_body().get("user_data"), Some(&json!("aGVsbG8=")));
    }

    fn database_server_attributes() -> impl Strategy<Value = Map<String, Value>> {
        (
            "[a-z]{0,6}",
            "[a-z ]{0,6}",
            0i64..7,
            0i64..24,
            proptest::collection::vec("srv-[a-z0-9]{5}", 0..4),
            "[0-9* ]{0,9}",
        )
            .prop_map(|(name, description, weekday, hour, access, schedule)| {
                json!({
                    "name": name,
                    "description": description,
                    "maintenance_weekday": weekday,
                    "maintenance_hour": hour,
                    "allow_access": access,
                    "snapshots_schedule": schedule,
                })
                .as_object()
                .unwrap()
                .clone()
            })
    }

    proptest! {
        #[test]
        fn agreeing_state_never_builds_an_update(attrs in database_server_attributes()) {
            let last = RemoteEntity {
                entity_type: EntityType::DatabaseServer,
                id: "dbs-123ab".to_string(),
                attributes: attrs.clone(),
            };
            let target = build_update(&DesiredState(attrs), &last).unwrap();
            prop_assert!(target.is_empty(), "unexpected update: {:?}", target.to_body());
        }

        #[test]
        fn undeclared_field_clears_only_itself(
            attrs in database_server_attributes(),
            index in 0usize..DATABASE_SERVER.mutable_fields.len(),
        ) {
            let field = &DATABASE_SERVER.mutable_fields[index];
            let last = RemoteEntity {
                entity_type: EntityType::DatabaseServer,
                id: "dbs-123ab".to_string(),
                attributes: attrs.clone(),
            };
            let mut desired = DesiredState(attrs);
            desired.0.remove(field.name);
            let target = build_update(&desired, &last).unwrap();

            let zero = zero_value(field.kind);
            if field.computed || last.attribute(field.name) == Some(&zero) {
                prop_assert!(target.is_empty());
            } else {
                prop_assert_eq!(target.fields().collect::<Vec<_>>(), vec![field.name]);
                prop_assert_eq!(
                    target.get(field.name),
                    Some(&Slot::ClearToDefault(field.kind))
                );
                let body = target.to_body();
                prop_assert_eq!(body.get(field.name), Some(&zero));
            }
        }
    }
}
