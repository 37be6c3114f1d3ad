//! One reconciliation pass for one resource.
//!
//! Reads go list → filter → resolve one → project. Writes go diff → build
//! update → mutate → re-project. Each call owns all of its state; the only
//! thing shared between calls is the borrowed client.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::client::RemoteClient;
use crate::entity::RemoteEntity;
use crate::error::{Error, Result};
use crate::field::{assign_string_set_always, DesiredState};
use crate::filter::FilterSet;
use crate::fingerprint::ensure_encoded;
use crate::resolve::resolve_one;
use crate::schema::{EntityType, FieldKind};
use crate::state::{project, LocalState};
use crate::update::{build_update, MutationTarget};

pub struct Reconciler<'c, C: RemoteClient + ?Sized> {
    client: &'c C,
}

impl<'c, C: RemoteClient + ?Sized> Reconciler<'c, C> {
    pub fn new(client: &'c C) -> Self {
        Reconciler { client }
    }

    /// Resolve a lookup to exactly one remote entity.
    pub fn read(&self, entity_type: EntityType, filters: &FilterSet) -> Result<RemoteEntity> {
        debug!("{} lookup called. Retrieving {} list", entity_type, entity_type);
        let candidates = self.client.list(entity_type)?;
        let found = resolve_one(&candidates, filters)?;
        Ok(found.clone())
    }

    /// [`Reconciler::read`], then write the result into `local`.
    pub fn read_into(
        &self,
        local: &mut LocalState,
        entity_type: EntityType,
        filters: &FilterSet,
    ) -> Result<RemoteEntity> {
        let found = self.read(entity_type, filters)?;
        project(local, &found);
        Ok(found)
    }

    /// Create an entity from every declared mutable field of `desired`.
    pub fn create(
        &self,
        local: &mut LocalState,
        entity_type: EntityType,
        desired: &DesiredState,
    ) -> Result<RemoteEntity> {
        let payload = create_payload(entity_type, desired)?;
        debug!(
            fields = ?payload.keys().collect::<Vec<_>>(),
            "creating {}", entity_type
        );
        let created = self.client.create(entity_type, &payload)?;
        info!(id = %created.id, "created {}", entity_type);
        project(local, &created);
        Ok(created)
    }

    /// Send the partial update that moves `last_known` toward `desired`.
    ///
    /// Returns `false` without touching the network when nothing changed.
    pub fn update(
        &self,
        local: &mut LocalState,
        desired: &DesiredState,
        last_known: &RemoteEntity,
    ) -> Result<bool> {
        let target = build_update(desired, last_known)?;
        if target.is_empty() {
            info!(id = %last_known.id, "{} is up to date", last_known.entity_type);
            return Ok(false);
        }
        let updated = self.send_update(&last_known.id, &target)?;
        project(local, &updated);
        Ok(true)
    }

    fn send_update(&self, id: &str, target: &MutationTarget) -> Result<RemoteEntity> {
        debug!(
            id = %id,
            fields = ?target.fields().collect::<Vec<_>>(),
            "updating {}", target.entity_type()
        );
        Ok(self.client.update(target.entity_type(), id, target)?)
    }

    /// Re-read the entity `local` refers to.
    ///
    /// Returns `None` and clears the local id if the entity no longer exists.
    pub fn refresh(&self, local: &mut LocalState) -> Result<Option<RemoteEntity>> {
        let id = local.id.clone().ok_or(Error::MissingId(local.entity_type))?;
        match self.client.get(local.entity_type, &id) {
            Ok(remote) => {
                project(local, &remote);
                Ok(Some(remote))
            }
            Err(e) if e.is_not_found() => {
                warn!(id = %id, "{} not found, removing from state", local.entity_type);
                local.clear_id();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the entity `local` refers to. An entity that is already gone
    /// counts as destroyed.
    pub fn destroy(&self, local: &mut LocalState) -> Result<()> {
        let id = local.id.clone().ok_or(Error::MissingId(local.entity_type))?;
        match self.client.delete(local.entity_type, &id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "{} was already gone", local.entity_type);
            }
            Err(e) => return Err(e.into()),
        }
        local.clear_id();
        Ok(())
    }

    /// Check that a destroyed entity is really gone.
    pub fn verify_destroyed(&self, entity_type: EntityType, id: &str) -> Result<()> {
        match self.client.get(entity_type, id) {
            Ok(_) => Err(Error::StillExists {
                entity_type,
                id: id.to_string(),
            }),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The create request body: declared mutable fields, with encoded payloads
/// encoded once and collections deduplicated.
fn create_payload(entity_type: EntityType, desired: &DesiredState) -> Result<Map<String, Value>> {
    let mut payload = Map::new();
    for field in entity_type.schema().mutable_fields {
        let Some(value) = desired.declared(field.name) else {
            continue;
        };
        let value = match field.kind {
            FieldKind::EncodedText => match value.as_str() {
                Some(s) => Value::String(ensure_encoded(s)),
                None => return Err(field_type(field.name, field.kind)),
            },
            FieldKind::StringSet => assign_string_set_always(desired, field.name)?
                .materialize()
                .unwrap_or_default()
                .into(),
            FieldKind::String if !value.is_string() => {
                return Err(field_type(field.name, field.kind))
            }
            FieldKind::Int if !value.is_i64() => return Err(field_type(field.name, field.kind)),
            FieldKind::Bool if !value.is_boolean() => {
                return Err(field_type(field.name, field.kind))
            }
            _ => value.clone(),
        };
        payload.insert(field.name.to_string(), value);
    }
    Ok(payload)
}

fn field_type(field: &str, expected: FieldKind) -> Error {
    Error::FieldType {
        field: field.to_string(),
        expected,
    }
}
