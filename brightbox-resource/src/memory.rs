//! An in-memory [`RemoteClient`], used by the runner and in tests.
//!
//! It keeps entities keyed by type and id, fills in a few fields the real API
//! computes on creation, and records every call it receives.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::client::{RemoteClient, RemoteError};
use crate::entity::RemoteEntity;
use crate::schema::EntityType;
use crate::update::MutationTarget;

/// A call received by a [`MemoryClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(EntityType),
    Get(EntityType, String),
    Create(EntityType, Map<String, Value>),
    Update(EntityType, String, Map<String, Value>),
    Delete(EntityType, String),
}

#[derive(Default)]
struct Inner {
    entities: BTreeMap<(EntityType, String), RemoteEntity>,
    next_serial: u32,
    calls: Vec<Call>,
    fail_next: Option<RemoteError>,
}

#[derive(Default)]
pub struct MemoryClient {
    inner: Mutex<Inner>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: impl IntoIterator<Item = RemoteEntity>) -> Self {
        let client = Self::new();
        for e in entities {
            client.insert(e);
        }
        client
    }

    /// Store an entity as-is, replacing any entity with the same type and id.
    pub fn insert(&self, entity: RemoteEntity) {
        let mut inner = self.lock();
        inner
            .entities
            .insert((entity.entity_type, entity.id.clone()), entity);
    }

    pub fn entity(&self, entity_type: EntityType, id: &str) -> Option<RemoteEntity> {
        self.lock()
            .entities
            .get(&(entity_type, id.to_string()))
            .cloned()
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.lock().fail_next = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn update_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Update(..)))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mutex poisoned")
    }

    fn record(&self, call: Call) -> Result<std::sync::MutexGuard<'_, Inner>, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(call);
        match inner.fail_next.take() {
            Some(e) => Err(e),
            None => Ok(inner),
        }
    }
}

fn not_found(entity_type: EntityType, id: &str) -> RemoteError {
    RemoteError::not_found(format!("{} {} not found", entity_type, id))
}

/// Fields the API derives when an entity is created.
fn fill_computed(entity: &mut RemoteEntity, serial: u32) {
    let attrs = &mut entity.attributes;
    match entity.entity_type {
        EntityType::CloudIp => {
            let address = format!("109.107.{}.{}", 50 + serial / 256, serial % 256);
            let reverse = format!("cip-{}.gb1.brightbox.com", address.replace('.', "-"));
            attrs.insert("public_ip".into(), Value::String(address));
            attrs.insert(
                "fqdn".into(),
                Value::String(format!("{}.gb1.brightbox.com", entity.id)),
            );
            attrs
                .entry("reverse_dns")
                .or_insert_with(|| Value::String(reverse));
            attrs
                .entry("status")
                .or_insert_with(|| Value::String("unmapped".into()));
        }
        EntityType::Server | EntityType::DatabaseServer => {
            attrs
                .entry("status")
                .or_insert_with(|| Value::String("creating".into()));
        }
        _ => {}
    }
}

impl RemoteClient for MemoryClient {
    fn list(&self, entity_type: EntityType) -> Result<Vec<RemoteEntity>, RemoteError> {
        let inner = self.record(Call::List(entity_type))?;
        Ok(inner
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect())
    }

    fn get(&self, entity_type: EntityType, id: &str) -> Result<RemoteEntity, RemoteError> {
        let inner = self.record(Call::Get(entity_type, id.to_string()))?;
        inner
            .entities
            .get(&(entity_type, id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(entity_type, id))
    }

    fn create(
        &self,
        entity_type: EntityType,
        payload: &Map<String, Value>,
    ) -> Result<RemoteEntity, RemoteError> {
        let mut inner = self.record(Call::Create(entity_type, payload.clone()))?;
        inner.next_serial += 1;
        let serial = inner.next_serial;
        let mut entity = RemoteEntity {
            entity_type,
            id: format!("{}-{:05}", entity_type.id_prefix(), serial),
            attributes: payload.clone(),
        };
        fill_computed(&mut entity, serial);
        inner
            .entities
            .insert((entity_type, entity.id.clone()), entity.clone());
        Ok(entity)
    }

    fn update(
        &self,
        entity_type: EntityType,
        id: &str,
        target: &MutationTarget,
    ) -> Result<RemoteEntity, RemoteError> {
        let body = target.to_body();
        let mut inner = self.record(Call::Update(entity_type, id.to_string(), body.clone()))?;
        let entity = inner
            .entities
            .get_mut(&(entity_type, id.to_string()))
            .ok_or_else(|| not_found(entity_type, id))?;
        entity.attributes.extend(body);
        Ok(entity.clone())
    }

    fn delete(&self, entity_type: EntityType, id: &str) -> Result<(), RemoteError> {
        let mut inner = self.record(Call::Delete(entity_type, id.to_string()))?;
        inner
            .entities
            .remove(&(entity_type, id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(entity_type, id))
    }
}
