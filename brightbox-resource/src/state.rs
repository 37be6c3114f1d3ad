//! Local state of a resource and the projection of remote snapshots into it.
//!
//! The local state is what the orchestrator persists between passes. It is
//! rewritten from the remote entity after every successful read or write:
//!
//! - the identifier is taken from the remote entity,
//! - the schema's projected fields are copied over, with encoded payloads
//!   stored as their content fingerprint rather than the payload itself,
//! - entities with a public address get `ipv4_address` and the matching
//!   reverse-DNS name in `public_hostname`.
//!
//! Projection is idempotent: projecting the same remote entity twice leaves
//! the state as the first projection did.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::entity::RemoteEntity;
use crate::fingerprint::fingerprint;
use crate::schema::{EntityType, FieldKind, PublicAddress};

pub const IPV4_ADDRESS: &str = "ipv4_address";
pub const PUBLIC_HOSTNAME: &str = "public_hostname";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
}

impl LocalState {
    pub fn new(entity_type: EntityType) -> Self {
        LocalState {
            entity_type,
            id: None,
            attributes: Map::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Forget the remote entity, e.g. after it was destroyed.
    pub fn clear_id(&mut self) {
        self.id = None;
    }
}

/// Copy `remote` into `local`.
pub fn project(local: &mut LocalState, remote: &RemoteEntity) {
    let schema = remote.schema();
    trace!(id = %remote.id, "projecting {} details", remote.entity_type);

    local.entity_type = remote.entity_type;
    local.id = Some(remote.id.clone());

    for name in schema.projected_fields {
        let encoded = schema
            .mutable_field(name)
            .is_some_and(|f| f.kind == FieldKind::EncodedText);
        match remote.attribute(name) {
            Some(Value::String(payload)) if encoded => {
                local.attributes.insert(
                    name.to_string(),
                    Value::String(fingerprint(payload).to_string()),
                );
            }
            Some(v) => {
                local.attributes.insert(name.to_string(), v.clone());
            }
            None => {
                local.attributes.remove(*name);
            }
        }
    }

    if let Some(source) = schema.public_address {
        set_public_address(local, remote, source);
    }
}

fn set_public_address(local: &mut LocalState, remote: &RemoteEntity, source: PublicAddress) {
    let (address, hostname) = match source {
        PublicAddress::Direct => (remote.attribute("public_ip"), remote.attribute("fqdn")),
        PublicAddress::PrimaryCloudIp => match remote.primary_cloud_ip() {
            Some(cip) => (cip.get("public_ip"), cip.get("fqdn")),
            None => (None, None),
        },
    };
    // A server without a mapped cloud IP keeps no public address.
    for (name, value) in [(IPV4_ADDRESS, address), (PUBLIC_HOSTNAME, hostname)] {
        match value {
            Some(v) if !v.is_null() => {
                local.attributes.insert(name.to_string(), v.clone());
            }
            _ => {
                local.attributes.remove(name);
            }
        }
    }
}
