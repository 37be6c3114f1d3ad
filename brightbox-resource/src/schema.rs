//! The entity schema table.
//!
//! One [`EntitySchema`] record per [`EntityType`] lists which fields the
//! update builder may mutate, which attributes are copied into local state,
//! which attributes a lookup may filter on, and where the public address of
//! the entity comes from.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    CloudIp,
    Server,
    DatabaseServer,
    DatabaseServerType,
    ServerType,
    ServerGroup,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::CloudIp,
        EntityType::Server,
        EntityType::DatabaseServer,
        EntityType::DatabaseServerType,
        EntityType::ServerType,
        EntityType::ServerGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::CloudIp => "cloud_ip",
            EntityType::Server => "server",
            EntityType::DatabaseServer => "database_server",
            EntityType::DatabaseServerType => "database_server_type",
            EntityType::ServerType => "server_type",
            EntityType::ServerGroup => "server_group",
        }
    }

    /// Identifier prefix the API uses for this type.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityType::CloudIp => "cip",
            EntityType::Server => "srv",
            EntityType::DatabaseServer => "dbs",
            EntityType::DatabaseServerType => "dbt",
            EntityType::ServerType => "typ",
            EntityType::ServerGroup => "grp",
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            EntityType::CloudIp => &CLOUD_IP,
            EntityType::Server => &SERVER,
            EntityType::DatabaseServer => &DATABASE_SERVER,
            EntityType::DatabaseServerType => &DATABASE_SERVER_TYPE,
            EntityType::ServerType => &SERVER_TYPE,
            EntityType::ServerGroup => &SERVER_GROUP,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type: {}", s))
    }
}

/// The shape of a mutable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Bool,
    /// Unordered collection of strings.
    StringSet,
    /// Free-form text sent base64 encoded and compared by fingerprint.
    EncodedText,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::String => "a string",
            FieldKind::Int => "an integer",
            FieldKind::Bool => "a boolean",
            FieldKind::StringSet => "a list of strings",
            FieldKind::EncodedText => "a string",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// The remote fills this field when the caller leaves it undeclared, so an
    /// undeclared desired value keeps whatever the remote has.
    pub computed: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            computed: false,
        }
    }

    const fn computed(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            computed: true,
        }
    }
}

/// Where the public IPv4 address and its reverse-DNS hostname come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicAddress {
    /// The entity carries `public_ip` and `fqdn` itself.
    Direct,
    /// The first element of the entity's `cloud_ips` list.
    PrimaryCloudIp,
}

#[derive(Debug)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    pub mutable_fields: &'static [FieldSpec],
    pub projected_fields: &'static [&'static str],
    pub filter_fields: &'static [&'static str],
    pub public_address: Option<PublicAddress>,
}

impl EntitySchema {
    pub fn mutable_field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.mutable_fields.iter().find(|f| f.name == name)
    }

    pub fn is_read_only(&self) -> bool {
        self.mutable_fields.is_empty()
    }
}

pub static CLOUD_IP: EntitySchema = EntitySchema {
    entity_type: EntityType::CloudIp,
    mutable_fields: &[
        FieldSpec::new("name", FieldKind::String),
        FieldSpec::computed("reverse_dns", FieldKind::String),
        FieldSpec::new("port_translators", FieldKind::StringSet),
    ],
    projected_fields: &[
        "name",
        "reverse_dns",
        "status",
        "interface",
        "server_group",
        "port_translators",
    ],
    filter_fields: &["name", "status"],
    public_address: Some(PublicAddress::Direct),
};

pub static SERVER: EntitySchema = EntitySchema {
    entity_type: EntityType::Server,
    mutable_fields: &[
        FieldSpec::new("name", FieldKind::String),
        FieldSpec::new("user_data", FieldKind::EncodedText),
        FieldSpec::new("server_groups", FieldKind::StringSet),
        FieldSpec::new("compatibility_mode", FieldKind::Bool),
    ],
    projected_fields: &[
        "name",
        "image",
        "type",
        "zone",
        "status",
        "server_groups",
        "compatibility_mode",
        "user_data",
        "locked",
        "username",
    ],
    filter_fields: &["name", "status", "zone"],
    public_address: Some(PublicAddress::PrimaryCloudIp),
};

pub static DATABASE_SERVER: EntitySchema = EntitySchema {
    entity_type: EntityType::DatabaseServer,
    mutable_fields: &[
        FieldSpec::new("name", FieldKind::String),
        FieldSpec::new("description", FieldKind::String),
        FieldSpec::new("maintenance_weekday", FieldKind::Int),
        FieldSpec::new("maintenance_hour", FieldKind::Int),
        FieldSpec::new("allow_access", FieldKind::StringSet),
        FieldSpec::computed("snapshots_schedule", FieldKind::String),
    ],
    projected_fields: &[
        "name",
        "description",
        "maintenance_weekday",
        "maintenance_hour",
        "allow_access",
        "snapshots_schedule",
        "database_engine",
        "database_version",
        "status",
        "admin_username",
        "locked",
    ],
    filter_fields: &["name", "description", "status"],
    public_address: Some(PublicAddress::PrimaryCloudIp),
};

pub static DATABASE_SERVER_TYPE: EntitySchema = EntitySchema {
    entity_type: EntityType::DatabaseServerType,
    mutable_fields: &[],
    projected_fields: &["name", "description", "disk_size", "ram"],
    filter_fields: &["name", "description"],
    public_address: None,
};

pub static SERVER_TYPE: EntitySchema = EntitySchema {
    entity_type: EntityType::ServerType,
    mutable_fields: &[],
    projected_fields: &["name", "handle", "cores", "ram", "disk_size", "status"],
    filter_fields: &["name", "handle", "status"],
    public_address: None,
};

pub static SERVER_GROUP: EntitySchema = EntitySchema {
    entity_type: EntityType::ServerGroup,
    mutable_fields: &[],
    projected_fields: &["name", "description", "default", "fqdn"],
    filter_fields: &["name", "description"],
    public_address: None,
};
