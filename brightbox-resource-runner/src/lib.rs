use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{bail, Context, Result};
use brightbox_resource::{
    client::RemoteClient as _, entity::RemoteEntity, field::DesiredState, filter::FilterSet,
    memory::MemoryClient, schema::EntityType,
};
use serde_json::{Map, Value};

/// Read a fixture: a JSON array of remote entities, each with `type` and `id`.
pub fn load_fixture(path: &Path) -> Result<Vec<RemoteEntity>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Could not read fixture {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Could not parse fixture {}", path.display()))
}

pub fn save_fixture(path: &Path, client: &MemoryClient) -> Result<()> {
    let mut entities = Vec::new();
    for t in EntityType::ALL {
        entities.extend(client.list(t)?);
    }
    let json = serde_json::to_string_pretty(&entities)?;
    fs::write(path, json).with_context(|| format!("Could not write fixture {}", path.display()))
}

/// Parse repeated `FIELD=PATTERN` arguments into a filter set.
///
/// Each field may be given once, and only fields the type can be looked up by
/// are accepted.
pub fn parse_filters(entity_type: EntityType, args: &[String]) -> Result<FilterSet> {
    let schema = entity_type.schema();
    let mut seen = BTreeSet::new();
    let mut filters = FilterSet::new();
    for arg in args {
        let Some((field, pattern)) = arg.split_once('=') else {
            bail!("filter must have the form FIELD=PATTERN, got: {}", arg);
        };
        if !schema.filter_fields.iter().any(|f| *f == field) {
            bail!(
                "{} cannot be filtered on {}; use one of: {}",
                entity_type,
                field,
                schema.filter_fields.join(", ")
            );
        }
        if !seen.insert(field) {
            bail!("duplicate filter: {}", field);
        }
        filters = filters.with(field, pattern)?;
    }
    Ok(filters)
}

pub fn parse_desired(json: &str) -> Result<DesiredState> {
    serde_json::from_str(json).with_context(|| "Could not parse desired state JSON")
}

/// Parse a last-known snapshot given as a JSON object. An `id` key, if
/// present, becomes the entity id.
pub fn parse_last_known(entity_type: EntityType, json: &str) -> Result<RemoteEntity> {
    let mut attributes: Map<String, Value> =
        serde_json::from_str(json).with_context(|| "Could not parse last-known state JSON")?;
    let id = match attributes.remove("id") {
        Some(Value::String(id)) => id,
        Some(other) => bail!("last-known id must be a string, got: {}", other),
        None => String::new(),
    };
    Ok(RemoteEntity {
        entity_type,
        id,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_parse_field_and_pattern() {
        let filters = parse_filters(
            EntityType::DatabaseServerType,
            &["name=^med".to_string(), "description=a=b".to_string()],
        )
        .unwrap();
        let parsed: Vec<_> = filters.iter().map(|f| (f.field(), f.pattern())).collect();
        assert_eq!(parsed, vec![("name", "^med"), ("description", "a=b")]);
    }

    #[test]
    fn duplicate_filters_are_rejected() {
        let err = parse_filters(
            EntityType::DatabaseServerType,
            &["name=a".to_string(), "name=b".to_string()],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "duplicate filter: name");
    }

    #[test]
    fn unknown_filter_fields_are_rejected() {
        let err =
            parse_filters(EntityType::DatabaseServerType, &["ram=1".to_string()]).unwrap_err();
        assert!(err.to_string().contains("name, description"));
        assert!(parse_filters(EntityType::DatabaseServerType, &["name".to_string()]).is_err());
    }

    #[test]
    fn last_known_takes_id_from_object() {
        let e = parse_last_known(EntityType::CloudIp, r#"{"id": "cip-k4a25", "name": "foo"}"#)
            .unwrap();
        assert_eq!(e.id, "cip-k4a25");
        assert_eq!(e.attribute("name"), Some(&json!("foo")));
        assert!(parse_last_known(EntityType::CloudIp, r#"{"id": 3}"#).is_err());
    }

    #[test]
    fn fixture_round_trips_through_memory_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        fs::write(
            &path,
            r#"[{"type": "server_group", "id": "grp-98v4n", "name": "default"}]"#,
        )
        .unwrap();
        let client = MemoryClient::with_entities(load_fixture(&path).unwrap());
        save_fixture(&path, &client).unwrap();
        let reloaded = load_fixture(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].id, "grp-98v4n");
    }
}
