use brightbox_resource::client::RemoteClient;
use brightbox_resource::entity::RemoteEntity;
use brightbox_resource::field::DesiredState;
use brightbox_resource::filter::FilterSet;
use brightbox_resource::memory::{Call, MemoryClient};
use brightbox_resource::reconcile::Reconciler;
use brightbox_resource::schema::EntityType;
use brightbox_resource::state::{LocalState, IPV4_ADDRESS, PUBLIC_HOSTNAME};
use brightbox_resource::update::build_update;
use brightbox_resource::{ensure_encoded, fingerprint, Error};
use serde_json::{json, Value};

fn database_types() -> MemoryClient {
    MemoryClient::with_entities([
        RemoteEntity::new(EntityType::DatabaseServerType, "dbt-00001")
            .with("name", "small")
            .with("description", "Small")
            .with("disk_size", 20480)
            .with("ram", 2048),
        RemoteEntity::new(EntityType::DatabaseServerType, "dbt-00002")
            .with("name", "medium")
            .with("description", "Medium")
            .with("disk_size", 40960)
            .with("ram", 4096),
        RemoteEntity::new(EntityType::DatabaseServerType, "dbt-00003")
            .with("name", "large")
            .with("description", "Large")
            .with("disk_size", 81920)
            .with("ram", 8192),
    ])
}

#[test]
fn lookup_by_name_prefix_projects_the_match() {
    let client = database_types();
    let query = DesiredState::new().with("name", "^med");
    let filters = FilterSet::from_query(EntityType::DatabaseServerType.schema(), &query).unwrap();
    let mut local = LocalState::new(EntityType::DatabaseServerType);

    let found = Reconciler::new(&client)
        .read_into(&mut local, EntityType::DatabaseServerType, &filters)
        .unwrap();

    assert_eq!(found.id, "dbt-00002");
    assert_eq!(local.id.as_deref(), Some("dbt-00002"));
    assert_eq!(local.get("ram"), Some(&json!(4096)));
    assert_eq!(local.get("disk_size"), Some(&json!(40960)));
    assert_eq!(client.calls(), vec![Call::List(EntityType::DatabaseServerType)]);
}

#[test]
fn lookup_without_filters_is_ambiguous() {
    let client = database_types();
    let err = Reconciler::new(&client)
        .read(EntityType::DatabaseServerType, &FilterSet::new())
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousMatch { count: 3 }));
}

#[test]
fn lookup_over_empty_list_finds_nothing() {
    let client = MemoryClient::new();
    let filters = FilterSet::new().with("name", "^x").unwrap();
    let mut local = LocalState::new(EntityType::DatabaseServerType);
    let err = Reconciler::new(&client)
        .read_into(&mut local, EntityType::DatabaseServerType, &filters)
        .unwrap_err();
    assert!(matches!(err, Error::NoMatch));
    assert_eq!(local.id, None);
}

#[test]
fn lookup_with_invalid_pattern_fails_before_listing() {
    let query = DesiredState::new().with("description", "[");
    let err = FilterSet::from_query(EntityType::DatabaseServerType.schema(), &query).unwrap_err();
    assert!(err.to_string().contains("description"));
    assert!(err.to_string().contains("\"[\""));
}

#[test]
fn undeclared_computed_field_is_omitted_and_explicit_empty_name_is_sent() {
    let last_known = RemoteEntity::new(EntityType::CloudIp, "cip-k4a25")
        .with("name", "foo")
        .with("reverse_dns", "cip-109-107-50-1.gb1.brightbox.com");

    // reverse_dns is not declared; the API keeps its own value
    let same_name = DesiredState::new().with("name", "foo");
    let target = build_update(&same_name, &last_known).unwrap();
    assert!(target.get("reverse_dns").is_none());
    assert!(target.is_empty());

    let cleared = DesiredState::new().with("name", "");
    let target = build_update(&cleared, &last_known).unwrap();
    assert_eq!(serde_json::to_value(&target).unwrap(), json!({ "name": "" }));
}

#[test]
fn line_wrapped_user_data_is_not_a_change() {
    let last_known = RemoteEntity::new(EntityType::Server, "srv-lv426")
        .with("name", "web")
        .with("user_data", "aGVsbG8=");
    let desired = DesiredState::new()
        .with("name", "web")
        .with("user_data", "aGVs\nbG8=\n");
    let target = build_update(&desired, &last_known).unwrap();
    assert!(target.is_empty(), "unexpected update: {:?}", target.to_body());
}

#[test]
fn encoded_and_raw_payloads_fingerprint_alike() {
    let payload = ensure_encoded("hello");
    assert_eq!(payload, "aGVsbG8=");
    assert_eq!(fingerprint(&payload), fingerprint("hello"));
}

#[test]
fn cloud_ip_lifecycle() {
    let client = MemoryClient::new();
    let reconciler = Reconciler::new(&client);
    let mut local = LocalState::new(EntityType::CloudIp);

    // create
    let desired = DesiredState::new().with("name", "foo-1");
    let created = reconciler
        .create(&mut local, EntityType::CloudIp, &desired)
        .unwrap();
    let id = created.id.clone();
    assert_eq!(local.get("name"), Some(&json!("foo-1")));
    assert!(local.get(IPV4_ADDRESS).is_some());
    assert_eq!(
        local.get(PUBLIC_HOSTNAME),
        Some(&Value::String(format!("{}.gb1.brightbox.com", id)))
    );
    assert_eq!(local.get("interface"), None);

    // same config again: nothing to send
    let last_known = client.get(EntityType::CloudIp, &id).unwrap();
    assert!(!reconciler.update(&mut local, &desired, &last_known).unwrap());

    // rename
    let renamed = DesiredState::new().with("name", "bar-1");
    assert!(reconciler.update(&mut local, &renamed, &last_known).unwrap());
    assert_eq!(local.get("name"), Some(&json!("bar-1")));

    // clear the name
    let last_known = client.get(EntityType::CloudIp, &id).unwrap();
    let empty = DesiredState::new().with("name", "");
    assert!(reconciler.update(&mut local, &empty, &last_known).unwrap());
    assert_eq!(local.get("name"), Some(&json!("")));
    assert_eq!(client.update_calls(), 2);

    // refresh sees the same thing
    let before = local.clone();
    reconciler.refresh(&mut local).unwrap();
    assert_eq!(local, before);

    // destroy and verify
    reconciler.destroy(&mut local).unwrap();
    assert_eq!(local.id, None);
    reconciler
        .verify_destroyed(EntityType::CloudIp, &id)
        .unwrap();
}

#[test]
fn server_user_data_round_trips_through_state() {
    let client = MemoryClient::new();
    let reconciler = Reconciler::new(&client);
    let mut local = LocalState::new(EntityType::Server);

    let desired = DesiredState::new()
        .with("name", "web")
        .with("user_data", "#!/bin/sh\necho hi\n")
        .with("server_groups", json!(["grp-98v4n"]));
    let created = reconciler
        .create(&mut local, EntityType::Server, &desired)
        .unwrap();
    assert_eq!(
        created.attribute("user_data"),
        Some(&json!("IyEvYmluL3NoCmVjaG8gaGkK"))
    );
    assert_eq!(
        local.get("user_data"),
        Some(&json!(fingerprint("#!/bin/sh\necho hi\n").as_str()))
    );

    // the payload already encoded by the caller is the same content
    let encoded = desired
        .clone()
        .with("user_data", "IyEvYmluL3NoCmVjaG8gaGkK");
    assert!(!reconciler.update(&mut local, &encoded, &created).unwrap());
    assert_eq!(client.update_calls(), 0);
}
