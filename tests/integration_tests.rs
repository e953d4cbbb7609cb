//! Integration tests for the complete Catbridge pipeline
//!
//! These tests exercise the crates together:
//! - configuration file → registry → canonical entities and relationships
//! - windowed change feed → change detection against captured stubs
//!
//! Run with: cargo test --test integration_tests

use catbridge_changeset::{ChangeOp, ChangeSetEngine};
use catbridge_mapping::{
    standard_registry, ChangeWindow, FidelityLevel, InMemoryCatalog, MappingConfig, PropertyMatch, SearchCriteria,
    WindowedChangeFeed,
};
use catbridge_model::{NativeAsset, NativeRef, Rid, StubSnapshot, CONTEXT, MODIFIED_ON, NAME};
use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;
use tempfile::tempdir;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
}

fn host() -> NativeRef {
    NativeRef::asset("h1", "host", "db-host-01")
}
fn database() -> NativeRef {
    NativeRef::asset("d1", "database", "ORDERS")
}
fn schema() -> NativeRef {
    NativeRef::asset("s1", "database_schema", "PUBLIC")
}
fn column() -> NativeRef {
    NativeRef::asset("col1", "database_column", "EMAIL")
}
fn email_class() -> NativeRef {
    NativeRef::asset("dc1", "data_class", "Email Address")
}
fn detection() -> NativeRef {
    NativeRef::link_object("cl1", "classification")
}

fn named(r: &NativeRef, day: u32) -> NativeAsset {
    NativeAsset::new(r.clone())
        .with_property(NAME, r.display_name())
        .with_property(MODIFIED_ON, at(day))
}

fn column_asset(day: u32, data_type: &str, detected: Vec<NativeRef>) -> NativeAsset {
    named(&column(), day)
        .with_property(CONTEXT, vec![host(), database(), schema()])
        .with_property("data_type", data_type)
        .with_property("detected_classifications", detected)
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_asset(named(&host(), 1))
        .with_asset(
            named(&database(), 1)
                .with_property(CONTEXT, vec![host()])
                .with_property("database_schemas", vec![schema()]),
        )
        .with_asset(
            named(&schema(), 1)
                .with_property(CONTEXT, vec![host(), database()])
                .with_property("database", database()),
        )
        .with_asset(column_asset(2, "VARCHAR", Vec::new()))
        .with_asset(named(&email_class(), 1).with_property(CONTEXT, Vec::<NativeRef>::new()))
        .with_asset(
            NativeAsset::new(detection())
                .with_property(MODIFIED_ON, at(5))
                .with_property("classifies_asset", column())
                .with_property("data_class", email_class())
                .with_property("confidencePercent", 97i64)
                .with_property("threshold", 0.9f64),
        )
}

#[test]
fn test_config_file_drives_the_registry() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("mapping.json");
    let mut file = std::fs::File::create(&path)?;
    write!(
        file,
        r#"{{"repository_name": "orders-catalog", "native_version": "11.5.0.2", "page_size": 2}}"#
    )?;

    let config = MappingConfig::from_json_file(&path)?;
    let registry = standard_registry(config)?;
    let catalog = catalog();
    let mut ctx = registry.context(&catalog);

    let mapped = registry
        .get_entity(&mut ctx, &Rid::new("s1"), None, FidelityLevel::Detail)?
        .ok_or_else(|| anyhow::anyhow!("schema missing"))?;
    assert_eq!(mapped.entity.metadata_collection, "orders-catalog");
    assert_eq!(
        mapped.entity.qualified_name(),
        Some("(host)=db-host-01::(database)=ORDERS::(database_schema)=PUBLIC")
    );
    assert!(mapped
        .relationships
        .iter()
        .all(|r| r.metadata_collection == "orders-catalog"));
    Ok(())
}

#[test]
fn test_guid_namespace_changes_identity() -> anyhow::Result<()> {
    let catalog = catalog();
    let default = standard_registry(MappingConfig::default())?;
    let other = standard_registry(MappingConfig {
        guid_namespace: Uuid::parse_str("6ba7b811-9dad-11d1-80b4-00c04fd430c8")?,
        ..MappingConfig::default()
    })?;

    let guid = |registry: &catbridge_mapping::MapperRegistry| -> anyhow::Result<_> {
        let mut ctx = registry.context(&catalog);
        let mapped = registry
            .get_entity(&mut ctx, &Rid::new("d1"), None, FidelityLevel::Summary)?
            .ok_or_else(|| anyhow::anyhow!("database missing"))?;
        Ok(mapped.entity.guid)
    };
    assert_eq!(guid(&default)?, guid(&default)?);
    assert_ne!(guid(&default)?, guid(&other)?);
    Ok(())
}

#[test]
fn test_search_then_sync_cycle() -> anyhow::Result<()> {
    init_tracing();
    let mut catalog = catalog();
    let registry = standard_registry(MappingConfig::default())?;
    let engine = ChangeSetEngine::new();

    // Initial load: everything modified before day 3.
    let first = ChangeWindow::new(at(1), at(3))?;
    let mut feed = WindowedChangeFeed::new(&registry);
    let baseline = {
        let mut ctx = registry.context(&catalog);
        let loaded = feed.changed_entities(&mut ctx, first, FidelityLevel::Detail)?;
        assert!(loaded.is_clean());
        let mut types: Vec<_> = loaded.items.iter().map(|m| m.entity.type_name.clone()).collect();
        types.sort();
        assert_eq!(
            types,
            vec!["DataClass", "Database", "DeployedDatabaseSchema", "RelationalColumn", "RelationalDBSchemaType"]
        );

        let criteria = SearchCriteria::all(vec![PropertyMatch::exact("dataType", "VARCHAR")]);
        let found = registry.find_entities(&mut ctx, "RelationalColumn", &criteria, FidelityLevel::Summary)?;
        assert_eq!(found.items.len(), 1);

        StubSnapshot::capture(
            catalog
                .asset(&Rid::new("col1"))
                .ok_or_else(|| anyhow::anyhow!("column missing"))?,
        )
    };

    // The column is retyped and picks up a detected data class.
    catalog.insert(column_asset(6, "NVARCHAR", vec![detection()]));

    let second = ChangeWindow::new(at(3), at(7))?;
    let mut ctx = registry.context(&catalog);
    let changed = feed.changed_entities(&mut ctx, second, FidelityLevel::Detail)?;
    assert_eq!(changed.items.len(), 1);
    let column_entity = &changed.items[0];
    assert_eq!(column_entity.entity.type_name, "RelationalColumn");
    assert_eq!(column_entity.relationships.len(), 1);
    assert_eq!(
        column_entity.relationships[0].property("confidence"),
        Some(&catbridge_model::CanonicalValue::Int(97))
    );

    let relationships = feed.changed_relationships(&mut ctx, second)?;
    assert_eq!(relationships.items.len(), 1);
    assert_eq!(relationships.items[0].guid, column_entity.relationships[0].guid);

    let current = catalog
        .asset(&Rid::new("col1"))
        .ok_or_else(|| anyhow::anyhow!("column missing"))?;
    assert!(baseline.is_older_than(current.modified_on()));
    let changes = engine.diff(&current.properties, &baseline);
    assert_eq!(changes.op_for("data_type"), Some(ChangeOp::Replace));
    assert_eq!(changes.op_for("detected_classifications"), Some(ChangeOp::Add));
    assert_eq!(changes.op_for(MODIFIED_ON), Some(ChangeOp::Replace));
    assert!(changes.unchanged_properties().contains(CONTEXT));
    assert!(changes.unchanged_properties().contains(NAME));

    let records: Vec<String> = changes.records().iter().map(|r| format!("{} {}", r.op, r.path)).collect();
    assert!(records.contains(&"replace /data_type".to_string()));
    Ok(())
}

#[test]
fn test_unchanged_asset_has_empty_change_set() {
    let catalog = catalog();
    let asset = catalog.asset(&Rid::new("d1")).unwrap();
    let stub = StubSnapshot::capture(asset);
    let changes = ChangeSetEngine::new().diff(&asset.properties, &stub);
    assert!(changes.is_empty());
    assert_eq!(changes.unchanged_properties().len(), asset.properties.len());
}
