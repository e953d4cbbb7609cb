//! Entity, relationship and classification mapping against the in-memory
//! catalog.

mod common;

use catbridge_mapping::catalog::{SCHEMA_TYPE_PREFIX, SUBJECT_AREA};
use catbridge_mapping::{FidelityLevel, MappedEntity, MapperRegistry, MappingConfig, NativeVersion};
use catbridge_model::{
    CanonicalRelationship, CanonicalValue, GenerationPrefix, MappingError, NativeRef, QUALIFIED_NAME,
};
use common::*;

fn get(registry: &MapperRegistry, catalog: &catbridge_mapping::InMemoryCatalog, id: &str, level: FidelityLevel) -> MappedEntity {
    let mut ctx = registry.context(catalog);
    registry
        .get_entity(&mut ctx, &rid(id), None, level)
        .unwrap()
        .unwrap()
}

fn by_type<'a>(relationships: &'a [CanonicalRelationship], type_name: &str) -> Vec<&'a CanonicalRelationship> {
    relationships.iter().filter(|r| r.type_name == type_name).collect()
}

fn status(r: &CanonicalRelationship) -> &str {
    r.property("status").and_then(CanonicalValue::as_str).unwrap_or_default()
}

#[test]
fn database_maps_with_two_relationships() {
    let catalog = catalog();
    let registry = registry();
    let mapped = get(&registry, &catalog, "d1", FidelityLevel::Detail);

    assert_eq!(mapped.entity.type_name, "Database");
    assert_eq!(mapped.entity.qualified_name(), Some("(host)=h1::(database)=SALES"));
    assert_eq!(mapped.entity.property("type"), Some(&CanonicalValue::string("DB2")));
    assert_eq!(mapped.entity.property("version"), Some(&CanonicalValue::string("11.5")));
    assert_eq!(mapped.entity.version, at(1).timestamp_millis());
    assert_eq!(mapped.entity.metadata_collection, "native-catalog");

    assert_eq!(mapped.relationships.len(), 2);
    let content = by_type(&mapped.relationships, "DataContentForDataSet");
    let connection = by_type(&mapped.relationships, "ConnectionToAsset");
    assert_eq!((content.len(), connection.len()), (1, 1));

    // Proxies identify the same entities mapping the endpoints directly does.
    let schema = get(&registry, &catalog, "s1", FidelityLevel::Summary);
    let conn = get(&registry, &catalog, "conn1", FidelityLevel::Summary);
    assert_eq!(content[0].proxy1.guid, mapped.entity.guid);
    assert_eq!(content[0].proxy2.guid, schema.entity.guid);
    assert_eq!(content[0].proxy2.qualified_name(), schema.entity.qualified_name());
    assert_eq!(connection[0].proxy1.guid, conn.entity.guid);
    assert_eq!(connection[0].proxy1.qualified_name(), conn.entity.qualified_name());
    assert_eq!(connection[0].proxy2.guid, mapped.entity.guid);
    assert_eq!(
        content[0].proxy2.unique_properties.keys().collect::<Vec<_>>(),
        vec![QUALIFIED_NAME]
    );
}

#[test]
fn relationships_agree_from_either_end() {
    let catalog = catalog();
    let registry = registry();
    let database = get(&registry, &catalog, "d1", FidelityLevel::Detail);
    let schema = get(&registry, &catalog, "s1", FidelityLevel::Detail);

    let from_database = by_type(&database.relationships, "DataContentForDataSet");
    let from_schema = by_type(&schema.relationships, "DataContentForDataSet");
    assert_eq!(from_database, from_schema);
    assert_eq!(from_schema[0].version, at(2).timestamp_millis());
}

#[test]
fn mapping_is_idempotent() {
    let catalog = catalog();
    let registry = registry();
    for id in ["d1", "s1", "col1", "dc1", "c3", "pol1"] {
        let first = get(&registry, &catalog, id, FidelityLevel::Detail);
        let second = get(&registry, &catalog, id, FidelityLevel::Detail);
        assert_eq!(first, second, "{id}");
    }
}

#[test]
fn summary_never_resolves_relationships() {
    let catalog = catalog();
    let registry = registry();

    let summary = get(&registry, &catalog, "d1", FidelityLevel::Summary);
    assert!(summary.relationships.is_empty());
    assert_eq!(summary.entity.properties.len(), 1);
    assert_eq!(catalog.total_property_calls(), 0);
    assert_eq!(catalog.property_calls(&rid("s1"), "_context"), 0);

    get(&registry, &catalog, "d1", FidelityLevel::Detail);
    assert_eq!(catalog.property_calls(&rid("s1"), "_context"), 1);
}

#[test]
fn each_property_is_fetched_at_most_once_per_call() {
    let catalog = catalog();
    let registry = registry();
    for id in ["col1", "dc1", "d1"] {
        catalog.reset_calls();
        get(&registry, &catalog, id, FidelityLevel::Detail);
        assert!(catalog.max_property_calls() <= 1, "{id}");
    }
}

#[test]
fn derived_view_has_its_own_identity() {
    let catalog = catalog();
    let registry = registry();
    let prefix = GenerationPrefix::new(SCHEMA_TYPE_PREFIX).unwrap();

    let mut ctx = registry.context(&catalog);
    let view = registry
        .get_entity(&mut ctx, &rid("s1"), Some(&prefix), FidelityLevel::Detail)
        .unwrap()
        .unwrap();
    let schema = get(&registry, &catalog, "s1", FidelityLevel::Detail);

    assert_eq!(view.entity.type_name, "RelationalDBSchemaType");
    assert_ne!(view.entity.guid, schema.entity.guid);
    assert_eq!(
        view.entity.qualified_name(),
        Some("gen!RDBST@(host)=h1::(database)=SALES::(database_schema)=PAYROLL")
    );

    let link = by_type(&schema.relationships, "AssetSchemaType");
    assert_eq!(link.len(), 1);
    assert_eq!(link[0].proxy1.guid, schema.entity.guid);
    assert_eq!(link[0].proxy2.guid, view.entity.guid);
    assert_eq!(by_type(&view.relationships, "AssetSchemaType"), link);
}

#[test]
fn column_carries_both_assignment_representations() {
    let catalog = catalog();
    let registry = registry();
    let column = get(&registry, &catalog, "col1", FidelityLevel::Detail);
    let salary = get(&registry, &catalog, "dc1", FidelityLevel::Summary);
    let bonus = get(&registry, &catalog, "dc2", FidelityLevel::Summary);

    let assignments = by_type(&column.relationships, "DataClassAssignment");
    assert_eq!(assignments.len(), 2);

    let proposed: Vec<_> = assignments.iter().filter(|r| status(r) == "Proposed").collect();
    assert_eq!(proposed.len(), 1);
    assert_eq!(proposed[0].proxy2.guid, salary.entity.guid);
    assert!(proposed[0].property("confidence").is_none());

    let discovered: Vec<_> = assignments.iter().filter(|r| status(r) == "Discovered").collect();
    assert_eq!(discovered.len(), 1);
    let d = discovered[0];
    assert_eq!(d.proxy1.guid, column.entity.guid);
    assert_eq!(d.proxy2.guid, bonus.entity.guid);
    assert_eq!(d.property("confidence"), Some(&CanonicalValue::Int(85)));
    assert_eq!(d.property("partialMatch"), Some(&CanonicalValue::Boolean(true)));
    assert_eq!(d.property("threshold"), Some(&CanonicalValue::Float(0.8)));
    assert_eq!(d.property("valueFrequency"), Some(&CanonicalValue::Long(12)));
    assert_eq!(d.version, at(5).timestamp_millis());
    assert!(d.property("steward").is_none());
}

#[test]
fn value_frequency_needs_a_recent_catalog() {
    let catalog = catalog();
    let registry = registry_with(MappingConfig {
        native_version: NativeVersion::V11502,
        ..MappingConfig::default()
    });
    let column = get(&registry, &catalog, "col1", FidelityLevel::Detail);
    let discovered: Vec<_> = column
        .relationships
        .iter()
        .filter(|r| status(r) == "Discovered")
        .collect();
    assert_eq!(discovered.len(), 1);
    assert!(discovered[0].property("valueFrequency").is_none());
    assert!(discovered[0].property("confidence").is_some());
}

#[test]
fn placeholder_endpoints_are_excluded() {
    let catalog = catalog();
    let registry = registry();
    let class = get(&registry, &catalog, "dc1", FidelityLevel::Detail);

    // Proposed for SALARY (the placeholder is dropped), discovered for BONUS.
    assert_eq!(class.relationships.len(), 2);
    assert!(class
        .relationships
        .iter()
        .all(|r| r.proxy1.type_name == "RelationalColumn" && r.proxy2.guid == class.entity.guid));
    assert_eq!(catalog.get_by_id_calls(&rid("mo1")), 0);
    assert_eq!(catalog.property_calls(&rid("mo1"), "_context"), 0);
}

#[test]
fn carrier_endpoint_is_fetched_when_first_fetch_lacks_it() {
    let catalog = catalog().withhold("cl2", "data_class");
    let registry = registry();
    let column = get(&registry, &catalog, "col2", FidelityLevel::Detail);

    assert_eq!(column.relationships.len(), 1);
    let r = &column.relationships[0];
    assert_eq!(r.proxy2.qualified_name(), Some("(data_class)=Salary"));
    assert_eq!(r.property("partialMatch"), Some(&CanonicalValue::Boolean(false)));
    assert_eq!(catalog.property_calls(&rid("cl2"), "data_class"), 1);
}

#[test]
fn carrier_participates_in_relationship_identity() {
    let catalog = catalog();
    let registry = registry();
    let column = get(&registry, &catalog, "col2", FidelityLevel::Detail);
    let class = get(&registry, &catalog, "dc1", FidelityLevel::Detail);

    let discovered = &column.relationships[0];
    let same = class.relationships.iter().find(|r| r.guid == discovered.guid);
    assert_eq!(same, Some(discovered));

    let salary = get(&registry, &catalog, "col1", FidelityLevel::Detail);
    let proposed = salary.relationships.iter().find(|r| status(r) == "Proposed").unwrap();
    assert_ne!(proposed.guid, discovered.guid);
}

#[test]
fn paged_reference_lists_are_drained() {
    let catalog = catalog().with_list_page_size(1);
    let registry = registry();
    let class = get(&registry, &catalog, "dc1", FidelityLevel::Detail);
    assert_eq!(class.relationships.len(), 2);
}

#[test]
fn subject_area_follows_the_marker_chain() {
    let catalog = catalog();
    let registry = registry();
    let area = |id: &str| {
        get(&registry, &catalog, id, FidelityLevel::Summary)
            .entity
            .classification(SUBJECT_AREA)
            .and_then(|c| c.properties.get("name").cloned())
    };

    assert_eq!(area("c3"), Some(CanonicalValue::string("Finance")));
    assert_eq!(area("c2"), Some(CanonicalValue::string("Finance")));
    assert_eq!(area("c4"), None);
    assert_eq!(area("c1"), None);
}

#[test]
fn subject_area_respects_the_hop_bound() {
    let catalog = catalog();
    let registry = registry_with(MappingConfig {
        subject_area_max_hops: 1,
        ..MappingConfig::default()
    });
    let mapped = get(&registry, &catalog, "c3", FidelityLevel::Summary);
    assert!(mapped.entity.classification(SUBJECT_AREA).is_none());
    let mapped = get(&registry, &catalog, "c2", FidelityLevel::Summary);
    assert!(mapped.entity.classification(SUBJECT_AREA).is_some());
}

#[test]
fn governance_domain_comes_from_the_parent_policy() {
    let catalog = catalog();
    let registry = registry();
    let policy = get(&registry, &catalog, "pol1", FidelityLevel::Detail);
    assert_eq!(policy.entity.property("title"), Some(&CanonicalValue::string("GDPR")));
    assert_eq!(policy.entity.property("summary"), Some(&CanonicalValue::string("EU data protection")));
    assert_eq!(policy.entity.property("domain"), Some(&CanonicalValue::string("Privacy")));
    assert!(policy.entity.property("scope").is_none());
}

#[test]
fn unmapped_types_are_unsupported() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);
    let err = registry
        .get_entity(&mut ctx, &rid("h1"), None, FidelityLevel::Summary)
        .unwrap_err();
    assert!(matches!(err, MappingError::UnsupportedType { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn batches_skip_failing_assets() {
    let catalog = catalog().fail_on("s1");
    let registry = registry();
    let refs = vec![database(), schema(), connection(), NativeRef::asset("h1", "host", "h1")];

    let mut ctx = registry.context(&catalog);
    let outcome = registry.map_entities(&mut ctx, &refs, None, FidelityLevel::Summary);
    assert_eq!(outcome.items.len(), 2);
    let skipped: Vec<_> = outcome.warnings.iter().map(|w| w.rid.to_string()).collect();
    assert_eq!(skipped, vec!["s1", "h1"]);

    // At detail the database reaches into the failing schema and is skipped too.
    let mut ctx = registry.context(&catalog);
    let err = registry
        .get_entity(&mut ctx, &rid("d1"), None, FidelityLevel::Detail)
        .unwrap_err();
    assert!(matches!(err, MappingError::ExternalCallFailure { .. }));
}

#[test]
fn parallel_batches_match_sequential_ones() {
    let catalog = catalog();
    let registry = registry();
    let refs = vec![database(), schema(), connection(), salary(), bonus(), salary_class()];

    let mut ctx = registry.context(&catalog);
    let sequential = registry.map_entities(&mut ctx, &refs, None, FidelityLevel::Detail);
    let parallel = registry.map_entities_parallel(&catalog, &refs, None, FidelityLevel::Detail);
    assert!(parallel.is_clean());
    assert_eq!(sequential, parallel);
}
