//! The standard mapper set for the native catalog's relational and
//! governance assets.
//!
//! | native type                     | canonical type           |
//! |---------------------------------|--------------------------|
//! | `database`                      | `Database`               |
//! | `database_schema`               | `DeployedDatabaseSchema` |
//! | `database_schema` + `RDBST`     | `RelationalDBSchemaType` |
//! | `data_connection`               | `Connection`             |
//! | `database_column`               | `RelationalColumn`       |
//! | `data_class`                    | `DataClass`              |
//! | `category`                      | `GlossaryCategory`       |
//! | `information_governance_policy` | `GovernancePolicy`       |
//!
//! Shared supertype tables (Referenceable, Asset, GovernanceDefinition) are
//! plain row lists concatenated into each mapper.

use crate::classification::AncestorMarkerClassifier;
use crate::client::{PropertyKind, StaticTypeDefinitions};
use crate::config::MappingConfig;
use crate::entity::EntityMapper;
use crate::property::{PropertyMapping, QualifiedNameProperty, ReferenceNameProperty};
use crate::registry::{MapperRegistry, RegistryError};
use crate::relationship::{
    DataClassAssignmentMapper, DirectRelationshipMapper, Endpoint, EndpointLink, RelationshipMapper,
};
use catbridge_model::{GenerationPrefix, QUALIFIED_NAME};
use std::sync::Arc;

/// Prefix of the schema-type view over `database_schema`.
pub const SCHEMA_TYPE_PREFIX: &str = "RDBST";

pub const SUBJECT_AREA: &str = "SubjectArea";

fn referenceable() -> Vec<PropertyMapping> {
    vec![PropertyMapping::complex(QUALIFIED_NAME, QualifiedNameProperty)]
}

fn asset() -> Vec<PropertyMapping> {
    let mut rows = referenceable();
    rows.extend([
        PropertyMapping::simple("name", "name"),
        PropertyMapping::simple("short_description", "description"),
    ]);
    rows
}

fn governance_definition() -> Vec<PropertyMapping> {
    let mut rows = referenceable();
    rows.extend([
        PropertyMapping::simple("name", "title"),
        PropertyMapping::simple("short_description", "summary"),
        PropertyMapping::simple("long_description", "description"),
        PropertyMapping::complex("domain", ReferenceNameProperty::new("parent_policy")),
        PropertyMapping::literal_null("scope"),
        PropertyMapping::literal_null("priority"),
        PropertyMapping::literal_null("implications"),
        PropertyMapping::literal_null("outcomes"),
        PropertyMapping::literal_null("results"),
    ]);
    rows
}

/// Canonical types produced by [`standard_registry`].
pub fn standard_type_definitions() -> StaticTypeDefinitions {
    use PropertyKind as K;

    let referenceable = [(QUALIFIED_NAME, K::String)];
    let asset = [(QUALIFIED_NAME, K::String), ("name", K::String), ("description", K::String)];

    StaticTypeDefinitions::new()
        .with_type("Database", &asset)
        .with_type(
            "Database",
            &[
                ("type", K::String),
                ("version", K::String),
                ("instance", K::String),
                ("importedFrom", K::String),
            ],
        )
        .with_type("DeployedDatabaseSchema", &asset)
        .with_type("RelationalDBSchemaType", &referenceable)
        .with_type("RelationalDBSchemaType", &[("displayName", K::String)])
        .with_type("Connection", &referenceable)
        .with_type("Connection", &[("displayName", K::String), ("description", K::String)])
        .with_type("RelationalColumn", &referenceable)
        .with_type(
            "RelationalColumn",
            &[
                ("displayName", K::String),
                ("dataType", K::String),
                ("length", K::Int),
                ("position", K::Int),
                ("isNullable", K::Boolean),
            ],
        )
        .with_type("DataClass", &referenceable)
        .with_type("DataClass", &[("name", K::String), ("description", K::String)])
        .with_type("GlossaryCategory", &referenceable)
        .with_type("GlossaryCategory", &[("displayName", K::String), ("description", K::String)])
        .with_type("GovernancePolicy", &referenceable)
        .with_type(
            "GovernancePolicy",
            &[
                ("title", K::String),
                ("summary", K::String),
                ("description", K::String),
                ("domain", K::String),
                ("scope", K::String),
                ("priority", K::String),
                ("implications", K::String),
                ("outcomes", K::String),
                ("results", K::String),
            ],
        )
        .with_type("DataContentForDataSet", &[])
        .with_type("ConnectionToAsset", &[])
        .with_type("AssetSchemaType", &[])
        .with_type(
            "DataClassAssignment",
            &[
                ("confidence", K::Int),
                ("partialMatch", K::Boolean),
                ("threshold", K::Float),
                ("valueFrequency", K::Long),
                ("status", K::Enum),
                ("method", K::String),
                ("steward", K::String),
                ("source", K::String),
            ],
        )
}

/// Build the standard registry for `config`.
pub fn standard_registry(config: MappingConfig) -> Result<MapperRegistry, RegistryError> {
    let schema_type = GenerationPrefix::new(SCHEMA_TYPE_PREFIX)?;

    let database = Endpoint::new("database", "Database");
    let schema = Endpoint::new("database_schema", "DeployedDatabaseSchema");
    let schema_view = Endpoint::new("database_schema", "RelationalDBSchemaType").with_prefix(schema_type.clone());
    let connection = Endpoint::new("data_connection", "Connection");
    let column = Endpoint::new("database_column", "RelationalColumn");
    let data_class = Endpoint::new("data_class", "DataClass");

    let data_content: Arc<dyn RelationshipMapper> = Arc::new(DirectRelationshipMapper::new(
        "DataContentForDataSet",
        (database.clone(), EndpointLink::property("database_schemas")),
        (schema.clone(), EndpointLink::property("database")),
    ));
    let connection_to_asset: Arc<dyn RelationshipMapper> = Arc::new(DirectRelationshipMapper::new(
        "ConnectionToAsset",
        (connection, EndpointLink::property("imports_database")),
        (database, EndpointLink::property("data_connections")),
    ));
    let asset_schema_type: Arc<dyn RelationshipMapper> = Arc::new(DirectRelationshipMapper::new(
        "AssetSchemaType",
        (schema, EndpointLink::SameAsset),
        (schema_view, EndpointLink::SameAsset),
    ));
    let data_class_assignment: Arc<dyn RelationshipMapper> = Arc::new(DataClassAssignmentMapper::new(
        column,
        data_class,
        config.native_version,
    ));
    let subject_area = Arc::new(AncestorMarkerClassifier::new(
        SUBJECT_AREA,
        "parent_category",
        &config.subject_area_marker,
        config.subject_area_max_hops,
    ));

    MapperRegistry::builder(config)
        .with_type_definitions(Arc::new(standard_type_definitions()))
        .register(
            EntityMapper::new("database", "Database")
                .with_properties(asset())
                .with_properties([
                    PropertyMapping::simple("dbms", "type"),
                    PropertyMapping::simple("dbms_version", "version"),
                    PropertyMapping::simple("dbms_server_instance", "instance"),
                    PropertyMapping::simple("imported_from", "importedFrom"),
                ])
                .with_relationship(Arc::clone(&data_content))
                .with_relationship(Arc::clone(&connection_to_asset)),
        )
        .register(
            EntityMapper::new("database_schema", "DeployedDatabaseSchema")
                .with_properties(asset())
                .with_relationship(Arc::clone(&data_content))
                .with_relationship(Arc::clone(&asset_schema_type)),
        )
        .register(
            EntityMapper::new("database_schema", "RelationalDBSchemaType")
                .with_prefix(schema_type)
                .with_properties(referenceable())
                .with_properties([PropertyMapping::simple("name", "displayName")])
                .with_relationship(Arc::clone(&asset_schema_type)),
        )
        .register(
            EntityMapper::new("data_connection", "Connection")
                .with_properties(referenceable())
                .with_properties([
                    PropertyMapping::simple("name", "displayName"),
                    PropertyMapping::simple("short_description", "description"),
                ])
                .with_relationship(Arc::clone(&connection_to_asset)),
        )
        .register(
            EntityMapper::new("database_column", "RelationalColumn")
                .with_properties(referenceable())
                .with_properties([
                    PropertyMapping::simple("name", "displayName"),
                    PropertyMapping::simple("data_type", "dataType"),
                    PropertyMapping::simple("length", "length"),
                    PropertyMapping::simple("position", "position"),
                    PropertyMapping::simple("allows_null_values", "isNullable"),
                ])
                .with_relationship(Arc::clone(&data_class_assignment)),
        )
        .register(
            EntityMapper::new("data_class", "DataClass")
                .with_properties(referenceable())
                .with_properties([
                    PropertyMapping::simple("name", "name"),
                    PropertyMapping::simple("short_description", "description"),
                ])
                .with_relationship(Arc::clone(&data_class_assignment)),
        )
        .register(
            EntityMapper::new("category", "GlossaryCategory")
                .with_properties(referenceable())
                .with_properties([
                    PropertyMapping::simple("name", "displayName"),
                    PropertyMapping::simple("short_description", "description"),
                ])
                .with_classification(subject_area),
        )
        .register(
            EntityMapper::new("information_governance_policy", "GovernancePolicy")
                .with_properties(governance_definition()),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_builds() {
        let registry = standard_registry(MappingConfig::default()).unwrap();
        assert_eq!(registry.entity_mappers().count(), 8);
        assert_eq!(registry.relationship_mappers().count(), 4);
        assert!(registry.native_types().contains("classification"));
        assert!(registry.mapper_for("RelationalDBSchemaType").unwrap().prefix().is_some());
    }

    #[test]
    fn governance_table_carries_literal_nulls() {
        let registry = standard_registry(MappingConfig::default()).unwrap();
        let mapper = registry.mapper_for("GovernancePolicy").unwrap();
        let literals = mapper
            .table()
            .iter()
            .filter(|row| matches!(row, PropertyMapping::Literal { value: None, .. }))
            .count();
        assert_eq!(literals, 5);
    }
}
