//! Shared native catalog fixture.
//!
//! ```text
//!   (host) h1
//!     └─ (database) d1 SALES ──data_connections──► (data_connection) conn1
//!          └─ (database_schema) s1 PAYROLL
//!               ├─ (database_column) col1 SALARY ─selected──► (data_class) dc1 Salary
//!               │        └─detected──► [cl1] ──► (data_class) dc2 Bonus   85%
//!               └─ (database_column) col2 BONUS
//!                        └─detected──► [cl2] ──► (data_class) dc1 Salary  100%
//!
//!   categories: Glossary ─ Subject Area ─ Finance ─ Payroll
//!               Glossary ─ Misc
//! ```

#![allow(dead_code)]

use catbridge_mapping::{standard_registry, InMemoryCatalog, MapperRegistry, MappingConfig};
use catbridge_model::{NativeAsset, NativeRef, Rid, CONTEXT, MODIFIED_ON, NAME};
use chrono::{DateTime, TimeZone, Utc};

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

pub fn rid(id: &str) -> Rid {
    Rid::new(id)
}

fn asset(r: &NativeRef, hour: u32) -> NativeAsset {
    NativeAsset::new(r.clone())
        .with_property(NAME, r.display_name())
        .with_property(MODIFIED_ON, at(hour))
}

pub fn host() -> NativeRef {
    NativeRef::asset("h1", "host", "h1")
}
pub fn database() -> NativeRef {
    NativeRef::asset("d1", "database", "SALES")
}
pub fn schema() -> NativeRef {
    NativeRef::asset("s1", "database_schema", "PAYROLL")
}
pub fn connection() -> NativeRef {
    NativeRef::asset("conn1", "data_connection", "SALES_CONN")
}
pub fn salary() -> NativeRef {
    NativeRef::asset("col1", "database_column", "SALARY")
}
pub fn bonus() -> NativeRef {
    NativeRef::asset("col2", "database_column", "BONUS")
}
pub fn salary_class() -> NativeRef {
    NativeRef::asset("dc1", "data_class", "Salary")
}
pub fn bonus_class() -> NativeRef {
    NativeRef::asset("dc2", "data_class", "Bonus")
}
pub fn detected_bonus() -> NativeRef {
    NativeRef::link_object("cl1", "classification")
}
pub fn detected_salary() -> NativeRef {
    NativeRef::link_object("cl2", "classification")
}

fn category(id: &str, name: &str, parent: Option<NativeRef>) -> NativeAsset {
    let r = NativeRef::asset(id, "category", name);
    let mut a = asset(&r, 6);
    if let Some(parent) = parent {
        a = a.with_property("parent_category", parent);
    }
    a
}

pub fn catalog() -> InMemoryCatalog {
    let glossary = NativeRef::asset("c0", "category", "Glossary");
    let marker = NativeRef::asset("c1", "category", "Subject Area");
    let finance = NativeRef::asset("c2", "category", "Finance");
    let policies = NativeRef::asset("pol0", "information_governance_policy", "Privacy");

    InMemoryCatalog::new()
        .with_asset(asset(&host(), 0))
        .with_asset(
            asset(&database(), 1)
                .with_property("dbms", "DB2")
                .with_property("dbms_version", "11.5")
                .with_property(CONTEXT, vec![host()])
                .with_property("database_schemas", vec![schema()])
                .with_property("data_connections", vec![connection()]),
        )
        .with_asset(
            asset(&schema(), 2)
                .with_property(CONTEXT, vec![host(), database()])
                .with_property("database", database()),
        )
        .with_asset(
            asset(&connection(), 1)
                .with_property(CONTEXT, Vec::<NativeRef>::new())
                .with_property("imports_database", database()),
        )
        .with_asset(
            asset(&salary(), 3)
                .with_property(CONTEXT, vec![host(), database(), schema()])
                .with_property("data_type", "DECIMAL")
                .with_property("length", 12i64)
                .with_property("selected_classification", salary_class())
                .with_property("detected_classifications", vec![detected_bonus()]),
        )
        .with_asset(
            asset(&bonus(), 3)
                .with_property(CONTEXT, vec![host(), database(), schema()])
                .with_property("detected_classifications", vec![detected_salary()]),
        )
        .with_asset(
            asset(&salary_class(), 4)
                .with_property(CONTEXT, Vec::<NativeRef>::new())
                .with_property(
                    "classifications_selected",
                    vec![salary(), NativeRef::placeholder("mo1")],
                ),
        )
        .with_asset(asset(&bonus_class(), 4).with_property(CONTEXT, Vec::<NativeRef>::new()))
        .with_asset(
            NativeAsset::new(detected_bonus())
                .with_property(MODIFIED_ON, at(5))
                .with_property("classifies_asset", salary())
                .with_property("data_class", bonus_class())
                .with_property("confidencePercent", 85i64)
                .with_property("threshold", 0.8f64)
                .with_property("value_frequency", 12i64),
        )
        .with_asset(
            NativeAsset::new(detected_salary())
                .with_property(MODIFIED_ON, at(5))
                .with_property("classifies_asset", bonus())
                .with_property("data_class", salary_class())
                .with_property("confidencePercent", 100i64)
                .with_property("threshold", 0.5f64),
        )
        .with_asset(category("c0", "Glossary", None))
        .with_asset(category("c1", "Subject Area", Some(glossary.clone())))
        .with_asset(category("c2", "Finance", Some(marker)))
        .with_asset(category("c3", "Payroll", Some(finance)))
        .with_asset(category("c4", "Misc", Some(glossary)))
        .with_asset(asset(&policies, 7).with_property("short_description", "Privacy policies"))
        .with_asset(
            asset(&NativeRef::asset("pol1", "information_governance_policy", "GDPR"), 7)
                .with_property("short_description", "EU data protection")
                .with_property("parent_policy", policies),
        )
}

pub fn registry() -> MapperRegistry {
    standard_registry(MappingConfig::default()).unwrap()
}

pub fn registry_with(config: MappingConfig) -> MapperRegistry {
    standard_registry(config).unwrap()
}
