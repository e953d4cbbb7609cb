//! Canonical searches translated into native queries and run against the
//! in-memory catalog.

mod common;

use catbridge_mapping::catalog::SUBJECT_AREA;
use catbridge_mapping::{FidelityLevel, MatchOperator, PropertyMatch, SearchCriteria};
use catbridge_model::{
    CanonicalValue, MappingError, NativeAsset, NativeRef, CONTEXT, MODIFIED_ON, NAME, QUALIFIED_NAME,
};
use common::*;

fn names(outcome: &catbridge_mapping::BatchOutcome<catbridge_mapping::MappedEntity>) -> Vec<String> {
    let mut names: Vec<String> = outcome
        .items
        .iter()
        .filter_map(|m| m.entity.qualified_name().map(str::to_string))
        .collect();
    names.sort();
    names
}

#[test]
fn finds_entities_by_name() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::exact("name", "SALES")]);
    let found = registry
        .find_entities(&mut ctx, "Database", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert!(found.is_clean());
    assert_eq!(names(&found), vec!["(host)=h1::(database)=SALES"]);
}

#[test]
fn finds_entities_by_qualified_name() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let exact = SearchCriteria::all(vec![PropertyMatch::exact(QUALIFIED_NAME, "(host)=h1::(database)=SALES")]);
    let found = registry
        .find_entities(&mut ctx, "Database", &exact, FidelityLevel::Detail)
        .unwrap();
    assert_eq!(found.items.len(), 1);

    // The native query matches on the name alone; the full name is checked
    // after mapping.
    let elsewhere = SearchCriteria::all(vec![PropertyMatch::exact(QUALIFIED_NAME, "(host)=h2::(database)=SALES")]);
    let found = registry
        .find_entities(&mut ctx, "Database", &elsewhere, FidelityLevel::Summary)
        .unwrap();
    assert!(found.items.is_empty());
}

#[test]
fn qualified_name_suffix_may_start_before_the_name() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::new(
        QUALIFIED_NAME,
        MatchOperator::EndsWith,
        "=SALES",
    )]);
    let found = registry
        .find_entities(&mut ctx, "Database", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(names(&found), vec!["(host)=h1::(database)=SALES"]);

    let crossing = SearchCriteria::all(vec![PropertyMatch::new(
        QUALIFIED_NAME,
        MatchOperator::EndsWith,
        "h1::(database)=SALES",
    )]);
    let found = registry
        .find_entities(&mut ctx, "Database", &crossing, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(found.items.len(), 1);
}

#[test]
fn free_text_suffix_may_start_before_the_name() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::text(MatchOperator::EndsWith, "=SALES");
    let found = registry
        .find_entities(&mut ctx, "Database", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(names(&found), vec!["(host)=h1::(database)=SALES"]);
}

#[test]
fn finds_names_containing_segment_separators() {
    let odd = NativeRef::asset("d9", "database", "A::B");
    let catalog = catalog().with_asset(
        NativeAsset::new(odd.clone())
            .with_property(NAME, odd.display_name())
            .with_property(MODIFIED_ON, at(1))
            .with_property(CONTEXT, vec![host()]),
    );
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let qn = "(host)=h1::(database)=A::B";
    let criteria = SearchCriteria::all(vec![PropertyMatch::exact(QUALIFIED_NAME, qn)]);
    let found = registry
        .find_entities(&mut ctx, "Database", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(names(&found), vec![qn]);
}

#[test]
fn finds_derived_views_by_qualified_name() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let qn = "gen!RDBST@(host)=h1::(database)=SALES::(database_schema)=PAYROLL";
    let criteria = SearchCriteria::all(vec![PropertyMatch::exact(QUALIFIED_NAME, qn)]);
    let found = registry
        .find_entities(&mut ctx, "RelationalDBSchemaType", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(names(&found), vec![qn]);

    // Without the marker the name cannot belong to a derived view.
    catalog.reset_calls();
    let plain = SearchCriteria::all(vec![PropertyMatch::exact(
        QUALIFIED_NAME,
        "(host)=h1::(database)=SALES::(database_schema)=PAYROLL",
    )]);
    let found = registry
        .find_entities(&mut ctx, "RelationalDBSchemaType", &plain, FidelityLevel::Summary)
        .unwrap();
    assert!(found.items.is_empty());
    assert_eq!(catalog.search_calls(), 0);
}

#[test]
fn unknown_property_forces_zero_rows_without_a_search() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![
        PropertyMatch::exact("name", "SALES"),
        PropertyMatch::exact("noSuchProperty", "x"),
    ]);
    let found = registry
        .find_entities(&mut ctx, "Database", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert!(found.items.is_empty());
    assert_eq!(catalog.search_calls(), 0);
}

#[test]
fn literal_null_properties_never_match() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::exact("scope", "global")]);
    let found = registry
        .find_entities(&mut ctx, "GovernancePolicy", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert!(found.items.is_empty());
    assert_eq!(catalog.search_calls(), 0);
}

#[test]
fn any_combinator_drops_unsatisfiable_predicates() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::any(vec![
        PropertyMatch::exact("scope", "global"),
        PropertyMatch::exact("title", "GDPR"),
    ]);
    let found = registry
        .find_entities(&mut ctx, "GovernancePolicy", &criteria, FidelityLevel::Detail)
        .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].entity.property("title"), Some(&CanonicalValue::string("GDPR")));
}

#[test]
fn unsupported_patterns_are_rejected() {
    let err = PropertyMatch::from_regex("name", "SAL[EA]S").unwrap_err();
    assert!(matches!(err, MappingError::UnsupportedSearchPattern { .. }));
    assert!(!err.is_recoverable());

    let prefix = PropertyMatch::from_regex("name", r"\QSAL\E.*").unwrap();
    assert_eq!(prefix.operator, MatchOperator::StartsWith);
    assert_eq!(prefix.value, "SAL");
}

#[test]
fn starts_with_uses_a_like_condition() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::from_regex("displayName", r"\QSAL\E.*").unwrap()]);
    let found = registry
        .find_entities(&mut ctx, "RelationalColumn", &criteria, FidelityLevel::Detail)
        .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(
        found.items[0].entity.property("displayName"),
        Some(&CanonicalValue::string("SALARY"))
    );
}

#[test]
fn governance_domain_searches_through_the_parent() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::new("domain", MatchOperator::StartsWith, "Priv")]);
    let found = registry
        .find_entities(&mut ctx, "GovernancePolicy", &criteria, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(found.items.len(), 1);
    let mut ctx = registry.context(&catalog);
    let gdpr = registry
        .get_entity(&mut ctx, &rid("pol1"), None, FidelityLevel::Summary)
        .unwrap()
        .unwrap();
    assert_eq!(found.items[0].entity.guid, gdpr.entity.guid);
}

#[test]
fn finds_categories_by_subject_area() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::exact("name", "Finance")]);
    let found = registry
        .find_entities_by_classification(&mut ctx, "GlossaryCategory", SUBJECT_AREA, &criteria, FidelityLevel::Detail)
        .unwrap();
    let mut shown: Vec<_> = found
        .items
        .iter()
        .filter_map(|m| m.entity.property("displayName").and_then(CanonicalValue::as_str))
        .collect();
    shown.sort();
    assert_eq!(shown, vec!["Finance", "Payroll"]);

    let anything = SearchCriteria::default();
    let found = registry
        .find_entities_by_classification(&mut ctx, "GlossaryCategory", SUBJECT_AREA, &anything, FidelityLevel::Summary)
        .unwrap();
    assert_eq!(found.items.len(), 2);
}

#[test]
fn unknown_classification_is_unsupported() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);
    let err = registry
        .find_entities_by_classification(
            &mut ctx,
            "Database",
            SUBJECT_AREA,
            &SearchCriteria::default(),
            FidelityLevel::Summary,
        )
        .unwrap_err();
    assert!(matches!(err, MappingError::UnsupportedType { .. }));
}

#[test]
fn assignments_by_status_pick_one_representation() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let proposed = SearchCriteria::all(vec![PropertyMatch::exact("status", "Proposed")]);
    let found = registry
        .find_relationships(&mut ctx, "DataClassAssignment", &proposed)
        .unwrap();
    assert_eq!(found.items.len(), 1);
    let r = &found.items[0];
    assert_eq!(r.property("status").and_then(CanonicalValue::as_str), Some("Proposed"));
    assert_eq!(r.proxy1.qualified_name(), Some("(host)=h1::(database)=SALES::(database_schema)=PAYROLL::(database_column)=SALARY"));

    catalog.reset_calls();
    let validated = SearchCriteria::all(vec![PropertyMatch::exact("status", "Validated")]);
    let found = registry
        .find_relationships(&mut ctx, "DataClassAssignment", &validated)
        .unwrap();
    assert!(found.items.is_empty());
    assert_eq!(catalog.search_calls(), 0);
}

#[test]
fn assignments_by_confidence_only_search_link_objects() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let criteria = SearchCriteria::all(vec![PropertyMatch::exact("confidence", "85")]);
    let found = registry
        .find_relationships(&mut ctx, "DataClassAssignment", &criteria)
        .unwrap();
    assert_eq!(catalog.search_calls(), 1);
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].property("confidence"), Some(&CanonicalValue::Int(85)));
}

#[test]
fn unconditional_assignment_search_finds_every_representation() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let found = registry
        .find_relationships(&mut ctx, "DataClassAssignment", &SearchCriteria::default())
        .unwrap();
    // cl1 and cl2 discovered, SALARY proposed; the placeholder is dropped.
    assert_eq!(found.items.len(), 3);
    let mut guids: Vec<_> = found.items.iter().map(|r| r.guid).collect();
    guids.sort();
    guids.dedup();
    assert_eq!(guids.len(), 3);
}

#[test]
fn direct_relationships_are_found_from_their_owning_side() {
    let catalog = catalog();
    let registry = registry();
    let mut ctx = registry.context(&catalog);

    let found = registry
        .find_relationships(&mut ctx, "DataContentForDataSet", &SearchCriteria::default())
        .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(
        found.items[0].proxy2.qualified_name(),
        Some("(host)=h1::(database)=SALES::(database_schema)=PAYROLL")
    );
}
