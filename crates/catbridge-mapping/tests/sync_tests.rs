//! Windowed change feed over the in-memory catalog.

mod common;

use catbridge_mapping::{ChangeWindow, FidelityLevel, WindowedChangeFeed};
use common::*;

fn window(from: u32, to: u32) -> ChangeWindow {
    ChangeWindow::new(at(from), at(to)).unwrap()
}

#[test]
fn working_set_is_reused_for_the_same_window() {
    let catalog = catalog();
    let registry = registry();
    let mut feed = WindowedChangeFeed::new(&registry);
    let mut ctx = registry.context(&catalog);

    let first = feed
        .changed_entities(&mut ctx, window(3, 6), FidelityLevel::Summary)
        .unwrap();
    assert_eq!(catalog.search_calls(), 1);
    assert_eq!(first.items.len(), 4);
    assert!(first.is_clean());

    let again = feed
        .changed_entities(&mut ctx, window(3, 6), FidelityLevel::Summary)
        .unwrap();
    assert_eq!(catalog.search_calls(), 1);
    assert_eq!(first, again);
    assert_eq!(feed.current_window(), Some(window(3, 6)));
}

#[test]
fn different_bounds_recompute_the_working_set() {
    let catalog = catalog();
    let registry = registry();
    let mut feed = WindowedChangeFeed::new(&registry);
    let mut ctx = registry.context(&catalog);

    feed.changed_entities(&mut ctx, window(3, 6), FidelityLevel::Summary)
        .unwrap();
    let shifted = feed
        .changed_entities(&mut ctx, window(1, 2), FidelityLevel::Summary)
        .unwrap();
    assert_eq!(catalog.search_calls(), 2);
    assert_eq!(feed.current_window(), Some(window(1, 2)));

    let mut types: Vec<_> = shifted.items.iter().map(|m| m.entity.type_name.as_str()).collect();
    types.sort();
    assert_eq!(types, vec!["Connection", "Database"]);
}

#[test]
fn window_end_is_exclusive() {
    let catalog = catalog();
    let registry = registry();
    let mut feed = WindowedChangeFeed::new(&registry);
    let mut ctx = registry.context(&catalog);

    let refs = feed.working_set(&mut ctx, window(2, 3)).unwrap();
    let ids: Vec<_> = refs.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, vec!["s1"]);
}

#[test]
fn unmapped_native_types_are_not_listed() {
    let catalog = catalog();
    let registry = registry();
    let mut feed = WindowedChangeFeed::new(&registry);
    let mut ctx = registry.context(&catalog);

    // Only the host changed in this window.
    let changed = feed
        .changed_entities(&mut ctx, window(0, 1), FidelityLevel::Summary)
        .unwrap();
    assert!(changed.items.is_empty());
    assert!(changed.is_clean());
}

#[test]
fn changed_relationships_are_deduplicated() {
    let catalog = catalog();
    let registry = registry();
    let mut feed = WindowedChangeFeed::new(&registry);
    let mut ctx = registry.context(&catalog);

    let changed = feed.changed_relationships(&mut ctx, window(3, 6)).unwrap();
    assert!(changed.is_clean());
    assert_eq!(changed.items.len(), 3);
    assert!(changed.items.iter().all(|r| r.type_name == "DataClassAssignment"));

    let mut guids: Vec<_> = changed.items.iter().map(|r| r.guid).collect();
    guids.sort();
    guids.dedup();
    assert_eq!(guids.len(), 3);
}

#[test]
fn failing_assets_become_warnings() {
    let catalog = catalog().fail_on("conn1");
    let registry = registry();
    let mut feed = WindowedChangeFeed::new(&registry);
    let mut ctx = registry.context(&catalog);

    let changed = feed
        .changed_entities(&mut ctx, window(1, 2), FidelityLevel::Summary)
        .unwrap();
    assert_eq!(changed.items.len(), 1);
    assert_eq!(changed.warnings.len(), 1);
    assert_eq!(changed.warnings[0].rid, rid("conn1"));
}
