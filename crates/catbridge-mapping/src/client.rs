//! Collaborator seams: the native catalog client and the canonical type
//! definitions.

use crate::query::NativeQuery;
use catbridge_model::{ClientError, NativeAsset, NativeRef, NativeValue, RefList, Rid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<NativeRef>,
    pub total: u64,
    /// Request for the following page, absent on the last one.
    pub next: Option<PageRequest>,
}

/// Paged client for the native catalog.
///
/// Transport, sessions, timeouts and authentication all live behind this
/// trait. References it returns must carry their `RefKind`.
pub trait NativeClient: Send + Sync {
    fn search(&self, query: &NativeQuery, page: PageRequest) -> Result<SearchPage, ClientError>;

    fn get_by_id(&self, rid: &Rid) -> Result<Option<NativeAsset>, ClientError>;

    /// Fetch a single property; missing properties come back as `Null`.
    fn get_property(&self, asset: &NativeRef, name: &str) -> Result<NativeValue, ClientError>;

    /// Fetch the remainder of a partially loaded reference list.
    fn next_page(&self, owner: &NativeRef, property: &str, list: &RefList) -> Result<RefList, ClientError>;
}

/// Run `query` and drain every page.
pub fn search_all(
    client: &dyn NativeClient,
    query: &NativeQuery,
    page_size: usize,
) -> Result<Vec<NativeRef>, ClientError> {
    let mut items = Vec::new();
    let mut page = Some(PageRequest::first(page_size));
    while let Some(request) = page {
        let result = client.search(query, request)?;
        let fetched = result.items.len();
        items.extend(result.items);
        // Guard against servers that keep handing out empty pages.
        page = if fetched == 0 { None } else { result.next };
    }
    Ok(items)
}

/// Value kind of a canonical property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Int,
    Long,
    Float,
    Boolean,
    Date,
    Enum,
}

pub trait TypeDefinitions: Send + Sync {
    fn is_defined(&self, canonical_type: &str) -> bool;

    fn property_kind(&self, canonical_type: &str, property: &str) -> Option<PropertyKind>;

    /// Every property name declared for `canonical_type`.
    fn property_names(&self, canonical_type: &str) -> Vec<String>;
}

/// Type definitions held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeDefinitions {
    types: HashMap<String, BTreeMap<String, PropertyKind>>,
}

impl StaticTypeDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `canonical_type` (or extend it) with `properties`.
    pub fn with_type(mut self, canonical_type: &str, properties: &[(&str, PropertyKind)]) -> Self {
        let entry = self.types.entry(canonical_type.to_string()).or_default();
        for (name, kind) in properties {
            entry.insert(name.to_string(), *kind);
        }
        self
    }
}

impl TypeDefinitions for StaticTypeDefinitions {
    fn is_defined(&self, canonical_type: &str) -> bool {
        self.types.contains_key(canonical_type)
    }

    fn property_kind(&self, canonical_type: &str, property: &str) -> Option<PropertyKind> {
        self.types.get(canonical_type)?.get(property).copied()
    }

    fn property_names(&self, canonical_type: &str) -> Vec<String> {
        self.types
            .get(canonical_type)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}
