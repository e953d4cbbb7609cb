//! Request-scoped resolution state.
//!
//! A `MappingContext` lives for one mapping call (or one batch on one
//! thread). It remembers every asset and property fetched through it, so a
//! property is requested from the native catalog at most once per asset per
//! call. Nothing survives the context.

use crate::client::{search_all, NativeClient, PropertyKind, TypeDefinitions};
use crate::config::MappingConfig;
use crate::query::NativeQuery;
use catbridge_model::{
    GenerationPrefix, Guid, GuidGenerator, MappingError, MappingResult, NativeAsset, NativeRef,
    NativeValue, Rid, MODIFIED_ON,
};
use std::collections::HashMap;

pub struct MappingContext<'a> {
    client: &'a dyn NativeClient,
    config: &'a MappingConfig,
    guids: &'a dyn GuidGenerator,
    types: &'a dyn TypeDefinitions,
    assets: HashMap<Rid, Option<NativeAsset>>,
    properties: HashMap<(Rid, String), NativeValue>,
}

impl<'a> MappingContext<'a> {
    pub fn new(
        client: &'a dyn NativeClient,
        config: &'a MappingConfig,
        guids: &'a dyn GuidGenerator,
        types: &'a dyn TypeDefinitions,
    ) -> Self {
        Self {
            client,
            config,
            guids,
            types,
            assets: HashMap::new(),
            properties: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MappingConfig {
        self.config
    }

    pub fn client(&self) -> &dyn NativeClient {
        self.client
    }

    pub fn property_kind(&self, canonical_type: &str, property: &str) -> Option<PropertyKind> {
        self.types.property_kind(canonical_type, property)
    }

    pub fn entity_guid(&self, rid: &Rid, native_type: &str, prefix: Option<&GenerationPrefix>) -> Guid {
        self.guids.entity_guid(rid, native_type, prefix)
    }

    pub fn relationship_guid(
        &self,
        relationship_type: &str,
        one: &Guid,
        two: &Guid,
        carrier: Option<&Rid>,
    ) -> Guid {
        self.guids.relationship_guid(relationship_type, one, two, carrier)
    }

    /// Fetch an asset by id, once per context.
    pub fn fetch(&mut self, rid: &Rid) -> MappingResult<Option<NativeAsset>> {
        if let Some(cached) = self.assets.get(rid) {
            return Ok(cached.clone());
        }
        let fetched = self
            .client
            .get_by_id(rid)
            .map_err(|e| MappingError::external(format!("fetching {rid}"), e))?;
        self.assets.insert(rid.clone(), fetched.clone());
        Ok(fetched)
    }

    /// Like [`fetch`](Self::fetch), but a missing asset is an incomplete
    /// reference from `referrer`.
    pub fn require(&mut self, reference: &NativeRef, referrer: &str) -> MappingResult<NativeAsset> {
        self.fetch(&reference.id)?
            .ok_or_else(|| MappingError::IncompleteReference {
                rid: reference.id.clone(),
                property: referrer.to_string(),
            })
    }

    /// Value of `name` on `asset`, loading it lazily when the fetched bag
    /// does not hold it. Paged reference lists are drained in full.
    pub fn property(&mut self, asset: &NativeAsset, name: &str) -> MappingResult<NativeValue> {
        if let Some(value) = asset.property(name) {
            return self.complete(&asset.reference, name, value.clone());
        }
        self.ref_property(&asset.reference, name)
    }

    /// Value of `name` on a bare reference, loading it lazily.
    pub fn ref_property(&mut self, reference: &NativeRef, name: &str) -> MappingResult<NativeValue> {
        if let Some(Some(asset)) = self.assets.get(&reference.id) {
            if let Some(value) = asset.property(name).cloned() {
                return self.complete(reference, name, value);
            }
        }
        self.lookup(reference, name)
    }

    /// Fetch `name` directly from the client even when a fetched bag exists.
    ///
    /// Used when a first fetch returned the property empty.
    pub fn refetch_property(&mut self, reference: &NativeRef, name: &str) -> MappingResult<NativeValue> {
        self.lookup(reference, name)
    }

    fn lookup(&mut self, reference: &NativeRef, name: &str) -> MappingResult<NativeValue> {
        let key = (reference.id.clone(), name.to_string());
        if let Some(cached) = self.properties.get(&key) {
            return Ok(cached.clone());
        }
        let value = self
            .client
            .get_property(reference, name)
            .map_err(|e| MappingError::external(format!("fetching {name} of {}", reference.id), e))?;
        let value = self.drain(reference, name, value)?;
        self.properties.insert(key, value.clone());
        Ok(value)
    }

    fn complete(&mut self, owner: &NativeRef, name: &str, value: NativeValue) -> MappingResult<NativeValue> {
        let key = (owner.id.clone(), name.to_string());
        if let Some(cached) = self.properties.get(&key) {
            return Ok(cached.clone());
        }
        let value = self.drain(owner, name, value)?;
        self.properties.insert(key, value.clone());
        Ok(value)
    }

    fn drain(&self, owner: &NativeRef, name: &str, value: NativeValue) -> MappingResult<NativeValue> {
        let NativeValue::ReferenceList(mut list) = value else {
            return Ok(value);
        };
        while !list.is_complete() {
            let next = self
                .client
                .next_page(owner, name, &list)
                .map_err(|e| MappingError::external(format!("paging {name} of {}", owner.id), e))?;
            if next.items.is_empty() {
                tracing::warn!(
                    rid = %owner.id,
                    property = name,
                    loaded = list.items.len(),
                    total = list.total,
                    "reference list ended before its reported total"
                );
                break;
            }
            list.items.extend(next.items);
        }
        Ok(NativeValue::ReferenceList(list))
    }

    /// Modification time of `asset` in epoch millis, loaded lazily when
    /// neither the bag nor the reference carries it.
    pub fn modified_on_millis(&mut self, asset: &NativeAsset) -> MappingResult<Option<i64>> {
        if let Some(at) = asset.modified_on() {
            return Ok(Some(at.timestamp_millis()));
        }
        Ok(self
            .property(asset, MODIFIED_ON)?
            .as_timestamp()
            .map(|t| t.timestamp_millis()))
    }

    /// Modification time of a referenced asset: the reference's own stamp,
    /// else its `modified_on` property.
    pub fn ref_modified_on_millis(&mut self, reference: &NativeRef) -> MappingResult<Option<i64>> {
        if let Some(at) = reference.modified_on {
            return Ok(Some(at.timestamp_millis()));
        }
        Ok(self
            .ref_property(reference, MODIFIED_ON)?
            .as_timestamp()
            .map(|t| t.timestamp_millis()))
    }

    /// Run a native search, draining every page.
    pub fn search(&mut self, query: &NativeQuery) -> MappingResult<Vec<NativeRef>> {
        if query.is_forced_empty() {
            tracing::debug!(types = ?query.asset_types, "query forced empty; not issued");
            return Ok(Vec::new());
        }
        search_all(self.client, query, self.config.page_size)
            .map_err(|e| MappingError::external(format!("searching {:?}", query.asset_types), e))
    }
}
