//! The mapper registry: an immutable lookup from native type (plus optional
//! generation prefix) to entity mapper, and from canonical type names to
//! entity and relationship mappers.
//!
//! ```text
//!   RegistryBuilder ──build()──► MapperRegistry (Send + Sync, read-only)
//!        │                            │
//!        │ validates:                 ├─ map_entity / get_entity
//!        │  one mapper per key        ├─ map_entities[_parallel] ─► BatchOutcome
//!        │  one canonical type each   ├─ find_entities[_by_classification]
//!        │  prefixes not reused       └─ find_relationships
//!        │  endpoints registered
//! ```
//!
//! Built once at startup. Request-scoped state lives in [`MappingContext`],
//! which callers obtain from [`MapperRegistry::context`].

use crate::client::{NativeClient, StaticTypeDefinitions, TypeDefinitions};
use crate::config::MappingConfig;
use crate::context::MappingContext;
use crate::criteria::{SearchCriteria, SearchCriteriaTranslator};
use crate::entity::{EntityMapper, FidelityLevel, MappedEntity};
use crate::query::NativeQuery;
use crate::relationship::RelationshipMapper;
use catbridge_model::{
    CanonicalRelationship, GenerationPrefix, Guid, GuidGenerator, MappingError, MappingResult, NamespaceGuids,
    NativeAsset, NativeRef, PrefixError, Rid,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Keys and errors
// ============================================================================

/// Registry key: native type plus optional generation prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapperKey {
    pub native_type: String,
    pub prefix: Option<GenerationPrefix>,
}

impl MapperKey {
    pub fn new(native_type: &str, prefix: Option<GenerationPrefix>) -> Self {
        Self {
            native_type: native_type.to_string(),
            prefix,
        }
    }
}

impl fmt::Display for MapperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}[{}]", self.native_type, p),
            None => f.write_str(&self.native_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a mapper is already registered for {0}")]
    DuplicateMapper(MapperKey),

    #[error("canonical type '{canonical_type}' is produced by both {first} and {second}")]
    DuplicateCanonicalType {
        canonical_type: String,
        first: MapperKey,
        second: MapperKey,
    },

    #[error("generation prefix '{prefix}' is already bound to canonical type '{canonical_type}'")]
    PrefixReused {
        prefix: GenerationPrefix,
        canonical_type: String,
    },

    #[error("relationship type '{0}' is registered with two different mappers")]
    ConflictingRelationship(String),

    #[error("relationship '{relationship_type}' names endpoint {endpoint} with no registered entity mapper")]
    UnknownEndpoint {
        relationship_type: String,
        endpoint: MapperKey,
    },

    #[error("canonical type '{0}' is not defined")]
    UndefinedType(String),

    #[error(transparent)]
    InvalidPrefix(#[from] PrefixError),
}

// ============================================================================
// Batch outcomes
// ============================================================================

/// An asset skipped during a batch, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWarning {
    pub rid: Rid,
    pub message: String,
}

/// Items that mapped, plus a warning for each asset that did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    pub warnings: Vec<BatchWarning>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Record `result`: successes become items, recoverable failures become
    /// warnings, anything else aborts the batch.
    pub fn record(&mut self, rid: &Rid, result: MappingResult<T>) -> MappingResult<()> {
        match result {
            Ok(item) => self.items.push(item),
            Err(err) if err.is_recoverable() => self.warn(rid, &err),
            Err(err) => return Err(err),
        }
        Ok(())
    }

    pub fn warn(&mut self, rid: &Rid, err: &MappingError) {
        tracing::warn!(rid = %rid, error = %err, "skipping asset");
        self.warnings.push(BatchWarning {
            rid: rid.clone(),
            message: err.to_string(),
        });
    }

    pub fn extend(&mut self, other: BatchOutcome<T>) {
        self.items.extend(other.items);
        self.warnings.extend(other.warnings);
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct RegistryBuilder {
    config: MappingConfig,
    guids: Option<Arc<dyn GuidGenerator>>,
    types: Option<Arc<dyn TypeDefinitions>>,
    mappers: Vec<EntityMapper>,
}

impl RegistryBuilder {
    /// GUID derivation; defaults to UUIDv5 under the configured namespace.
    pub fn with_guids(mut self, guids: Arc<dyn GuidGenerator>) -> Self {
        self.guids = Some(guids);
        self
    }

    /// Canonical type definitions; without them every type is accepted.
    pub fn with_type_definitions(mut self, types: Arc<dyn TypeDefinitions>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn register(mut self, mapper: EntityMapper) -> Self {
        self.mappers.push(mapper);
        self
    }

    pub fn build(self) -> Result<MapperRegistry, RegistryError> {
        let mut entities: HashMap<MapperKey, Arc<EntityMapper>> = HashMap::new();
        let mut order = Vec::new();
        let mut by_canonical: HashMap<String, MapperKey> = HashMap::new();
        let mut prefixes: HashMap<GenerationPrefix, String> = HashMap::new();
        let mut relationships: HashMap<String, Arc<dyn RelationshipMapper>> = HashMap::new();

        for mapper in self.mappers {
            let key = mapper.key();
            if entities.contains_key(&key) {
                return Err(RegistryError::DuplicateMapper(key));
            }
            if let Some(types) = &self.types {
                if !types.is_defined(mapper.canonical_type()) {
                    return Err(RegistryError::UndefinedType(mapper.canonical_type().to_string()));
                }
            }
            if let Some(first) = by_canonical.get(mapper.canonical_type()) {
                return Err(RegistryError::DuplicateCanonicalType {
                    canonical_type: mapper.canonical_type().to_string(),
                    first: first.clone(),
                    second: key,
                });
            }
            if let Some(prefix) = mapper.prefix() {
                if let Some(bound) = prefixes.get(prefix) {
                    if bound != mapper.canonical_type() {
                        return Err(RegistryError::PrefixReused {
                            prefix: prefix.clone(),
                            canonical_type: bound.clone(),
                        });
                    }
                }
                prefixes.insert(prefix.clone(), mapper.canonical_type().to_string());
            }
            for relationship in mapper.relationship_mappers() {
                let name = relationship.relationship_type().to_string();
                match relationships.get(&name) {
                    Some(existing) if !Arc::ptr_eq(existing, relationship) => {
                        return Err(RegistryError::ConflictingRelationship(name));
                    }
                    Some(_) => {}
                    None => {
                        relationships.insert(name, Arc::clone(relationship));
                    }
                }
            }
            by_canonical.insert(mapper.canonical_type().to_string(), key.clone());
            order.push(key.clone());
            entities.insert(key, Arc::new(mapper));
        }

        for relationship in relationships.values() {
            for endpoint in relationship.endpoints() {
                let key = endpoint.key();
                if !entities.contains_key(&key) {
                    return Err(RegistryError::UnknownEndpoint {
                        relationship_type: relationship.relationship_type().to_string(),
                        endpoint: key,
                    });
                }
            }
        }

        let guids = self
            .guids
            .unwrap_or_else(|| Arc::new(NamespaceGuids::new(self.config.guid_namespace)));
        let types = self
            .types
            .unwrap_or_else(|| Arc::new(StaticTypeDefinitions::new()));

        tracing::debug!(
            entity_mappers = order.len(),
            relationship_mappers = relationships.len(),
            native_version = ?self.config.native_version,
            "mapper registry built"
        );

        Ok(MapperRegistry {
            config: self.config,
            guids,
            types,
            entities,
            order,
            by_canonical,
            relationships,
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

pub struct MapperRegistry {
    config: MappingConfig,
    guids: Arc<dyn GuidGenerator>,
    types: Arc<dyn TypeDefinitions>,
    entities: HashMap<MapperKey, Arc<EntityMapper>>,
    order: Vec<MapperKey>,
    by_canonical: HashMap<String, MapperKey>,
    relationships: HashMap<String, Arc<dyn RelationshipMapper>>,
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("config", &self.config)
            .field("entity_mappers", &self.order)
            .field("relationship_mappers", &self.relationships.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MapperRegistry {
    pub fn builder(config: MappingConfig) -> RegistryBuilder {
        RegistryBuilder {
            config,
            guids: None,
            types: None,
            mappers: Vec::new(),
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn translator(&self) -> SearchCriteriaTranslator<'_> {
        SearchCriteriaTranslator::new(&self.config)
    }

    /// A fresh request-scoped context over `client`.
    pub fn context<'a>(&'a self, client: &'a dyn NativeClient) -> MappingContext<'a> {
        MappingContext::new(client, &self.config, self.guids.as_ref(), self.types.as_ref())
    }

    pub fn mapper(&self, native_type: &str, prefix: Option<&GenerationPrefix>) -> MappingResult<&EntityMapper> {
        self.entities
            .get(&MapperKey::new(native_type, prefix.cloned()))
            .map(Arc::as_ref)
            .ok_or_else(|| MappingError::UnsupportedType {
                type_name: native_type.to_string(),
                prefix: prefix.cloned(),
            })
    }

    pub fn mapper_for(&self, canonical_type: &str) -> MappingResult<&EntityMapper> {
        self.by_canonical
            .get(canonical_type)
            .and_then(|key| self.entities.get(key))
            .map(Arc::as_ref)
            .ok_or_else(|| MappingError::unsupported_type(canonical_type))
    }

    /// Entity mappers in registration order.
    pub fn entity_mappers(&self) -> impl Iterator<Item = &EntityMapper> {
        self.order
            .iter()
            .filter_map(|key| self.entities.get(key).map(Arc::as_ref))
    }

    /// Every mapper reading `native_type`, whatever its prefix.
    pub fn mappers_for_native<'s>(&'s self, native_type: &'s str) -> impl Iterator<Item = &'s EntityMapper> + 's {
        self.entity_mappers().filter(move |m| m.native_type() == native_type)
    }

    pub fn relationship_mapper(&self, relationship_type: &str) -> MappingResult<&dyn RelationshipMapper> {
        self.relationships
            .get(relationship_type)
            .map(Arc::as_ref)
            .ok_or_else(|| MappingError::unsupported_type(relationship_type))
    }

    pub fn relationship_mappers(&self) -> impl Iterator<Item = &dyn RelationshipMapper> {
        self.relationships.values().map(Arc::as_ref)
    }

    /// Every native type the registry reads: mapped asset types plus the
    /// link-object types behind relationships.
    pub fn native_types(&self) -> BTreeSet<String> {
        let mut types: BTreeSet<String> = self.order.iter().map(|k| k.native_type.clone()).collect();
        for relationship in self.relationships.values() {
            types.extend(relationship.carrier_types().into_iter().map(str::to_string));
        }
        types
    }

    pub fn entity_guid(&self, rid: &Rid, native_type: &str, prefix: Option<&GenerationPrefix>) -> Guid {
        self.guids.entity_guid(rid, native_type, prefix)
    }

    // ------------------------------------------------------------------------
    // Mapping
    // ------------------------------------------------------------------------

    pub fn map_entity(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
        level: FidelityLevel,
    ) -> MappingResult<MappedEntity> {
        self.mapper(asset.native_type(), prefix)?.map(ctx, asset, level)
    }

    /// Fetch and map one asset; `None` when the catalog no longer has it.
    pub fn get_entity(
        &self,
        ctx: &mut MappingContext<'_>,
        rid: &Rid,
        prefix: Option<&GenerationPrefix>,
        level: FidelityLevel,
    ) -> MappingResult<Option<MappedEntity>> {
        match ctx.fetch(rid)? {
            Some(asset) => self.map_entity(ctx, &asset, prefix, level).map(Some),
            None => Ok(None),
        }
    }

    fn map_reference(
        &self,
        ctx: &mut MappingContext<'_>,
        reference: &NativeRef,
        prefix: Option<&GenerationPrefix>,
        level: FidelityLevel,
    ) -> MappingResult<MappedEntity> {
        let mapper = self.mapper(&reference.native_type, prefix)?;
        let asset = ctx.require(reference, mapper.canonical_type())?;
        mapper.map(ctx, &asset, level)
    }

    /// Map a batch sequentially through one context, skipping assets that fail.
    pub fn map_entities(
        &self,
        ctx: &mut MappingContext<'_>,
        references: &[NativeRef],
        prefix: Option<&GenerationPrefix>,
        level: FidelityLevel,
    ) -> BatchOutcome<MappedEntity> {
        let mut outcome = BatchOutcome::new();
        for reference in references {
            match self.map_reference(ctx, reference, prefix, level) {
                Ok(mapped) => outcome.items.push(mapped),
                Err(err) => outcome.warn(&reference.id, &err),
            }
        }
        outcome
    }

    /// Map a batch in parallel, one context per asset. Items keep the order
    /// of `references`.
    pub fn map_entities_parallel(
        &self,
        client: &dyn NativeClient,
        references: &[NativeRef],
        prefix: Option<&GenerationPrefix>,
        level: FidelityLevel,
    ) -> BatchOutcome<MappedEntity> {
        let results: Vec<(Rid, MappingResult<MappedEntity>)> = references
            .par_iter()
            .map(|reference| {
                let mut ctx = self.context(client);
                (
                    reference.id.clone(),
                    self.map_reference(&mut ctx, reference, prefix, level),
                )
            })
            .collect();

        let mut outcome = BatchOutcome::new();
        for (rid, result) in results {
            match result {
                Ok(mapped) => outcome.items.push(mapped),
                Err(err) => outcome.warn(&rid, &err),
            }
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// Run `queries` and map every hit with `mapper`, keeping entities whose
    /// full property set passes `keep`.
    fn collect_entities(
        &self,
        ctx: &mut MappingContext<'_>,
        mapper: &EntityMapper,
        queries: &[NativeQuery],
        level: FidelityLevel,
        keep: impl Fn(&EntityMapper, &mut MappingContext<'_>, &NativeAsset, &MappedEntity) -> MappingResult<bool>,
    ) -> MappingResult<BatchOutcome<MappedEntity>> {
        let mut outcome = BatchOutcome::new();
        let mut seen = HashSet::new();
        for query in queries {
            for hit in ctx.search(query)? {
                if !seen.insert(hit.id.clone()) {
                    continue;
                }
                let mapped = ctx.require(&hit, mapper.canonical_type()).and_then(|asset| {
                    let mapped = mapper.map(ctx, &asset, level)?;
                    Ok(keep(mapper, ctx, &asset, &mapped)?.then_some(mapped))
                });
                match mapped {
                    Ok(Some(mapped)) => outcome.items.push(mapped),
                    Ok(None) => {}
                    Err(err) => outcome.warn(&hit.id, &err),
                }
            }
        }
        Ok(outcome)
    }

    /// Entities of `canonical_type` satisfying `criteria`.
    pub fn find_entities(
        &self,
        ctx: &mut MappingContext<'_>,
        canonical_type: &str,
        criteria: &SearchCriteria,
        level: FidelityLevel,
    ) -> MappingResult<BatchOutcome<MappedEntity>> {
        let mapper = self.mapper_for(canonical_type)?;
        let queries = self.translator().entity_queries(mapper, criteria)?;
        self.collect_entities(ctx, mapper, &queries, level, |mapper, ctx, asset, mapped| {
            if criteria.is_unconditional() {
                return Ok(true);
            }
            match level {
                FidelityLevel::Detail => Ok(criteria.matches(&mapped.entity.properties)),
                FidelityLevel::Summary => Ok(criteria.matches(&mapper.map_properties(ctx, asset)?)),
            }
        })
    }

    /// Entities of `canonical_type` carrying `classification_type` with
    /// classification properties satisfying `criteria`.
    pub fn find_entities_by_classification(
        &self,
        ctx: &mut MappingContext<'_>,
        canonical_type: &str,
        classification_type: &str,
        criteria: &SearchCriteria,
        level: FidelityLevel,
    ) -> MappingResult<BatchOutcome<MappedEntity>> {
        let mapper = self.mapper_for(canonical_type)?;
        let queries = self
            .translator()
            .classification_queries(mapper, classification_type, criteria)?;
        self.collect_entities(ctx, mapper, &queries, level, |_, _, _, mapped| {
            Ok(mapped
                .entity
                .classification(classification_type)
                .is_some_and(|c| criteria.matches(&c.properties)))
        })
    }

    /// Relationships of `relationship_type` satisfying `criteria`, across
    /// every native representation, de-duplicated by GUID.
    pub fn find_relationships(
        &self,
        ctx: &mut MappingContext<'_>,
        relationship_type: &str,
        criteria: &SearchCriteria,
    ) -> MappingResult<BatchOutcome<CanonicalRelationship>> {
        let mapper = self.relationship_mapper(relationship_type)?;
        let queries = self.translator().relationship_queries(mapper, criteria)?;

        let mut outcome = BatchOutcome::new();
        let mut seen = HashSet::new();
        for query in &queries {
            for hit in ctx.search(query)? {
                match mapper.map_hit(ctx, &hit) {
                    Ok(found) => outcome.items.extend(
                        found
                            .into_iter()
                            .filter(|r| criteria.matches(&r.properties))
                            .filter(|r| seen.insert(r.guid)),
                    ),
                    Err(err) => outcome.warn(&hit.id, &err),
                }
            }
        }
        tracing::debug!(
            relationship_type,
            queries = queries.len(),
            found = outcome.items.len(),
            "relationship search finished"
        );
        Ok(outcome)
    }
}
