//! Relationship mappers.
//!
//! Two endpoint-resolution patterns:
//!
//! ```text
//!   direct        [asset A] ──prop──► [asset B]
//!
//!   link object   [asset A] ──► [carrier] ──► [asset B]
//!                                   │
//!                                   └─ relationship-level properties
//! ```
//!
//! Every emitted relationship goes through [`RelationshipBuilder`], which
//! refuses to build one without both proxies.

mod data_class;
mod direct;

pub use data_class::{DataClassAssignmentMapper, DataClassAssignmentStatus, Representation};
pub use direct::{DirectRelationshipMapper, EndpointLink};

use crate::config::MappingConfig;
use crate::context::MappingContext;
use crate::criteria::SearchCriteria;
use crate::property::qualified_name;
use crate::query::NativeQuery;
use crate::registry::MapperKey;
use catbridge_model::{
    CanonicalRelationship, CanonicalValue, EntityProxy, GenerationPrefix, InstanceProperties,
    MappingError, MappingResult, NativeAsset, NativeRef, Rid, QUALIFIED_NAME,
};
use std::fmt;

/// One end of a relationship type: which mapper's entities sit there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub native_type: String,
    pub canonical_type: String,
    pub prefix: Option<GenerationPrefix>,
}

impl Endpoint {
    pub fn new(native_type: &str, canonical_type: &str) -> Self {
        Self {
            native_type: native_type.to_string(),
            canonical_type: canonical_type.to_string(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: GenerationPrefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn key(&self) -> MapperKey {
        MapperKey::new(&self.native_type, self.prefix.clone())
    }

    pub fn is(&self, native_type: &str, prefix: Option<&GenerationPrefix>) -> bool {
        self.native_type == native_type && self.prefix.as_ref() == prefix
    }

    /// Proxy for an already fetched asset at this end.
    pub fn proxy(&self, ctx: &mut MappingContext<'_>, asset: &NativeAsset) -> MappingResult<EntityProxy> {
        Ok(EntityProxy {
            guid: ctx.entity_guid(asset.id(), &self.native_type, self.prefix.as_ref()),
            type_name: self.canonical_type.clone(),
            unique_properties: InstanceProperties::from([(
                QUALIFIED_NAME.to_string(),
                CanonicalValue::String(qualified_name(ctx, asset, self.prefix.as_ref())?),
            )]),
        })
    }

    /// Proxy for a reference at this end; only identity properties are
    /// loaded, never the full asset.
    pub fn proxy_for_ref(&self, ctx: &mut MappingContext<'_>, reference: &NativeRef) -> MappingResult<EntityProxy> {
        if reference.native_type != self.native_type {
            return Err(MappingError::InvariantViolation {
                type_name: self.canonical_type.clone(),
                detail: format!(
                    "endpoint {} is a {}, expected {}",
                    reference.id, reference.native_type, self.native_type
                ),
            });
        }
        self.proxy(ctx, &NativeAsset::new(reference.clone()))
    }
}

pub trait RelationshipMapper: Send + Sync + fmt::Debug {
    fn relationship_type(&self) -> &str;

    fn endpoints(&self) -> [&Endpoint; 2];

    /// Native types of the link objects this mapper reads.
    fn carrier_types(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Relationships of this type in which `asset`, mapped under `prefix`,
    /// takes part.
    fn map_from(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Vec<CanonicalRelationship>>;

    /// Relationships behind one hit of a query from
    /// [`search_queries`](Self::search_queries).
    fn map_hit(&self, ctx: &mut MappingContext<'_>, hit: &NativeRef) -> MappingResult<Vec<CanonicalRelationship>>;

    /// One native query per native representation of this relationship.
    fn search_queries(
        &self,
        criteria: &SearchCriteria,
        config: &MappingConfig,
    ) -> MappingResult<Vec<NativeQuery>>;
}

/// Assembles one relationship instance.
#[derive(Debug, Clone)]
pub struct RelationshipBuilder<'m> {
    relationship_type: &'m str,
    proxy1: Option<EntityProxy>,
    proxy2: Option<EntityProxy>,
    properties: InstanceProperties,
    version: i64,
    carrier: Option<Rid>,
}

impl<'m> RelationshipBuilder<'m> {
    pub fn new(relationship_type: &'m str) -> Self {
        Self {
            relationship_type,
            proxy1: None,
            proxy2: None,
            properties: InstanceProperties::new(),
            version: 1,
            carrier: None,
        }
    }

    pub fn proxy1(mut self, proxy: EntityProxy) -> Self {
        self.proxy1 = Some(proxy);
        self
    }

    pub fn proxy2(mut self, proxy: EntityProxy) -> Self {
        self.proxy2 = Some(proxy);
        self
    }

    pub fn property(mut self, name: &str, value: Option<CanonicalValue>) -> Self {
        if let Some(value) = value {
            self.properties.insert(name.to_string(), value);
        }
        self
    }

    /// Version from the freshest known modification time (epoch millis).
    pub fn version(mut self, modified: impl IntoIterator<Item = Option<i64>>) -> Self {
        self.version = modified.into_iter().flatten().max().unwrap_or(1);
        self
    }

    /// The link object carrying this relationship, part of its identity.
    pub fn carrier(mut self, rid: Rid) -> Self {
        self.carrier = Some(rid);
        self
    }

    pub fn build(self, ctx: &MappingContext<'_>) -> MappingResult<CanonicalRelationship> {
        let (Some(proxy1), Some(proxy2)) = (self.proxy1, self.proxy2) else {
            return Err(MappingError::InvariantViolation {
                type_name: self.relationship_type.to_string(),
                detail: "relationship needs exactly two endpoints".to_string(),
            });
        };
        let guid = ctx.relationship_guid(
            self.relationship_type,
            &proxy1.guid,
            &proxy2.guid,
            self.carrier.as_ref(),
        );
        Ok(CanonicalRelationship {
            guid,
            type_name: self.relationship_type.to_string(),
            version: self.version,
            properties: self.properties,
            proxy1,
            proxy2,
            metadata_collection: ctx.config().repository_name.clone(),
        })
    }
}
