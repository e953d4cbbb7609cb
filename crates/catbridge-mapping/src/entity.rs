//! Entity mappers: one native asset type (plus optional generation prefix)
//! to one canonical entity type.

use crate::classification::ClassificationMapper;
use crate::context::MappingContext;
use crate::property::{qualified_name, PropertyMapping};
use crate::registry::MapperKey;
use crate::relationship::RelationshipMapper;
use catbridge_model::{
    CanonicalEntity, CanonicalRelationship, CanonicalValue, EntityProxy, GenerationPrefix, Guid,
    InstanceProperties, MappingError, MappingResult, NativeAsset, Rid, QUALIFIED_NAME,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// How much of an entity to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FidelityLevel {
    /// Identity and classifications; relationship mappers are never called.
    #[default]
    Summary,
    /// Every property row, classification and relationship mapper.
    Detail,
}

/// A mapped entity and, at detail level, the relationships it takes part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedEntity {
    pub entity: CanonicalEntity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<CanonicalRelationship>,
}

/// Keep going past asset-scoped trouble, but let collaborator failures
/// through so the caller skips the whole asset.
pub(crate) fn tolerate<T>(result: MappingResult<T>, rid: &Rid, what: &str) -> MappingResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ MappingError::ExternalCallFailure { .. }) => Err(err),
        Err(err) => {
            tracing::warn!(rid = %rid, what, error = %err, "skipping part of mapping");
            Ok(None)
        }
    }
}

#[derive(Clone)]
pub struct EntityMapper {
    native_type: String,
    canonical_type: String,
    prefix: Option<GenerationPrefix>,
    table: Vec<PropertyMapping>,
    relationships: Vec<Arc<dyn RelationshipMapper>>,
    classifications: Vec<Arc<dyn ClassificationMapper>>,
}

impl fmt::Debug for EntityMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapper")
            .field("native_type", &self.native_type)
            .field("canonical_type", &self.canonical_type)
            .field("prefix", &self.prefix)
            .field("rows", &self.table.len())
            .field(
                "relationships",
                &self
                    .relationships
                    .iter()
                    .map(|r| r.relationship_type())
                    .collect::<Vec<_>>(),
            )
            .field(
                "classifications",
                &self
                    .classifications
                    .iter()
                    .map(|c| c.classification_type())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl EntityMapper {
    pub fn new(native_type: &str, canonical_type: &str) -> Self {
        Self {
            native_type: native_type.to_string(),
            canonical_type: canonical_type.to_string(),
            prefix: None,
            table: Vec::new(),
            relationships: Vec::new(),
            classifications: Vec::new(),
        }
    }

    /// Register as a derived view of the native asset.
    pub fn with_prefix(mut self, prefix: GenerationPrefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Append rows; shared supertype tables are concatenated this way.
    pub fn with_properties(mut self, rows: impl IntoIterator<Item = PropertyMapping>) -> Self {
        self.table.extend(rows);
        self
    }

    pub fn with_relationship(mut self, mapper: Arc<dyn RelationshipMapper>) -> Self {
        self.relationships.push(mapper);
        self
    }

    pub fn with_classification(mut self, mapper: Arc<dyn ClassificationMapper>) -> Self {
        self.classifications.push(mapper);
        self
    }

    pub fn native_type(&self) -> &str {
        &self.native_type
    }

    pub fn canonical_type(&self) -> &str {
        &self.canonical_type
    }

    pub fn prefix(&self) -> Option<&GenerationPrefix> {
        self.prefix.as_ref()
    }

    pub fn key(&self) -> MapperKey {
        MapperKey::new(&self.native_type, self.prefix.clone())
    }

    pub fn table(&self) -> &[PropertyMapping] {
        &self.table
    }

    pub fn relationship_mappers(&self) -> &[Arc<dyn RelationshipMapper>] {
        &self.relationships
    }

    pub fn classification_mappers(&self) -> &[Arc<dyn ClassificationMapper>] {
        &self.classifications
    }

    pub fn classification_mapper(&self, classification_type: &str) -> Option<&Arc<dyn ClassificationMapper>> {
        self.classifications
            .iter()
            .find(|c| c.classification_type() == classification_type)
    }

    pub fn guid(&self, ctx: &MappingContext<'_>, rid: &Rid) -> Guid {
        ctx.entity_guid(rid, &self.native_type, self.prefix.as_ref())
    }

    fn check_type(&self, asset: &NativeAsset) -> MappingResult<()> {
        if asset.native_type() == self.native_type {
            Ok(())
        } else {
            Err(MappingError::UnsupportedType {
                type_name: asset.native_type().to_string(),
                prefix: self.prefix.clone(),
            })
        }
    }

    pub fn proxy(&self, ctx: &mut MappingContext<'_>, asset: &NativeAsset) -> MappingResult<EntityProxy> {
        self.check_type(asset)?;
        Ok(EntityProxy {
            guid: self.guid(ctx, asset.id()),
            type_name: self.canonical_type.clone(),
            unique_properties: InstanceProperties::from([(
                QUALIFIED_NAME.to_string(),
                CanonicalValue::String(qualified_name(ctx, asset, self.prefix.as_ref())?),
            )]),
        })
    }

    /// Every table row; rows that fail to resolve are left unset.
    pub fn map_properties(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
    ) -> MappingResult<InstanceProperties> {
        let mut properties = InstanceProperties::new();
        for row in &self.table {
            let mapped = row.map(ctx, &self.canonical_type, asset, self.prefix.as_ref());
            if let Some(Some(value)) = tolerate(mapped, asset.id(), row.canonical_name())? {
                properties.insert(row.canonical_name().to_string(), value);
            }
        }
        if !properties.contains_key(QUALIFIED_NAME) {
            let qn = qualified_name(ctx, asset, self.prefix.as_ref())?;
            properties.insert(QUALIFIED_NAME.to_string(), CanonicalValue::String(qn));
        }
        Ok(properties)
    }

    pub fn map(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        level: FidelityLevel,
    ) -> MappingResult<MappedEntity> {
        self.check_type(asset)?;
        let guid = self.guid(ctx, asset.id());
        let version = ctx.modified_on_millis(asset)?.unwrap_or(1);

        let properties = match level {
            FidelityLevel::Summary => InstanceProperties::from([(
                QUALIFIED_NAME.to_string(),
                CanonicalValue::String(qualified_name(ctx, asset, self.prefix.as_ref())?),
            )]),
            FidelityLevel::Detail => self.map_properties(ctx, asset)?,
        };

        let mut classifications = Vec::new();
        for classifier in &self.classifications {
            let found = classifier.classify(ctx, asset);
            if let Some(Some(c)) = tolerate(found, asset.id(), classifier.classification_type())? {
                classifications.push(c);
            }
        }

        let mut relationships = Vec::new();
        if level == FidelityLevel::Detail {
            let mut seen = HashSet::new();
            for mapper in &self.relationships {
                let mapped = mapper.map_from(ctx, asset, self.prefix.as_ref());
                let Some(found) = tolerate(mapped, asset.id(), mapper.relationship_type())? else {
                    continue;
                };
                relationships.extend(found.into_iter().filter(|r| seen.insert(r.guid)));
            }
        }

        tracing::debug!(
            rid = %asset.id(),
            canonical_type = %self.canonical_type,
            level = ?level,
            relationships = relationships.len(),
            "mapped entity"
        );

        Ok(MappedEntity {
            entity: CanonicalEntity {
                guid,
                type_name: self.canonical_type.clone(),
                version,
                properties,
                classifications,
                metadata_collection: ctx.config().repository_name.clone(),
            },
            relationships,
        })
    }
}
