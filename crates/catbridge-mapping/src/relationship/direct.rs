use super::{Endpoint, RelationshipBuilder, RelationshipMapper};
use crate::config::MappingConfig;
use crate::context::MappingContext;
use crate::criteria::{apply_table, QueryBuilder, SearchCriteria};
use crate::entity::tolerate;
use crate::property::PropertyMapping;
use crate::query::{Condition, ConditionSet, NativeQuery};
use catbridge_model::{
    CanonicalRelationship, CanonicalValue, GenerationPrefix, MappingError, MappingResult, NativeAsset, NativeRef,
};

/// How one end reaches the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointLink {
    /// Both ends are views of the same native asset.
    SameAsset,
    /// A reference (or reference list) property on this end.
    Property(String),
}

impl EndpointLink {
    pub fn property(name: &str) -> Self {
        EndpointLink::Property(name.to_string())
    }
}

/// Relationship whose endpoints reference each other directly.
#[derive(Debug, Clone)]
pub struct DirectRelationshipMapper {
    relationship_type: String,
    one: Endpoint,
    two: Endpoint,
    one_to_two: EndpointLink,
    two_to_one: EndpointLink,
    properties: Vec<PropertyMapping>,
}

impl DirectRelationshipMapper {
    pub fn new(
        relationship_type: &str,
        (one, one_to_two): (Endpoint, EndpointLink),
        (two, two_to_one): (Endpoint, EndpointLink),
    ) -> Self {
        Self {
            relationship_type: relationship_type.to_string(),
            one,
            two,
            one_to_two,
            two_to_one,
            properties: Vec::new(),
        }
    }

    /// Relationship-level rows; only literal rows apply to direct links.
    pub fn with_properties(mut self, rows: impl IntoIterator<Item = PropertyMapping>) -> Self {
        self.properties.extend(rows);
        self
    }

    /// The end whose native assets hold the link, used for searching.
    fn search_side(&self) -> (&Endpoint, &EndpointLink) {
        match (&self.one_to_two, &self.two_to_one) {
            (EndpointLink::Property(_), _) | (EndpointLink::SameAsset, EndpointLink::SameAsset) => {
                (&self.one, &self.one_to_two)
            }
            (EndpointLink::SameAsset, EndpointLink::Property(_)) => (&self.two, &self.two_to_one),
        }
    }

    fn literal_properties(&self) -> impl Iterator<Item = (&str, Option<CanonicalValue>)> {
        self.properties.iter().filter_map(|row| match row {
            PropertyMapping::Literal { canonical, value } => Some((canonical.as_str(), value.clone())),
            _ => None,
        })
    }
}

impl RelationshipMapper for DirectRelationshipMapper {
    fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    fn endpoints(&self) -> [&Endpoint; 2] {
        [&self.one, &self.two]
    }

    fn map_from(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Vec<CanonicalRelationship>> {
        let (this_is_one, this, other, link) = if self.one.is(asset.native_type(), prefix) {
            (true, &self.one, &self.two, &self.one_to_two)
        } else if self.two.is(asset.native_type(), prefix) {
            (false, &self.two, &self.one, &self.two_to_one)
        } else {
            return Err(MappingError::UnsupportedType {
                type_name: asset.native_type().to_string(),
                prefix: prefix.cloned(),
            });
        };

        let others: Vec<NativeRef> = match link {
            EndpointLink::SameAsset => vec![asset.to_ref()],
            EndpointLink::Property(name) => ctx
                .property(asset, name)?
                .references()
                .into_iter()
                .cloned()
                .collect(),
        };
        if others.is_empty() {
            return Ok(Vec::new());
        }

        let this_proxy = this.proxy(ctx, asset)?;
        let this_modified = ctx.modified_on_millis(asset)?;
        let mut relationships = Vec::with_capacity(others.len());
        for other_ref in &others {
            if !other_ref.is_retrievable() {
                tracing::debug!(
                    rid = %asset.id(),
                    relationship = %self.relationship_type,
                    endpoint = %other_ref.id,
                    "excluding placeholder endpoint"
                );
                continue;
            }
            let Some(other_proxy) =
                tolerate(other.proxy_for_ref(ctx, other_ref), &other_ref.id, &self.relationship_type)?
            else {
                continue;
            };
            let (proxy1, proxy2) = if this_is_one {
                (this_proxy.clone(), other_proxy)
            } else {
                (other_proxy, this_proxy.clone())
            };
            let other_modified = ctx.ref_modified_on_millis(other_ref)?;
            let mut builder = RelationshipBuilder::new(&self.relationship_type)
                .proxy1(proxy1)
                .proxy2(proxy2)
                .version([this_modified, other_modified]);
            for (name, value) in self.literal_properties() {
                builder = builder.property(name, value);
            }
            if let Some(relationship) = tolerate(builder.build(ctx), asset.id(), &self.relationship_type)? {
                relationships.push(relationship);
            }
        }
        Ok(relationships)
    }

    fn map_hit(&self, ctx: &mut MappingContext<'_>, hit: &NativeRef) -> MappingResult<Vec<CanonicalRelationship>> {
        let (side, _) = self.search_side();
        let asset = ctx.require(hit, &self.relationship_type)?;
        self.map_from(ctx, &asset, side.prefix.as_ref())
    }

    fn search_queries(
        &self,
        criteria: &SearchCriteria,
        _config: &MappingConfig,
    ) -> MappingResult<Vec<NativeQuery>> {
        let (side, link) = self.search_side();
        let base = match link {
            EndpointLink::Property(name) => ConditionSet::all().with(Condition::not_null(name.as_str())),
            EndpointLink::SameAsset => ConditionSet::all(),
        };
        let mut builder = QueryBuilder::new(
            NativeQuery::new(side.native_type.as_str()),
            base,
            criteria.combinator(),
        );
        apply_table(&mut builder, &self.properties, criteria, &side.native_type, side.prefix.as_ref())?;
        Ok(vec![builder.finish()])
    }
}
