//! DataClassAssignment: one canonical relationship, two native shapes.
//!
//! ```text
//!   Proposed    [column] ──selected_classification──► [data_class]
//!               [data_class] ──classifications_selected──► [column, ...]
//!
//!   Discovered  [column] ──detected_classifications──► [classification]
//!                                                       ├─ classifies_asset ──► [column]
//!                                                       ├─ data_class ───────► [data_class]
//!                                                       └─ confidencePercent, threshold,
//!                                                          value_frequency
//! ```
//!
//! The `status` property tells the two apart on every emitted instance.

use super::{Endpoint, RelationshipBuilder, RelationshipMapper};
use crate::config::{MappingConfig, NativeVersion};
use crate::context::MappingContext;
use crate::criteria::{PropertyMatch, QueryBuilder, SearchCriteria};
use crate::entity::tolerate;
use crate::query::{Condition, ConditionSet, NativeQuery, ID_PROPERTY};
use catbridge_model::{
    CanonicalRelationship, CanonicalValue, EntityProxy, GenerationPrefix, MappingError,
    MappingResult, NativeAsset, NativeRef,
};

pub const RELATIONSHIP_TYPE: &str = "DataClassAssignment";

const CARRIER_TYPE: &str = "classification";
const CLASSIFIES_ASSET: &str = "classifies_asset";
const DATA_CLASS: &str = "data_class";
const CONFIDENCE_PERCENT: &str = "confidencePercent";
const THRESHOLD: &str = "threshold";
const VALUE_FREQUENCY: &str = "value_frequency";
const SELECTED_CLASSIFICATION: &str = "selected_classification";
const CLASSIFICATIONS_SELECTED: &str = "classifications_selected";
const DETECTED_CLASSIFICATIONS: &str = "detected_classifications";

/// Canonical relationship-level properties with no native analog.
const LITERAL_NULL: [&str; 3] = ["method", "steward", "source"];

/// Canonical assignment status, with the canonical enum's ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClassAssignmentStatus {
    Discovered,
    Proposed,
    Imported,
    Validated,
    Deprecated,
    Obsolete,
    Other,
}

/// Native shape producing a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    LinkObject,
    Direct,
}

impl DataClassAssignmentStatus {
    pub const ALL: [DataClassAssignmentStatus; 7] = [
        DataClassAssignmentStatus::Discovered,
        DataClassAssignmentStatus::Proposed,
        DataClassAssignmentStatus::Imported,
        DataClassAssignmentStatus::Validated,
        DataClassAssignmentStatus::Deprecated,
        DataClassAssignmentStatus::Obsolete,
        DataClassAssignmentStatus::Other,
    ];

    pub fn ordinal(self) -> i32 {
        match self {
            DataClassAssignmentStatus::Discovered => 0,
            DataClassAssignmentStatus::Proposed => 1,
            DataClassAssignmentStatus::Imported => 2,
            DataClassAssignmentStatus::Validated => 3,
            DataClassAssignmentStatus::Deprecated => 4,
            DataClassAssignmentStatus::Obsolete => 5,
            DataClassAssignmentStatus::Other => 99,
        }
    }

    pub fn symbolic_name(self) -> &'static str {
        match self {
            DataClassAssignmentStatus::Discovered => "Discovered",
            DataClassAssignmentStatus::Proposed => "Proposed",
            DataClassAssignmentStatus::Imported => "Imported",
            DataClassAssignmentStatus::Validated => "Validated",
            DataClassAssignmentStatus::Deprecated => "Deprecated",
            DataClassAssignmentStatus::Obsolete => "Obsolete",
            DataClassAssignmentStatus::Other => "Other",
        }
    }

    /// Which native shape can carry this status. The native catalog has no
    /// notion of the other statuses, so nothing produces them.
    pub fn representation(self) -> Option<Representation> {
        match self {
            DataClassAssignmentStatus::Discovered => Some(Representation::LinkObject),
            DataClassAssignmentStatus::Proposed => Some(Representation::Direct),
            DataClassAssignmentStatus::Imported
            | DataClassAssignmentStatus::Validated
            | DataClassAssignmentStatus::Deprecated
            | DataClassAssignmentStatus::Obsolete
            | DataClassAssignmentStatus::Other => None,
        }
    }

    pub fn to_value(self) -> CanonicalValue {
        CanonicalValue::Enum {
            ordinal: self.ordinal(),
            symbolic_name: self.symbolic_name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataClassAssignmentMapper {
    element: Endpoint,
    data_class: Endpoint,
    version: NativeVersion,
}

impl DataClassAssignmentMapper {
    pub fn new(element: Endpoint, data_class: Endpoint, version: NativeVersion) -> Self {
        Self {
            element,
            data_class,
            version,
        }
    }

    fn has_value_frequency(&self) -> bool {
        self.version >= NativeVersion::V11702
    }

    fn proposed(
        &self,
        ctx: &mut MappingContext<'_>,
        element: EntityProxy,
        data_class: EntityProxy,
        modified: [Option<i64>; 2],
    ) -> MappingResult<CanonicalRelationship> {
        RelationshipBuilder::new(RELATIONSHIP_TYPE)
            .proxy1(element)
            .proxy2(data_class)
            .property("status", Some(DataClassAssignmentStatus::Proposed.to_value()))
            .version(modified)
            .build(ctx)
    }

    fn proposed_from_element(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
    ) -> MappingResult<Vec<CanonicalRelationship>> {
        let selected = ctx.property(asset, SELECTED_CLASSIFICATION)?;
        let mut out = Vec::new();
        let element_modified = ctx.modified_on_millis(asset)?;
        for class_ref in selected.references() {
            if !class_ref.is_retrievable() {
                continue;
            }
            let element = self.element.proxy(ctx, asset)?;
            let Some(data_class) =
                tolerate(self.data_class.proxy_for_ref(ctx, class_ref), &class_ref.id, RELATIONSHIP_TYPE)?
            else {
                continue;
            };
            let modified = [element_modified, ctx.ref_modified_on_millis(class_ref)?];
            if let Some(r) = tolerate(self.proposed(ctx, element, data_class, modified), asset.id(), RELATIONSHIP_TYPE)? {
                out.push(r);
            }
        }
        Ok(out)
    }

    fn proposed_from_data_class(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
    ) -> MappingResult<Vec<CanonicalRelationship>> {
        let selected_by = ctx.property(asset, CLASSIFICATIONS_SELECTED)?;
        let class_modified = ctx.modified_on_millis(asset)?;
        let mut out = Vec::new();
        for element_ref in selected_by.references() {
            if !element_ref.is_retrievable() || element_ref.native_type != self.element.native_type {
                tracing::debug!(
                    rid = %asset.id(),
                    endpoint = %element_ref.id,
                    native_type = %element_ref.native_type,
                    "skipping unmapped classified asset"
                );
                continue;
            }
            let data_class = self.data_class.proxy(ctx, asset)?;
            let Some(element) =
                tolerate(self.element.proxy_for_ref(ctx, element_ref), &element_ref.id, RELATIONSHIP_TYPE)?
            else {
                continue;
            };
            let modified = [ctx.ref_modified_on_millis(element_ref)?, class_modified];
            if let Some(r) = tolerate(self.proposed(ctx, element, data_class, modified), asset.id(), RELATIONSHIP_TYPE)? {
                out.push(r);
            }
        }
        Ok(out)
    }

    /// An endpoint of a carrier, re-fetched by id when the first fetch
    /// came back without it.
    fn carrier_endpoint(
        &self,
        ctx: &mut MappingContext<'_>,
        carrier: &NativeAsset,
        property: &str,
    ) -> MappingResult<NativeRef> {
        let mut value = ctx.property(carrier, property)?;
        if value.is_absent() {
            tracing::debug!(rid = %carrier.id(), property, "carrier endpoint missing; fetching it by id");
            value = ctx.refetch_property(&carrier.reference, property)?;
        }
        value
            .references()
            .first()
            .map(|r| (*r).clone())
            .ok_or_else(|| MappingError::IncompleteReference {
                rid: carrier.id().clone(),
                property: property.to_string(),
            })
    }

    fn discovered(
        &self,
        ctx: &mut MappingContext<'_>,
        carrier_ref: &NativeRef,
    ) -> MappingResult<Option<CanonicalRelationship>> {
        let carrier = ctx.require(carrier_ref, DETECTED_CLASSIFICATIONS)?;
        let element_ref = self.carrier_endpoint(ctx, &carrier, CLASSIFIES_ASSET)?;
        let class_ref = self.carrier_endpoint(ctx, &carrier, DATA_CLASS)?;

        if !element_ref.is_retrievable() || !class_ref.is_retrievable() {
            tracing::debug!(rid = %carrier.id(), "excluding carrier with a placeholder endpoint");
            return Ok(None);
        }
        if element_ref.native_type != self.element.native_type {
            tracing::debug!(
                rid = %carrier.id(),
                native_type = %element_ref.native_type,
                "skipping carrier for unmapped asset type"
            );
            return Ok(None);
        }

        let element = self.element.proxy_for_ref(ctx, &element_ref)?;
        let data_class = self.data_class.proxy_for_ref(ctx, &class_ref)?;

        let confidence = ctx
            .property(&carrier, CONFIDENCE_PERCENT)?
            .as_int()
            .and_then(|c| i32::try_from(c).ok());
        let threshold = ctx.property(&carrier, THRESHOLD)?.as_float();
        let value_frequency = if self.has_value_frequency() {
            ctx.property(&carrier, VALUE_FREQUENCY)?.as_int()
        } else {
            None
        };

        RelationshipBuilder::new(RELATIONSHIP_TYPE)
            .proxy1(element)
            .proxy2(data_class)
            .property("confidence", confidence.map(CanonicalValue::Int))
            .property("partialMatch", confidence.map(|c| CanonicalValue::Boolean(c < 100)))
            .property("threshold", threshold.map(CanonicalValue::Float))
            .property("valueFrequency", value_frequency.map(CanonicalValue::Long))
            .property("status", Some(DataClassAssignmentStatus::Discovered.to_value()))
            .version([ctx.modified_on_millis(&carrier)?])
            .carrier(carrier.id().clone())
            .build(ctx)
            .map(Some)
    }

    fn discovered_all<'r>(
        &self,
        ctx: &mut MappingContext<'_>,
        owner: &NativeAsset,
        carriers: impl IntoIterator<Item = &'r NativeRef>,
    ) -> MappingResult<Vec<CanonicalRelationship>> {
        let mut out = Vec::new();
        for carrier in carriers {
            if let Some(Some(r)) = tolerate(self.discovered(ctx, carrier), owner.id(), RELATIONSHIP_TYPE)? {
                out.push(r);
            }
        }
        Ok(out)
    }

    /// Per-representation effect of one property predicate.
    fn apply(&self, m: &PropertyMatch, discovered: &mut QueryBuilder, proposed: &mut QueryBuilder) {
        match m.property.as_str() {
            "confidence" => {
                discovered.condition(m.condition(CONFIDENCE_PERCENT));
                proposed.unsatisfiable();
            }
            "threshold" => {
                discovered.condition(m.condition(THRESHOLD));
                proposed.unsatisfiable();
            }
            "valueFrequency" => {
                if self.has_value_frequency() {
                    discovered.condition(m.condition(VALUE_FREQUENCY));
                } else {
                    discovered.unsatisfiable();
                }
                proposed.unsatisfiable();
            }
            "partialMatch" => {
                let partial = m.matches_text("true");
                let full = m.matches_text("false");
                match (partial, full) {
                    (true, true) => discovered.constrain(ConditionSet::all()),
                    (true, false) => discovered.condition(Condition::less_than(CONFIDENCE_PERCENT, 100i64)),
                    (false, true) => discovered.condition(Condition::equals(CONFIDENCE_PERCENT, 100i64)),
                    (false, false) => discovered.unsatisfiable(),
                }
                proposed.unsatisfiable();
            }
            "status" => {
                let wanted: Vec<Representation> = DataClassAssignmentStatus::ALL
                    .iter()
                    .filter(|s| m.matches_text(s.symbolic_name()))
                    .filter_map(|s| s.representation())
                    .collect();
                discovered.literal(wanted.contains(&Representation::LinkObject));
                proposed.literal(wanted.contains(&Representation::Direct));
            }
            name if LITERAL_NULL.contains(&name) => {
                discovered.literal(false);
                proposed.literal(false);
            }
            other => {
                tracing::debug!(property = other, "unrecognized {RELATIONSHIP_TYPE} property; forcing zero rows");
                discovered.force_empty();
                proposed.force_empty();
            }
        }
    }
}

impl RelationshipMapper for DataClassAssignmentMapper {
    fn relationship_type(&self) -> &str {
        RELATIONSHIP_TYPE
    }

    fn endpoints(&self) -> [&Endpoint; 2] {
        [&self.element, &self.data_class]
    }

    fn carrier_types(&self) -> Vec<&str> {
        vec![CARRIER_TYPE]
    }

    fn map_from(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Vec<CanonicalRelationship>> {
        if self.element.is(asset.native_type(), prefix) {
            let mut out = self.proposed_from_element(ctx, asset)?;
            let detected = ctx.property(asset, DETECTED_CLASSIFICATIONS)?;
            out.extend(self.discovered_all(ctx, asset, detected.references())?);
            Ok(out)
        } else if self.data_class.is(asset.native_type(), prefix) {
            let mut out = self.proposed_from_data_class(ctx, asset)?;
            let query = NativeQuery::new(CARRIER_TYPE).with_conditions(
                ConditionSet::all().with(Condition::equals(
                    format!("{DATA_CLASS}.{ID_PROPERTY}"),
                    asset.id().as_str(),
                )),
            );
            let carriers = ctx.search(&query)?;
            out.extend(self.discovered_all(ctx, asset, &carriers)?);
            Ok(out)
        } else {
            Err(MappingError::UnsupportedType {
                type_name: asset.native_type().to_string(),
                prefix: prefix.cloned(),
            })
        }
    }

    fn map_hit(&self, ctx: &mut MappingContext<'_>, hit: &NativeRef) -> MappingResult<Vec<CanonicalRelationship>> {
        if hit.native_type == CARRIER_TYPE {
            return Ok(self.discovered(ctx, hit)?.into_iter().collect());
        }
        let asset = ctx.require(hit, RELATIONSHIP_TYPE)?;
        if asset.native_type() == self.data_class.native_type {
            self.proposed_from_data_class(ctx, &asset)
        } else {
            self.map_from(ctx, &asset, self.element.prefix.as_ref())
        }
    }

    fn search_queries(
        &self,
        criteria: &SearchCriteria,
        _config: &MappingConfig,
    ) -> MappingResult<Vec<NativeQuery>> {
        let combinator = criteria.combinator();
        let mut discovered = QueryBuilder::new(
            NativeQuery::new(CARRIER_TYPE),
            ConditionSet::all()
                .with(Condition::not_null(CLASSIFIES_ASSET))
                .with(Condition::not_null(DATA_CLASS)),
            combinator,
        );
        let mut proposed = QueryBuilder::new(
            NativeQuery::new(self.data_class.native_type.as_str()),
            ConditionSet::all().with(Condition::not_null(CLASSIFICATIONS_SELECTED)),
            combinator,
        );

        match criteria {
            SearchCriteria::Properties { matches, .. } => {
                for m in matches {
                    self.apply(m, &mut discovered, &mut proposed);
                }
            }
            // Only the status is textual.
            SearchCriteria::Text(text) => {
                discovered.literal(text.matches_text(DataClassAssignmentStatus::Discovered.symbolic_name()));
                proposed.literal(text.matches_text(DataClassAssignmentStatus::Proposed.symbolic_name()));
            }
        }
        Ok(vec![discovered.finish(), proposed.finish()])
    }
}
