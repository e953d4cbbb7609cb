//! Classification mappers.
//!
//! A classification here is a derived predicate over the native graph rather
//! than stored data. [`AncestorMarkerClassifier`] walks up a parent chain:
//!
//! ```text
//!   [Root] ── [Marker] ── [Area] ── [Leaf]        Leaf: SubjectArea{name: Area}
//!                  └───── [Area2]                 Area2: SubjectArea{name: Area2}
//!   [Root] ── [Other] ── [Leaf2]                  Leaf2: not classified
//! ```

use crate::context::MappingContext;
use crate::criteria::{PropertyMatch, SearchCriteria};
use crate::query::{Combinator, Condition, ConditionSet};
use catbridge_model::{
    CanonicalClassification, CanonicalValue, InstanceProperties, MappingResult, NativeAsset, NativeRef, NAME,
};
use std::fmt;

pub trait ClassificationMapper: Send + Sync + fmt::Debug {
    fn classification_type(&self) -> &str;

    /// Zero or one classification for `asset`.
    fn classify(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
    ) -> MappingResult<Option<CanonicalClassification>>;

    /// Native conditions selecting assets that carry this classification with
    /// properties satisfying `criteria`. Unconditional criteria select every
    /// classified asset.
    fn search_conditions(&self, criteria: &SearchCriteria) -> MappingResult<ConditionSet>;
}

/// Classifies assets whose parent chain reaches a marker within a bounded
/// number of hops. The classification's `name` is the ancestor sitting
/// directly under the marker (or the asset itself when its parent is the
/// marker).
#[derive(Debug, Clone)]
pub struct AncestorMarkerClassifier {
    classification_type: String,
    parent: String,
    marker: String,
    max_hops: usize,
}

impl AncestorMarkerClassifier {
    pub fn new(classification_type: &str, parent: &str, marker: &str, max_hops: usize) -> Self {
        Self {
            classification_type: classification_type.to_string(),
            parent: parent.to_string(),
            marker: marker.to_string(),
            max_hops,
        }
    }

    /// `parent.parent.<...>` with `hops` segments, then `.name`.
    fn name_path(&self, hops: usize) -> String {
        let mut segments = vec![self.parent.as_str(); hops];
        segments.push(NAME);
        segments.join(".")
    }

    /// Some ancestor within range is the marker.
    fn existence(&self) -> ConditionSet {
        (1..=self.max_hops).fold(ConditionSet::any(), |set, hops| {
            set.with(Condition::equals(self.name_path(hops), self.marker.as_str()))
        })
    }

    /// The node directly under the marker has a name satisfying `m`.
    fn name_match(&self, m: &PropertyMatch) -> ConditionSet {
        (0..self.max_hops).fold(ConditionSet::any(), |set, hops| {
            set.nest(
                ConditionSet::all()
                    .with(m.condition(&self.name_path(hops)))
                    .with(Condition::equals(self.name_path(hops + 1), self.marker.as_str())),
            )
        })
    }

    fn property_conditions(&self, m: &PropertyMatch) -> ConditionSet {
        if m.property == NAME {
            self.name_match(m)
        } else {
            tracing::debug!(
                classification = %self.classification_type,
                property = %m.property,
                "unrecognized classification property; forcing zero rows"
            );
            ConditionSet::impossible()
        }
    }

    fn parent_of(&self, ctx: &mut MappingContext<'_>, node: &NativeRef) -> MappingResult<Option<NativeRef>> {
        let parent = ctx.ref_property(node, &self.parent)?;
        Ok(parent
            .references()
            .first()
            .filter(|r| r.is_retrievable())
            .map(|r| (*r).clone()))
    }
}

impl ClassificationMapper for AncestorMarkerClassifier {
    fn classification_type(&self) -> &str {
        &self.classification_type
    }

    fn classify(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
    ) -> MappingResult<Option<CanonicalClassification>> {
        let mut below = asset.to_ref();
        let Some(mut current) = ctx
            .property(asset, &self.parent)?
            .references()
            .first()
            .filter(|r| r.is_retrievable())
            .map(|r| (*r).clone())
        else {
            return Ok(None);
        };

        for hop in 1..=self.max_hops {
            if current.display_name() == self.marker {
                tracing::debug!(
                    rid = %asset.id(),
                    classification = %self.classification_type,
                    hop,
                    "marker ancestor found"
                );
                return Ok(Some(CanonicalClassification {
                    type_name: self.classification_type.clone(),
                    properties: InstanceProperties::from([(
                        NAME.to_string(),
                        CanonicalValue::string(below.display_name()),
                    )]),
                }));
            }
            if hop == self.max_hops {
                break;
            }
            let Some(next) = self.parent_of(ctx, &current)? else {
                break;
            };
            below = std::mem::replace(&mut current, next);
        }
        Ok(None)
    }

    fn search_conditions(&self, criteria: &SearchCriteria) -> MappingResult<ConditionSet> {
        let filters: Vec<ConditionSet> = match criteria {
            SearchCriteria::Properties { matches, .. } => {
                matches.iter().map(|m| self.property_conditions(m)).collect()
            }
            SearchCriteria::Text(text) => vec![self.name_match(&text.on(NAME))],
        };

        let mut combined = ConditionSet::with_combinator(criteria.combinator());
        let mut impossible = 0;
        for set in &filters {
            if set.is_impossible() {
                impossible += 1;
            } else {
                combined.push_set(set.clone());
            }
        }
        let unsatisfiable = match criteria.combinator() {
            Combinator::All => impossible > 0,
            Combinator::Any => !filters.is_empty() && impossible == filters.len(),
        };
        if unsatisfiable {
            return Ok(ConditionSet::impossible());
        }

        Ok(ConditionSet::all().nest(self.existence()).nest(combined))
    }
}
