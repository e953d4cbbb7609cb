//! Declarative property tables.
//!
//! An entity mapper is parameterized by a table of rows, each producing one
//! canonical property:
//!
//! | kind      | source                                                    |
//! |-----------|-----------------------------------------------------------|
//! | `Simple`  | one native property, copied with type coercion            |
//! | `Literal` | a fixed constant (often null) with no native analog       |
//! | `Complex` | a [`ComplexProperty`] callback that may fetch more data   |
//!
//! Shared canonical supertypes are plain tables concatenated into the
//! subtype's table.

use crate::client::PropertyKind;
use crate::context::MappingContext;
use crate::criteria::{MatchOperator, PropertyMatch};
use crate::query::{Condition, ConditionSet};
use catbridge_model::{
    CanonicalValue, GenerationPrefix, MappingResult, NativeAsset, NativeValue, CONTEXT, NAME,
};
use std::fmt;
use std::sync::Arc;

/// Custom logic behind a `Complex` table row.
pub trait ComplexProperty: Send + Sync + fmt::Debug {
    fn map(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<CanonicalValue>>;

    /// Native conditions approximating `matcher`.
    ///
    /// `None` means the property cannot be searched natively. An empty set
    /// places no native constraint; results are then post-filtered.
    fn search(
        &self,
        matcher: &PropertyMatch,
        native_type: &str,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<ConditionSet>>;
}

#[derive(Debug, Clone)]
pub enum PropertyMapping {
    Simple { native: String, canonical: String },
    Literal { canonical: String, value: Option<CanonicalValue> },
    Complex { canonical: String, property: Arc<dyn ComplexProperty> },
}

impl PropertyMapping {
    pub fn simple(native: &str, canonical: &str) -> Self {
        PropertyMapping::Simple {
            native: native.to_string(),
            canonical: canonical.to_string(),
        }
    }

    pub fn literal(canonical: &str, value: CanonicalValue) -> Self {
        PropertyMapping::Literal {
            canonical: canonical.to_string(),
            value: Some(value),
        }
    }

    /// A canonical property that is always unset.
    pub fn literal_null(canonical: &str) -> Self {
        PropertyMapping::Literal {
            canonical: canonical.to_string(),
            value: None,
        }
    }

    pub fn complex(canonical: &str, property: impl ComplexProperty + 'static) -> Self {
        PropertyMapping::Complex {
            canonical: canonical.to_string(),
            property: Arc::new(property),
        }
    }

    pub fn canonical_name(&self) -> &str {
        match self {
            PropertyMapping::Simple { canonical, .. }
            | PropertyMapping::Literal { canonical, .. }
            | PropertyMapping::Complex { canonical, .. } => canonical,
        }
    }

    /// Compute the canonical value for `asset`; `None` leaves it unset.
    pub fn map(
        &self,
        ctx: &mut MappingContext<'_>,
        canonical_type: &str,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<CanonicalValue>> {
        match self {
            PropertyMapping::Simple { native, canonical } => {
                let value = ctx.property(asset, native)?;
                if value.is_absent() {
                    return Ok(None);
                }
                let kind = ctx
                    .property_kind(canonical_type, canonical)
                    .unwrap_or(PropertyKind::String);
                let coerced = coerce(&value, kind);
                if coerced.is_none() {
                    tracing::debug!(
                        rid = %asset.id(),
                        property = %native,
                        kind = ?kind,
                        "native value does not coerce; leaving property unset"
                    );
                }
                Ok(coerced)
            }
            PropertyMapping::Literal { value, .. } => Ok(value.clone()),
            PropertyMapping::Complex { property, .. } => property.map(ctx, asset, prefix),
        }
    }
}

/// Convert a native value to the canonical kind, when it fits.
pub fn coerce(value: &NativeValue, kind: PropertyKind) -> Option<CanonicalValue> {
    match kind {
        PropertyKind::String => value.as_search_text().map(CanonicalValue::String),
        PropertyKind::Int => value
            .as_int()
            .and_then(|i| i32::try_from(i).ok())
            .map(CanonicalValue::Int),
        PropertyKind::Long => value.as_int().map(CanonicalValue::Long),
        PropertyKind::Float => value.as_float().map(CanonicalValue::Float),
        PropertyKind::Boolean => value.as_bool().map(CanonicalValue::Boolean),
        PropertyKind::Date => value.as_timestamp().map(CanonicalValue::Date),
        // Enum ordinals come from a complex row that knows the symbol table.
        PropertyKind::Enum => None,
    }
}

// ============================================================================
// Qualified names
// ============================================================================

/// `(type)=name::(type)=name::...` over the asset's ancestors and itself,
/// wrapped as `gen!<PREFIX>@...` for derived views.
pub fn qualified_name(
    ctx: &mut MappingContext<'_>,
    asset: &NativeAsset,
    prefix: Option<&GenerationPrefix>,
) -> MappingResult<String> {
    let ancestors = ctx.property(asset, CONTEXT)?;
    let mut segments: Vec<String> = ancestors
        .references()
        .into_iter()
        .map(|r| format!("({})={}", r.native_type, r.display_name()))
        .collect();

    let name = match asset.name() {
        Some(name) => name.to_string(),
        None => ctx
            .property(asset, NAME)?
            .as_search_text()
            .unwrap_or_else(|| asset.id().to_string()),
    };
    segments.push(format!("({})={}", asset.native_type(), name));

    let base = segments.join("::");
    Ok(match prefix {
        Some(p) => p.qualify(&base),
        None => base,
    })
}

/// Every name `qualified_name` could end with for an asset of
/// `native_type`: the text after each `(native_type)=` that opens a segment.
///
/// Names may themselves contain `::` or `)=`, so more than one split can be
/// plausible; the true name is always among them.
fn exact_name_candidates<'v>(qualified_name: &'v str, native_type: &str) -> Vec<&'v str> {
    let marker = format!("({native_type})=");
    qualified_name
        .match_indices(marker.as_str())
        .filter(|(i, _)| *i == 0 || qualified_name[..*i].ends_with("::"))
        .map(|(i, _)| &qualified_name[i + marker.len()..])
        .collect()
}

/// Names a qualified name ending in `suffix` could have, when `suffix`
/// reaches back past the `=` that opens the name.
fn suffix_name_candidates(suffix: &str) -> Vec<&str> {
    suffix
        .match_indices('=')
        .map(|(i, _)| &suffix[i + 1..])
        .filter(|name| !name.is_empty())
        .collect()
}

fn any_name(names: &[&str]) -> ConditionSet {
    names.iter().fold(ConditionSet::any(), |set, name| {
        set.with(Condition::equals(NAME, *name))
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QualifiedNameProperty;

impl ComplexProperty for QualifiedNameProperty {
    fn map(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<CanonicalValue>> {
        qualified_name(ctx, asset, prefix).map(|qn| Some(CanonicalValue::String(qn)))
    }

    fn search(
        &self,
        matcher: &PropertyMatch,
        native_type: &str,
        prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<ConditionSet>> {
        let mut value = matcher.value.as_str();
        if let Some(p) = prefix {
            let marker = p.qualify("");
            match matcher.operator {
                MatchOperator::Exact | MatchOperator::StartsWith => match value.strip_prefix(&marker) {
                    Some(rest) => value = rest,
                    None if marker.starts_with(value) => return Ok(Some(ConditionSet::all())),
                    None => return Ok(Some(ConditionSet::impossible())),
                },
                MatchOperator::EndsWith | MatchOperator::Contains => {}
            }
        } else if value.starts_with("gen!") && matcher.operator == MatchOperator::Exact {
            return Ok(Some(ConditionSet::impossible()));
        }

        match matcher.operator {
            MatchOperator::Exact => {
                let names = exact_name_candidates(value, native_type);
                Ok(Some(if names.is_empty() {
                    ConditionSet::impossible()
                } else {
                    any_name(&names)
                }))
            }
            // A suffix without `=` lies inside the name; one with `=` may
            // start at any of them.
            MatchOperator::EndsWith => {
                let within = matcher.with_value(value).condition(NAME);
                Ok(Some(if value.contains('=') {
                    any_name(&suffix_name_candidates(value)).with(within)
                } else {
                    ConditionSet::all().with(within)
                }))
            }
            // The name sits at the end of the qualified name, so a prefix or
            // infix says nothing certain about it natively.
            MatchOperator::StartsWith | MatchOperator::Contains => Ok(Some(ConditionSet::all())),
        }
    }
}

/// Canonical string sourced from the name of a referenced asset, e.g. a
/// policy's `domain` from its `parent_policy`.
#[derive(Debug, Clone)]
pub struct ReferenceNameProperty {
    native: String,
}

impl ReferenceNameProperty {
    pub fn new(native: &str) -> Self {
        Self {
            native: native.to_string(),
        }
    }
}

impl ComplexProperty for ReferenceNameProperty {
    fn map(
        &self,
        ctx: &mut MappingContext<'_>,
        asset: &NativeAsset,
        _prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<CanonicalValue>> {
        let value = ctx.property(asset, &self.native)?;
        Ok(value
            .references()
            .first()
            .filter(|r| r.is_retrievable())
            .map(|r| CanonicalValue::string(r.display_name())))
    }

    fn search(
        &self,
        matcher: &PropertyMatch,
        _native_type: &str,
        _prefix: Option<&GenerationPrefix>,
    ) -> MappingResult<Option<ConditionSet>> {
        let path = format!("{}.{}", self.native, NAME);
        Ok(Some(ConditionSet::all().with(matcher.condition(&path))))
    }
}
