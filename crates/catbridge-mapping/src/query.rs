//! Native query model.
//!
//! A query names the native asset types to search and a tree of conditions
//! over dotted property paths (`parent_category.parent_category.name`).

use catbridge_model::NativeValue;
use serde::{Deserialize, Serialize};

/// Native pseudo-property holding the asset id; never null.
pub const ID_PROPERTY: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    All,
    Any,
}

/// Position of the wildcard in a native `like` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeForm {
    /// `like 'x%'`
    Prefix,
    /// `like '%x'`
    Suffix,
    /// `like '%x%'`
    Infix,
}

impl LikeForm {
    pub fn matches(self, candidate: &str, value: &str) -> bool {
        match self {
            LikeForm::Prefix => candidate.starts_with(value),
            LikeForm::Suffix => candidate.ends_with(value),
            LikeForm::Infix => candidate.contains(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeOperator {
    Equals,
    NotEquals,
    Like(LikeForm),
    IsNull,
    NotNull,
    LessThan,
    AtLeast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub property: String,
    pub operator: NativeOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<NativeValue>,
}

impl Condition {
    fn new(property: impl Into<String>, operator: NativeOperator, value: Option<NativeValue>) -> Self {
        Self {
            property: property.into(),
            operator,
            value,
        }
    }

    pub fn equals(property: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        Self::new(property, NativeOperator::Equals, Some(value.into()))
    }

    pub fn not_equals(property: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        Self::new(property, NativeOperator::NotEquals, Some(value.into()))
    }

    pub fn like(property: impl Into<String>, form: LikeForm, value: impl Into<String>) -> Self {
        Self::new(
            property,
            NativeOperator::Like(form),
            Some(NativeValue::Text(value.into())),
        )
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self::new(property, NativeOperator::IsNull, None)
    }

    pub fn not_null(property: impl Into<String>) -> Self {
        Self::new(property, NativeOperator::NotNull, None)
    }

    pub fn less_than(property: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        Self::new(property, NativeOperator::LessThan, Some(value.into()))
    }

    pub fn at_least(property: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        Self::new(property, NativeOperator::AtLeast, Some(value.into()))
    }
}

/// Conditions and nested sets joined by one combinator.
///
/// An empty set places no constraint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionSet {
    pub combinator: Combinator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ConditionSet>,
}

impl ConditionSet {
    pub fn all() -> Self {
        Self::with_combinator(Combinator::All)
    }

    pub fn any() -> Self {
        Self::with_combinator(Combinator::Any)
    }

    pub fn with_combinator(combinator: Combinator) -> Self {
        Self {
            combinator,
            conditions: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// A set no asset can satisfy: its id is never null.
    pub fn impossible() -> Self {
        Self::all().with(Condition::is_null(ID_PROPERTY))
    }

    pub fn is_impossible(&self) -> bool {
        self.combinator == Combinator::All
            && (self
                .conditions
                .iter()
                .any(|c| c.property == ID_PROPERTY && c.operator == NativeOperator::IsNull)
                || self.nested.iter().any(ConditionSet::is_impossible))
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn nest(mut self, set: ConditionSet) -> Self {
        self.push_set(set);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Adds `set`, flattening it when it has a single member or shares this
    /// set's combinator.
    pub fn push_set(&mut self, set: ConditionSet) {
        if set.is_empty() {
            return;
        }
        if set.len() == 1 || set.combinator == self.combinator {
            self.conditions.extend(set.conditions);
            self.nested.extend(set.nested);
        } else {
            self.nested.push(set);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.nested.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len() + self.nested.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeQuery {
    pub asset_types: Vec<String>,
    /// Properties the caller wants returned with each hit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    pub conditions: ConditionSet,
}

impl NativeQuery {
    pub fn new(asset_type: impl Into<String>) -> Self {
        Self {
            asset_types: vec![asset_type.into()],
            properties: Vec::new(),
            conditions: ConditionSet::all(),
        }
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Replace every condition with one that no asset satisfies.
    pub fn force_no_results(&mut self) {
        self.conditions = ConditionSet::impossible();
    }

    pub fn is_forced_empty(&self) -> bool {
        self.conditions.is_impossible()
    }
}
