//! Canonical search criteria and their translation into native queries.
//!
//! ```text
//!   SearchCriteria ──► SearchCriteriaTranslator ──► [NativeQuery; 1..n]
//!                         │                            │
//!                         │ property table rows        │ one per native
//!                         │ relationship mappers       │ representation
//!                         ▼                            ▼
//!                  unrecognized property ──────► forced to zero rows
//! ```
//!
//! Translation never widens a search. Whatever cannot be expressed natively
//! either narrows to zero rows or is left to the post-filter
//! ([`SearchCriteria::matches`]) over the mapped results.

use crate::config::MappingConfig;
use crate::entity::EntityMapper;
use crate::property::PropertyMapping;
use crate::query::{Combinator, Condition, ConditionSet, LikeForm, NativeQuery};
use crate::relationship::RelationshipMapper;
use catbridge_model::{CanonicalValue, GenerationPrefix, InstanceProperties, MappingError, MappingResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    Exact,
    StartsWith,
    EndsWith,
    Contains,
}

impl MatchOperator {
    pub fn matches(self, candidate: &str, value: &str) -> bool {
        match self {
            MatchOperator::Exact => candidate == value,
            MatchOperator::StartsWith => candidate.starts_with(value),
            MatchOperator::EndsWith => candidate.ends_with(value),
            MatchOperator::Contains => candidate.contains(value),
        }
    }

    pub fn like_form(self) -> Option<LikeForm> {
        match self {
            MatchOperator::Exact => None,
            MatchOperator::StartsWith => Some(LikeForm::Prefix),
            MatchOperator::EndsWith => Some(LikeForm::Suffix),
            MatchOperator::Contains => Some(LikeForm::Infix),
        }
    }
}

fn quoted_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\.\*)?\\Q(.*?)\\E(\.\*)?$").ok())
        .as_ref()
}

/// Parse a regex-form search value into an operator and literal.
///
/// Accepted: `\Qx\E`, `\Qx\E.*`, `.*\Qx\E`, `.*\Qx\E.*`, and plain literals
/// free of regex metacharacters (exact).
pub fn parse_match_pattern(pattern: &str) -> MappingResult<(MatchOperator, String)> {
    if let Some(caps) = quoted_pattern().and_then(|re| re.captures(pattern)) {
        let literal = caps.get(2).map_or("", |m| m.as_str()).to_string();
        let operator = match (caps.get(1).is_some(), caps.get(3).is_some()) {
            (false, false) => MatchOperator::Exact,
            (false, true) => MatchOperator::StartsWith,
            (true, false) => MatchOperator::EndsWith,
            (true, true) => MatchOperator::Contains,
        };
        return Ok((operator, literal));
    }
    if regex::escape(pattern) == pattern {
        return Ok((MatchOperator::Exact, pattern.to_string()));
    }
    Err(MappingError::UnsupportedSearchPattern {
        pattern: pattern.to_string(),
    })
}

/// One `{property, value, operator}` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMatch {
    pub property: String,
    pub value: String,
    pub operator: MatchOperator,
}

impl PropertyMatch {
    pub fn new(property: &str, operator: MatchOperator, value: &str) -> Self {
        Self {
            property: property.to_string(),
            value: value.to_string(),
            operator,
        }
    }

    pub fn exact(property: &str, value: &str) -> Self {
        Self::new(property, MatchOperator::Exact, value)
    }

    pub fn from_regex(property: &str, pattern: &str) -> MappingResult<Self> {
        let (operator, value) = parse_match_pattern(pattern)?;
        Ok(Self::new(property, operator, &value))
    }

    /// Same property and operator, different literal.
    pub fn with_value(&self, value: &str) -> Self {
        Self::new(&self.property, self.operator, value)
    }

    pub fn matches_text(&self, candidate: &str) -> bool {
        self.operator.matches(candidate, &self.value)
    }

    pub fn matches_value(&self, value: &CanonicalValue) -> bool {
        self.matches_text(&value.match_text())
    }

    /// Native condition applying this predicate to `path`.
    pub fn condition(&self, path: &str) -> Condition {
        match self.operator.like_form() {
            Some(form) => Condition::like(path, form, self.value.as_str()),
            None => Condition::equals(path, self.value.as_str()),
        }
    }
}

/// Free-text predicate applied to every string-valued property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearch {
    pub value: String,
    pub operator: MatchOperator,
}

impl TextSearch {
    pub fn matches_text(&self, candidate: &str) -> bool {
        self.operator.matches(candidate, &self.value)
    }

    /// The free text as a predicate over one named property.
    pub fn on(&self, property: &str) -> PropertyMatch {
        PropertyMatch::new(property, self.operator, &self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCriteria {
    Properties {
        matches: Vec<PropertyMatch>,
        combinator: Combinator,
    },
    Text(TextSearch),
}

impl Default for SearchCriteria {
    fn default() -> Self {
        SearchCriteria::all(Vec::new())
    }
}

impl SearchCriteria {
    pub fn all(matches: Vec<PropertyMatch>) -> Self {
        SearchCriteria::Properties {
            matches,
            combinator: Combinator::All,
        }
    }

    pub fn any(matches: Vec<PropertyMatch>) -> Self {
        SearchCriteria::Properties {
            matches,
            combinator: Combinator::Any,
        }
    }

    pub fn text(operator: MatchOperator, value: &str) -> Self {
        SearchCriteria::Text(TextSearch {
            value: value.to_string(),
            operator,
        })
    }

    pub fn text_regex(pattern: &str) -> MappingResult<Self> {
        let (operator, value) = parse_match_pattern(pattern)?;
        Ok(Self::text(operator, &value))
    }

    /// How predicates combine; free text is a disjunction over properties.
    pub fn combinator(&self) -> Combinator {
        match self {
            SearchCriteria::Properties { combinator, .. } => *combinator,
            SearchCriteria::Text(_) => Combinator::Any,
        }
    }

    /// No predicate at all.
    pub fn is_unconditional(&self) -> bool {
        matches!(self, SearchCriteria::Properties { matches, .. } if matches.is_empty())
    }

    /// Post-filter: whether canonical `properties` satisfy these criteria.
    pub fn matches(&self, properties: &InstanceProperties) -> bool {
        match self {
            SearchCriteria::Properties { matches, .. } if matches.is_empty() => true,
            SearchCriteria::Properties { matches, combinator } => {
                let hit = |m: &PropertyMatch| {
                    properties
                        .get(&m.property)
                        .is_some_and(|v| m.matches_value(v))
                };
                match combinator {
                    Combinator::All => matches.iter().all(hit),
                    Combinator::Any => matches.iter().any(hit),
                }
            }
            SearchCriteria::Text(text) => properties.values().any(|v| {
                matches!(v, CanonicalValue::String(_) | CanonicalValue::Enum { .. })
                    && text.matches_text(&v.match_text())
            }),
        }
    }
}

// ============================================================================
// Query assembly
// ============================================================================

/// Accumulates the filters for one native query.
///
/// The base set always applies (it selects the representation); filters are
/// joined by the criteria's combinator. Under ANY an unsatisfiable filter is
/// dropped and a satisfied literal lifts every filter; under ALL either one
/// forces zero rows.
#[derive(Debug, Clone)]
pub(crate) struct QueryBuilder {
    query: NativeQuery,
    base: ConditionSet,
    filters: ConditionSet,
    requested: usize,
    dropped: usize,
    forced: bool,
    unconditional: bool,
}

impl QueryBuilder {
    pub(crate) fn new(query: NativeQuery, base: ConditionSet, combinator: Combinator) -> Self {
        Self {
            query,
            base,
            filters: ConditionSet::with_combinator(combinator),
            requested: 0,
            dropped: 0,
            forced: false,
            unconditional: false,
        }
    }

    fn combinator(&self) -> Combinator {
        self.filters.combinator
    }

    pub(crate) fn constrain(&mut self, set: ConditionSet) {
        self.requested += 1;
        if set.is_impossible() {
            self.mark_unsatisfiable();
        } else if set.is_empty() {
            if self.combinator() == Combinator::Any {
                self.unconditional = true;
            }
        } else {
            self.filters.push_set(set);
        }
    }

    pub(crate) fn condition(&mut self, condition: Condition) {
        self.constrain(ConditionSet::all().with(condition));
    }

    /// A filter evaluated at translation time.
    pub(crate) fn literal(&mut self, matched: bool) {
        self.constrain(if matched {
            ConditionSet::all()
        } else {
            ConditionSet::impossible()
        });
    }

    /// A filter this representation can never satisfy.
    pub(crate) fn unsatisfiable(&mut self) {
        self.constrain(ConditionSet::impossible());
    }

    fn mark_unsatisfiable(&mut self) {
        match self.combinator() {
            Combinator::All => self.forced = true,
            Combinator::Any => self.dropped += 1,
        }
    }

    /// Zero rows regardless of combinator.
    pub(crate) fn force_empty(&mut self) {
        self.forced = true;
    }

    pub(crate) fn finish(self) -> NativeQuery {
        let mut query = self.query;
        let all_dropped = self.requested > 0 && self.dropped == self.requested;
        if self.forced || all_dropped {
            query.force_no_results();
            return query;
        }
        let mut conditions = self.base;
        if !self.unconditional {
            conditions.push_set(self.filters);
        }
        query.conditions = conditions;
        query
    }
}

/// Apply `criteria` to `builder` through a property table.
pub(crate) fn apply_table(
    builder: &mut QueryBuilder,
    table: &[PropertyMapping],
    criteria: &SearchCriteria,
    native_type: &str,
    prefix: Option<&GenerationPrefix>,
) -> MappingResult<()> {
    match criteria {
        SearchCriteria::Properties { matches, .. } => {
            for m in matches {
                match table.iter().find(|row| row.canonical_name() == m.property) {
                    Some(row) => apply_row(builder, row, m, native_type, prefix)?,
                    None => {
                        tracing::debug!(
                            property = %m.property,
                            native_type,
                            "unrecognized search property; forcing zero rows"
                        );
                        builder.force_empty();
                    }
                }
            }
        }
        SearchCriteria::Text(text) => {
            for row in table {
                apply_row(builder, row, &text.on(row.canonical_name()), native_type, prefix)?;
            }
            if builder.requested == 0 {
                builder.force_empty();
            }
        }
    }
    Ok(())
}

fn apply_row(
    builder: &mut QueryBuilder,
    row: &PropertyMapping,
    m: &PropertyMatch,
    native_type: &str,
    prefix: Option<&GenerationPrefix>,
) -> MappingResult<()> {
    match row {
        PropertyMapping::Simple { native, .. } => builder.condition(m.condition(native)),
        PropertyMapping::Literal { value, .. } => {
            builder.literal(value.as_ref().is_some_and(|v| m.matches_value(v)))
        }
        PropertyMapping::Complex { property, .. } => match property.search(m, native_type, prefix)? {
            Some(set) => builder.constrain(set),
            None => builder.unsatisfiable(),
        },
    }
    Ok(())
}

/// Converts canonical search criteria into native queries.
#[derive(Debug, Clone, Copy)]
pub struct SearchCriteriaTranslator<'a> {
    config: &'a MappingConfig,
}

impl<'a> SearchCriteriaTranslator<'a> {
    pub fn new(config: &'a MappingConfig) -> Self {
        Self { config }
    }

    /// Entities stored directly on one native type: a single query.
    pub fn entity_queries(
        &self,
        mapper: &EntityMapper,
        criteria: &SearchCriteria,
    ) -> MappingResult<Vec<NativeQuery>> {
        let mut builder = QueryBuilder::new(
            NativeQuery::new(mapper.native_type()),
            ConditionSet::all(),
            criteria.combinator(),
        );
        apply_table(
            &mut builder,
            mapper.table(),
            criteria,
            mapper.native_type(),
            mapper.prefix(),
        )?;
        Ok(vec![builder.finish()])
    }

    /// Entities of `mapper`'s type carrying `classification_type` whose
    /// classification properties satisfy `criteria`.
    pub fn classification_queries(
        &self,
        mapper: &EntityMapper,
        classification_type: &str,
        criteria: &SearchCriteria,
    ) -> MappingResult<Vec<NativeQuery>> {
        let classifier = mapper
            .classification_mapper(classification_type)
            .ok_or_else(|| MappingError::unsupported_type(classification_type))?;
        let conditions = classifier.search_conditions(criteria)?;
        Ok(vec![
            NativeQuery::new(mapper.native_type()).with_conditions(conditions)
        ])
    }

    /// One query per native representation of the relationship.
    pub fn relationship_queries(
        &self,
        mapper: &dyn RelationshipMapper,
        criteria: &SearchCriteria,
    ) -> MappingResult<Vec<NativeQuery>> {
        mapper.search_queries(criteria, self.config)
    }
}
