//! Incremental sync feed.
//!
//! An external scheduler drives synchronization in half-open time windows:
//!
//! ```text
//!   scheduler ──[from, to)──► WindowedChangeFeed
//!                                 │ same bounds as last call? reuse working set
//!                                 │ different bounds?        recompute
//!                                 ▼
//!                 assets with modified_on ∈ [from, to) across every native type
//!                                 │
//!                     ┌───────────┴────────────┐
//!                     ▼                        ▼
//!             changed_entities       changed_relationships
//! ```
//!
//! The feed is owned by the caller; nothing about a window outlives it.

use crate::context::MappingContext;
use crate::entity::{FidelityLevel, MappedEntity};
use crate::query::{Condition, ConditionSet, NativeQuery};
use crate::registry::{BatchOutcome, MapperRegistry};
use catbridge_model::{CanonicalRelationship, MappingResult, NativeRef, NativeValue, MODIFIED_ON};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Window
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("window start {from} is not before its end {to}")]
    Empty { from: DateTime<Utc>, to: DateTime<Utc> },
}

/// Half-open interval `[from, to)` of modification times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl ChangeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, WindowError> {
        if from >= to {
            return Err(WindowError::Empty { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }

    fn conditions(&self) -> ConditionSet {
        ConditionSet::all()
            .with(Condition::at_least(MODIFIED_ON, NativeValue::Timestamp(self.from)))
            .with(Condition::less_than(MODIFIED_ON, NativeValue::Timestamp(self.to)))
    }
}

// ============================================================================
// Feed
// ============================================================================

/// Changed canonical instances per window, computing each window's working
/// set of native assets at most once.
#[derive(Debug)]
pub struct WindowedChangeFeed<'r> {
    registry: &'r MapperRegistry,
    current: Option<(ChangeWindow, Vec<NativeRef>)>,
}

impl<'r> WindowedChangeFeed<'r> {
    pub fn new(registry: &'r MapperRegistry) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    /// Window of the cached working set, if any.
    pub fn current_window(&self) -> Option<ChangeWindow> {
        self.current.as_ref().map(|(w, _)| *w)
    }

    /// Native assets modified within `window`.
    pub fn working_set(&mut self, ctx: &mut MappingContext<'_>, window: ChangeWindow) -> MappingResult<&[NativeRef]> {
        let stale = self.current.as_ref().is_some_and(|(w, _)| *w != window);
        if stale || self.current.is_none() {
            if stale {
                tracing::debug!(from = %window.from, to = %window.to, "window bounds changed; discarding working set");
            }
            let query = NativeQuery {
                asset_types: self.registry.native_types().into_iter().collect(),
                properties: vec![MODIFIED_ON.to_string()],
                conditions: window.conditions(),
            };
            let changed = ctx.search(&query)?;
            tracing::debug!(
                from = %window.from,
                to = %window.to,
                assets = changed.len(),
                "computed window working set"
            );
            self.current = Some((window, changed));
        }
        Ok(self.current.as_ref().map(|(_, refs)| refs.as_slice()).unwrap_or_default())
    }

    /// Canonical entities whose native asset changed within `window`.
    pub fn changed_entities(
        &mut self,
        ctx: &mut MappingContext<'_>,
        window: ChangeWindow,
        level: FidelityLevel,
    ) -> MappingResult<BatchOutcome<MappedEntity>> {
        let registry = self.registry;
        let changed = self.working_set(ctx, window)?.to_vec();

        let mut outcome = BatchOutcome::new();
        for reference in &changed {
            for mapper in registry.mappers_for_native(&reference.native_type) {
                let mapped = ctx
                    .require(reference, mapper.canonical_type())
                    .and_then(|asset| mapper.map(ctx, &asset, level));
                match mapped {
                    Ok(mapped) => outcome.items.push(mapped),
                    Err(err) => outcome.warn(&reference.id, &err),
                }
            }
        }
        Ok(outcome)
    }

    /// Canonical relationships touching any native asset (or carrier) that
    /// changed within `window`, de-duplicated by GUID.
    pub fn changed_relationships(
        &mut self,
        ctx: &mut MappingContext<'_>,
        window: ChangeWindow,
    ) -> MappingResult<BatchOutcome<CanonicalRelationship>> {
        let registry = self.registry;
        let changed = self.working_set(ctx, window)?.to_vec();

        let mut outcome = BatchOutcome::new();
        let mut seen = HashSet::new();
        for reference in &changed {
            for relationship in registry.relationship_mappers() {
                if relationship.carrier_types().contains(&reference.native_type.as_str()) {
                    match relationship.map_hit(ctx, reference) {
                        Ok(found) => outcome.items.extend(found.into_iter().filter(|r| seen.insert(r.guid))),
                        Err(err) => outcome.warn(&reference.id, &err),
                    }
                }
            }
            for mapper in registry.mappers_for_native(&reference.native_type) {
                let asset = match ctx.require(reference, mapper.canonical_type()) {
                    Ok(asset) => asset,
                    Err(err) => {
                        outcome.warn(&reference.id, &err);
                        continue;
                    }
                };
                for relationship in mapper.relationship_mappers() {
                    match relationship.map_from(ctx, &asset, mapper.prefix()) {
                        Ok(found) => outcome.items.extend(found.into_iter().filter(|r| seen.insert(r.guid))),
                        Err(err) => outcome.warn(&reference.id, &err),
                    }
                }
            }
        }
        Ok(outcome)
    }
}
