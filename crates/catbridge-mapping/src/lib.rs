//! Catbridge mapping layer
//!
//! Maps assets of a native catalog onto the canonical metadata model, and
//! canonical search criteria back onto native queries.
//!
//! ```text
//!                 ┌────────────────────────────────────────────┐
//!   request ────► │ MapperRegistry  (immutable, Send + Sync)   │
//!                 │   (native type, prefix) ─► EntityMapper    │
//!                 └─────────────┬──────────────────────────────┘
//!                               │
//!               ┌───────────────┼─────────────────────┐
//!               ▼               ▼                     ▼
//!        property table   RelationshipMapper   ClassificationMapper
//!        Simple/Literal/   direct | link-object   ancestor marker
//!        Complex rows
//!               │               │                     │
//!               └───────────────┴──────────┬──────────┘
//!                                          ▼
//!                        MappingContext (one per request)
//!                                          │
//!                                          ▼
//!                              NativeClient (collaborator)
//! ```
//!
//! Searches flow the other way through [`SearchCriteriaTranslator`], which
//! produces one [`NativeQuery`] per native representation and forces a query
//! to zero rows rather than widen it.
//!
//! [`sync::WindowedChangeFeed`] lists what changed in a `[from, to)` window;
//! change detection itself lives in `catbridge-changeset`.

pub mod catalog;
pub mod classification;
pub mod client;
pub mod config;
pub mod context;
pub mod criteria;
pub mod entity;
pub mod memory;
pub mod property;
pub mod query;
pub mod registry;
pub mod relationship;
pub mod sync;

pub use catalog::{standard_registry, standard_type_definitions};
pub use classification::{AncestorMarkerClassifier, ClassificationMapper};
pub use client::{NativeClient, PageRequest, PropertyKind, SearchPage, StaticTypeDefinitions, TypeDefinitions};
pub use config::{ConfigError, MappingConfig, NativeVersion};
pub use context::MappingContext;
pub use criteria::{MatchOperator, PropertyMatch, SearchCriteria, SearchCriteriaTranslator, TextSearch};
pub use entity::{EntityMapper, FidelityLevel, MappedEntity};
pub use memory::InMemoryCatalog;
pub use property::{ComplexProperty, PropertyMapping, QualifiedNameProperty, ReferenceNameProperty};
pub use query::{Combinator, Condition, ConditionSet, LikeForm, NativeOperator, NativeQuery};
pub use registry::{BatchOutcome, BatchWarning, MapperKey, MapperRegistry, RegistryBuilder, RegistryError};
pub use relationship::{
    DataClassAssignmentMapper, DataClassAssignmentStatus, DirectRelationshipMapper, Endpoint, EndpointLink,
    RelationshipMapper, Representation,
};
pub use sync::{ChangeWindow, WindowError, WindowedChangeFeed};
