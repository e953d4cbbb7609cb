//! Catbridge shared model
//!
//! Both sides of the bridge live here:
//!
//! ```text
//! ┌──────────────────────────┐          ┌──────────────────────────────┐
//! │   NATIVE CATALOG SIDE    │          │       CANONICAL SIDE         │
//! │                          │          │                              │
//! │  NativeRef (RID, type,   │  guid()  │  CanonicalEntity             │
//! │   RefKind tag)           │ ───────► │  CanonicalRelationship       │
//! │  NativeValue / bag       │          │   └─ EntityProxy × 2         │
//! │  NativeAsset             │          │  CanonicalClassification     │
//! │  StubSnapshot (baseline) │          │                              │
//! └──────────────────────────┘          └──────────────────────────────┘
//! ```
//!
//! Identity is a pure function of `(rid, native type, generation prefix)`, see
//! [`guid`]. Everything in this crate is plain data: no I/O, no shared state.

pub mod canonical;
pub mod error;
pub mod guid;
pub mod native;
pub mod stub;

pub use canonical::{
    CanonicalClassification, CanonicalEntity, CanonicalRelationship, CanonicalValue, EntityProxy,
    Guid, InstanceProperties, QUALIFIED_NAME,
};
pub use error::{ClientError, MappingError, MappingResult};
pub use guid::{GenerationPrefix, GuidGenerator, NamespaceGuids, PrefixError, DEFAULT_GUID_NAMESPACE};
pub use native::{
    NativeAsset, NativeRef, NativeValue, PropertyBag, RefKind, RefList, Rid, CONTEXT, MODIFIED_ON,
    NAME, PLACEHOLDER_TYPE,
};
pub use stub::{fingerprint, StubSnapshot};
