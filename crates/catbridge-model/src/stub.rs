//! Persisted diff baselines.

use crate::native::{NativeAsset, PropertyBag, Rid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Minimal native property bag recorded at the previous sync, used as the
/// change-detection baseline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StubSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<Rid>,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,
}

impl StubSnapshot {
    /// Baseline for an asset that has never been synchronized.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn capture(asset: &NativeAsset) -> Self {
        Self {
            rid: Some(asset.id().clone()),
            properties: asset.properties.clone(),
            modified_on: asset.modified_on(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.properties)
    }

    /// True when `current` was modified after this baseline was taken.
    pub fn is_older_than(&self, current: Option<DateTime<Utc>>) -> bool {
        match (self.modified_on, current) {
            (Some(stub), Some(current)) => current > stub,
            (None, Some(_)) => true,
            _ => false,
        }
    }
}

/// SHA-256 over the identity projection of a property bag.
///
/// Two bags with the same fingerprint produce no change records.
pub fn fingerprint(properties: &PropertyBag) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in properties {
        hasher.update(name.len().to_le_bytes());
        hasher.update(name.as_bytes());
        let key = value.identity_key();
        hasher.update(key.len().to_le_bytes());
        hasher.update(key.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(7 + digest.len() * 2);
    out.push_str("sha256:");
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeRef, NativeValue, MODIFIED_ON};

    #[test]
    fn fingerprint_ignores_referenced_content() {
        let mut a = PropertyBag::new();
        a.insert(
            "parent".to_string(),
            NativeValue::Reference(NativeRef::asset("p1", "category", "Old")),
        );
        let mut b = PropertyBag::new();
        b.insert(
            "parent".to_string(),
            NativeValue::Reference(NativeRef::asset("p1", "category", "Renamed")),
        );
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.insert("name".to_string(), NativeValue::from("x"));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn capture_records_modification_time() {
        let at = DateTime::<Utc>::from_timestamp_millis(1_600_000_000_000).unwrap();
        let asset = NativeAsset::new(NativeRef::asset("t1", "term", "Customer"))
            .with_property(MODIFIED_ON, at);
        let stub = StubSnapshot::capture(&asset);
        assert_eq!(stub.modified_on, Some(at));
        assert_eq!(stub.rid, Some(Rid::from("t1")));
        assert!(!stub.is_older_than(Some(at)));
        assert!(StubSnapshot::empty().is_older_than(Some(at)));
    }
}
