//! Mapping configuration.
//!
//! Threaded explicitly into the registry at construction; nothing here is
//! process-global.

use anyhow::Context;
use catbridge_model::DEFAULT_GUID_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Release of the native catalog being mapped.
///
/// Ordered, so version gates read as `config.native_version >= V11702`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NativeVersion {
    #[serde(rename = "11.5.0.1")]
    V11501,
    #[serde(rename = "11.5.0.2")]
    V11502,
    #[serde(rename = "11.7.0.2")]
    V11702,
}

impl Default for NativeVersion {
    fn default() -> Self {
        NativeVersion::V11702
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid mapping configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid mapping configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub native_version: NativeVersion,
    pub guid_namespace: Uuid,
    /// Page size used when draining paged native searches.
    pub page_size: usize,
    /// Provenance tag set on every emitted canonical payload.
    pub repository_name: String,
    /// Name of the category marking subject-area roots.
    pub subject_area_marker: String,
    pub subject_area_max_hops: usize,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            native_version: NativeVersion::default(),
            guid_namespace: DEFAULT_GUID_NAMESPACE,
            page_size: 100,
            repository_name: "native-catalog".to_string(),
            subject_area_marker: "Subject Area".to_string(),
            subject_area_max_hops: 3,
        }
    }
}

impl MappingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MappingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".to_string()));
        }
        if self.subject_area_max_hops == 0 {
            return Err(ConfigError::Invalid(
                "subject_area_max_hops must be positive".to_string(),
            ));
        }
        if self.subject_area_marker.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "subject_area_marker must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
