//! Error taxonomy shared by the mapping and sync layers.

use crate::guid::GenerationPrefix;
use crate::native::Rid;

/// Failure reported by the native catalog client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// No mapper is registered for the requested type; the caller skips it.
    #[error("unsupported type '{type_name}'{}", prefix_suffix(.prefix))]
    UnsupportedType {
        type_name: String,
        prefix: Option<GenerationPrefix>,
    },

    /// A match pattern outside exact / starts-with / ends-with / contains.
    #[error("unsupported search pattern '{pattern}'")]
    UnsupportedSearchPattern { pattern: String },

    /// An expected property or endpoint is missing on the native side.
    #[error("asset {rid} is missing '{property}'")]
    IncompleteReference { rid: Rid, property: String },

    #[error("native call failed while {context}")]
    ExternalCallFailure {
        context: String,
        #[source]
        source: ClientError,
    },

    /// The instance cannot be emitted; only that instance is dropped.
    #[error("invalid {type_name} instance: {detail}")]
    InvariantViolation { type_name: String, detail: String },
}

fn prefix_suffix(prefix: &Option<GenerationPrefix>) -> String {
    match prefix {
        Some(p) => format!(" (prefix {p})"),
        None => String::new(),
    }
}

impl MappingError {
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        MappingError::UnsupportedType {
            type_name: type_name.into(),
            prefix: None,
        }
    }

    pub fn external(context: impl Into<String>, source: ClientError) -> Self {
        MappingError::ExternalCallFailure {
            context: context.into(),
            source,
        }
    }

    /// Whether a batch may skip the affected asset and carry on.
    ///
    /// Only malformed search input is a caller contract violation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MappingError::UnsupportedSearchPattern { .. })
    }
}

pub type MappingResult<T> = Result<T, MappingError>;
