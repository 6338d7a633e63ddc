//! Error taxonomy for the data provider.
//!
//! Every fallible operation in this crate reports a [`ProviderError`]. The
//! variants split into caller errors (bad identifier, unknown set or format),
//! upstream dependency failures (Solr or the repository unreachable), and
//! startup-time configuration faults. Adapter and backend errors propagate
//! to the facade unchanged; the facade only adds identifying context.

use thiserror::Error;

/// How a [`ProviderError`] should be surfaced by a protocol or HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller supplied a bad argument (malformed identifier, bad set spec,
    /// unsupported format).
    BadArgument,
    /// The requested record or set does not exist.
    NotFound,
    /// An external dependency failed; the request may succeed later.
    ServiceUnavailable,
    /// The provider itself is misconfigured or returned inconsistent data.
    Internal,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Identifier string does not match `oai:{namespace}:{local-key}`.
    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    /// No document in the index matches the given native key.
    #[error("Unable to find record {key:?} in the index")]
    RecordNotFound { key: String },

    /// Unknown set spec passed to `get_set`.
    #[error("Unknown set {spec:?}")]
    SetNotFound { spec: String },

    /// Unknown set spec used as a listing filter.
    #[error("{spec:?} is not a valid setSpec value")]
    InvalidSetSpec { spec: String },

    /// Requested metadata format has no registered transform.
    #[error("Cannot disseminate format {format:?}")]
    FormatNotSupported { format: String },

    /// A stored last-modified value could not be parsed as a timestamp.
    #[error("Invalid timestamp {value:?} for {identifier:?}")]
    InvalidTimestamp { identifier: String, value: String },

    /// The search index client failed (connection, timeout, malformed query).
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    /// The repository fetch failed or returned a non-success status.
    #[error("Unable to retrieve resource from repository: {0}")]
    UpstreamUnavailable(String),

    /// Invalid set/format/field configuration. Fatal at startup: the process
    /// should refuse to serve rather than run with it.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Classifies this error for the surfacing layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::MalformedIdentifier(_)
            | ProviderError::InvalidSetSpec { .. }
            | ProviderError::FormatNotSupported { .. } => ErrorClass::BadArgument,
            ProviderError::RecordNotFound { .. } | ProviderError::SetNotFound { .. } => {
                ErrorClass::NotFound
            }
            ProviderError::IndexUnavailable(_) | ProviderError::UpstreamUnavailable(_) => {
                ErrorClass::ServiceUnavailable
            }
            ProviderError::InvalidTimestamp { .. } | ProviderError::Configuration(_) => {
                ErrorClass::Internal
            }
        }
    }
}
