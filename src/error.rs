//! Error types for template definition lookup, parameter mapping and discovery
//!
//! Errors are structured with fields so callers can tell a bad request
//! (missing required parameter) from an operator problem (definition not
//! enabled) or a transient upstream failure (discovery service).

use thiserror::Error;

/// Main error type for stackdef operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No plugin serves the requested (infra kind, os, engine) triple
    #[error("cluster type ({infra_kind}, {os}, {engine}) not supported")]
    UnsupportedCombination {
        /// Requested infrastructure kind (e.g., "vm")
        infra_kind: String,
        /// Requested base OS (e.g., "fedora-atomic")
        os: String,
        /// Requested orchestration engine (e.g., "kubernetes")
        engine: String,
    },

    /// Plugins serve the triple but all of them are excluded by configuration
    #[error("cluster type ({infra_kind}, {os}, {engine}) not enabled (candidates: {})", .candidates.join(", "))]
    DefinitionNotEnabled {
        /// Requested infrastructure kind
        infra_kind: String,
        /// Requested base OS
        os: String,
        /// Requested orchestration engine
        engine: String,
        /// Plugin names that serve the triple but are disabled
        candidates: Vec<String>,
    },

    /// A required template parameter resolved to an empty value
    #[error("required template parameter {template_key} not provided")]
    RequiredParameterMissing {
        /// Template input key that could not be filled
        template_key: String,
    },

    /// The discovery service answered without allocating a token
    #[error("discovery service at {endpoint} returned an empty discovery url")]
    DiscoveryUrlNotFound {
        /// Endpoint that was queried
        endpoint: String,
    },

    /// The discovery service could not be reached or returned an error status
    #[error("discovery request to {endpoint} failed: {message}")]
    DiscoveryRequest {
        /// Endpoint that was queried
        endpoint: String,
        /// Description of the transport failure
        message: String,
    },

    /// No mapping or attribute exists under the given name
    #[error("no attribute {attr} on {owner}")]
    AttributeLookup {
        /// Attribute name that was looked up
        attr: String,
        /// Where the lookup happened (e.g., "cluster instance", "parameter mappings")
        owner: String,
    },

    /// Invalid or incomplete configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's wrong
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create an unsupported-combination error for a triple
    pub fn unsupported(
        infra_kind: impl Into<String>,
        os: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self::UnsupportedCombination {
            infra_kind: infra_kind.into(),
            os: os.into(),
            engine: engine.into(),
        }
    }

    /// Create a not-enabled error listing the disabled candidates
    pub fn not_enabled(
        infra_kind: impl Into<String>,
        os: impl Into<String>,
        engine: impl Into<String>,
        candidates: Vec<String>,
    ) -> Self {
        Self::DefinitionNotEnabled {
            infra_kind: infra_kind.into(),
            os: os.into(),
            engine: engine.into(),
            candidates,
        }
    }

    /// Create a required-parameter error for a template key
    pub fn required_parameter(template_key: impl Into<String>) -> Self {
        Self::RequiredParameterMissing {
            template_key: template_key.into(),
        }
    }

    /// Create a discovery-url-not-found error for an endpoint
    pub fn discovery_not_found(endpoint: impl Into<String>) -> Self {
        Self::DiscoveryUrlNotFound {
            endpoint: endpoint.into(),
        }
    }

    /// Create a discovery transport error
    pub fn discovery_request(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DiscoveryRequest {
            endpoint: endpoint.into(),
            message: msg.into(),
        }
    }

    /// Create an attribute lookup error
    pub fn attribute_lookup(attr: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::AttributeLookup {
            attr: attr.into(),
            owner: owner.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Whether retrying the provisioning request may succeed
    ///
    /// Only discovery failures depend on an external service; everything
    /// else needs a request or configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryUrlNotFound { .. } | Self::DiscoveryRequest { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
