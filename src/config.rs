//! Configuration for the data provider and the search-index adapter.
//!
//! All configuration is declared as plain structs populated once at startup
//! and validated eagerly: a bad set or field configuration fails with
//! [`ProviderError::Configuration`] before the provider serves anything,
//! instead of surfacing as a type-coercion surprise on first access.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::{Granularity, SetDescriptor};

/// Facet-discovery settings for automatic set creation.
///
/// `name_field` is the stored field holding the display name of a record's
/// collection; `name_query_field` is the indexed (exact-match) variant used
/// both for faceting and for set filter predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSetConfig {
    pub name_field: String,
    pub name_query_field: String,
}

/// Search-index (Solr) adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base corpus predicate; every listing query is scoped to it.
    #[serde(default = "default_base_query")]
    pub base_query: String,
    /// Field holding the record's native key (handle).
    #[serde(default = "default_handle_field")]
    pub handle_field: String,
    /// Field holding the fetchable location of the record.
    #[serde(default = "default_uri_field")]
    pub uri_field: String,
    /// Field holding the record's last-modified timestamp.
    #[serde(default = "default_last_modified_field")]
    pub last_modified_field: String,
    /// When true, the set catalog is extended with facet-discovered sets.
    #[serde(default)]
    pub auto_create_sets: bool,
    /// Required when `auto_create_sets` is enabled.
    #[serde(default)]
    pub auto_set: Option<AutoSetConfig>,
    /// Statically declared sets. These win over facet-discovered sets on
    /// spec collision.
    #[serde(default)]
    pub sets: Vec<SetDescriptor>,
    /// Page size for listing queries.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_base_query() -> String {
    "handle:*".to_string()
}

fn default_handle_field() -> String {
    "handle".to_string()
}

fn default_uri_field() -> String {
    "id".to_string()
}

fn default_last_modified_field() -> String {
    "last_modified".to_string()
}

fn default_page_size() -> usize {
    25
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            base_query: default_base_query(),
            handle_field: default_handle_field(),
            uri_field: default_uri_field(),
            last_modified_field: default_last_modified_field(),
            auto_create_sets: false,
            auto_set: None,
            sets: Vec::new(),
            page_size: default_page_size(),
        }
    }
}

impl IndexConfig {
    /// Loads the index configuration from a YAML file and validates it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ProviderError::Configuration(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml(&text)
    }

    /// Parses the index configuration from YAML text and validates it.
    pub fn from_yaml(text: &str) -> Result<Self, ProviderError> {
        let config: IndexConfig = serde_yaml::from_str(text)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if facet-discovered sets are
    /// enabled without the field names they need, if the page size is zero,
    /// or if two statically declared sets share a spec.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.auto_create_sets {
            match &self.auto_set {
                None => {
                    return Err(ProviderError::Configuration(
                        "auto_create_sets is enabled but auto_set is missing".to_string(),
                    ))
                }
                Some(auto_set) => {
                    if auto_set.name_field.is_empty() || auto_set.name_query_field.is_empty() {
                        return Err(ProviderError::Configuration(
                            "auto_set.name_field and auto_set.name_query_field must be set"
                                .to_string(),
                        ));
                    }
                }
            }
        }
        if self.page_size == 0 {
            return Err(ProviderError::Configuration(
                "page_size must be greater than zero".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for set in &self.sets {
            if !seen.insert(set.spec.as_str()) {
                return Err(ProviderError::Configuration(format!(
                    "duplicate set spec {:?} in static set configuration",
                    set.spec
                )));
            }
        }
        Ok(())
    }
}

/// Provider identity and backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub admin_email: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_granularity")]
    pub granularity: Granularity,
    pub earliest_datestamp: String,
    pub repository_name: String,
    /// Namespace component of every identifier this provider issues.
    pub namespace_identifier: String,
    #[serde(default = "default_report_deleted")]
    pub report_deleted_records: String,
    /// Prefix stripped from native keys before composing identifiers
    /// (e.g. a handle proxy URL prefix). Empty means keys are used as-is.
    #[serde(default)]
    pub handle_proxy_prefix: String,
    /// Bearer token for authenticated repository fetches (graph backend).
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Public base URL for pre-structured record fetches (field-assembly
    /// backend).
    #[serde(default)]
    pub public_url: Option<String>,
    /// Timeout applied to each index or repository call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000/".to_string()
}

fn default_granularity() -> Granularity {
    Granularity::Second
}

fn default_report_deleted() -> String {
    "no".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks that the identity fields required by every response are set.
    pub fn validate(&self) -> Result<(), ProviderError> {
        for (name, value) in [
            ("admin_email", &self.admin_email),
            ("base_url", &self.base_url),
            ("earliest_datestamp", &self.earliest_datestamp),
            ("repository_name", &self.repository_name),
            ("namespace_identifier", &self.namespace_identifier),
        ] {
            if value.is_empty() {
                return Err(ProviderError::Configuration(format!("{name} must be set")));
            }
        }
        Ok(())
    }
}
