//! Backend retrieval strategies.
//!
//! A [`MetadataBackend`] turns a resolved record location into a transformed
//! metadata document. Two strategies exist, chosen once when the provider is
//! constructed:
//!
//! - [`GraphFetchBackend`]: fetches the semantic-graph (JSON-LD) document at
//!   the location from the repository and runs it through the transform
//!   registered for the requested format.
//! - [`FieldAssemblyBackend`]: fetches a pre-structured field set from a
//!   public JSON endpoint and assembles a fixed `oai_dc` document directly
//!   from named fields, bypassing the registry. It supports exactly that one
//!   format.

use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use crate::element::Element;
use crate::error::ProviderError;
use crate::formats::{TransformContext, TransformRegistry};
use crate::identifier::OaiIdentifier;
use crate::model::MetadataFormat;
use crate::repo::RepositoryClient;

const OAI_DC_NS: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";
const OAI_DC_SCHEMA: &str = "http://www.openarchives.org/OAI/2.0/oai_dc.xsd";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// The `oai_dc` format descriptor used by the field-assembly strategy.
pub fn oai_dc_format() -> MetadataFormat {
    MetadataFormat {
        prefix: "oai_dc".to_string(),
        namespace: OAI_DC_NS.to_string(),
        schema: OAI_DC_SCHEMA.to_string(),
    }
}

#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Formats this backend can disseminate.
    fn metadata_formats(&self) -> Vec<MetadataFormat>;

    /// Whether `prefix` is one of [`MetadataBackend::metadata_formats`].
    fn supports(&self, prefix: &str) -> bool {
        self.metadata_formats().iter().any(|f| f.prefix == prefix)
    }

    /// Fetches the raw record behind `location` and produces the output
    /// document for `prefix`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::FormatNotSupported`] for an unsupported prefix
    /// (checked before any fetch); [`ProviderError::UpstreamUnavailable`]
    /// when the fetch fails or returns a non-success status.
    async fn record_metadata(
        &self,
        location: &str,
        identifier: &OaiIdentifier,
        prefix: &str,
    ) -> Result<Element, ProviderError>;
}

// ============================================================================
// Graph-Fetch Strategy
// ============================================================================

/// Fetches the repository's JSON-LD representation of the record and hands
/// it to the transform registry, along with the [`TransformContext`] fixed
/// at construction (the provider's handle-proxy prefix, per
/// [`crate::config::ProviderConfig::handle_proxy_prefix`]).
pub struct GraphFetchBackend {
    repo: std::sync::Arc<dyn RepositoryClient>,
    registry: TransformRegistry,
    context: TransformContext,
}

impl GraphFetchBackend {
    pub fn new(
        repo: std::sync::Arc<dyn RepositoryClient>,
        registry: TransformRegistry,
        context: TransformContext,
    ) -> Result<Self, ProviderError> {
        if registry.is_empty() {
            return Err(ProviderError::Configuration(
                "graph backend requires at least one registered transform".to_string(),
            ));
        }
        Ok(GraphFetchBackend {
            repo,
            registry,
            context,
        })
    }
}

#[async_trait]
impl MetadataBackend for GraphFetchBackend {
    fn metadata_formats(&self) -> Vec<MetadataFormat> {
        self.registry.formats()
    }

    async fn record_metadata(
        &self,
        location: &str,
        _identifier: &OaiIdentifier,
        prefix: &str,
    ) -> Result<Element, ProviderError> {
        if !self.registry.contains(prefix) {
            return Err(ProviderError::FormatNotSupported {
                format: prefix.to_string(),
            });
        }
        let response = self
            .repo
            .get(location, Some("application/ld+json"))
            .await
            .map_err(|e| ProviderError::UpstreamUnavailable(e.to_string()))?;
        if !response.ok() {
            error!(url = %location, status = response.status, "Repository fetch failed");
            return Err(ProviderError::UpstreamUnavailable(format!(
                "GET {location} -> {}",
                response.status
            )));
        }
        let graph: Value = serde_json::from_str(&response.body).map_err(|e| {
            ProviderError::UpstreamUnavailable(format!("invalid graph document at {location}: {e}"))
        })?;
        self.registry.transform(prefix, &graph, &self.context)
    }
}

// ============================================================================
// Field-Assembly Strategy
// ============================================================================

/// Fetches a pre-structured record from `{public_url}{location}.json` and
/// assembles the `oai_dc` document from its `fields` object. Multi-valued
/// fields are joined with `", "`; absent fields are omitted.
pub struct FieldAssemblyBackend {
    repo: std::sync::Arc<dyn RepositoryClient>,
    public_url: String,
}

impl FieldAssemblyBackend {
    pub fn new(repo: std::sync::Arc<dyn RepositoryClient>, public_url: impl Into<String>) -> Self {
        FieldAssemblyBackend {
            repo,
            public_url: public_url.into(),
        }
    }

    fn assemble(&self, fields: &Value, identifier: &OaiIdentifier) -> Element {
        let mut root = Element::new("oai_dc:dc")
            .with_attr("xmlns:oai_dc", OAI_DC_NS)
            .with_attr("xmlns:dc", DC_NS)
            .with_attr("xmlns:xsi", XSI_NS)
            .with_attr(
                "xsi:schemaLocation",
                format!("{OAI_DC_NS} {OAI_DC_SCHEMA}"),
            );

        let mut push = |element: &str, value: Option<String>| {
            if let Some(value) = value {
                root.push_child(Element::new(format!("dc:{element}")).with_text(value));
            }
        };
        push("title", joined(fields, "title"));
        push("identifier", Some(identifier.local_key.clone()));
        push("creator", joined(fields, "creator"));
        push("contributor", joined(fields, "contributor"));
        push("subject", joined(fields, "subject"));
        push("rights", joined(fields, "rights_statement"));
        push("date", joined(fields, "date_created"));
        push("coverage", joined(fields, "geographic_subject"));
        push("format", joined(fields, "format"));
        push("type", joined(fields, "genre"));
        push("format", joined(fields, "avalon_resource_type"));
        push("publisher", joined(fields, "publisher"));
        root
    }
}

/// Joins a single- or multi-valued field into one string (`", "` separator).
fn joined(fields: &Value, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => Some(
            values
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    }
}

#[async_trait]
impl MetadataBackend for FieldAssemblyBackend {
    fn metadata_formats(&self) -> Vec<MetadataFormat> {
        vec![oai_dc_format()]
    }

    async fn record_metadata(
        &self,
        location: &str,
        identifier: &OaiIdentifier,
        prefix: &str,
    ) -> Result<Element, ProviderError> {
        if prefix != "oai_dc" {
            return Err(ProviderError::FormatNotSupported {
                format: prefix.to_string(),
            });
        }
        let url = format!("{}{}.json", self.public_url, location);
        let response = self
            .repo
            .get(&url, None)
            .await
            .map_err(|e| ProviderError::UpstreamUnavailable(e.to_string()))?;
        if !response.ok() {
            error!(url = %url, status = response.status, "Public record fetch failed");
            return Err(ProviderError::UpstreamUnavailable(format!(
                "GET {url} -> {}",
                response.status
            )));
        }
        let body: Value = serde_json::from_str(&response.body).map_err(|e| {
            ProviderError::UpstreamUnavailable(format!("invalid record document at {url}: {e}"))
        })?;
        let fields = body.get("fields").cloned().unwrap_or(Value::Null);
        Ok(self.assemble(&fields, identifier))
    }
}

// ============================================================================
// Tests
// ============================================================================
