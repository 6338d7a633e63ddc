//! Data provider facade.
//!
//! [`DataProvider`] implements the data-access contract the harvesting
//! protocol engine builds on: identity, identifier validation, record
//! headers, set listing, paged identifier listing, and metadata retrieval
//! through the configured [`MetadataBackend`].
//!
//! All record-resolving operations go through a [`ProviderSession`], which
//! carries the request-scoped document cache. The protocol layer constructs
//! one session per incoming request and discards it afterwards; a listing
//! populates the cache so the follow-up header or metadata lookup for the
//! same identifier does not re-query the index. Sessions are not shared
//! across requests, so the cache needs no locking.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::backend::MetadataBackend;
use crate::config::ProviderConfig;
use crate::element::Element;
use crate::error::ProviderError;
use crate::identifier::OaiIdentifier;
use crate::index::{Index, IndexDocument};
use crate::model::{Identify, MetadataFormat, RecordHeader, SetDescriptor};

/// One page of a paged identifier listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPage {
    pub identifiers: Vec<String>,
    /// Total match count reported by the index, independent of paging.
    pub total: u64,
    /// Offset for the next page; `None` when this page exhausts the results.
    /// The provider is stateless across pages — the caller supplies the
    /// cursor on each call.
    pub next_cursor: Option<usize>,
}

pub struct DataProvider {
    config: ProviderConfig,
    index: Index,
    backend: Box<dyn MetadataBackend>,
}

impl DataProvider {
    /// Creates the facade, validating the provider configuration eagerly.
    pub fn new(
        config: ProviderConfig,
        index: Index,
        backend: Box<dyn MetadataBackend>,
    ) -> Result<Self, ProviderError> {
        config.validate()?;
        info!(
            repository = %config.repository_name,
            namespace = %config.namespace_identifier,
            "Data provider ready"
        );
        Ok(DataProvider {
            config,
            index,
            backend,
        })
    }

    /// Opens a session carrying a fresh request-scoped document cache.
    pub fn session(&self) -> ProviderSession<'_> {
        ProviderSession {
            provider: self,
            cache: HashMap::new(),
        }
    }

    pub fn identify(&self) -> Identify {
        Identify {
            base_url: self.config.base_url.clone(),
            admin_email: vec![self.config.admin_email.clone()],
            repository_name: self.config.repository_name.clone(),
            earliest_datestamp: self.config.earliest_datestamp.clone(),
            deleted_record: self.config.report_deleted_records.clone(),
            granularity: self.config.granularity,
        }
    }

    pub fn is_valid_identifier(&self, identifier: &str) -> bool {
        identifier.starts_with(&format!("oai:{}:", self.config.namespace_identifier))
    }

    /// Builds the identifier for an index-native key, stripping the
    /// configured handle-proxy prefix first.
    pub fn oai_identifier(&self, native_key: &str) -> OaiIdentifier {
        let key = if self.config.handle_proxy_prefix.is_empty() {
            native_key
        } else {
            native_key
                .strip_prefix(&self.config.handle_proxy_prefix)
                .unwrap_or(native_key)
        };
        OaiIdentifier::compose(&self.config.namespace_identifier, key)
    }

    /// Formats the configured backend can disseminate. Identical for every
    /// identifier; there is no per-record format restriction.
    pub fn metadata_formats(&self) -> Vec<MetadataFormat> {
        self.backend.metadata_formats()
    }

    /// The full set catalog, keyed by spec.
    pub async fn list_sets(&self) -> Result<BTreeMap<String, SetDescriptor>, ProviderError> {
        self.index.set_catalog().await
    }

    pub async fn get_set(&self, spec: &str) -> Result<SetDescriptor, ProviderError> {
        self.index
            .set_catalog()
            .await?
            .remove(spec)
            .ok_or_else(|| ProviderError::SetNotFound {
                spec: spec.to_string(),
            })
    }
}

/// Request-scoped view of the provider: all record-resolving operations,
/// backed by a document cache keyed by canonical rendered identifier.
pub struct ProviderSession<'a> {
    provider: &'a DataProvider,
    cache: HashMap<String, IndexDocument>,
}

impl ProviderSession<'_> {
    fn index(&self) -> &Index {
        &self.provider.index
    }

    /// Resolves an identifier string to its index document: parse, cache
    /// lookup, then a point query on a miss.
    async fn document(&mut self, identifier: &str) -> Result<IndexDocument, ProviderError> {
        let id = OaiIdentifier::parse(identifier)?;
        let cache_key = id.render();
        if let Some(doc) = self.cache.get(&cache_key) {
            return Ok(doc.clone());
        }
        let doc = self.index().find_document(&id.local_key).await?;
        self.cache.insert(cache_key, doc.clone());
        Ok(doc)
    }

    fn document_field(
        &self,
        doc: &IndexDocument,
        identifier: &str,
        field: &str,
    ) -> Result<String, ProviderError> {
        doc.first_str(field).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "document for {identifier} has no {field:?} field; check the index field configuration"
            ))
        })
    }

    /// Resolves an identifier to the fetchable location of its record.
    pub async fn resolve_location(&mut self, identifier: &str) -> Result<String, ProviderError> {
        let doc = self.document(identifier).await?;
        let field = self.index().config().uri_field.clone();
        self.document_field(&doc, identifier, &field)
    }

    /// Resolves an identifier to its record's last-modified timestamp.
    pub async fn last_modified(
        &mut self,
        identifier: &str,
    ) -> Result<DateTime<Utc>, ProviderError> {
        let doc = self.document(identifier).await?;
        let field = self.index().config().last_modified_field.clone();
        let value = self.document_field(&doc, identifier, &field)?;
        DateTime::parse_from_rfc3339(&value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ProviderError::InvalidTimestamp {
                identifier: identifier.to_string(),
                value,
            })
    }

    /// Builds the record header: identifier, datestamp at the configured
    /// granularity, and set memberships.
    pub async fn record_header(&mut self, identifier: &str) -> Result<RecordHeader, ProviderError> {
        let last_modified = self.last_modified(identifier).await?;
        let id = OaiIdentifier::parse(identifier)?;
        let set_specs = self.index().sets_for_key(&id.local_key).await?;
        Ok(RecordHeader {
            identifier: identifier.to_string(),
            datestamp: self.provider.config.granularity.format(last_modified),
            set_specs,
        })
    }

    /// Fixed empty result: no "about" containers are modeled.
    pub fn record_abouts(&self, _identifier: &str) -> Vec<Element> {
        Vec::new()
    }

    /// Lists one page of identifiers matching the optional date range and
    /// set filter, populating the document cache as a side effect.
    pub async fn list_identifiers(
        &mut self,
        metadata_prefix: &str,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        set_spec: Option<&str>,
        cursor: usize,
    ) -> Result<IdentifierPage, ProviderError> {
        debug!(
            metadata_prefix,
            ?from,
            ?until,
            ?set_spec,
            cursor,
            "list_identifiers"
        );
        let page_size = self.index().config().page_size;
        let (docs, total) = self
            .index()
            .list_documents(from, until, set_spec, cursor, page_size)
            .await?;

        let mut identifiers = Vec::with_capacity(docs.len());
        for doc in docs {
            let native_key = self.index().native_key(&doc).ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "listed document has no {:?} field; check the index field configuration",
                    self.index().config().handle_field
                ))
            })?;
            let id = self.provider.oai_identifier(&native_key);
            let rendered = id.render();
            self.cache.insert(rendered.clone(), doc);
            identifiers.push(rendered);
        }

        let next_cursor = match cursor + page_size {
            next if (next as u64) < total => Some(next),
            _ => None,
        };
        Ok(IdentifierPage {
            identifiers,
            total,
            next_cursor,
        })
    }

    /// Lists set specs: the whole catalog, or only the sets the given record
    /// belongs to.
    pub async fn list_set_specs(
        &mut self,
        identifier: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        match identifier {
            Some(identifier) => {
                let id = OaiIdentifier::parse(identifier)?;
                self.index().sets_for_key(&id.local_key).await
            }
            None => Ok(self.index().set_catalog().await?.into_keys().collect()),
        }
    }

    /// Retrieves and transforms the record's metadata in the requested
    /// format. The format is checked against the backend before anything is
    /// resolved or fetched.
    pub async fn record_metadata(
        &mut self,
        identifier: &str,
        metadata_prefix: &str,
    ) -> Result<Element, ProviderError> {
        if !self.provider.backend.supports(metadata_prefix) {
            return Err(ProviderError::FormatNotSupported {
                format: metadata_prefix.to_string(),
            });
        }
        let location = self.resolve_location(identifier).await?;
        let id = OaiIdentifier::parse(identifier)?;
        self.provider
            .backend
            .record_metadata(&location, &id, metadata_prefix)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
