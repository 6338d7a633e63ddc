//! Search-index adapter.
//!
//! This module wraps the search client behind the [`SearchIndexClient`]
//! trait and provides the [`Index`] adapter that the data provider talks to:
//! - Query construction: base corpus predicate, half-open date range over
//!   the last-modified field, set membership predicate.
//! - Error translation: client transport failures become
//!   [`ProviderError::IndexUnavailable`].
//! - Set catalog computation: statically configured sets merged with
//!   facet-discovered sets, static entries winning on spec collision.

pub mod solr;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::IndexConfig;
use crate::error::ProviderError;
use crate::identifier::derive_set_spec;
use crate::model::SetDescriptor;

/// Datestamp format used in index range queries.
const INDEX_DATESTAMP: &str = "%Y-%m-%dT%H:%M:%SZ";

// ============================================================================
// Client Contract
// ============================================================================

/// One paged, optionally faceted query against the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Main query string (`q`).
    pub query: String,
    /// Filter predicate (`fq`); `None` means unfiltered.
    pub filter_query: Option<String>,
    /// Restriction of returned fields (`fl`); `None` returns all fields.
    pub fields: Option<String>,
    /// Result offset.
    pub start: usize,
    /// Page size; zero for facet-only queries.
    pub rows: usize,
    /// Facet specification, when facet counts are wanted.
    pub facet: Option<FacetSpec>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        SearchRequest {
            query: query.into(),
            filter_query: None,
            fields: None,
            start: 0,
            rows: 0,
            facet: None,
        }
    }
}

/// Facet request over a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSpec {
    pub field: String,
    /// Minimum match count for a facet value to be reported.
    pub min_count: u64,
}

/// One facet value with its match count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// Result of a [`SearchIndexClient::search`] call.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub docs: Vec<IndexDocument>,
    /// Total number of matches reported by the index, independent of paging.
    pub hits: u64,
    /// Facet counts per faceted field, present when the request asked for
    /// them.
    pub facets: BTreeMap<String, Vec<FacetCount>>,
}

/// Errors from the underlying search client, before domain translation.
#[derive(Error, Debug)]
pub enum IndexClientError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Index returned HTTP {status}")]
    Http { status: u16 },
    #[error("Invalid index response: {0}")]
    InvalidResponse(String),
}

/// The consumed search-index interface. Implementations must be `Send +
/// Sync`; the adapter issues each logical call at most once and never
/// retries internally.
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, IndexClientError>;
}

// ============================================================================
// Documents
// ============================================================================

/// One record as returned by the search index: an opaque mapping from field
/// name to value(s).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDocument(pub serde_json::Map<String, Value>);

impl IndexDocument {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the field as a string, unwrapping a single- or multi-valued
    /// field to its first value.
    pub fn first_str(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Array(values) => values.first().and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }),
            other => Some(other.to_string()),
        }
    }
}

// ============================================================================
// Query Helpers
// ============================================================================

/// Quotes a value for an exact-match predicate, escaping embedded quotes.
pub fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Renders a half-open datestamp range: `from` inclusive, `until` exclusive.
/// Absent bounds render as `*`.
pub fn date_range(from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> String {
    let from = from
        .map(|t| t.format(INDEX_DATESTAMP).to_string())
        .unwrap_or_else(|| "*".to_string());
    let until = until
        .map(|t| t.format(INDEX_DATESTAMP).to_string())
        .unwrap_or_else(|| "*".to_string());
    format!("[{from} TO {until}}}")
}

// ============================================================================
// Adapter
// ============================================================================

/// Search-index adapter: query construction, error translation, and set
/// catalog computation over a [`SearchIndexClient`].
pub struct Index {
    config: IndexConfig,
    client: Arc<dyn SearchIndexClient>,
}

impl Index {
    /// Creates the adapter, validating the configuration eagerly.
    pub fn new(
        config: IndexConfig,
        client: Arc<dyn SearchIndexClient>,
    ) -> Result<Self, ProviderError> {
        config.validate()?;
        info!(base_query = %config.base_query, page_size = config.page_size, "Index adapter ready");
        Ok(Index { config, client })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Extracts the native key from a document, unwrapping multi-valued key
    /// fields to their first value.
    pub fn native_key(&self, doc: &IndexDocument) -> Option<String> {
        doc.first_str(&self.config.handle_field)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        self.client.search(request).await.map_err(|e| {
            error!(error = %e, "Index query failed");
            ProviderError::IndexUnavailable(e.to_string())
        })
    }

    /// Looks up a single document by its native key.
    ///
    /// The index is assumed to enforce key uniqueness; if it does not, the
    /// first hit is used without further validation.
    ///
    /// # Errors
    ///
    /// [`ProviderError::RecordNotFound`] on zero hits,
    /// [`ProviderError::IndexUnavailable`] on client failure.
    pub async fn find_document(&self, native_key: &str) -> Result<IndexDocument, ProviderError> {
        let request = SearchRequest {
            rows: 1,
            ..SearchRequest::new(format!(
                "{}:{}",
                self.config.handle_field,
                quoted(native_key)
            ))
        };
        let response = self.search(&request).await?;
        response
            .docs
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::RecordNotFound {
                key: native_key.to_string(),
            })
    }

    /// Runs one paged listing query with the composite filter: base corpus
    /// predicate, optional half-open date range, optional set predicate.
    ///
    /// Returns the page of documents plus the total match count.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InvalidSetSpec`] if `set_spec` is not in the catalog
    /// (checked before the listing query runs).
    pub async fn list_documents(
        &self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        set_spec: Option<&str>,
        cursor: usize,
        rows: usize,
    ) -> Result<(Vec<IndexDocument>, u64), ProviderError> {
        let mut filter_query = self.config.base_query.clone();
        if from.is_some() || until.is_some() {
            filter_query.push_str(&format!(
                " AND {}:{}",
                self.config.last_modified_field,
                date_range(from, until)
            ));
        }
        if let Some(spec) = set_spec {
            let catalog = self.set_catalog().await?;
            let set = catalog.get(spec).ok_or_else(|| ProviderError::InvalidSetSpec {
                spec: spec.to_string(),
            })?;
            filter_query.push_str(&format!(" AND ({})", set.filter_query));
        }
        debug!(fq = %filter_query, cursor, rows, "Listing documents");

        let request = SearchRequest {
            filter_query: Some(filter_query),
            start: cursor,
            rows,
            ..SearchRequest::new("*:*")
        };
        let response = self.search(&request).await?;
        Ok((response.docs, response.hits))
    }

    /// Computes the set catalog: statically configured sets plus, when
    /// enabled, one set per discovered facet value of the collection name
    /// field. Static entries win on spec collision; other collisions keep
    /// the first entry and are logged rather than silently merged.
    pub async fn set_catalog(&self) -> Result<BTreeMap<String, SetDescriptor>, ProviderError> {
        let mut sets: BTreeMap<String, SetDescriptor> = self
            .config
            .sets
            .iter()
            .map(|set| (set.spec.clone(), set.clone()))
            .collect();

        if !self.config.auto_create_sets {
            return Ok(sets);
        }
        let auto_set = self.config.auto_set.as_ref().ok_or_else(|| {
            ProviderError::Configuration("auto_create_sets is enabled but auto_set is missing".to_string())
        })?;

        let request = SearchRequest {
            fields: Some(auto_set.name_field.clone()),
            facet: Some(FacetSpec {
                field: auto_set.name_query_field.clone(),
                min_count: 1,
            }),
            ..SearchRequest::new(self.config.base_query.clone())
        };
        let response = self.search(&request).await?;
        let facets = response
            .facets
            .get(&auto_set.name_query_field)
            .cloned()
            .unwrap_or_default();

        for facet in facets {
            let spec = derive_set_spec(&facet.value);
            if let Some(existing) = sets.get(&spec) {
                if existing.name != facet.value {
                    warn!(
                        spec = %spec,
                        kept = %existing.name,
                        skipped = %facet.value,
                        "Set spec collision; keeping earlier entry"
                    );
                }
                continue;
            }
            sets.insert(
                spec.clone(),
                SetDescriptor {
                    spec,
                    name: facet.value.clone(),
                    filter_query: format!("{}:{}", auto_set.name_query_field, quoted(&facet.value)),
                },
            );
        }
        Ok(sets)
    }

    /// Returns the specs of every catalog set the given record belongs to.
    ///
    /// Membership is checked with one existence query per catalog set,
    /// scoped to the record's native key.
    pub async fn sets_for_key(&self, native_key: &str) -> Result<Vec<String>, ProviderError> {
        let key_query = format!("{}:{}", self.config.handle_field, quoted(native_key));
        let mut specs = Vec::new();
        for (spec, set) in self.set_catalog().await? {
            let request = SearchRequest {
                filter_query: Some(set.filter_query.clone()),
                fields: Some(self.config.uri_field.clone()),
                ..SearchRequest::new(key_query.clone())
            };
            let response = self.search(&request).await?;
            if response.hits > 0 {
                specs.push(spec);
            }
        }
        Ok(specs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) fn doc(fields: &[(&str, Value)]) -> IndexDocument {
        IndexDocument(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    /// Scripted client that records every request it receives.
    pub(crate) struct MockClient {
        responses: Mutex<VecDeque<Result<SearchResponse, IndexClientError>>>,
        pub requests: Mutex<Vec<SearchRequest>>,
    }

    impl MockClient {
        pub fn new(responses: Vec<Result<SearchResponse, IndexClientError>>) -> Self {
            MockClient {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SearchIndexClient for MockClient {
        async fn search(
            &self,
            request: &SearchRequest,
        ) -> Result<SearchResponse, IndexClientError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SearchResponse::default()))
        }
    }

    fn index_with(config: IndexConfig, client: Arc<MockClient>) -> Index {
        Index::new(config, client).unwrap()
    }

    #[test]
    fn test_quoted_escapes_embedded_quotes() {
        assert_eq!(quoted("Music Collection"), "\"Music Collection\"");
        assert_eq!(quoted("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_date_range_is_half_open() {
        let from = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
        // until is exclusive: a record stamped exactly 2020-02-01T00:00:00Z
        // falls outside the range
        assert_eq!(
            date_range(Some(from), Some(until)),
            "[2020-01-01T00:00:00Z TO 2020-02-01T00:00:00Z}"
        );
        assert_eq!(date_range(None, Some(until)), "[* TO 2020-02-01T00:00:00Z}");
        assert_eq!(date_range(Some(from), None), "[2020-01-01T00:00:00Z TO *}");
    }

    #[test]
    fn test_first_str_unwraps_multivalued_fields() {
        let d = doc(&[
            ("handle", serde_json::json!(["1903.1/1", "1903.1/2"])),
            ("id", serde_json::json!("http://example.com/1")),
        ]);
        assert_eq!(d.first_str("handle").unwrap(), "1903.1/1");
        assert_eq!(d.first_str("id").unwrap(), "http://example.com/1");
        assert!(d.first_str("missing").is_none());
    }

    #[tokio::test]
    async fn test_find_document_uses_exact_match_query() {
        let client = Arc::new(MockClient::new(vec![Ok(SearchResponse {
            docs: vec![doc(&[("handle", serde_json::json!("1903.1/1"))])],
            hits: 1,
            facets: BTreeMap::new(),
        })]));
        let index = index_with(IndexConfig::default(), client.clone());

        let found = index.find_document("1903.1/1").await.unwrap();
        assert_eq!(index.native_key(&found).unwrap(), "1903.1/1");

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].query, "handle:\"1903.1/1\"");
    }

    #[tokio::test]
    async fn test_find_document_zero_hits_is_record_not_found() {
        let client = Arc::new(MockClient::new(vec![Ok(SearchResponse::default())]));
        let index = index_with(IndexConfig::default(), client);
        assert!(matches!(
            index.find_document("1903.1/404").await,
            Err(ProviderError::RecordNotFound { key }) if key == "1903.1/404"
        ));
    }

    #[tokio::test]
    async fn test_client_error_becomes_index_unavailable() {
        let client = Arc::new(MockClient::new(vec![Err(IndexClientError::Transport(
            "connection refused".to_string(),
        ))]));
        let index = index_with(IndexConfig::default(), client);
        assert!(matches!(
            index.find_document("1903.1/1").await,
            Err(ProviderError::IndexUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_list_documents_builds_composite_filter() {
        let client = Arc::new(MockClient::new(vec![Ok(SearchResponse::default())]));
        let config = IndexConfig {
            sets: vec![SetDescriptor {
                spec: "music".to_string(),
                name: "Music Collection".to_string(),
                filter_query: "collection:\"Music Collection\"".to_string(),
            }],
            ..IndexConfig::default()
        };
        let index = index_with(config, client.clone());

        let from = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
        index
            .list_documents(Some(from), Some(until), Some("music"), 50, 25)
            .await
            .unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "*:*");
        assert_eq!(
            requests[0].filter_query.as_deref().unwrap(),
            "handle:* AND last_modified:[2020-01-01T00:00:00Z TO 2020-02-01T00:00:00Z} \
             AND (collection:\"Music Collection\")"
        );
        assert_eq!(requests[0].start, 50);
        assert_eq!(requests[0].rows, 25);
    }

    #[tokio::test]
    async fn test_unknown_set_spec_fails_before_any_query() {
        let client = Arc::new(MockClient::new(vec![]));
        let index = index_with(IndexConfig::default(), client.clone());
        assert!(matches!(
            index
                .list_documents(None, None, Some("nonexistent"), 0, 25)
                .await,
            Err(ProviderError::InvalidSetSpec { spec }) if spec == "nonexistent"
        ));
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_set_catalog_static_only() {
        let client = Arc::new(MockClient::new(vec![]));
        let config = IndexConfig {
            sets: vec![SetDescriptor {
                spec: "music".to_string(),
                name: "Music Collection".to_string(),
                filter_query: "curated:music".to_string(),
            }],
            ..IndexConfig::default()
        };
        let index = index_with(config, client.clone());

        let catalog = index.set_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains_key("music"));
        // no facet query without auto_create_sets
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_set_catalog_static_wins_over_facet() {
        let mut facets = BTreeMap::new();
        facets.insert(
            "collection_s".to_string(),
            vec![
                FacetCount {
                    value: "Music Collection".to_string(),
                    count: 12,
                },
                FacetCount {
                    value: "Art Collection".to_string(),
                    count: 3,
                },
            ],
        );
        let client = Arc::new(MockClient::new(vec![Ok(SearchResponse {
            docs: vec![],
            hits: 15,
            facets,
        })]));
        let config = IndexConfig {
            auto_create_sets: true,
            auto_set: Some(crate::config::AutoSetConfig {
                name_field: "collection".to_string(),
                name_query_field: "collection_s".to_string(),
            }),
            sets: vec![SetDescriptor {
                spec: "music_collection".to_string(),
                name: "Music Collection".to_string(),
                filter_query: "curated:music".to_string(),
            }],
            ..IndexConfig::default()
        };
        let index = index_with(config, client.clone());

        let catalog = index.set_catalog().await.unwrap();
        assert_eq!(catalog.len(), 2);
        // static filter wins over the facet-derived one
        assert_eq!(
            catalog.get("music_collection").unwrap().filter_query,
            "curated:music"
        );
        assert_eq!(
            catalog.get("art_collection").unwrap().filter_query,
            "collection_s:\"Art Collection\""
        );
        // one zero-row facet query over the base corpus
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "handle:*");
        assert_eq!(requests[0].rows, 0);
        assert_eq!(
            requests[0].facet.as_ref().unwrap().field,
            "collection_s"
        );
    }

    #[tokio::test]
    async fn test_sets_for_key_runs_one_existence_query_per_set() {
        let client = Arc::new(MockClient::new(vec![
            // membership check for "art": no hit
            Ok(SearchResponse::default()),
            // membership check for "music": hit
            Ok(SearchResponse {
                docs: vec![],
                hits: 1,
                facets: BTreeMap::new(),
            }),
        ]));
        let config = IndexConfig {
            sets: vec![
                SetDescriptor {
                    spec: "art".to_string(),
                    name: "Art Collection".to_string(),
                    filter_query: "collection:art".to_string(),
                },
                SetDescriptor {
                    spec: "music".to_string(),
                    name: "Music Collection".to_string(),
                    filter_query: "collection:music".to_string(),
                },
            ],
            ..IndexConfig::default()
        };
        let index = index_with(config, client.clone());

        let specs = index.sets_for_key("1903.1/1").await.unwrap();
        assert_eq!(specs, vec!["music".to_string()]);
        assert_eq!(client.request_count(), 2);
    }
}
