//! Solr implementation of [`SearchIndexClient`].
//!
//! Issues `GET {base_url}/select` queries and maps the JSON response body
//! into [`SearchResponse`]. Facet counts arrive from Solr as flat
//! `[value, count, value, count, ...]` arrays and are folded into pairs.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    FacetCount, IndexClientError, IndexDocument, SearchIndexClient, SearchRequest, SearchResponse,
};

pub struct SolrClient {
    http: reqwest::Client,
    base_url: String,
}

impl SolrClient {
    /// Creates a client for the Solr core at `base_url`
    /// (e.g. `http://localhost:8983/solr/fcrepo`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IndexClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexClientError::Transport(e.to_string()))?;
        Ok(SolrClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct SelectBody {
    response: DocList,
    facet_counts: Option<FacetCounts>,
}

#[derive(Deserialize)]
struct DocList {
    #[serde(rename = "numFound")]
    num_found: u64,
    docs: Vec<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
struct FacetCounts {
    #[serde(default)]
    facet_fields: BTreeMap<String, Vec<Value>>,
}

/// Folds Solr's alternating `[value, count, ...]` facet array into pairs.
/// Entries with a non-string value or non-integer count are dropped.
fn facet_pairs(flat: &[Value]) -> Vec<FacetCount> {
    flat.chunks_exact(2)
        .filter_map(|pair| match (&pair[0], &pair[1]) {
            (Value::String(value), Value::Number(count)) => Some(FacetCount {
                value: value.clone(),
                count: count.as_u64()?,
            }),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl SearchIndexClient for SolrClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, IndexClientError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", request.query.clone()),
            ("wt", "json".to_string()),
            ("start", request.start.to_string()),
            ("rows", request.rows.to_string()),
        ];
        if let Some(fq) = &request.filter_query {
            params.push(("fq", fq.clone()));
        }
        if let Some(fl) = &request.fields {
            params.push(("fl", fl.clone()));
        }
        if let Some(facet) = &request.facet {
            params.push(("facet", "on".to_string()));
            params.push(("facet.field", facet.field.clone()));
            params.push(("facet.mincount", facet.min_count.to_string()));
        }

        let url = format!("{}/select", self.base_url);
        debug!(url = %url, q = %request.query, "Solr query");
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| IndexClientError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IndexClientError::Http {
                status: response.status().as_u16(),
            });
        }
        let body: SelectBody = response
            .json()
            .await
            .map_err(|e| IndexClientError::InvalidResponse(e.to_string()))?;

        let facets = body
            .facet_counts
            .map(|fc| {
                fc.facet_fields
                    .iter()
                    .map(|(field, flat)| (field.clone(), facet_pairs(flat)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(SearchResponse {
            docs: body.response.docs.into_iter().map(IndexDocument).collect(),
            hits: body.response.num_found,
            facets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_facet_pairs_folds_flat_array() {
        let flat = vec![json!("Music Collection"), json!(12), json!("Art"), json!(3)];
        let pairs = facet_pairs(&flat);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].value, "Music Collection");
        assert_eq!(pairs[0].count, 12);
        assert_eq!(pairs[1].value, "Art");
        assert_eq!(pairs[1].count, 3);
    }

    #[test]
    fn test_facet_pairs_drops_malformed_entries() {
        let flat = vec![json!(7), json!("backwards"), json!("ok"), json!(1)];
        let pairs = facet_pairs(&flat);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].value, "ok");
    }

    #[test]
    fn test_select_body_parses_solr_response() {
        let body: SelectBody = serde_json::from_value(json!({
            "response": {
                "numFound": 3,
                "start": 0,
                "docs": [
                    {"handle": "1903.1/1", "last_modified": "2020-01-15T00:00:00Z"}
                ]
            },
            "facet_counts": {
                "facet_fields": {
                    "collection_s": ["Music Collection", 12]
                }
            }
        }))
        .unwrap();
        assert_eq!(body.response.num_found, 3);
        assert_eq!(body.response.docs.len(), 1);
        let facets = body.facet_counts.unwrap().facet_fields;
        assert_eq!(facets["collection_s"].len(), 2);
    }
}
