use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named grouping of records, addressable by its normalized `spec` slug.
///
/// `filter_query` is the index predicate selecting the set's members; for
/// facet-discovered sets it is an exact-match predicate on the collection
/// name field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDescriptor {
    pub spec: String,
    pub name: String,
    #[serde(rename = "filter")]
    pub filter_query: String,
}

/// A registered output metadata format (OAI metadata prefix plus its XML
/// namespace and schema location).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFormat {
    pub prefix: String,
    pub namespace: String,
    pub schema: String,
}

/// Header information for one record: its rendered identifier, datestamp at
/// the repository's granularity, and the specs of the sets it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub identifier: String,
    pub datestamp: String,
    pub set_specs: Vec<String>,
}

/// Datestamp granularity advertised by the repository and applied to record
/// header datestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "YYYY-MM-DD")]
    Day,
    #[serde(rename = "YYYY-MM-DDThh:mm:ssZ")]
    Second,
}

impl Granularity {
    /// Formats a timestamp at this granularity.
    pub fn format(&self, timestamp: DateTime<Utc>) -> String {
        match self {
            Granularity::Day => timestamp.format("%Y-%m-%d").to_string(),
            Granularity::Second => timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

/// Repository identity descriptor returned for the protocol's Identify
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    pub base_url: String,
    pub admin_email: Vec<String>,
    pub repository_name: String,
    pub earliest_datestamp: String,
    pub deleted_record: String,
    pub granularity: Granularity,
}
