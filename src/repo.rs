//! Repository fetch client.
//!
//! Backends retrieve raw record representations over HTTP: the graph
//! backend asks the repository itself (with bearer auth), the
//! field-assembly backend asks a public JSON endpoint. Both go through the
//! [`RepositoryClient`] trait so tests can substitute a scripted client.
//! Non-success HTTP statuses are returned in the [`FetchResponse`], not as
//! errors; the backend decides how to surface them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Outcome of one repository fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level fetch failure (connection refused, timeout, etc).
#[derive(Error, Debug)]
#[error("Fetch error: {0}")]
pub struct FetchError(pub String);

#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Issues one GET for `url`, optionally with an `Accept` header. Called
    /// at most once per logical operation; retries are the deployment's
    /// concern.
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<FetchResponse, FetchError>;
}

/// `reqwest`-backed client with optional bearer-token auth and a bounded
/// request timeout.
pub struct HttpRepositoryClient {
    http: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpRepositoryClient {
    pub fn new(timeout: Duration, bearer_token: Option<String>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError(e.to_string()))?;
        Ok(HttpRepositoryClient { http, bearer_token })
    }
}

#[async_trait]
impl RepositoryClient for HttpRepositoryClient {
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<FetchResponse, FetchError> {
        debug!(url = %url, accept = ?accept, "Repository fetch");
        let mut request = self.http.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| FetchError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| FetchError(e.to_string()))?;
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_response_ok_bounds() {
        assert!(FetchResponse { status: 200, body: String::new() }.ok());
        assert!(FetchResponse { status: 299, body: String::new() }.ok());
        assert!(!FetchResponse { status: 304, body: String::new() }.ok());
        assert!(!FetchResponse { status: 404, body: String::new() }.ok());
        assert!(!FetchResponse { status: 503, body: String::new() }.ok());
    }
}
