//! Query execution against SPARQL endpoints.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::debug;
use trellis_core::SparqlResponse;

use crate::error::ExecutorError;

/// Media type for the SPARQL 1.1 Query Results JSON format.
pub const RESULTS_JSON: &str = "application/sparql-results+json";

/// Anything that can run a SELECT query and produce the standard JSON
/// result set. HTTP endpoints go through [`SparqlHttpExecutor`]; tests
/// substitute canned responses.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn select(&self, query: &str) -> Result<SparqlResponse, ExecutorError>;
}

/// Runs queries as form-encoded POSTs, the submission style every common
/// endpoint (Virtuoso, Fuseki, Blazegraph) accepts regardless of query
/// length.
#[derive(Debug, Clone)]
pub struct SparqlHttpExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl SparqlHttpExecutor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        SparqlHttpExecutor {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Reuses a configured client, for shared pools, proxies, or timeouts.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        SparqlHttpExecutor {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryExecutor for SparqlHttpExecutor {
    async fn select(&self, query: &str) -> Result<SparqlResponse, ExecutorError> {
        debug!(endpoint = %self.endpoint, "sending SPARQL query");
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, RESULTS_JSON)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| ExecutorError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<SparqlResponse>()
            .await
            .map_err(|e| ExecutorError::Decode(e.to_string()))
    }
}
