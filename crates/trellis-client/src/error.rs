//! Error types for query execution and the end-to-end transform.

use thiserror::Error;
use trellis_core::CompileError;

/// Errors from talking to a SPARQL endpoint.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The request never completed (connection, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    /// The endpoint answered 2xx but the body is not a SPARQL JSON
    /// result set.
    #[error("malformed results payload: {0}")]
    Decode(String),
}

/// Errors from the whole template-to-entities pipeline.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("query execution failed: {0}")]
    Execute(#[from] ExecutorError),

    #[error("cannot read template file: {0}")]
    Io(#[from] std::io::Error),

    #[error("template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_errors_keep_endpoint_detail() {
        let err = ExecutorError::Endpoint {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "endpoint returned 503: maintenance");
    }

    #[test]
    fn test_compile_errors_pass_through_transparently() {
        let err: TransformError =
            CompileError::InvalidTemplate("missing `proto`".to_string()).into();
        assert_eq!(err.to_string(), "invalid template: missing `proto`");
    }
}
