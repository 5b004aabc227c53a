//! # Trellis Client
//!
//! The async face of trellis: compile a JSON template, POST the query to a
//! SPARQL endpoint, and hand back entities in the template's own shape.
//!
//! ```no_run
//! use serde_json::json;
//! use trellis_client::{Transformer, TransformOptions};
//!
//! # async fn run() -> Result<(), trellis_client::TransformError> {
//! let transformer = Transformer::new(TransformOptions {
//!     endpoint: "https://dbpedia.org/sparql".to_string(),
//!     ..TransformOptions::default()
//! });
//! let cities = transformer
//!     .transform(&json!({
//!         "proto": {"id": "?id", "name": "$rdfs:label$required$lang:en"},
//!         "$where": "?id a dbo:City",
//!         "$limit": 10
//!     }))
//!     .await?;
//! println!("{cities:#}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info};
use trellis_core::{bind, compile, format, merge, LangTagPolicy};

pub use crate::error::{ExecutorError, TransformError};
pub use crate::executor::{QueryExecutor, SparqlHttpExecutor};

/// Endpoint queried when the options name none.
pub const DEFAULT_ENDPOINT: &str = "http://dbpedia.org/sparql";

/// Settings for a [`Transformer`].
///
/// `context` and `lang_tag` override what the template declares; leave them
/// `None` to let the template (or the built-in default) win.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub endpoint: String,
    /// Replaces the output `@context` of `@graph` templates.
    pub context: Option<String>,
    /// Forces language-tagged literals to bind wrapped or bare.
    pub lang_tag: Option<LangTagPolicy>,
    /// Logs the generated query at INFO instead of DEBUG.
    pub debug: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            context: None,
            lang_tag: None,
            debug: false,
        }
    }
}

/// Compiles templates, runs them, and reassembles the results.
pub struct Transformer {
    options: TransformOptions,
    executor: Arc<dyn QueryExecutor>,
}

impl Default for Transformer {
    fn default() -> Self {
        Transformer::new(TransformOptions::default())
    }
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Self {
        let executor = Arc::new(SparqlHttpExecutor::new(options.endpoint.clone()));
        Transformer { options, executor }
    }

    /// Swaps out the HTTP layer, for tests or non-HTTP endpoints.
    pub fn with_executor(options: TransformOptions, executor: Arc<dyn QueryExecutor>) -> Self {
        Transformer { options, executor }
    }

    /// Runs a template end to end: compile, execute, bind, merge, wrap.
    pub async fn transform(&self, template: &JsonValue) -> Result<JsonValue, TransformError> {
        let compiled = compile(template)?;
        if self.options.debug {
            info!("generated query:\n{}", compiled.query);
        } else {
            debug!("generated query:\n{}", compiled.query);
        }

        let response = self.executor.select(&compiled.query).await?;
        debug!(rows = response.rows().len(), "endpoint answered");

        let lang_tag = self
            .options
            .lang_tag
            .or(compiled.lang_tag)
            .unwrap_or_default();
        let instances = response
            .rows()
            .iter()
            .map(|row| bind(&compiled.compiled, row, &compiled.shape, lang_tag))
            .collect();
        let merged = merge(instances);
        let context = self
            .options
            .context
            .as_ref()
            .map(|c| JsonValue::String(c.clone()));
        Ok(format(&compiled.shape, merged, context.as_ref()))
    }

    /// Reads a template from disk and runs it.
    pub async fn transform_file(&self, path: impl AsRef<Path>) -> Result<JsonValue, TransformError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let template: JsonValue = serde_json::from_str(&raw)?;
        self.transform(&template).await
    }
}

/// One-shot helper for callers that do not keep a transformer around.
pub async fn transform(
    template: &JsonValue,
    options: TransformOptions,
) -> Result<JsonValue, TransformError> {
    Transformer::new(options).transform(template).await
}
