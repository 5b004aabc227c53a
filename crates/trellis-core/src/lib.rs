//! # Trellis Core
//!
//! Compiles declarative JSON templates into SPARQL SELECT queries and folds
//! the flat result rows back into the template's shape.
//!
//! A template describes the output you want; string leaves carry directives
//! (`$property$modifier...` or `?variable`) saying where each value comes
//! from. [`compile`] turns it into a query plus a compiled template;
//! [`bind`], [`merge`] and [`format`] rebuild nested entities from the
//! endpoint's rows:
//!
//! ```
//! use serde_json::json;
//! use trellis_core::{compile, SparqlResponse};
//!
//! let template = json!({
//!     "proto": {
//!         "id": "?id",
//!         "name": "$rdfs:label$required"
//!     },
//!     "$where": "?id a dbo:City",
//!     "$limit": 2
//! });
//! let compiled = compile(&template)?;
//! assert!(compiled.query.contains("SELECT DISTINCT ?id ?v1"));
//!
//! // run `compiled.query` against an endpoint, then fold the rows back
//! let raw = r#"{"head": {"vars": ["id", "v1"]}, "results": {"bindings": [
//!     {"id": {"type": "uri", "value": "http://x/rome"},
//!      "v1": {"type": "literal", "value": "Rome"}},
//!     {"id": {"type": "uri", "value": "http://x/rome"},
//!      "v1": {"type": "literal", "value": "Roma"}}
//! ]}}"#;
//! let response: SparqlResponse = serde_json::from_str(raw)?;
//! let entities = compiled.reconstruct(&response);
//! assert_eq!(entities, json!([{"id": "http://x/rome", "name": ["Rome", "Roma"]}]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Everything here is synchronous and endpoint-agnostic; the `trellis-client`
//! crate adds the HTTP side.

pub mod bind;
pub mod coerce;
pub mod compile;
pub mod context;
pub mod directive;
pub mod error;
pub mod format;
pub mod merge;
pub mod results;
pub mod sparql;
pub mod template;

pub use bind::bind;
pub use compile::{compile, CompiledQuery};
pub use context::QueryContext;
pub use directive::{AcceptType, Aggregate, Directive, LangTagPolicy, Mode, Modifier};
pub use error::{CompileError, Result};
pub use format::format;
pub use merge::merge;
pub use results::{BindingRow, RdfTerm, SparqlResponse};
pub use sparql::SelectQuery;
pub use template::{KeyVocab, ResultShape, DEFAULT_CONTEXT};
