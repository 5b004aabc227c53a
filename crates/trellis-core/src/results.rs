//! SPARQL 1.1 Query Results JSON, deserialization side.
//!
//! The shape every SELECT endpoint returns:
//!
//! ```json
//! {
//!   "head": { "vars": ["city", "label"] },
//!   "results": { "bindings": [
//!     { "city": { "type": "uri", "value": "http://dbpedia.org/resource/Rome" },
//!       "label": { "type": "literal", "value": "Roma", "xml:lang": "it" } }
//!   ]}
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One row of the result set: variable name to bound term. Variables a row
/// leaves unbound are simply absent.
pub type BindingRow = HashMap<String, RdfTerm>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparqlResponse {
    #[serde(default)]
    pub head: Head,
    #[serde(default)]
    pub results: ResultSet,
}

impl SparqlResponse {
    pub fn rows(&self) -> &[BindingRow] {
        &self.results.bindings
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Head {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub bindings: Vec<BindingRow>,
}

/// One bound RDF term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RdfTerm {
    /// `uri`, `literal`, or `bnode`. Some endpoints also emit the legacy
    /// `typed-literal`; the distinction never matters here.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl RdfTerm {
    pub fn uri(value: impl Into<String>) -> Self {
        RdfTerm {
            kind: Some("uri".to_string()),
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        RdfTerm {
            kind: Some("literal".to_string()),
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        RdfTerm {
            kind: Some("literal".to_string()),
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        RdfTerm {
            kind: Some("literal".to_string()),
            value: value.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }
}
