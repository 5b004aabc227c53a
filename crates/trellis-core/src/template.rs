//! Template envelopes, key vocabularies, and bookkeeping keys.
//!
//! A template is a JSON object in one of two envelope forms:
//!
//! ```json
//! { "proto": { ... }, "$limit": 10 }
//! { "@context": "http://schema.org/", "@graph": { ... }, "$limit": 10 }
//! ```
//!
//! The `proto` form yields a bare array of entities and uses plain output
//! keys (`id`, `language`, `value`); the `@graph` form yields a JSON-LD
//! document and uses `@`-prefixed keys.

use serde_json::Value as JsonValue;

use crate::error::{CompileError, Result};

/// Context emitted for `@graph` templates that carry none of their own.
pub const DEFAULT_CONTEXT: &str = "http://schema.org/";

/// Entity-internal key naming the field that identifies the entity.
pub const ANCHOR_KEY: &str = "$anchor";

/// Entity-internal key marking the entity as always-an-array.
pub const LIST_KEY: &str = "$list";

/// Keys the pipeline adds for its own bookkeeping; stripped before output.
pub const BOOKKEEPING_KEYS: &[&str] = &[ANCHOR_KEY, LIST_KEY];

/// Field names recognized as identity anchors when no explicit `anchor`
/// modifier is present, in lookup order.
pub const ID_FIELDS: &[&str] = &["@id", "id"];

/// Output key names for one envelope form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyVocab {
    pub id: &'static str,
    pub lang: &'static str,
    pub value: &'static str,
}

/// JSON-LD keywords, used by `@graph` templates.
pub const JSONLD_VOCAB: KeyVocab = KeyVocab {
    id: "@id",
    lang: "@language",
    value: "@value",
};

/// Plain keys, used by `proto` templates.
pub const PLAIN_VOCAB: KeyVocab = KeyVocab {
    id: "id",
    lang: "language",
    value: "value",
};

/// Which envelope the template used, and therefore how output is wrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    /// `proto` envelope: output is a bare array of entities.
    Plain,
    /// `@graph` envelope: output is `{"@context": ..., "@graph": [...]}`.
    /// Holds the template's own `@context`, when it declared one.
    Graph { context: Option<JsonValue> },
}

impl ResultShape {
    pub fn vocab(&self) -> &'static KeyVocab {
        match self {
            ResultShape::Plain => &PLAIN_VOCAB,
            ResultShape::Graph { .. } => &JSONLD_VOCAB,
        }
    }

    pub fn is_graph(&self) -> bool {
        matches!(self, ResultShape::Graph { .. })
    }
}

/// Pulls the prototype object and the envelope form out of a template root.
///
/// The prototype may be wrapped in a one-element array; only the first
/// element is compiled (output is an array either way).
pub fn extract_prototype(
    root: &serde_json::Map<String, JsonValue>,
) -> Result<(serde_json::Map<String, JsonValue>, ResultShape)> {
    let (node, shape) = if let Some(graph) = root.get("@graph") {
        let shape = ResultShape::Graph {
            context: root.get("@context").cloned(),
        };
        (graph, shape)
    } else if let Some(proto) = root.get("proto") {
        (proto, ResultShape::Plain)
    } else {
        return Err(CompileError::InvalidTemplate(
            "template must have a `proto` or `@graph` key".to_string(),
        ));
    };

    let node = match node {
        JsonValue::Array(items) => items.first().ok_or_else(|| {
            CompileError::InvalidTemplate("prototype array is empty".to_string())
        })?,
        other => other,
    };

    match node {
        JsonValue::Object(map) => Ok((map.clone(), shape)),
        _ => Err(CompileError::InvalidTemplate(
            "prototype must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: JsonValue) -> serde_json::Map<String, JsonValue> {
        match v {
            JsonValue::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_proto_envelope_is_plain() {
        let root = as_map(json!({"proto": {"id": "?x"}}));
        let (proto, shape) = extract_prototype(&root).unwrap();
        assert_eq!(shape, ResultShape::Plain);
        assert_eq!(proto.get("id"), Some(&json!("?x")));
        assert_eq!(shape.vocab().lang, "language");
    }

    #[test]
    fn test_graph_envelope_captures_context() {
        let root = as_map(json!({
            "@context": "http://example.org/",
            "@graph": [{"@id": "?x"}]
        }));
        let (proto, shape) = extract_prototype(&root).unwrap();
        assert!(proto.contains_key("@id"));
        assert_eq!(
            shape,
            ResultShape::Graph {
                context: Some(json!("http://example.org/"))
            }
        );
        assert_eq!(shape.vocab().lang, "@language");
    }

    #[test]
    fn test_graph_without_context_is_none() {
        let root = as_map(json!({"@graph": {"@id": "?x"}}));
        let (_, shape) = extract_prototype(&root).unwrap();
        assert_eq!(shape, ResultShape::Graph { context: None });
    }

    #[test]
    fn test_array_prototype_takes_first_element() {
        let root = as_map(json!({"proto": [{"id": "?a"}, {"id": "?b"}]}));
        let (proto, _) = extract_prototype(&root).unwrap();
        assert_eq!(proto.get("id"), Some(&json!("?a")));
    }

    #[test]
    fn test_missing_envelope_is_an_error() {
        let root = as_map(json!({"$limit": 5}));
        let err = extract_prototype(&root).unwrap_err();
        assert!(err.to_string().contains("proto"));
    }

    #[test]
    fn test_scalar_prototype_is_an_error() {
        let root = as_map(json!({"proto": "?x"}));
        assert!(extract_prototype(&root).is_err());
    }
}
