//! Final output assembly: strip bookkeeping, apply the envelope.

use serde_json::{Map, Value as JsonValue};

use crate::template::{ResultShape, BOOKKEEPING_KEYS, DEFAULT_CONTEXT};

/// Wraps merged entities in the template's envelope. `context` overrides
/// the template's own `@context`; with neither, `@graph` output falls back
/// to the default vocabulary.
pub fn format(
    shape: &ResultShape,
    mut content: Vec<JsonValue>,
    context: Option<&JsonValue>,
) -> JsonValue {
    for entity in &mut content {
        strip_bookkeeping(entity);
    }
    match shape {
        ResultShape::Plain => JsonValue::Array(content),
        ResultShape::Graph {
            context: template_context,
        } => {
            let resolved = context
                .cloned()
                .or_else(|| template_context.clone())
                .unwrap_or_else(|| JsonValue::String(DEFAULT_CONTEXT.to_string()));
            let mut doc = Map::new();
            doc.insert("@context".to_string(), resolved);
            doc.insert("@graph".to_string(), JsonValue::Array(content));
            JsonValue::Object(doc)
        }
    }
}

fn strip_bookkeeping(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            for key in BOOKKEEPING_KEYS {
                map.shift_remove(*key);
            }
            for v in map.values_mut() {
                strip_bookkeeping(v);
            }
        }
        JsonValue::Array(items) => {
            for v in items {
                strip_bookkeeping(v);
            }
        }
        _ => {}
    }
}
