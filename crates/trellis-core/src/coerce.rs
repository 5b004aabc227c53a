//! Coercion of RDF terms into native JSON values.

use serde_json::{Map, Number, Value as JsonValue};

use crate::directive::{AcceptType, LangTagPolicy};
use crate::results::RdfTerm;
use crate::template::KeyVocab;

pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

/// XSD types that coerce to a JSON integer.
pub const XSD_INTEGER_TYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#nonPositiveInteger",
    "http://www.w3.org/2001/XMLSchema#negativeInteger",
    "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
    "http://www.w3.org/2001/XMLSchema#positiveInteger",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#short",
    "http://www.w3.org/2001/XMLSchema#byte",
    "http://www.w3.org/2001/XMLSchema#unsignedLong",
    "http://www.w3.org/2001/XMLSchema#unsignedInt",
    "http://www.w3.org/2001/XMLSchema#unsignedShort",
    "http://www.w3.org/2001/XMLSchema#unsignedByte",
];

/// XSD types that coerce to a JSON float.
pub const XSD_DECIMAL_TYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#decimal",
    "http://www.w3.org/2001/XMLSchema#float",
    "http://www.w3.org/2001/XMLSchema#double",
];

/// Lexical forms of xsd:boolean that mean false; anything else is true.
const FALSY_BOOLEANS: &[&str] = &["false", "0", "False"];

/// Turns one bound term into the JSON value a template field receives.
///
/// Coercion never fails on a malformed lexical form: a numeric literal
/// that does not parse (or has no finite JSON representation, like INF)
/// falls back to its raw string. `None` means the value was filtered out
/// by `accept`.
pub fn coerce(
    term: &RdfTerm,
    accept: Option<AcceptType>,
    lang_tag: LangTagPolicy,
    as_list: bool,
    vocab: &KeyVocab,
) -> Option<JsonValue> {
    let mut value = typed_value(term);

    if let Some(filter) = accept {
        if !filter.matches(&value) {
            return None;
        }
    }

    if value.is_string() && lang_tag == LangTagPolicy::Show {
        if let Some(lang) = term.lang.as_deref().filter(|l| !l.is_empty()) {
            let mut wrapped = Map::new();
            wrapped.insert(vocab.lang.to_string(), JsonValue::String(lang.to_string()));
            wrapped.insert(vocab.value.to_string(), value);
            value = JsonValue::Object(wrapped);
        }
    }

    if as_list {
        value = JsonValue::Array(vec![value]);
    }
    Some(value)
}

fn typed_value(term: &RdfTerm) -> JsonValue {
    let raw = term.value.as_str();
    let Some(datatype) = term.datatype.as_deref() else {
        return JsonValue::String(raw.to_string());
    };

    if datatype == XSD_BOOLEAN {
        return JsonValue::Bool(!FALSY_BOOLEANS.contains(&raw));
    }
    if XSD_INTEGER_TYPES.contains(&datatype) {
        if let Ok(n) = raw.parse::<i64>() {
            return JsonValue::Number(n.into());
        }
        if let Ok(n) = raw.parse::<u64>() {
            return JsonValue::Number(n.into());
        }
        return JsonValue::String(raw.to_string());
    }
    if XSD_DECIMAL_TYPES.contains(&datatype) {
        return raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(raw.to_string()));
    }
    JsonValue::String(raw.to_string())
}
