//! Binding result rows into the compiled template.

use serde_json::{Map, Value as JsonValue};

use crate::coerce::coerce;
use crate::directive::{Directive, LangTagPolicy, Mode};
use crate::results::BindingRow;
use crate::template::{ResultShape, BOOKKEEPING_KEYS, LIST_KEY};

/// Instantiates the compiled template against one binding row.
///
/// Fields whose variable the row leaves unbound disappear; nested entities
/// that lose every data field disappear with them. Bookkeeping keys stay,
/// the merge step still needs them.
pub fn bind(
    compiled: &JsonValue,
    row: &BindingRow,
    shape: &ResultShape,
    lang_tag: LangTagPolicy,
) -> JsonValue {
    let mut instance = compiled.clone();
    if let JsonValue::Object(map) = &mut instance {
        fill(map, row, shape, lang_tag);
    }
    instance
}

enum Action {
    Keep,
    Remove,
    WrapList,
}

fn fill(
    obj: &mut Map<String, JsonValue>,
    row: &BindingRow,
    shape: &ResultShape,
    lang_tag: LangTagPolicy,
) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for key in keys {
        if BOOKKEEPING_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Some(value) = obj.get_mut(&key) else {
            continue;
        };
        let action = match value {
            JsonValue::Object(child) => {
                fill(child, row, shape, lang_tag);
                if is_empty_entity(child) {
                    Action::Remove
                } else if child.get(LIST_KEY) == Some(&JsonValue::Bool(true)) {
                    Action::WrapList
                } else {
                    Action::Keep
                }
            }
            JsonValue::Array(items) => {
                let mut resolved = Vec::new();
                for item in items.drain(..) {
                    match item {
                        JsonValue::Object(mut child) => {
                            fill(&mut child, row, shape, lang_tag);
                            if !is_empty_entity(&child) {
                                resolved.push(JsonValue::Object(child));
                            }
                        }
                        JsonValue::String(s) => match leaf_directive(&s) {
                            Some(d) => {
                                if let Some(v) = resolve_leaf(&d, row, shape, lang_tag) {
                                    resolved.push(v);
                                }
                            }
                            None => resolved.push(JsonValue::String(s)),
                        },
                        other => resolved.push(other),
                    }
                }
                if resolved.is_empty() {
                    Action::Remove
                } else {
                    *items = resolved;
                    Action::Keep
                }
            }
            JsonValue::String(s) => match leaf_directive(s) {
                Some(d) => match resolve_leaf(&d, row, shape, lang_tag) {
                    Some(v) => {
                        *value = v;
                        Action::Keep
                    }
                    None => Action::Remove,
                },
                None => Action::Keep,
            },
            _ => Action::Keep,
        };
        match action {
            Action::Keep => {}
            Action::Remove => {
                obj.shift_remove(&key);
            }
            Action::WrapList => {
                if let Some(v) = obj.get_mut(&key) {
                    let entity = std::mem::take(v);
                    *v = JsonValue::Array(vec![entity]);
                }
            }
        }
    }
}

/// Compiled leaves are reference-mode directives; anything else is a
/// constant.
fn leaf_directive(s: &str) -> Option<Directive> {
    Directive::parse(s).filter(|d| d.mode == Mode::Reference)
}

fn resolve_leaf(
    d: &Directive,
    row: &BindingRow,
    shape: &ResultShape,
    default_tag: LangTagPolicy,
) -> Option<JsonValue> {
    let term = row.get(&d.head)?;
    let tag = d.lang_tag().unwrap_or(default_tag);
    coerce(term, d.accept(), tag, d.wants_list(), shape.vocab())
}

/// True when only constants of no identity remain: a `@type` marker and
/// bookkeeping keys.
fn is_empty_entity(obj: &Map<String, JsonValue>) -> bool {
    obj.keys()
        .all(|k| k == "@type" || BOOKKEEPING_KEYS.contains(&k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::RdfTerm;
    use serde_json::json;

    fn row(pairs: &[(&str, RdfTerm)]) -> BindingRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn bind_plain(compiled: JsonValue, row: &BindingRow) -> JsonValue {
        bind(&compiled, row, &ResultShape::Plain, LangTagPolicy::Show)
    }

    #[test]
    fn test_bound_fields_resolve_and_unbound_drop() {
        let compiled = json!({
            "id": "?id",
            "name": "?v1",
            "image": "?v2",
            "$anchor": "id"
        });
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/rome")),
            ("v1", RdfTerm::literal("Rome")),
        ]);
        let inst = bind_plain(compiled, &r);
        assert_eq!(
            inst,
            json!({"id": "http://example.org/rome", "name": "Rome", "$anchor": "id"})
        );
    }

    #[test]
    fn test_constants_and_type_markers_survive() {
        let compiled = json!({"id": "?id", "@type": "City", "note": "fixed"});
        let r = row(&[("id", RdfTerm::uri("http://example.org/x"))]);
        let inst = bind_plain(compiled, &r);
        assert_eq!(inst["@type"], json!("City"));
        assert_eq!(inst["note"], json!("fixed"));
    }

    #[test]
    fn test_empty_nested_entity_is_dropped() {
        let compiled = json!({
            "id": "?id",
            "region": {"id": "?v1r", "label": "?v11", "$anchor": "id"}
        });
        let r = row(&[("id", RdfTerm::uri("http://example.org/x"))]);
        let inst = bind_plain(compiled, &r);
        assert!(inst.get("region").is_none());
    }

    #[test]
    fn test_partially_bound_nested_entity_survives() {
        let compiled = json!({
            "id": "?id",
            "region": {"id": "?v1r", "label": "?v11", "$anchor": "id"}
        });
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/x")),
            ("v1r", RdfTerm::uri("http://example.org/lazio")),
        ]);
        let inst = bind_plain(compiled, &r);
        assert_eq!(
            inst["region"],
            json!({"id": "http://example.org/lazio", "$anchor": "id"})
        );
    }

    #[test]
    fn test_list_entities_bind_as_single_element_arrays() {
        let compiled = json!({
            "id": "?id",
            "members": {"id": "?m", "$anchor": "id", "$list": true}
        });
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/band")),
            ("m", RdfTerm::uri("http://example.org/alice")),
        ]);
        let inst = bind_plain(compiled, &r);
        assert_eq!(
            inst["members"],
            json!([{"id": "http://example.org/alice", "$anchor": "id", "$list": true}])
        );
    }

    #[test]
    fn test_leaf_lang_tag_override_beats_default() {
        let compiled = json!({"id": "?id", "label": "?v1$langTag:hide"});
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/x")),
            ("v1", RdfTerm::lang_literal("Roma", "it")),
        ]);
        let inst = bind(
            &compiled,
            &r,
            &ResultShape::Plain,
            LangTagPolicy::Show,
        );
        assert_eq!(inst["label"], json!("Roma"));
    }

    #[test]
    fn test_default_lang_tag_applies_without_override() {
        let compiled = json!({"id": "?id", "label": "?v1"});
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/x")),
            ("v1", RdfTerm::lang_literal("Roma", "it")),
        ]);
        let shown = bind(&compiled, &r, &ResultShape::Plain, LangTagPolicy::Show);
        assert_eq!(shown["label"], json!({"language": "it", "value": "Roma"}));
        let hidden = bind(&compiled, &r, &ResultShape::Plain, LangTagPolicy::Hide);
        assert_eq!(hidden["label"], json!("Roma"));
    }

    #[test]
    fn test_accept_filter_drops_mismatched_cells() {
        let compiled = json!({"id": "?id", "pop": "?v1$accept:number"});
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/x")),
            ("v1", RdfTerm::literal("not numeric")),
        ]);
        let inst = bind_plain(compiled, &r);
        assert!(inst.get("pop").is_none());
    }

    #[test]
    fn test_array_fields_resolve_per_element() {
        let compiled = json!({"id": "?id", "names": ["?v1", "?v1_2"]});
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/x")),
            ("v1_2", RdfTerm::literal("Rome")),
        ]);
        let inst = bind_plain(compiled, &r);
        assert_eq!(inst["names"], json!(["Rome"]));
    }

    #[test]
    fn test_jsonld_vocabulary_wraps_with_at_keys() {
        let compiled = json!({"@id": "?id", "label": "?v1"});
        let r = row(&[
            ("id", RdfTerm::uri("http://example.org/x")),
            ("v1", RdfTerm::lang_literal("Roma", "it")),
        ]);
        let inst = bind(
            &compiled,
            &r,
            &ResultShape::Graph { context: None },
            LangTagPolicy::Show,
        );
        assert_eq!(inst["label"], json!({"@language": "it", "@value": "Roma"}));
    }
}
