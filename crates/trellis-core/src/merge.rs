//! Merging bound instances by identity.
//!
//! Each result row yields one instance of the compiled template; rows about
//! the same entity differ only in multi-valued fields. Merging folds them
//! into one entity per distinct anchor value, in first-seen order. Equality
//! throughout is structural, on the JSON values themselves.

use serde_json::Value as JsonValue;

use crate::template::{ANCHOR_KEY, BOOKKEEPING_KEYS};

/// Folds per-row instances into one entity per distinct anchor value.
/// Instances without an anchor, or with nothing bound for it, pass through
/// untouched.
pub fn merge(instances: Vec<JsonValue>) -> Vec<JsonValue> {
    let mut content: Vec<JsonValue> = Vec::new();
    for instance in instances {
        let anchor = anchor_of(&instance).map(|(f, v)| (f.to_string(), v.clone()));
        match anchor {
            Some((field, id)) => {
                if let Some(existing) = content.iter_mut().find(|e| e.get(&field) == Some(&id)) {
                    merge_into(existing, instance);
                } else {
                    content.push(instance);
                }
            }
            None => content.push(instance),
        }
    }
    content
}

/// The `(anchor field, bound identity value)` of an instance, when it has
/// both.
fn anchor_of(value: &JsonValue) -> Option<(&str, &JsonValue)> {
    let obj = value.as_object()?;
    let field = obj.get(ANCHOR_KEY)?.as_str()?;
    let id = obj.get(field)?;
    Some((field, id))
}

/// Merges `addition` into `base`, field by field. Bookkeeping keys are
/// already present on `base` and never merged.
fn merge_into(base: &mut JsonValue, addition: JsonValue) {
    let JsonValue::Object(add) = addition else {
        return;
    };
    let Some(base_map) = base.as_object_mut() else {
        return;
    };
    for (key, value) in add {
        if BOOKKEEPING_KEYS.contains(&key.as_str()) {
            continue;
        }
        match base_map.get_mut(&key) {
            None => {
                base_map.insert(key, value);
            }
            Some(existing) => merge_field(existing, value),
        }
    }
}

/// Merges one field: equal values collapse, entities with the same anchor
/// value merge recursively, arrays grow element-wise, anything else
/// promotes to a two-element array.
fn merge_field(base: &mut JsonValue, addition: JsonValue) {
    if *base == addition {
        return;
    }
    if let JsonValue::Array(items) = base {
        push_merged(items, addition);
        return;
    }
    let same_entity = match anchor_of(&addition) {
        Some((field, id)) => base.get(field) == Some(id),
        None => false,
    };
    if same_entity {
        merge_into(base, addition);
        return;
    }
    let first = std::mem::take(base);
    *base = JsonValue::Array(vec![first, addition]);
}

/// Adds one value to an array field: added arrays merge element by element
/// rather than nesting, same-anchor elements merge in place, and plain
/// duplicates are dropped.
fn push_merged(items: &mut Vec<JsonValue>, addition: JsonValue) {
    if let JsonValue::Array(elements) = addition {
        for element in elements {
            push_merged(items, element);
        }
        return;
    }
    let anchor = anchor_of(&addition).map(|(f, v)| (f.to_string(), v.clone()));
    if let Some((field, id)) = anchor {
        if let Some(existing) = items.iter_mut().find(|e| e.get(&field) == Some(&id)) {
            merge_into(existing, addition);
            return;
        }
    }
    if !items.iter().any(|e| e == &addition) {
        items.push(addition);
    }
}
