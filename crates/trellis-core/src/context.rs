//! Query-level root modifiers.
//!
//! Every key of the template root that starts with `$` configures the query
//! as a whole rather than a field. They are harvested into a [`QueryContext`]
//! before the prototype is walked and never appear in output.

use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::directive::LangTagPolicy;

#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Extra graph pattern lines, prepended to the generated ones.
    pub wheres: Vec<String>,
    /// Raw FILTER expressions.
    pub filters: Vec<String>,
    /// Variable name to allowed values, rendered as VALUES lines.
    pub values: Map<String, JsonValue>,
    pub order_by: Vec<String>,
    pub group_by: Vec<String>,
    pub having: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// SELECT DISTINCT unless explicitly disabled.
    pub distinct: bool,
    /// Prefix to namespace URI.
    pub prefixes: Map<String, JsonValue>,
    pub from: Option<String>,
    /// Default language for `lang`/`bestlang` modifiers without one inline.
    pub lang: Option<String>,
    /// Template-wide language tag policy.
    pub lang_tag: Option<LangTagPolicy>,
}

impl QueryContext {
    /// Reads the `$`-keys off a template root. Unknown ones are ignored
    /// with a log line so typos stay visible.
    pub fn extract(root: &Map<String, JsonValue>) -> Self {
        let mut ctx = QueryContext {
            distinct: true,
            ..QueryContext::default()
        };
        for (key, value) in root {
            let Some(name) = key.strip_prefix('$') else {
                continue;
            };
            match name {
                "where" => ctx.wheres = string_or_list(value),
                "filter" => ctx.filters = string_or_list(value),
                "values" => match value {
                    JsonValue::Object(map) => ctx.values = map.clone(),
                    _ => warn!("$values must be an object, ignoring"),
                },
                "orderby" => ctx.order_by = string_or_list(value),
                "groupby" => ctx.group_by = string_or_list(value),
                "having" => ctx.having = string_or_list(value),
                "limit" => ctx.limit = as_count(value, "$limit"),
                "offset" => ctx.offset = as_count(value, "$offset"),
                "distinct" => ctx.distinct = as_flag(value),
                "prefixes" => match value {
                    JsonValue::Object(map) => ctx.prefixes = map.clone(),
                    _ => warn!("$prefixes must be an object, ignoring"),
                },
                "from" => ctx.from = value.as_str().map(str::to_string),
                "lang" => ctx.lang = value.as_str().map(str::to_string),
                "langTag" => {
                    ctx.lang_tag = match value.as_str() {
                        Some("hide") => Some(LangTagPolicy::Hide),
                        Some("show") => Some(LangTagPolicy::Show),
                        _ => {
                            warn!("$langTag must be \"show\" or \"hide\", ignoring");
                            None
                        }
                    }
                }
                other => warn!(modifier = other, "unknown root modifier, ignoring"),
            }
        }
        ctx
    }

    /// `$values` keys without their `?`, for required-ness checks.
    pub fn values_var_names(&self) -> Vec<String> {
        self.values
            .keys()
            .map(|k| k.trim_start_matches('?').to_string())
            .collect()
    }
}

/// A scalar string or an array of strings; entries are trimmed and empties
/// dropped.
fn string_or_list(value: &JsonValue) -> Vec<String> {
    let items: Vec<&JsonValue> = match value {
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(|v| match v.as_str() {
            Some(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            None => {
                warn!("expected a string entry in a root modifier, ignoring");
                None
            }
        })
        .collect()
}

fn as_count(value: &JsonValue, name: &str) -> Option<u64> {
    let n = match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    if n.is_none() {
        warn!("{name} must be a non-negative integer, ignoring");
    }
    n
}

fn as_flag(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s != "false",
        JsonValue::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}
