//! SPARQL SELECT assembly.
//!
//! The compiler fills a [`SelectQuery`] while walking the template; rendering
//! it to text is a separate, purely mechanical pass. Clause order and
//! separators are fixed, so the same template always renders byte-identical.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

/// A SELECT query under construction.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    /// `(prefix, uri)` pairs, one PREFIX line each.
    pub prefixes: Vec<(String, String)>,
    pub distinct: bool,
    /// Projection expressions in first-registration order.
    pub select: Vec<String>,
    /// Default graph for a FROM clause.
    pub from: Option<String>,
    /// Pre-rendered VALUES lines.
    pub values: Vec<String>,
    /// Graph pattern lines or blocks, joined with ` .`.
    pub wheres: Vec<String>,
    /// Raw filter expressions, each wrapped in `FILTER(...)`.
    pub filters: Vec<String>,
    pub group_by: Vec<String>,
    pub having: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Default for SelectQuery {
    fn default() -> Self {
        SelectQuery {
            prefixes: Vec::new(),
            distinct: true,
            select: Vec::new(),
            from: None,
            values: Vec::new(),
            wheres: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

impl SelectQuery {
    /// Registers a projection expression, keeping the first occurrence only.
    pub fn push_select(&mut self, expr: String) {
        if !self.select.contains(&expr) {
            self.select.push(expr);
        }
    }

    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (prefix, uri) in &self.prefixes {
            lines.push(format!("PREFIX {prefix}: <{uri}>"));
        }

        let mut head = String::from("SELECT ");
        if self.distinct {
            head.push_str("DISTINCT ");
        }
        head.push_str(&self.select.join(" "));
        if let Some(graph) = &self.from {
            head.push_str(&format!(" FROM <{graph}>"));
        }
        head.push_str(" WHERE {");
        lines.push(head);

        for v in &self.values {
            lines.push(format!("  {v}"));
        }
        if !self.wheres.is_empty() {
            lines.push(format!("  {}", self.wheres.join(" .\n  ")));
        }
        for f in &self.filters {
            lines.push(format!("  FILTER({f})"));
        }
        lines.push("}".to_string());

        if !self.group_by.is_empty() {
            lines.push(format!("GROUP BY {}", self.group_by.join(" ")));
        }
        if !self.having.is_empty() {
            lines.push(format!("HAVING({})", self.having.join(" && ")));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("ORDER BY {}", self.order_by.join(" ")));
        }
        if let Some(n) = self.limit {
            lines.push(format!("LIMIT {n}"));
        }
        if let Some(n) = self.offset {
            lines.push(format!("OFFSET {n}"));
        }
        lines.join("\n")
    }
}

/// Ensures a variable name carries its `?`.
pub fn sparql_var(name: &str) -> String {
    if name.starts_with('?') {
        name.to_string()
    } else {
        format!("?{name}")
    }
}

static LANG_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)@([a-z]{2,3}(?:-[A-Z]{2})?)$").unwrap());

/// Renders one `VALUES` line for a variable and its allowed values.
pub fn values_line(var: &str, values: &JsonValue) -> String {
    let items: Vec<&JsonValue> = match values {
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let terms: Vec<String> = items.into_iter().filter_map(values_term).collect();
    format!("VALUES {} {{ {} }}", sparql_var(var), terms.join(" "))
}

/// Classifies one allowed value: URI, prefixed name, language-tagged
/// literal, or plain literal, checked in that order.
fn values_term(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            if s.starts_with("http") {
                Some(format!("<{s}>"))
            } else if s.contains(':') {
                Some(s.clone())
            } else if let Some(caps) = LANG_LITERAL.captures(s) {
                Some(format!("\"{}\"@{}", &caps[1], &caps[2]))
            } else {
                Some(format!("\"{s}\""))
            }
        }
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
