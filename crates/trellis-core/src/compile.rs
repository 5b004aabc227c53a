//! Template compilation.
//!
//! One walk over the prototype does three things at once: it emits graph
//! pattern lines into a [`SelectQuery`], registers every bound variable in
//! the projection, and rewrites directive leaves into their compiled
//! `?var$modifier` form. The rewritten tree is what result rows are later
//! bound against, so compilation is the single source of truth for which
//! variable feeds which field.

use std::collections::HashSet;

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::context::QueryContext;
use crate::directive::{AcceptType, Aggregate, Directive, LangTagPolicy, Mode, Modifier};
use crate::error::{CompileError, Result};
use crate::results::SparqlResponse;
use crate::sparql::{sparql_var, values_line, SelectQuery};
use crate::template::{self, ResultShape, ANCHOR_KEY, ID_FIELDS, LIST_KEY};

/// A compiled template: the query to run and everything needed to fold its
/// results back into the template's shape.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// Rendered SPARQL text.
    pub query: String,
    /// The prototype with every directive leaf rewritten to a variable
    /// reference, plus `$anchor`/`$list` bookkeeping.
    pub compiled: JsonValue,
    /// Output envelope.
    pub shape: ResultShape,
    /// Template-wide `$langTag` policy, when one was declared.
    pub lang_tag: Option<LangTagPolicy>,
}

impl CompiledQuery {
    /// Binds, merges, and wraps a raw result set using the template's own
    /// defaults. Callers that need to override the language tag policy or
    /// the output context compose [`crate::bind`], [`crate::merge`] and
    /// [`crate::format`] directly.
    pub fn reconstruct(&self, response: &SparqlResponse) -> JsonValue {
        let lang_tag = self.lang_tag.unwrap_or_default();
        let instances = response
            .rows()
            .iter()
            .map(|row| crate::bind::bind(&self.compiled, row, &self.shape, lang_tag))
            .collect();
        let merged = crate::merge::merge(instances);
        crate::format::format(&self.shape, merged, None)
    }
}

/// Compiles a template into a SPARQL SELECT query. The input is never
/// modified; the compiled tree is a rewritten copy.
pub fn compile(template: &JsonValue) -> Result<CompiledQuery> {
    let root = template.as_object().ok_or_else(|| {
        CompileError::InvalidTemplate("template root must be a JSON object".to_string())
    })?;
    let (mut proto, shape) = template::extract_prototype(root)?;
    let ctx = QueryContext::extract(root);

    let mut compiler = Compiler::new(&ctx);
    compiler.declare_named_vars(&proto);
    let mut lines = ctx.wheres.clone();
    compiler.walk_entity(&mut proto, "v", None, &mut lines)?;

    let mut query = compiler.query;
    query.distinct = ctx.distinct;
    query.from = ctx.from.clone();
    query.limit = ctx.limit;
    query.offset = ctx.offset;
    query.group_by = ctx.group_by.clone();
    query.having = ctx.having.clone();
    query.order_by = ctx.order_by.clone();
    query.filters = ctx.filters.clone();
    for (prefix, uri) in &ctx.prefixes {
        if let Some(uri) = uri.as_str() {
            query.prefixes.push((prefix.clone(), uri.to_string()));
        }
    }
    for (var, allowed) in &ctx.values {
        query.values.push(values_line(var, allowed));
    }
    query.wheres = lines;

    let text = query.render();
    debug!(vars = query.select.len(), "compiled template");
    Ok(CompiledQuery {
        query: text,
        compiled: JsonValue::Object(proto),
        shape,
        lang_tag: ctx.lang_tag,
    })
}

// ==================== Walker internals ====================

/// Where a leaf sits while the walker visits it.
struct LeafSite<'s> {
    field: &'s str,
    index: usize,
    prefix: &'s str,
    /// Subject variable of the enclosing entity, with `?`.
    subject: &'s str,
    /// Subject variable of the entity one level up.
    prev_root: Option<&'s str>,
    /// True when this field is the entity's elected anchor.
    is_anchor: bool,
}

/// Which expression a leaf contributes to the projection. The first
/// aggregate or bestlang modifier claims the slot.
enum Projection {
    Plain,
    Aggregate(Aggregate),
    BestLang,
}

fn projection(d: &Directive) -> Projection {
    for m in &d.modifiers {
        match m {
            Modifier::Aggregate(agg) => return Projection::Aggregate(*agg),
            Modifier::BestLang(_) => return Projection::BestLang,
            _ => {}
        }
    }
    Projection::Plain
}

/// Hands out pattern variable names, never the same one twice.
#[derive(Default)]
struct VarAllocator {
    used: HashSet<String>,
}

impl VarAllocator {
    fn declare(&mut self, name: &str) {
        self.used.insert(name.trim_start_matches('?').to_string());
    }

    /// Returns `base`, or `base_2`, `base_3`, ... when a declared or
    /// previously issued name already took it.
    fn fresh(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

struct Compiler<'a> {
    ctx: &'a QueryContext,
    /// `$values` variable names, normalized; membership makes a line required.
    values_vars: Vec<String>,
    query: SelectQuery,
    vars: VarAllocator,
}

impl<'a> Compiler<'a> {
    fn new(ctx: &'a QueryContext) -> Self {
        let values_vars = ctx.values_var_names();
        let mut vars = VarAllocator::default();
        for v in &values_vars {
            vars.declare(v);
        }
        Compiler {
            ctx,
            values_vars,
            query: SelectQuery::default(),
            vars,
        }
    }

    /// Pre-registers every user-chosen variable name so positional names
    /// can never collide with one declared deeper in the tree.
    fn declare_named_vars(&mut self, proto: &Map<String, JsonValue>) {
        fn scan(vars: &mut VarAllocator, value: &JsonValue) {
            match value {
                JsonValue::Object(map) => map.values().for_each(|v| scan(vars, v)),
                JsonValue::Array(items) => items.iter().for_each(|v| scan(vars, v)),
                JsonValue::String(s) => {
                    if let Some(d) = Directive::parse(s) {
                        if d.mode == Mode::Reference {
                            vars.declare(&d.head);
                        }
                        if let Some(v) = d.var_name() {
                            vars.declare(v);
                        }
                    }
                }
                _ => {}
            }
        }
        for v in proto.values() {
            scan(&mut self.vars, v);
        }
    }

    /// Elects the entity's anchor field, records the bookkeeping keys, and
    /// returns `(subject variable, block required)`. Entities without an
    /// anchor get no subject of their own and merge-pass through untouched.
    fn elect_anchor(
        &mut self,
        entity: &mut Map<String, JsonValue>,
        prefix: &str,
    ) -> (Option<String>, bool) {
        let mut field: Option<String> = None;
        for (k, v) in entity.iter() {
            if let JsonValue::String(s) = v {
                if Directive::parse(s).is_some_and(|d| d.has_anchor()) {
                    field = Some(k.clone());
                    break;
                }
            }
        }
        if field.is_none() {
            field = ID_FIELDS
                .iter()
                .find(|k| {
                    matches!(entity.get(**k), Some(JsonValue::String(s)) if Directive::parse(s).is_some())
                })
                .map(|k| k.to_string());
        }
        let Some(field) = field else {
            return (None, false);
        };
        let raw = entity
            .get(&field)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(d) = Directive::parse(&raw) else {
            return (None, false);
        };

        // a referenced anchor is a hard constraint; a generated one only
        // binds the block when explicitly required
        let block_required = d.is_required() || d.mode == Mode::Reference;
        let subject = if let Some(v) = d.var_name() {
            sparql_var(v)
        } else if d.mode == Mode::Reference {
            sparql_var(&d.head)
        } else {
            let synthesized = self.vars.fresh(&format!("{prefix}r"));
            entity.insert(
                field.clone(),
                JsonValue::String(format!("{raw}$var:{synthesized}")),
            );
            sparql_var(&synthesized)
        };
        if d.wants_list() {
            entity.insert(LIST_KEY.to_string(), JsonValue::Bool(true));
        }
        entity.insert(ANCHOR_KEY.to_string(), JsonValue::String(field));
        (Some(subject), block_required)
    }

    /// Walks one entity, pushing its pattern lines into `lines` and
    /// rewriting its leaves in place. Returns whether the enclosing block
    /// must not be wrapped in OPTIONAL.
    fn walk_entity(
        &mut self,
        entity: &mut Map<String, JsonValue>,
        prefix: &str,
        prev_root: Option<&str>,
        lines: &mut Vec<String>,
    ) -> Result<bool> {
        let (anchor_subject, block_required) = self.elect_anchor(entity, prefix);
        let anchor_field = entity
            .get(ANCHOR_KEY)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let subject = anchor_subject
            .or_else(|| prev_root.map(str::to_string))
            .unwrap_or_else(|| "?id".to_string());

        let keys: Vec<String> = entity
            .keys()
            .filter(|k| !template::BOOKKEEPING_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        for (index, key) in keys.iter().enumerate() {
            let Some(value) = entity.get(key).cloned() else {
                continue;
            };
            match value {
                JsonValue::Object(mut child) => {
                    let child_prefix = format!("{prefix}{index}");
                    self.walk_child(&mut child, &child_prefix, &subject, lines)?;
                    entity.insert(key.clone(), JsonValue::Object(child));
                }
                JsonValue::Array(items) => {
                    let mut compiled_items = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            JsonValue::Object(mut child) => {
                                let child_prefix = format!("{prefix}{index}");
                                self.walk_child(&mut child, &child_prefix, &subject, lines)?;
                                compiled_items.push(JsonValue::Object(child));
                            }
                            JsonValue::String(s) => {
                                compiled_items.push(self.compile_string_leaf(
                                    &s,
                                    LeafSite {
                                        field: key,
                                        index,
                                        prefix,
                                        subject: &subject,
                                        prev_root,
                                        is_anchor: false,
                                    },
                                    lines,
                                )?);
                            }
                            other => compiled_items.push(other),
                        }
                    }
                    entity.insert(key.clone(), JsonValue::Array(compiled_items));
                }
                JsonValue::String(s) => {
                    let compiled = self.compile_string_leaf(
                        &s,
                        LeafSite {
                            field: key,
                            index,
                            prefix,
                            subject: &subject,
                            prev_root,
                            is_anchor: anchor_field.as_deref() == Some(key.as_str()),
                        },
                        lines,
                    )?;
                    entity.insert(key.clone(), compiled);
                }
                _ => {}
            }
        }
        Ok(block_required)
    }

    /// Compiles a nested entity and wraps its lines in OPTIONAL unless its
    /// anchor makes the whole block required.
    fn walk_child(
        &mut self,
        child: &mut Map<String, JsonValue>,
        child_prefix: &str,
        subject: &str,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        let mut child_lines = Vec::new();
        let child_required = self.walk_entity(child, child_prefix, Some(subject), &mut child_lines)?;
        if !child_lines.is_empty() {
            let block = child_lines.join(" .\n");
            lines.push(if child_required {
                block
            } else {
                format!("OPTIONAL {{ {block} }}")
            });
        }
        Ok(())
    }

    /// Constants stay as they are; directives compile to a `?var` leaf.
    fn compile_string_leaf(
        &mut self,
        raw: &str,
        site: LeafSite<'_>,
        lines: &mut Vec<String>,
    ) -> Result<JsonValue> {
        match Directive::parse(raw) {
            Some(d) => {
                let leaf = self.compile_leaf(&d, site, lines)?;
                Ok(JsonValue::String(leaf))
            }
            None => Ok(JsonValue::String(raw.to_string())),
        }
    }

    fn compile_leaf(
        &mut self,
        d: &Directive,
        site: LeafSite<'_>,
        lines: &mut Vec<String>,
    ) -> Result<String> {
        let declared = d.var_name().map(str::to_string);
        let positional = format!("{}{}", site.prefix, site.index);
        let proj = projection(d);

        // the variable the graph pattern binds; aggregate aliases are
        // projected separately, so their pattern var stays positional
        let pattern_var = match d.mode {
            Mode::Reference => d.head.clone(),
            Mode::Generate => match (&proj, &declared) {
                (Projection::Aggregate(_), _) => self.vars.fresh(&positional),
                (_, Some(v)) => v.clone(),
                (_, None) => self.vars.fresh(&positional),
            },
        };

        // aggregate sources always bind; OPTIONAL around them is meaningless
        let required = d.is_required()
            || ID_FIELDS.contains(&site.field)
            || self.values_vars.contains(&pattern_var)
            || matches!(&proj, Projection::Aggregate(_));

        let (select_expr, bound_var, string_accept) = match proj {
            Projection::Plain => (sparql_var(&pattern_var), pattern_var.clone(), false),
            Projection::Aggregate(agg) => {
                let alias = match &declared {
                    Some(v) => v.clone(),
                    None => self
                        .vars
                        .fresh(&format!("{}_{}", agg.token(), sanitize_path(&d.head))),
                };
                let distinct = if d.has_distinct() { "DISTINCT " } else { "" };
                let expr = format!(
                    "({}({distinct}{}) AS {})",
                    agg.keyword(),
                    sparql_var(&pattern_var),
                    sparql_var(&alias)
                );
                (expr, alias, false)
            }
            Projection::BestLang => {
                let prefs = d
                    .best_lang()
                    .and_then(|p| p.clone())
                    .or_else(|| self.ctx.lang.clone())
                    .ok_or_else(|| CompileError::MissingLanguage {
                        field: site.field.to_string(),
                    })?;
                let var = sparql_var(&pattern_var);
                let expr = format!("(sql:BEST_LANGMATCH({var}, \"{prefs}\", \"en\") AS {var})");
                (expr, pattern_var.clone(), true)
            }
        };

        if d.mode == Mode::Generate {
            let subject = if d.uses_prev_root() {
                site.prev_root.unwrap_or(site.subject)
            } else if site.is_anchor {
                // the anchor's path walks from the parent down to this
                // entity's own subject
                site.prev_root.unwrap_or("?id")
            } else {
                site.subject
            };
            let object = sparql_var(&pattern_var);
            let mut line = if d.is_reverse() {
                format!("{object} {} {subject}", d.head)
            } else {
                format!("{subject} {} {object}", d.head)
            };
            if let Some(inline) = d.lang() {
                let code = inline.clone().or_else(|| self.ctx.lang.clone());
                if let Some(code) = code.filter(|c| !c.is_empty()) {
                    line.push_str(&format!(" .\nFILTER(lang({object}) = '{code}')"));
                }
            }
            lines.push(if required {
                line
            } else {
                format!("OPTIONAL {{ {line} }}")
            });
        }

        self.query.push_select(select_expr);

        let mut modifiers = d.bind_stage_modifiers();
        if string_accept && !modifiers.iter().any(|m| matches!(m, Modifier::Accept(_))) {
            modifiers.push(Modifier::Accept(AcceptType::String));
        }
        Ok(Directive::reference(&bound_var, modifiers).to_string())
    }
}

/// Path text reduced to variable-safe characters, for derived aliases.
fn sanitize_path(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
