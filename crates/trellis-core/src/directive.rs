//! The directive mini-language embedded in template string leaves.
//!
//! A string leaf is a directive when it starts with `$` (generate a new
//! graph pattern from a property path) or `?` (reference a variable bound
//! elsewhere). Everything after the head is a `$`-separated modifier list:
//!
//! ```text
//! $dbo:populationTotal$sum$var:population
//! $rdfs:label$required$lang:it
//! ?city$langTag:hide
//! ```
//!
//! Modifiers are order-independent; when two compete for the same slot the
//! first occurrence wins. Unrecognized tokens are carried through verbatim
//! so templates survive round-trips through the compiler.

use std::fmt;

use serde_json::Value as JsonValue;

/// How a directive binds its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `$path`: emit a triple pattern and bind a fresh variable.
    Generate,
    /// `?var`: reuse a variable bound by another field or `$where` line.
    Reference,
}

/// Native JSON type filter applied when binding a cell (`accept:<type>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptType {
    Int,
    Float,
    Number,
    String,
    Bool,
}

impl AcceptType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(AcceptType::Int),
            "float" => Some(AcceptType::Float),
            "number" => Some(AcceptType::Number),
            "str" | "string" => Some(AcceptType::String),
            "bool" | "boolean" => Some(AcceptType::Bool),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            AcceptType::Int => "int",
            AcceptType::Float => "float",
            AcceptType::Number => "number",
            AcceptType::String => "string",
            AcceptType::Bool => "bool",
        }
    }

    /// Whether a coerced value passes this filter.
    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            AcceptType::Int => value.as_i64().is_some() || value.as_u64().is_some(),
            AcceptType::Float => value.as_number().is_some_and(|n| n.is_f64()),
            AcceptType::Number => value.is_number(),
            AcceptType::String => value.is_string(),
            AcceptType::Bool => value.is_boolean(),
        }
    }
}

/// Aggregate functions available as modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sample,
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Aggregate {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sample" => Some(Aggregate::Sample),
            "count" => Some(Aggregate::Count),
            "sum" => Some(Aggregate::Sum),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            "avg" => Some(Aggregate::Avg),
            _ => None,
        }
    }

    /// SPARQL keyword, e.g. `SAMPLE`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Aggregate::Sample => "SAMPLE",
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Avg => "AVG",
        }
    }

    /// Modifier spelling, e.g. `sum`.
    pub fn token(&self) -> &'static str {
        match self {
            Aggregate::Sample => "sample",
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Avg => "avg",
        }
    }
}

/// Whether a language-tagged literal binds as `{language, value}` or bare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LangTagPolicy {
    #[default]
    Show,
    Hide,
}

/// One parsed modifier token.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// `var:<name>`: bind to this variable instead of a positional one.
    Var(String),
    /// `anchor`: this field identifies the entity for merging.
    Anchor,
    /// `required`: do not wrap the pattern in OPTIONAL.
    Required,
    /// `reverse`: swap subject and object in the emitted pattern.
    Reverse,
    /// `prevRoot`: attach to the parent entity's subject, not this one's.
    PrevRoot,
    /// `lang[:code]`: filter on exact language tag.
    Lang(Option<String>),
    /// `bestlang[:prefs]`: pick the best-matching language variant.
    BestLang(Option<String>),
    /// `accept:<type>`: drop bound values of any other native type.
    Accept(AcceptType),
    /// `langTag:show|hide`: how language-tagged literals bind.
    LangTag(LangTagPolicy),
    /// `list` / `asList`: always bind this field as an array.
    List,
    /// `sample` / `count` / `sum` / `min` / `max` / `avg`.
    Aggregate(Aggregate),
    /// `distinct`: aggregate over distinct bindings.
    Distinct,
    /// Anything else, preserved verbatim.
    Unknown(String),
}

impl Modifier {
    fn parse_token(token: &str) -> Self {
        let (name, arg) = match token.split_once(':') {
            Some((n, a)) => (n, Some(a)),
            None => (token, None),
        };
        let non_empty = |a: Option<&str>| a.filter(|s| !s.is_empty()).map(str::to_string);
        match name {
            "var" => match non_empty(arg).map(|a| a.trim_start_matches('?').to_string()) {
                Some(v) if !v.is_empty() => Modifier::Var(v),
                _ => Modifier::Unknown(token.to_string()),
            },
            "anchor" => Modifier::Anchor,
            "required" => Modifier::Required,
            "reverse" => Modifier::Reverse,
            "prevRoot" => Modifier::PrevRoot,
            "lang" => Modifier::Lang(non_empty(arg)),
            "bestlang" => Modifier::BestLang(non_empty(arg)),
            "accept" => match arg.and_then(AcceptType::parse) {
                Some(t) => Modifier::Accept(t),
                None => Modifier::Unknown(token.to_string()),
            },
            "langTag" => match arg {
                Some("show") => Modifier::LangTag(LangTagPolicy::Show),
                Some("hide") => Modifier::LangTag(LangTagPolicy::Hide),
                _ => Modifier::Unknown(token.to_string()),
            },
            "list" | "asList" => Modifier::List,
            "distinct" => Modifier::Distinct,
            _ => match Aggregate::parse(name) {
                Some(agg) if arg.is_none() => Modifier::Aggregate(agg),
                _ => Modifier::Unknown(token.to_string()),
            },
        }
    }

    /// True for modifiers that still matter after compilation, when result
    /// cells are bound back into the template.
    pub fn is_bind_stage(&self) -> bool {
        matches!(
            self,
            Modifier::Accept(_) | Modifier::LangTag(_) | Modifier::List | Modifier::Unknown(_)
        )
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Var(v) => write!(f, "var:{v}"),
            Modifier::Anchor => f.write_str("anchor"),
            Modifier::Required => f.write_str("required"),
            Modifier::Reverse => f.write_str("reverse"),
            Modifier::PrevRoot => f.write_str("prevRoot"),
            Modifier::Lang(None) => f.write_str("lang"),
            Modifier::Lang(Some(code)) => write!(f, "lang:{code}"),
            Modifier::BestLang(None) => f.write_str("bestlang"),
            Modifier::BestLang(Some(prefs)) => write!(f, "bestlang:{prefs}"),
            Modifier::Accept(t) => write!(f, "accept:{}", t.token()),
            Modifier::LangTag(LangTagPolicy::Show) => f.write_str("langTag:show"),
            Modifier::LangTag(LangTagPolicy::Hide) => f.write_str("langTag:hide"),
            Modifier::List => f.write_str("list"),
            Modifier::Aggregate(agg) => f.write_str(agg.token()),
            Modifier::Distinct => f.write_str("distinct"),
            Modifier::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// A parsed directive: head plus modifier list.
///
/// In generate mode the head is a property path (`dbo:region`, a full IRI,
/// or any SPARQL path expression without `$`). In reference mode it is a
/// variable name, stored without the leading `?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub mode: Mode,
    pub head: String,
    pub modifiers: Vec<Modifier>,
}

impl Directive {
    /// Parses a string leaf. Returns `None` for plain constants (no sigil,
    /// or a sigil with an empty head).
    pub fn parse(raw: &str) -> Option<Self> {
        let mode = match raw.chars().next() {
            Some('$') => Mode::Generate,
            Some('?') => Mode::Reference,
            _ => return None,
        };
        let mut parts = raw[1..].split('$');
        let head = parts.next().unwrap_or_default().to_string();
        if head.is_empty() {
            return None;
        }
        let modifiers = parts.map(Modifier::parse_token).collect();
        Some(Directive {
            mode,
            head,
            modifiers,
        })
    }

    /// A reference-mode directive, as written into compiled templates.
    pub fn reference(var: &str, modifiers: Vec<Modifier>) -> Self {
        Directive {
            mode: Mode::Reference,
            head: var.trim_start_matches('?').to_string(),
            modifiers,
        }
    }

    /// First `var:` name, without `?`.
    pub fn var_name(&self) -> Option<&str> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Var(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn has_anchor(&self) -> bool {
        self.modifiers.contains(&Modifier::Anchor)
    }

    pub fn is_required(&self) -> bool {
        self.modifiers.contains(&Modifier::Required)
    }

    pub fn is_reverse(&self) -> bool {
        self.modifiers.contains(&Modifier::Reverse)
    }

    pub fn uses_prev_root(&self) -> bool {
        self.modifiers.contains(&Modifier::PrevRoot)
    }

    pub fn wants_list(&self) -> bool {
        self.modifiers.contains(&Modifier::List)
    }

    pub fn has_distinct(&self) -> bool {
        self.modifiers.contains(&Modifier::Distinct)
    }

    /// First `lang` modifier, if any. The inner option is the inline code.
    pub fn lang(&self) -> Option<&Option<String>> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Lang(code) => Some(code),
            _ => None,
        })
    }

    /// First `bestlang` modifier, if any.
    pub fn best_lang(&self) -> Option<&Option<String>> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::BestLang(prefs) => Some(prefs),
            _ => None,
        })
    }

    pub fn accept(&self) -> Option<AcceptType> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Accept(t) => Some(*t),
            _ => None,
        })
    }

    pub fn lang_tag(&self) -> Option<LangTagPolicy> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::LangTag(p) => Some(*p),
            _ => None,
        })
    }

    pub fn aggregate(&self) -> Option<Aggregate> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Aggregate(agg) => Some(*agg),
            _ => None,
        })
    }

    /// Modifiers that survive into the compiled leaf, in original order.
    pub fn bind_stage_modifiers(&self) -> Vec<Modifier> {
        self.modifiers
            .iter()
            .filter(|m| m.is_bind_stage())
            .cloned()
            .collect()
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = match self.mode {
            Mode::Generate => '$',
            Mode::Reference => '?',
        };
        write!(f, "{sigil}{}", self.head)?;
        for m in &self.modifiers {
            write!(f, "${m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    // ==================== Parsing ====================

    #[test]
    fn test_parse_generate_with_path() {
        let d = Directive::parse("$dbo:region").unwrap();
        assert_eq!(d.mode, Mode::Generate);
        assert_eq!(d.head, "dbo:region");
        assert!(d.modifiers.is_empty());
    }

    #[test]
    fn test_parse_reference() {
        let d = Directive::parse("?city").unwrap();
        assert_eq!(d.mode, Mode::Reference);
        assert_eq!(d.head, "city");
    }

    #[test]
    fn test_constants_are_not_directives() {
        assert!(Directive::parse("http://example.org/x").is_none());
        assert!(Directive::parse("plain text").is_none());
        assert!(Directive::parse("").is_none());
        assert!(Directive::parse("$").is_none());
        assert!(Directive::parse("?").is_none());
    }

    #[test]
    fn test_parse_full_modifier_chain() {
        let d = Directive::parse("$rdfs:label$required$lang:it$var:label").unwrap();
        assert!(d.is_required());
        assert_eq!(d.lang(), Some(&Some("it".to_string())));
        assert_eq!(d.var_name(), Some("label"));
    }

    #[test]
    fn test_var_strips_question_mark() {
        let d = Directive::parse("$dbo:region$var:?region").unwrap();
        assert_eq!(d.var_name(), Some("region"));
    }

    #[test]
    fn test_bare_lang_and_bestlang_have_no_code() {
        let d = Directive::parse("$rdfs:label$lang").unwrap();
        assert_eq!(d.lang(), Some(&None));
        let d = Directive::parse("$rdfs:label$bestlang").unwrap();
        assert_eq!(d.best_lang(), Some(&None));
    }

    #[test]
    fn test_bestlang_keeps_full_preference_string() {
        let d = Directive::parse("$rdfs:label$bestlang:en;q=1, it;q=0.7").unwrap();
        assert_eq!(d.best_lang(), Some(&Some("en;q=1, it;q=0.7".to_string())));
    }

    #[test_case("sample", Aggregate::Sample)]
    #[test_case("count", Aggregate::Count)]
    #[test_case("sum", Aggregate::Sum)]
    #[test_case("min", Aggregate::Min)]
    #[test_case("max", Aggregate::Max)]
    #[test_case("avg", Aggregate::Avg)]
    fn test_parse_aggregates(token: &str, expected: Aggregate) {
        let d = Directive::parse(&format!("$dbo:population${token}")).unwrap();
        assert_eq!(d.aggregate(), Some(expected));
    }

    #[test]
    fn test_unknown_tokens_survive_verbatim() {
        let d = Directive::parse("$foaf:name$shiny$accept:nope").unwrap();
        assert_eq!(
            d.modifiers,
            vec![
                Modifier::Unknown("shiny".to_string()),
                Modifier::Unknown("accept:nope".to_string()),
            ]
        );
        assert_eq!(d.to_string(), "$foaf:name$shiny$accept:nope");
    }

    #[test]
    fn test_first_match_wins_on_conflicts() {
        let d = Directive::parse("$p$var:a$var:b$lang:en$lang:fr").unwrap();
        assert_eq!(d.var_name(), Some("a"));
        assert_eq!(d.lang(), Some(&Some("en".to_string())));
    }

    #[test]
    fn test_as_list_is_an_alias_for_list() {
        assert!(Directive::parse("$p$asList").unwrap().wants_list());
        assert!(Directive::parse("$p$list").unwrap().wants_list());
    }

    // ==================== Serialization ====================

    #[test]
    fn test_round_trip_preserves_known_modifiers() {
        let raw = "$dbo:populationTotal$sum$distinct$var:population";
        let d = Directive::parse(raw).unwrap();
        assert_eq!(d.to_string(), raw);
    }

    #[test]
    fn test_reference_serializes_with_question_mark() {
        let d = Directive::reference("v1", vec![Modifier::Accept(AcceptType::String)]);
        assert_eq!(d.to_string(), "?v1$accept:string");
    }

    #[test]
    fn test_bind_stage_filtering() {
        let d = Directive::parse("$p$required$accept:int$reverse$langTag:hide$custom").unwrap();
        let kept = d.bind_stage_modifiers();
        assert_eq!(
            kept,
            vec![
                Modifier::Accept(AcceptType::Int),
                Modifier::LangTag(LangTagPolicy::Hide),
                Modifier::Unknown("custom".to_string()),
            ]
        );
    }

    // ==================== Accept filters ====================

    #[test_case(AcceptType::Int, json!(3), true)]
    #[test_case(AcceptType::Int, json!(3.5), false)]
    #[test_case(AcceptType::Float, json!(3.5), true)]
    #[test_case(AcceptType::Float, json!(3), false)]
    #[test_case(AcceptType::Number, json!(3), true)]
    #[test_case(AcceptType::Number, json!(3.5), true)]
    #[test_case(AcceptType::Number, json!("3"), false)]
    #[test_case(AcceptType::Number, json!(true), false)]
    #[test_case(AcceptType::String, json!("x"), true)]
    #[test_case(AcceptType::Bool, json!(true), true)]
    #[test_case(AcceptType::Bool, json!("true"), false)]
    fn test_accept_matches(accept: AcceptType, value: JsonValue, expected: bool) {
        assert_eq!(accept.matches(&value), expected);
    }

    #[test]
    fn test_accept_spelling_aliases() {
        assert_eq!(AcceptType::parse("integer"), Some(AcceptType::Int));
        assert_eq!(AcceptType::parse("str"), Some(AcceptType::String));
        assert_eq!(AcceptType::parse("boolean"), Some(AcceptType::Bool));
        assert_eq!(AcceptType::parse("uri"), None);
    }
}
