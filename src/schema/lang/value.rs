//! Values and unification
//!
//! Struct fields and list elements are kept as unevaluated conjuncts
//! ([`Thunk`]s); unifying two structs only concatenates them. Scalars,
//! kinds and bounds are resolved eagerly.

use super::ast::{BoundOp, Opt};
use super::eval::Thunk;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Go reference layout for RFC 3339 timestamps
pub const RFC3339: &str = "2006-01-02T15:04:05Z07:00";

/// Set of basic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kinds(u16);

impl Kinds {
    pub const NULL: Kinds = Kinds(1);
    pub const BOOL: Kinds = Kinds(1 << 1);
    pub const INT: Kinds = Kinds(1 << 2);
    pub const FLOAT: Kinds = Kinds(1 << 3);
    pub const STRING: Kinds = Kinds(1 << 4);
    pub const BYTES: Kinds = Kinds(1 << 5);
    pub const LIST: Kinds = Kinds(1 << 6);
    pub const STRUCT: Kinds = Kinds(1 << 7);
    pub const NUMBER: Kinds = Kinds(Self::INT.0 | Self::FLOAT.0);
    pub const SCALAR: Kinds =
        Kinds(Self::NULL.0 | Self::BOOL.0 | Self::NUMBER.0 | Self::STRING.0 | Self::BYTES.0);

    pub fn and(self, other: Kinds) -> Kinds {
        Kinds(self.0 & other.0)
    }

    pub fn contains(self, other: Kinds) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Kinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Kinds, &str); 8] = [
            (Kinds::NULL, "null"),
            (Kinds::BOOL, "bool"),
            (Kinds::INT, "int"),
            (Kinds::FLOAT, "float"),
            (Kinds::STRING, "string"),
            (Kinds::BYTES, "bytes"),
            (Kinds::LIST, "list"),
            (Kinds::STRUCT, "struct"),
        ];
        if *self == Kinds::NUMBER {
            return f.write_str("number");
        }
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(k, _)| self.contains(*k))
            .map(|(_, n)| *n)
            .collect();
        f.write_str(&names.join(" | "))
    }
}

/// A constraint on a concrete value
#[derive(Debug, Clone)]
pub enum Bound {
    /// `<`, `<=`, `>`, `>=` against a number
    Cmp(BoundOp, f64),
    /// `!=`
    Ne(Box<Value>),
    /// `=~` (or `!~` when negated)
    Regex { negated: bool, re: Regex },
    MinRunes(usize),
    MaxRunes(usize),
    MinItems(usize),
    MaxItems(usize),
    /// Go-style time layout
    TimeFormat(String),
}

impl Bound {
    /// Kinds the bound can apply to
    pub fn kinds(&self) -> Kinds {
        match self {
            Bound::Cmp(..) => Kinds::NUMBER,
            Bound::Ne(v) => v.kind(),
            Bound::Regex { .. } | Bound::MinRunes(_) | Bound::MaxRunes(_) | Bound::TimeFormat(_) => {
                Kinds::STRING
            }
            Bound::MinItems(_) | Bound::MaxItems(_) => Kinds::LIST,
        }
    }

    /// Check a concrete scalar; list bounds are checked by the list itself
    fn check(&self, v: &Value) -> Result<(), String> {
        let ok = match (self, v) {
            (Bound::Cmp(op, limit), Value::Int(n)) => cmp(*op, *n as f64, *limit),
            (Bound::Cmp(op, limit), Value::Float(n)) => cmp(*op, *n, *limit),
            (Bound::Ne(other), v) => !scalar_eq(v, other),
            (Bound::Regex { negated, re }, Value::Str(s)) => re.is_match(s) != *negated,
            (Bound::MinRunes(n), Value::Str(s)) => s.chars().count() >= *n,
            (Bound::MaxRunes(n), Value::Str(s)) => s.chars().count() <= *n,
            (Bound::TimeFormat(layout), Value::Str(s)) => time_matches(layout, s),
            _ => true,
        };
        if ok {
            return Ok(());
        }
        let verb = match self {
            Bound::Cmp(..) | Bound::Ne(_) | Bound::Regex { .. } => "out of bound",
            _ => "does not satisfy",
        };
        Err(format!("invalid value {} ({} {})", v, verb, self))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Cmp(op, n) => write!(f, "{}{}", op.symbol(), n),
            Bound::Ne(v) => write!(f, "!={}", v),
            Bound::Regex { negated, re } => {
                write!(f, "{}{:?}", if *negated { "!~" } else { "=~" }, re.as_str())
            }
            Bound::MinRunes(n) => write!(f, "strings.MinRunes({})", n),
            Bound::MaxRunes(n) => write!(f, "strings.MaxRunes({})", n),
            Bound::MinItems(n) => write!(f, "list.MinItems({})", n),
            Bound::MaxItems(n) => write!(f, "list.MaxItems({})", n),
            Bound::TimeFormat(layout) if layout == RFC3339 => f.write_str("time.Time"),
            Bound::TimeFormat(layout) => write!(f, "time.Format({:?})", layout),
        }
    }
}

fn cmp(op: BoundOp, n: f64, limit: f64) -> bool {
    match op {
        BoundOp::Lt => n < limit,
        BoundOp::Le => n <= limit,
        BoundOp::Gt => n > limit,
        BoundOp::Ge => n >= limit,
        _ => true,
    }
}

/// Non-concrete value of one or more kinds, with bounds
#[derive(Debug, Clone)]
pub struct Basic {
    pub kinds: Kinds,
    pub bounds: Vec<Bound>,
}

impl Basic {
    pub fn kind(kinds: Kinds) -> Self {
        Self {
            kinds,
            bounds: Vec::new(),
        }
    }

    pub fn bound(bound: Bound) -> Self {
        Self {
            kinds: bound.kinds(),
            bounds: vec![bound],
        }
    }
}

impl fmt::Display for Basic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implied = self
            .bounds
            .iter()
            .fold(Kinds(u16::MAX), |k, b| k.and(b.kinds()));
        let mut parts = Vec::new();
        if self.bounds.is_empty() || implied != self.kinds {
            parts.push(self.kinds.to_string());
        }
        parts.extend(self.bounds.iter().map(|b| b.to_string()));
        f.write_str(&parts.join(" & "))
    }
}

/// A field's conjuncts and optionality
#[derive(Debug, Clone)]
pub struct FieldVal {
    pub opt: Opt,
    pub conjuncts: Vec<Thunk>,
}

/// Labels admitted by a closed definition
#[derive(Debug, Clone, Default)]
pub struct Closer {
    pub labels: BTreeSet<String>,
    pub patterns: Vec<Value>,
}

impl Closer {
    pub fn allows(&self, label: &str) -> bool {
        self.labels.contains(label) || self.patterns.iter().any(|p| label_matches(p, label))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructVal {
    /// Regular, optional and required fields
    pub fields: BTreeMap<String, FieldVal>,
    /// `#Name` definitions, keyed with the leading `#`
    pub defs: BTreeMap<String, FieldVal>,
    /// (label constraint, value) for `[label]: value`
    pub patterns: Vec<(Value, Thunk)>,
    /// A regular field must be admitted by every closer
    pub closers: Vec<Arc<Closer>>,
}

impl StructVal {
    pub fn add_field(&mut self, label: String, opt: Opt, thunk: Thunk) {
        add_to(&mut self.fields, label, opt, thunk);
    }

    pub fn add_definition(&mut self, name: String, thunk: Thunk) {
        add_to(&mut self.defs, name, Opt::Regular, thunk);
    }

    /// Conjuncts of definition `name`
    pub fn definition(&self, name: &str) -> Option<Vec<Thunk>> {
        self.defs.get(name).map(|f| f.conjuncts.clone())
    }

    /// Conjuncts for regular field `label`, including matching patterns
    pub fn conjuncts_for(&self, label: &str) -> Vec<Thunk> {
        let mut out = self
            .fields
            .get(label)
            .map(|f| f.conjuncts.clone())
            .unwrap_or_default();
        out.extend(
            self.patterns
                .iter()
                .filter(|(p, _)| label_matches(p, label))
                .map(|(_, t)| t.clone()),
        );
        out
    }

    fn merge(mut self, other: StructVal) -> StructVal {
        merge_into(&mut self.fields, other.fields);
        merge_into(&mut self.defs, other.defs);
        self.patterns.extend(other.patterns);
        self.closers.extend(other.closers);
        self
    }
}

fn add_to(fields: &mut BTreeMap<String, FieldVal>, label: String, opt: Opt, thunk: Thunk) {
    fields
        .entry(label)
        .and_modify(|f| {
            f.opt = f.opt.merge(opt);
            f.conjuncts.push(thunk.clone());
        })
        .or_insert_with(|| FieldVal {
            opt,
            conjuncts: vec![thunk],
        });
}

fn merge_into(fields: &mut BTreeMap<String, FieldVal>, other: BTreeMap<String, FieldVal>) {
    for (label, field) in other {
        match fields.get_mut(&label) {
            Some(existing) => {
                existing.opt = existing.opt.merge(field.opt);
                existing.conjuncts.extend(field.conjuncts);
            }
            None => {
                fields.insert(label, field);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListVal {
    pub elems: Vec<Vec<Thunk>>,
    /// `...T`: the list may grow; extra elements take these conjuncts
    pub tail: Option<Vec<Thunk>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ListVal {
    fn conjuncts_at(&self, i: usize) -> Vec<Thunk> {
        match self.elems.get(i) {
            Some(conj) => conj.clone(),
            None => self.tail.clone().unwrap_or_default(),
        }
    }

    fn shape(&self) -> String {
        match self.tail {
            Some(_) => format!("list of at least {} items", self.elems.len()),
            None => format!("list of {} items", self.elems.len()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Top,
    Bottom(String),
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Basic(Basic),
    Struct(StructVal),
    List(ListVal),
    /// Alternatives; the flag marks a default
    Disj(Vec<(Value, bool)>),
}

impl Value {
    pub fn is_bottom(&self) -> bool {
        matches!(self, Value::Bottom(_))
    }

    /// Kind of a concrete value or the kinds a non-concrete one admits
    pub fn kind(&self) -> Kinds {
        match self {
            Value::Top => Kinds(u16::MAX),
            Value::Bottom(_) => Kinds(0),
            Value::Null => Kinds::NULL,
            Value::Bool(_) => Kinds::BOOL,
            Value::Int(_) => Kinds::INT,
            Value::Float(_) => Kinds::FLOAT,
            Value::Str(_) => Kinds::STRING,
            Value::Basic(b) => b.kinds,
            Value::Struct(_) => Kinds::STRUCT,
            Value::List(_) => Kinds::LIST,
            Value::Disj(alts) => alts.iter().fold(Kinds(0), |k, (v, _)| Kinds(k.0 | v.kind().0)),
        }
    }

    /// Concrete value built from parsed YAML or JSON
    pub fn from_yaml(data: &serde_yaml::Value) -> Value {
        use serde_yaml::Value as Y;
        match data {
            Y::Null => Value::Null,
            Y::Bool(b) => Value::Bool(*b),
            Y::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Y::String(s) => Value::Str(s.clone()),
            Y::Sequence(items) => Value::List(ListVal {
                elems: items
                    .iter()
                    .map(|v| vec![Thunk::Ready(Value::from_yaml(v))])
                    .collect(),
                ..Default::default()
            }),
            Y::Mapping(map) => {
                let mut s = StructVal::default();
                for (k, v) in map {
                    s.add_field(yaml_key(k), Opt::Regular, Thunk::Ready(Value::from_yaml(v)));
                }
                Value::Struct(s)
            }
            Y::Tagged(tagged) => Value::from_yaml(&tagged.value),
        }
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    use serde_yaml::Value as Y;
    match key {
        Y::String(s) => s.clone(),
        Y::Bool(b) => b.to_string(),
        Y::Number(n) => n.to_string(),
        Y::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Top => f.write_str("_"),
            Value::Bottom(_) => f.write_str("_|_"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Basic(b) => write!(f, "{}", b),
            Value::Struct(_) => f.write_str("{...}"),
            Value::List(l) => f.write_str(if l.tail.is_some() { "[...]" } else { "[]" }),
            Value::Disj(alts) => {
                let parts: Vec<String> = alts
                    .iter()
                    .map(|(v, d)| if *d { format!("*{}", v) } else { v.to_string() })
                    .collect();
                f.write_str(&parts.join(" | "))
            }
        }
    }
}

/// Equality of concrete scalars
pub fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

/// Whether a pattern constraint admits `label`
pub fn label_matches(pattern: &Value, label: &str) -> bool {
    !unify(pattern.clone(), Value::Str(label.to_string())).is_bottom()
}

fn conflict(a: &Value, b: &Value) -> Value {
    let (ka, kb) = (a.kind(), b.kind());
    if ka.and(kb).is_empty() {
        Value::Bottom(format!(
            "conflicting values {} and {} (mismatched types {} and {})",
            a, b, ka, kb
        ))
    } else {
        Value::Bottom(format!("conflicting values {} and {}", a, b))
    }
}

/// Unify two values
pub fn unify(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Bottom(m), _) | (_, Value::Bottom(m)) => Value::Bottom(m),
        (Value::Top, v) | (v, Value::Top) => v,
        (Value::Disj(x), Value::Disj(y)) => unify_disjunctions(x, y),
        (Value::Disj(alts), v) | (v, Value::Disj(alts)) => unify_disjunction(alts, v),
        (Value::Basic(x), Value::Basic(y)) => {
            let kinds = x.kinds.and(y.kinds);
            if kinds.is_empty() {
                return conflict(&Value::Basic(x), &Value::Basic(y));
            }
            let mut bounds = x.bounds;
            bounds.extend(y.bounds);
            Value::Basic(Basic { kinds, bounds })
        }
        (Value::Basic(b), v) | (v, Value::Basic(b)) => apply_basic(b, v),
        (Value::Struct(x), Value::Struct(y)) => Value::Struct(x.merge(y)),
        (Value::List(x), Value::List(y)) => unify_lists(x, y),
        (x, y) => {
            if scalar_eq(&x, &y) {
                x
            } else {
                conflict(&x, &y)
            }
        }
    }
}

fn apply_basic(basic: Basic, v: Value) -> Value {
    if !basic.kinds.contains(v.kind()) {
        return conflict(&Value::Basic(basic), &v);
    }
    match v {
        Value::List(mut list) => {
            for bound in &basic.bounds {
                match bound {
                    Bound::MinItems(n) => {
                        list.min_items = Some(list.min_items.map_or(*n, |m| m.max(*n)))
                    }
                    Bound::MaxItems(n) => {
                        list.max_items = Some(list.max_items.map_or(*n, |m| m.min(*n)))
                    }
                    _ => {}
                }
            }
            Value::List(list)
        }
        s @ Value::Struct(_) => s,
        scalar => {
            for bound in &basic.bounds {
                if let Err(msg) = bound.check(&scalar) {
                    return Value::Bottom(msg);
                }
            }
            scalar
        }
    }
}

fn unify_lists(x: ListVal, y: ListVal) -> Value {
    let (xl, yl) = (x.elems.len(), y.elems.len());
    let incompatible = match (&x.tail, &y.tail) {
        (None, None) => xl != yl,
        (None, Some(_)) => xl < yl,
        (Some(_), None) => yl < xl,
        (Some(_), Some(_)) => false,
    };
    if incompatible {
        return Value::Bottom(format!(
            "incompatible list lengths ({} and {})",
            x.shape(),
            y.shape()
        ));
    }

    let len = xl.max(yl);
    let elems = (0..len)
        .map(|i| {
            let mut conj = x.conjuncts_at(i);
            conj.extend(y.conjuncts_at(i));
            conj
        })
        .collect();
    let tail = match (x.tail, y.tail) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Some(a)
        }
        _ => None,
    };
    let min_items = match (x.min_items, y.min_items) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    let max_items = match (x.max_items, y.max_items) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    Value::List(ListVal {
        elems,
        tail,
        min_items,
        max_items,
    })
}

fn unify_disjunction(alts: Vec<(Value, bool)>, other: Value) -> Value {
    let results: Vec<(Value, bool)> = alts
        .iter()
        .map(|(v, d)| (unify(v.clone(), other.clone()), *d))
        .collect();
    if results.iter().all(|(v, _)| v.is_bottom()) && alts.len() > 1 {
        return Value::Bottom(format!(
            "conflicting values {} and {}",
            other,
            Value::Disj(alts)
        ));
    }
    disjunction(results)
}

fn unify_disjunctions(x: Vec<(Value, bool)>, y: Vec<(Value, bool)>) -> Value {
    let x_defaults = x.iter().any(|(_, d)| *d);
    let y_defaults = y.iter().any(|(_, d)| *d);
    let mut results = Vec::with_capacity(x.len() * y.len());
    for (a, da) in &x {
        for (b, db) in &y {
            let default = (*da || !x_defaults) && (*db || !y_defaults) && (x_defaults || y_defaults);
            results.push((unify(a.clone(), b.clone()), default));
        }
    }
    if results.iter().all(|(v, _)| v.is_bottom()) {
        return Value::Bottom(format!(
            "conflicting values {} and {}",
            Value::Disj(x),
            Value::Disj(y)
        ));
    }
    disjunction(results)
}

/// Build a normalized disjunction: nested alternatives are flattened and
/// failed ones dropped
pub fn disjunction(alts: Vec<(Value, bool)>) -> Value {
    let mut flat: Vec<(Value, bool)> = Vec::with_capacity(alts.len());
    let mut first_error = None;
    for (v, d) in alts {
        match v {
            Value::Bottom(msg) => {
                first_error.get_or_insert(msg);
            }
            Value::Disj(inner) => {
                let inner_defaults = inner.iter().any(|(_, id)| *id);
                flat.extend(
                    inner
                        .into_iter()
                        .map(|(iv, id)| (iv, d && (id || !inner_defaults))),
                );
            }
            v => flat.push((v, d)),
        }
    }
    match flat.len() {
        0 => Value::Bottom(first_error.unwrap_or_else(|| "empty disjunction".to_string())),
        1 => flat.pop().map(|(v, _)| v).unwrap_or(Value::Top),
        _ => Value::Disj(flat),
    }
}

/// Whether `s` parses with a Go-style time layout
pub fn time_matches(layout: &str, s: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

    if layout == RFC3339 || layout == "2006-01-02T15:04:05.999999999Z07:00" {
        return DateTime::parse_from_rfc3339(s).is_ok();
    }
    let fmt = go_layout_to_strftime(layout);
    DateTime::parse_from_str(s, &fmt).is_ok()
        || NaiveDateTime::parse_from_str(s, &fmt).is_ok()
        || NaiveDate::parse_from_str(s, &fmt).is_ok()
        || NaiveTime::parse_from_str(s, &fmt).is_ok()
}

fn go_layout_to_strftime(layout: &str) -> String {
    const TOKENS: [(&str, &str); 14] = [
        ("2006", "%Y"),
        ("Z07:00", "%:z"),
        ("-07:00", "%:z"),
        ("-0700", "%z"),
        ("January", "%B"),
        ("Monday", "%A"),
        ("Jan", "%b"),
        ("Mon", "%a"),
        ("MST", "%Z"),
        ("01", "%m"),
        ("02", "%d"),
        ("15", "%H"),
        ("04", "%M"),
        ("05", "%S"),
    ];
    let mut out = String::new();
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (go, strf) in TOKENS {
            if let Some(after) = rest.strip_prefix(go) {
                out.push_str(strf);
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string() -> Value {
        Value::Basic(Basic::kind(Kinds::STRING))
    }

    fn min_runes(n: usize) -> Value {
        Value::Basic(Basic::bound(Bound::MinRunes(n)))
    }

    #[test]
    fn test_scalars() {
        assert!(matches!(unify(Value::Int(1), Value::Int(1)), Value::Int(1)));
        let err = unify(Value::Str("a".into()), Value::Str("b".into()));
        match err {
            Value::Bottom(msg) => assert_eq!(msg, r#"conflicting values "a" and "b""#),
            other => panic!("unexpected {:?}", other),
        }
        match unify(string(), Value::Int(1)) {
            Value::Bottom(msg) => assert!(msg.contains("mismatched types string and int"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bounds() {
        let ge0 = Value::Basic(Basic::bound(Bound::Cmp(BoundOp::Ge, 0.0)));
        assert!(matches!(unify(ge0.clone(), Value::Int(3)), Value::Int(3)));
        match unify(ge0, Value::Int(-1)) {
            Value::Bottom(msg) => assert_eq!(msg, "invalid value -1 (out of bound >=0)"),
            other => panic!("unexpected {:?}", other),
        }
        let both = unify(string(), min_runes(1));
        assert!(matches!(unify(both.clone(), Value::Str("x".into())), Value::Str(_)));
        match unify(both, Value::Str(String::new())) {
            Value::Bottom(msg) => {
                assert_eq!(msg, r#"invalid value "" (does not satisfy strings.MinRunes(1))"#)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_regex_bound() {
        let re = Value::Basic(Basic::bound(Bound::Regex {
            negated: false,
            re: Regex::new("^https?://").unwrap(),
        }));
        assert!(!unify(re.clone(), Value::Str("https://x".into())).is_bottom());
        assert!(unify(re, Value::Str("ftp://x".into())).is_bottom());
    }

    #[test]
    fn test_disjunction_elimination() {
        let enum_ = disjunction(vec![
            (Value::Str("a".into()), false),
            (Value::Str("b".into()), false),
        ]);
        assert!(matches!(unify(enum_.clone(), Value::Str("b".into())), Value::Str(s) if s == "b"));
        match unify(enum_, Value::Str("c".into())) {
            Value::Bottom(msg) => assert_eq!(msg, r#"conflicting values "c" and "a" | "b""#),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_default_survives_unify_with_kind() {
        let d = disjunction(vec![(Value::Str("x".into()), true), (string(), false)]);
        match unify(d, string()) {
            Value::Disj(alts) => {
                assert_eq!(alts.len(), 2);
                assert!(alts[0].1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_lengths() {
        let closed = |n: usize| {
            Value::List(ListVal {
                elems: (0..n).map(|i| vec![Thunk::Ready(Value::Int(i as i64))]).collect(),
                ..Default::default()
            })
        };
        let open = Value::List(ListVal {
            elems: vec![vec![]],
            tail: Some(vec![]),
            ..Default::default()
        });
        assert!(unify(closed(2), closed(3)).is_bottom());
        assert!(unify(open.clone(), closed(0)).is_bottom());
        match unify(open, closed(3)) {
            Value::List(l) => {
                assert_eq!(l.elems.len(), 3);
                assert!(l.tail.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_item_bounds_move_into_list() {
        let min = Value::Basic(Basic::bound(Bound::MinItems(1)));
        match unify(min, Value::List(ListVal::default())) {
            Value::List(l) => assert_eq!(l.min_items, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_time_formats() {
        assert!(time_matches("2006-01-02", "2024-02-29"));
        assert!(!time_matches("2006-01-02", "2024-13-01"));
        assert!(!time_matches("2006-01-02", "yesterday"));
        assert!(time_matches(RFC3339, "2024-05-01T10:00:00Z"));
        assert!(time_matches(RFC3339, "2024-05-01T10:00:00+02:00"));
        assert!(!time_matches(RFC3339, "2024-05-01"));
    }

    #[test]
    fn test_from_yaml() {
        let data: serde_yaml::Value = serde_yaml::from_str("a: 1\nb: [x, 2.5]\nc: null").unwrap();
        match Value::from_yaml(&data) {
            Value::Struct(s) => {
                assert_eq!(s.fields.len(), 3);
                assert!(s.closers.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Kinds::NUMBER.to_string(), "number");
        assert_eq!(Kinds::STRING.to_string(), "string");
        assert_eq!(string().to_string(), "string");
        assert_eq!(min_runes(1).to_string(), "strings.MinRunes(1)");
    }
}
