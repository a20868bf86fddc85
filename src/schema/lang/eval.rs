//! Lazy evaluation and concreteness checking
//!
//! References are resolved lexically: a name binds to the nearest enclosing
//! struct literal that declares it. Definitions (`#Name`) and everything
//! nested inside them evaluate to closed structs.

use super::ast::{BoundOp, Decl, Expr, KindName, Label, ListLit, Opt, StructLit};
use super::value::{
    disjunction, label_matches, unify, Basic, Bound, Closer, Kinds, ListVal, StructVal, Value,
    RFC3339,
};
use regex::Regex;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Evaluation depth at which a reference chain is treated as a cycle
const MAX_DEPTH: usize = 256;

/// Data nesting limit for the concreteness check
const MAX_NESTING: usize = 128;

/// Builtin packages and the members they export
pub const BUILTINS: &[(&str, &[&str])] = &[
    ("strings", &["MinRunes", "MaxRunes"]),
    ("list", &["MinItems", "MaxItems"]),
    ("time", &["Format", "Time", "RFC3339"]),
];

pub fn is_builtin_package(name: &str) -> bool {
    BUILTINS.iter().any(|(pkg, _)| *pkg == name)
}

pub fn is_builtin(pkg: &str, member: &str) -> bool {
    BUILTINS
        .iter()
        .any(|(p, members)| *p == pkg && members.contains(&member))
}

/// Lexical scope: the chain of enclosing struct literals
#[derive(Debug, Clone, Default)]
pub struct Env(Option<Arc<Frame>>);

#[derive(Debug)]
struct Frame {
    lit: Arc<StructLit>,
    parent: Env,
    closing: bool,
}

impl Env {
    pub fn root(lit: Arc<StructLit>) -> Env {
        Env::default().push(lit, false)
    }

    fn push(&self, lit: Arc<StructLit>, closing: bool) -> Env {
        Env(Some(Arc::new(Frame {
            lit,
            parent: self.clone(),
            closing,
        })))
    }
}

/// An unevaluated conjunct
#[derive(Debug, Clone)]
pub enum Thunk {
    Lazy {
        expr: Arc<Expr>,
        env: Env,
        closing: bool,
    },
    Ready(Value),
}

pub struct Evaluator<'a> {
    imports: &'a BTreeSet<String>,
    depth: Cell<usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(imports: &'a BTreeSet<String>) -> Self {
        Self {
            imports,
            depth: Cell::new(0),
        }
    }

    pub fn force(&self, thunk: &Thunk) -> Value {
        match thunk {
            Thunk::Ready(v) => v.clone(),
            Thunk::Lazy { expr, env, closing } => self.eval(expr, env, *closing),
        }
    }

    pub fn unify_all(&self, thunks: &[Thunk]) -> Value {
        thunks.iter().fold(Value::Top, |acc, t| {
            if acc.is_bottom() {
                acc
            } else {
                unify(acc, self.force(t))
            }
        })
    }

    pub fn field_value(&self, s: &StructVal, label: &str) -> Value {
        self.unify_all(&s.conjuncts_for(label))
    }

    pub fn eval(&self, expr: &Expr, env: &Env, closing: bool) -> Value {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
            return Value::Bottom("structural cycle detected".to_string());
        }
        self.depth.set(depth + 1);
        let v = self.eval_inner(expr, env, closing);
        self.depth.set(depth);
        v
    }

    fn eval_inner(&self, expr: &Expr, env: &Env, closing: bool) -> Value {
        match expr {
            Expr::Top => Value::Top,
            Expr::Bottom => Value::Bottom("explicit error (_|_ literal)".to_string()),
            Expr::Null => Value::Null,
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Int(n) => Value::Int(*n),
            Expr::Float(n) => Value::Float(*n),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Kind(k) => Value::Basic(Basic::kind(kinds_of(*k))),
            Expr::Bound(op, operand) => self.bound(*op, operand, env),
            Expr::And(parts) => parts.iter().fold(Value::Top, |acc, p| {
                if acc.is_bottom() {
                    acc
                } else {
                    unify(acc, self.eval(p, env, closing))
                }
            }),
            Expr::Or(alts) => disjunction(
                alts.iter()
                    .map(|(e, d)| (self.eval(e, env, closing), *d))
                    .collect(),
            ),
            Expr::Struct(lit) => self.eval_struct(lit, env, closing),
            Expr::List(lit) => self.eval_list(lit, env, closing),
            Expr::Ref(path) => self.reference(path, env),
            Expr::Call(path, args) => self.call(path, args, env),
        }
    }

    fn bound(&self, op: BoundOp, operand: &Expr, env: &Env) -> Value {
        let v = self.eval(operand, env, false);
        let bound = match (op, v) {
            (_, b @ Value::Bottom(_)) => return b,
            (BoundOp::Match | BoundOp::NotMatch, Value::Str(pattern)) => match Regex::new(&pattern) {
                Ok(re) => Bound::Regex {
                    negated: op == BoundOp::NotMatch,
                    re,
                },
                Err(e) => return Value::Bottom(format!("invalid regular expression: {}", e)),
            },
            (BoundOp::Ne, v @ (Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_))) => {
                Bound::Ne(Box::new(v))
            }
            (BoundOp::Lt | BoundOp::Le | BoundOp::Gt | BoundOp::Ge, Value::Int(n)) => {
                Bound::Cmp(op, n as f64)
            }
            (BoundOp::Lt | BoundOp::Le | BoundOp::Gt | BoundOp::Ge, Value::Float(n)) => Bound::Cmp(op, n),
            (op, v) => {
                return Value::Bottom(format!(
                    "invalid operand {} for bound {}",
                    v,
                    op.symbol()
                ))
            }
        };
        Value::Basic(Basic::bound(bound))
    }

    fn eval_struct(&self, lit: &Arc<StructLit>, env: &Env, closing: bool) -> Value {
        let scope = env.push(lit.clone(), closing);
        let mut own = StructVal::default();
        let mut allowed = Closer::default();
        let mut embeds = Vec::new();

        for decl in &lit.decls {
            match decl {
                Decl::Field(f) => match &f.label {
                    Label::Name(name) => {
                        allowed.labels.insert(name.clone());
                        own.add_field(
                            name.clone(),
                            f.opt,
                            Thunk::Lazy {
                                expr: f.value.clone(),
                                env: scope.clone(),
                                closing,
                            },
                        );
                    }
                    Label::Def(name) => own.add_definition(
                        name.clone(),
                        Thunk::Lazy {
                            expr: f.value.clone(),
                            env: scope.clone(),
                            closing: true,
                        },
                    ),
                    Label::Pattern(p) => {
                        let pattern = self.eval(p, &scope, false);
                        allowed.patterns.push(pattern.clone());
                        own.patterns.push((
                            pattern,
                            Thunk::Lazy {
                                expr: f.value.clone(),
                                env: scope.clone(),
                                closing,
                            },
                        ));
                    }
                },
                Decl::Embed(e) => embeds.push(self.eval(e, &scope, closing)),
                Decl::Ellipsis => {}
            }
        }

        let has_fields =
            !own.fields.is_empty() || !own.defs.is_empty() || !own.patterns.is_empty();
        let mut result = if has_fields || embeds.is_empty() {
            Value::Struct(own)
        } else {
            Value::Top
        };
        let mut close = closing;
        for embed in embeds {
            result = match embed {
                Value::Struct(mut es) => {
                    if !es.closers.is_empty() {
                        close = true;
                        for c in es.closers.drain(..) {
                            allowed.labels.extend(c.labels.iter().cloned());
                            allowed.patterns.extend(c.patterns.iter().cloned());
                        }
                    }
                    allowed.labels.extend(es.fields.keys().cloned());
                    allowed
                        .patterns
                        .extend(es.patterns.iter().map(|(p, _)| p.clone()));
                    unify(result, Value::Struct(es))
                }
                other => unify(result, other),
            };
        }

        match result {
            Value::Struct(mut s) if close && !lit.is_open() => {
                s.closers.push(Arc::new(allowed));
                Value::Struct(s)
            }
            other => other,
        }
    }

    fn eval_list(&self, lit: &ListLit, env: &Env, closing: bool) -> Value {
        let thunk = |expr: &Arc<Expr>| Thunk::Lazy {
            expr: expr.clone(),
            env: env.clone(),
            closing,
        };
        Value::List(ListVal {
            elems: lit.elems.iter().map(|e| vec![thunk(e)]).collect(),
            tail: lit.tail.as_ref().map(|t| vec![thunk(t)]),
            min_items: None,
            max_items: None,
        })
    }

    fn reference(&self, path: &[String], env: &Env) -> Value {
        let Some(first) = path.first() else {
            return Value::Bottom("empty reference".to_string());
        };
        let (mut v, rest) = if let Some(v) = self.lookup(first, env) {
            (v, &path[1..])
        } else if self.imports.contains(first) {
            match path.get(1) {
                Some(member) => (builtin_value(first, member), &path[2..]),
                None => return Value::Bottom(format!("package {} used as a value", first)),
            }
        } else {
            return Value::Bottom(format!("reference {:?} not found", first));
        };
        for seg in rest {
            v = self.select(v, seg);
        }
        v
    }

    /// Value of the nearest field named `name` visible from `env`
    pub fn lookup(&self, name: &str, env: &Env) -> Option<Value> {
        let mut cur = env.0.as_ref();
        while let Some(frame) = cur {
            if frame.lit.declares(name) {
                let scope = Env(Some(frame.clone()));
                let closing = frame.closing || name.starts_with('#');
                let thunks: Vec<Thunk> = frame
                    .lit
                    .fields_named(name)
                    .map(|f| Thunk::Lazy {
                        expr: f.value.clone(),
                        env: scope.clone(),
                        closing,
                    })
                    .collect();
                return Some(self.unify_all(&thunks));
            }
            cur = frame.parent.0.as_ref();
        }
        None
    }

    fn select(&self, v: Value, seg: &str) -> Value {
        match v {
            Value::Struct(s) if seg.starts_with('#') => match s.definition(seg) {
                Some(conjuncts) => self.unify_all(&conjuncts),
                None => Value::Bottom(format!("reference {:?} not found", seg)),
            },
            Value::Struct(s) => {
                let declared = s.fields.contains_key(seg)
                    || s.patterns.iter().any(|(p, _)| label_matches(p, seg));
                if declared {
                    self.field_value(&s, seg)
                } else {
                    Value::Bottom(format!("reference {:?} not found", seg))
                }
            }
            b @ Value::Bottom(_) => b,
            other => Value::Bottom(format!("invalid selector {:?} on {}", seg, other)),
        }
    }

    fn call(&self, path: &[String], args: &[Expr], env: &Env) -> Value {
        let name = path.join(".");
        match path.first() {
            Some(pkg) if self.imports.contains(pkg) => {}
            _ => return Value::Bottom(format!("unknown function {}", name)),
        }
        let args: Vec<Value> = args.iter().map(|a| self.eval(a, env, false)).collect();
        if let Some(b) = args.iter().find(|a| a.is_bottom()) {
            return b.clone();
        }

        let bound = match (name.as_str(), args.as_slice()) {
            ("strings.MinRunes", [Value::Int(n)]) if *n >= 0 => Bound::MinRunes(*n as usize),
            ("strings.MaxRunes", [Value::Int(n)]) if *n >= 0 => Bound::MaxRunes(*n as usize),
            ("list.MinItems", [Value::Int(n)]) if *n >= 0 => Bound::MinItems(*n as usize),
            ("list.MaxItems", [Value::Int(n)]) if *n >= 0 => Bound::MaxItems(*n as usize),
            ("time.Format", [Value::Str(layout)]) => Bound::TimeFormat(layout.clone()),
            ("time.Time", []) => Bound::TimeFormat(RFC3339.to_string()),
            _ => {
                return Value::Bottom(format!(
                    "invalid call {}({})",
                    name,
                    args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
                ))
            }
        };
        Value::Basic(Basic::bound(bound))
    }

    /// Errors making `v` invalid or incomplete, sorted and deduplicated
    pub fn check(&self, v: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        self.check_at(v, &mut Vec::new(), &mut errors);
        errors.sort();
        errors.dedup();
        errors
    }

    fn check_at(&self, v: &Value, path: &mut Vec<String>, errors: &mut Vec<String>) {
        if path.len() > MAX_NESTING {
            errors.push(at(path, "value nested too deeply"));
            return;
        }
        match v {
            Value::Bottom(msg) => errors.push(at(path, msg)),
            Value::Top | Value::Basic(_) => errors.push(at(path, &format!("incomplete value {}", v))),
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {}
            Value::Struct(s) => self.check_struct(s, path, errors),
            Value::List(l) => self.check_list(l, path, errors),
            Value::Disj(alts) => self.check_disjunction(alts, path, errors),
        }
    }

    /// A disjunction is concrete when exactly one alternative survives the
    /// check, or when the surviving alternatives single out one default.
    fn check_disjunction(
        &self,
        alts: &[(Value, bool)],
        path: &mut Vec<String>,
        errors: &mut Vec<String>,
    ) {
        let mut firsts = Vec::with_capacity(alts.len());
        let mut clean: Vec<&(Value, bool)> = Vec::new();
        for alt in alts {
            let mut sub = Vec::new();
            self.check_at(&alt.0, path, &mut sub);
            if sub.is_empty() {
                clean.push(alt);
            } else {
                sub.sort();
                firsts.push(sub.swap_remove(0));
            }
        }

        if clean.is_empty() {
            errors.push(at(
                path,
                &format!("no alternative matched ({})", firsts.join("; ")),
            ));
            return;
        }

        let defaults: Vec<&(Value, bool)> = clean.iter().copied().filter(|(_, d)| *d).collect();
        let candidates = if defaults.is_empty() { clean } else { defaults };
        let mut distinct: Vec<String> = candidates.iter().map(|(v, _)| v.to_string()).collect();
        distinct.sort();
        distinct.dedup();
        if distinct.len() > 1 {
            let open = Value::Disj(candidates.iter().map(|(v, _)| (v.clone(), false)).collect());
            errors.push(at(path, &format!("incomplete value {}", open)));
        }
    }

    fn check_struct(&self, s: &StructVal, path: &mut Vec<String>, errors: &mut Vec<String>) {
        for (label, field) in &s.fields {
            path.push(label.clone());
            match field.opt {
                Opt::Optional => {}
                Opt::Required => errors.push(at(path, "field is required but not present")),
                Opt::Regular if s.closers.iter().any(|c| !c.allows(label)) => {
                    errors.push(at(path, "field not allowed"))
                }
                Opt::Regular => {
                    let v = self.field_value(s, label);
                    self.check_at(&v, path, errors);
                }
            }
            path.pop();
        }
    }

    fn check_list(&self, l: &ListVal, path: &mut Vec<String>, errors: &mut Vec<String>) {
        let n = l.elems.len();
        if let Some(min) = l.min_items.filter(|min| n < *min) {
            errors.push(at(
                path,
                &format!("invalid value (list has {} items, want list.MinItems({}))", n, min),
            ));
        }
        if let Some(max) = l.max_items.filter(|max| n > *max) {
            errors.push(at(
                path,
                &format!("invalid value (list has {} items, want list.MaxItems({}))", n, max),
            ));
        }
        for (i, conj) in l.elems.iter().enumerate() {
            let v = self.unify_all(conj);
            path.push(i.to_string());
            self.check_at(&v, path, errors);
            path.pop();
        }
    }
}

fn at(path: &[String], msg: &str) -> String {
    if path.is_empty() {
        msg.to_string()
    } else {
        format!("{}: {}", path.join("."), msg)
    }
}

fn kinds_of(k: KindName) -> Kinds {
    match k {
        KindName::String => Kinds::STRING,
        KindName::Bytes => Kinds::BYTES,
        KindName::Bool => Kinds::BOOL,
        KindName::Int => Kinds::INT,
        KindName::Float => Kinds::FLOAT,
        KindName::Number => Kinds::NUMBER,
    }
}

fn builtin_value(pkg: &str, member: &str) -> Value {
    match (pkg, member) {
        ("time", "RFC3339") => Value::Str(RFC3339.to_string()),
        ("time", "Time") => Value::Basic(Basic::bound(Bound::TimeFormat(RFC3339.to_string()))),
        _ => Value::Bottom(format!("{}.{} is not a value", pkg, member)),
    }
}
