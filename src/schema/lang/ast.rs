//! Syntax tree for schema fragments

use std::sync::Arc;

/// Basic type kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindName {
    String,
    Bytes,
    Bool,
    Int,
    Float,
    Number,
}

/// Comparison and match operators usable as unary bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Match,
    NotMatch,
}

impl BoundOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BoundOp::Lt => "<",
            BoundOp::Le => "<=",
            BoundOp::Gt => ">",
            BoundOp::Ge => ">=",
            BoundOp::Ne => "!=",
            BoundOp::Match => "=~",
            BoundOp::NotMatch => "!~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `_`
    Top,
    /// `_|_`
    Bottom,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Kind(KindName),
    /// `a.b.#c`
    Ref(Vec<String>),
    Bound(BoundOp, Box<Expr>),
    And(Vec<Expr>),
    /// Alternatives; the flag marks a `*` default
    Or(Vec<(Expr, bool)>),
    Struct(Arc<StructLit>),
    List(Arc<ListLit>),
    /// `pkg.Func(args...)`
    Call(Vec<String>, Vec<Expr>),
}

/// Field optionality marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opt {
    Regular,
    /// `?`
    Optional,
    /// `!`
    Required,
}

impl Opt {
    /// Optionality after unifying two fields with the same label
    pub fn merge(self, other: Opt) -> Opt {
        match (self, other) {
            (Opt::Regular, _) | (_, Opt::Regular) => Opt::Regular,
            (Opt::Required, _) | (_, Opt::Required) => Opt::Required,
            (Opt::Optional, Opt::Optional) => Opt::Optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    /// Regular field name (identifier or quoted)
    Name(String),
    /// `#Name`, stored with the leading `#`
    Def(String),
    /// `[expr]: value`
    Pattern(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: Label,
    pub opt: Opt,
    pub value: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Field(Field),
    Embed(Arc<Expr>),
    /// `...`
    Ellipsis,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructLit {
    pub decls: Vec<Decl>,
}

impl StructLit {
    /// Regular and definition fields declaring `name`
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.decls.iter().filter_map(move |d| match d {
            Decl::Field(f) => match &f.label {
                Label::Name(n) | Label::Def(n) if n == name => Some(f),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn declares(&self, name: &str) -> bool {
        self.fields_named(name).next().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.decls.iter().any(|d| matches!(d, Decl::Ellipsis))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListLit {
    pub elems: Vec<Arc<Expr>>,
    /// `...T`; `...` alone is `Some(Top)`
    pub tail: Option<Arc<Expr>>,
}

/// A parsed fragment
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub body: StructLit,
}
