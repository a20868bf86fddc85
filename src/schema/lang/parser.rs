//! Recursive-descent parser for schema fragments
//!
//! Declarations are separated by commas or line breaks. A binary operator
//! continues an expression only when it sits on the same line as its left
//! operand.

use super::ast::*;
use super::lexer::{tokenize, Tok, Token};
use std::sync::Arc;

/// Parse a complete fragment
pub fn parse_file(src: &str) -> Result<File, String> {
    let mut p = Parser::new(src)?;
    p.file()
}

/// Parse a single expression (used by tests and builtins)
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let mut p = Parser::new(src)?;
    let expr = p.expr()?;
    p.expect(&Tok::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    fn file(&mut self) -> Result<File, String> {
        let mut package = None;
        let mut imports = Vec::new();

        if self.is_ident("package") && !self.next_is_label_colon(0) {
            self.pos += 1;
            match self.advance().tok {
                Tok::Ident(name) => package = Some(name),
                other => return Err(self.err_at(self.pos - 1, format!("expected package name, found {}", other))),
            }
        }

        while self.is_ident("import") && !self.next_is_label_colon(0) {
            self.pos += 1;
            if self.eat(&Tok::LParen) {
                while !self.eat(&Tok::RParen) {
                    imports.push(self.import_path()?);
                    self.eat(&Tok::Comma);
                }
            } else {
                imports.push(self.import_path()?);
            }
        }

        let body = self.decls(&Tok::Eof)?;
        Ok(File {
            package,
            imports,
            body,
        })
    }

    fn import_path(&mut self) -> Result<String, String> {
        match self.advance().tok {
            Tok::Str(path) => Ok(path),
            other => Err(self.err_at(self.pos - 1, format!("expected import path, found {}", other))),
        }
    }

    /// Declarations up to (and consuming) `end`
    fn decls(&mut self, end: &Tok) -> Result<StructLit, String> {
        let mut lit = StructLit::default();
        loop {
            if self.eat(end) {
                return Ok(lit);
            }
            lit.decls.push(self.decl()?);

            if self.eat(&Tok::Comma) {
                continue;
            }
            let next = self.peek();
            if next.tok != *end && !next.newline_before {
                return Err(self.err_at(
                    self.pos,
                    format!("expected ',' or newline, found {}", next.tok),
                ));
            }
        }
    }

    fn decl(&mut self) -> Result<Decl, String> {
        if self.eat(&Tok::Ellipsis) {
            return Ok(Decl::Ellipsis);
        }
        if let Some(field) = self.field()? {
            return Ok(Decl::Field(field));
        }
        Ok(Decl::Embed(Arc::new(self.expr()?)))
    }

    /// A field declaration, or `None` if the next tokens are not a label
    fn field(&mut self) -> Result<Option<Field>, String> {
        let label = match &self.peek().tok {
            Tok::Ident(name) if self.next_is_label_colon(0) => {
                let label = if name.starts_with('#') {
                    Label::Def(name.clone())
                } else {
                    Label::Name(name.clone())
                };
                self.pos += 1;
                label
            }
            Tok::Str(name) if self.next_is_label_colon(0) => {
                let label = Label::Name(name.clone());
                self.pos += 1;
                label
            }
            Tok::LBrack => match self.matching_bracket(self.pos) {
                Some(close) if self.tok_at(close + 1) == &Tok::Colon => {
                    self.pos += 1;
                    let pattern = self.expr()?;
                    self.expect(&Tok::RBrack)?;
                    Label::Pattern(pattern)
                }
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        let opt = if self.eat(&Tok::Question) {
            Opt::Optional
        } else if self.eat(&Tok::Bang) {
            Opt::Required
        } else {
            Opt::Regular
        };
        self.expect(&Tok::Colon)?;

        // `a: b: c` shorthand
        let value = match self.field()? {
            Some(nested) => Expr::Struct(Arc::new(StructLit {
                decls: vec![Decl::Field(nested)],
            })),
            None => self.expr()?,
        };

        Ok(Some(Field {
            label,
            opt,
            value: Arc::new(value),
        }))
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let first = self.alternative()?;
        if !self.at_same_line(&Tok::Pipe) {
            return match first {
                (expr, false) => Ok(expr),
                (_, true) => Err(self.err_at(self.pos, "default marker outside a disjunction")),
            };
        }
        let mut alts = vec![first];
        while self.at_same_line(&Tok::Pipe) {
            self.pos += 1;
            alts.push(self.alternative()?);
        }
        Ok(Expr::Or(alts))
    }

    fn alternative(&mut self) -> Result<(Expr, bool), String> {
        let default = self.eat(&Tok::Star);
        Ok((self.conjunction()?, default))
    }

    fn conjunction(&mut self) -> Result<Expr, String> {
        let first = self.unary()?;
        if !self.at_same_line(&Tok::Amp) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.at_same_line(&Tok::Amp) {
            self.pos += 1;
            parts.push(self.unary()?);
        }
        Ok(Expr::And(parts))
    }

    fn unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek().tok {
            Tok::Lt => Some(BoundOp::Lt),
            Tok::Le => Some(BoundOp::Le),
            Tok::Gt => Some(BoundOp::Gt),
            Tok::Ge => Some(BoundOp::Ge),
            Tok::Ne => Some(BoundOp::Ne),
            Tok::Match => Some(BoundOp::Match),
            Tok::NotMatch => Some(BoundOp::NotMatch),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            return Ok(Expr::Bound(op, Box::new(self.unary()?)));
        }
        if self.eat(&Tok::Minus) {
            return match self.advance().tok {
                Tok::Int(n) => Ok(Expr::Int(-n)),
                Tok::Float(n) => Ok(Expr::Float(-n)),
                other => Err(self.err_at(self.pos - 1, format!("expected number after '-', found {}", other))),
            };
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let at = self.pos;
        match self.advance().tok {
            Tok::Bottom => Ok(Expr::Bottom),
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Float(n) => Ok(Expr::Float(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::LParen => {
                let inner = self.expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBrace => Ok(Expr::Struct(Arc::new(self.decls(&Tok::RBrace)?))),
            Tok::LBrack => self.list(),
            Tok::Ident(name) => self.ident_expr(name),
            other => Err(self.err_at(at, format!("unexpected {}", other))),
        }
    }

    fn ident_expr(&mut self, name: String) -> Result<Expr, String> {
        let simple = match name.as_str() {
            "_" => Some(Expr::Top),
            "null" => Some(Expr::Null),
            "true" => Some(Expr::Bool(true)),
            "false" => Some(Expr::Bool(false)),
            "string" => Some(Expr::Kind(KindName::String)),
            "bytes" => Some(Expr::Kind(KindName::Bytes)),
            "bool" => Some(Expr::Kind(KindName::Bool)),
            "int" => Some(Expr::Kind(KindName::Int)),
            "float" => Some(Expr::Kind(KindName::Float)),
            "number" => Some(Expr::Kind(KindName::Number)),
            "let" | "for" | "if" => {
                return Err(self.err_at(self.pos - 1, format!("'{}' is not supported", name)))
            }
            _ => None,
        };
        if let Some(expr) = simple {
            return Ok(expr);
        }

        let mut path = vec![name];
        while self.at_same_line(&Tok::Dot) {
            self.pos += 1;
            match self.advance().tok {
                Tok::Ident(seg) => path.push(seg),
                other => return Err(self.err_at(self.pos - 1, format!("expected selector, found {}", other))),
            }
        }

        if self.at_same_line(&Tok::LParen) {
            self.pos += 1;
            let mut args = Vec::new();
            while !self.eat(&Tok::RParen) {
                args.push(self.expr()?);
                if !self.eat(&Tok::Comma) {
                    self.expect(&Tok::RParen)?;
                    break;
                }
            }
            return Ok(Expr::Call(path, args));
        }
        Ok(Expr::Ref(path))
    }

    fn list(&mut self) -> Result<Expr, String> {
        let mut lit = ListLit::default();
        loop {
            if self.eat(&Tok::RBrack) {
                break;
            }
            if self.eat(&Tok::Ellipsis) {
                let tail = if self.peek().tok == Tok::RBrack || self.peek().tok == Tok::Comma {
                    Expr::Top
                } else {
                    self.expr()?
                };
                lit.tail = Some(Arc::new(tail));
                self.eat(&Tok::Comma);
                self.expect(&Tok::RBrack)?;
                break;
            }
            lit.elems.push(Arc::new(self.expr()?));
            if !self.eat(&Tok::Comma) && self.peek().tok != Tok::RBrack && !self.peek().newline_before {
                return Err(self.err_at(self.pos, format!("expected ',' or ']', found {}", self.peek().tok)));
            }
        }
        Ok(Expr::List(Arc::new(lit)))
    }

    // ---- token helpers ----

    fn peek(&self) -> &Token {
        self.token_at(self.pos)
    }

    fn token_at(&self, i: usize) -> &Token {
        // the token list always ends with Eof
        let last = self.tokens.len() - 1;
        &self.tokens[i.min(last)]
    }

    fn tok_at(&self, i: usize) -> &Tok {
        &self.token_at(i).tok
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.tok != Tok::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek().tok == *tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), String> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.err_at(self.pos, format!("expected {}, found {}", tok, self.peek().tok)))
        }
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.peek().tok, Tok::Ident(n) if n == name)
    }

    /// Operator on the same line as the previous token
    fn at_same_line(&self, tok: &Tok) -> bool {
        let next = self.peek();
        next.tok == *tok && !next.newline_before
    }

    /// Whether the token after `pos + offset` starts a field (`:`, `?:`, `!:`)
    fn next_is_label_colon(&self, offset: usize) -> bool {
        let i = self.pos + offset + 1;
        match self.tok_at(i) {
            Tok::Colon => true,
            Tok::Question | Tok::Bang => self.tok_at(i + 1) == &Tok::Colon,
            _ => false,
        }
    }

    fn matching_bracket(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = open;
        loop {
            match self.tok_at(i) {
                Tok::LBrack => depth += 1,
                Tok::RBrack => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                Tok::Eof => return None,
                _ => {}
            }
            i += 1;
        }
    }

    fn err_at(&self, i: usize, msg: impl std::fmt::Display) -> String {
        format!("line {}: {}", self.token_at(i).line, msg)
    }
}
