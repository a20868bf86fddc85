//! Tokenizer for schema fragments

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    /// `_|_`
    Bottom,
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    LParen,
    RParen,
    Colon,
    Comma,
    Dot,
    Ellipsis,
    Question,
    Bang,
    Amp,
    Pipe,
    Star,
    Minus,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Match,
    NotMatch,
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Ident(s) => write!(f, "{}", s),
            Tok::Str(s) => write!(f, "{:?}", s),
            Tok::Int(n) => write!(f, "{}", n),
            Tok::Float(n) => write!(f, "{}", n),
            Tok::Bottom => f.write_str("_|_"),
            Tok::LBrace => f.write_str("{"),
            Tok::RBrace => f.write_str("}"),
            Tok::LBrack => f.write_str("["),
            Tok::RBrack => f.write_str("]"),
            Tok::LParen => f.write_str("("),
            Tok::RParen => f.write_str(")"),
            Tok::Colon => f.write_str(":"),
            Tok::Comma => f.write_str(","),
            Tok::Dot => f.write_str("."),
            Tok::Ellipsis => f.write_str("..."),
            Tok::Question => f.write_str("?"),
            Tok::Bang => f.write_str("!"),
            Tok::Amp => f.write_str("&"),
            Tok::Pipe => f.write_str("|"),
            Tok::Star => f.write_str("*"),
            Tok::Minus => f.write_str("-"),
            Tok::Lt => f.write_str("<"),
            Tok::Le => f.write_str("<="),
            Tok::Gt => f.write_str(">"),
            Tok::Ge => f.write_str(">="),
            Tok::Ne => f.write_str("!="),
            Tok::Match => f.write_str("=~"),
            Tok::NotMatch => f.write_str("!~"),
            Tok::Eof => f.write_str("end of file"),
        }
    }
}

/// A token with its line and whether a newline preceded it
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub newline_before: bool,
}

/// Split `src` into tokens. The last token is always `Tok::Eof`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        let mut newline_before = false;

        loop {
            // whitespace and comments
            while let Some(c) = self.peek(0) {
                if c == '\n' {
                    newline_before = true;
                    self.line += 1;
                    self.pos += 1;
                } else if c.is_whitespace() {
                    self.pos += 1;
                } else if c == '/' && self.peek(1) == Some('/') {
                    while matches!(self.peek(0), Some(c) if c != '\n') {
                        self.pos += 1;
                    }
                } else {
                    break;
                }
            }

            let line = self.line;
            let Some(c) = self.peek(0) else {
                tokens.push(Token {
                    tok: Tok::Eof,
                    line,
                    newline_before: true,
                });
                return Ok(tokens);
            };

            let tok = match c {
                '"' => self.string()?,
                '0'..='9' => self.number()?,
                '_' if self.peek(1) == Some('|') && self.peek(2) == Some('_') => {
                    self.pos += 3;
                    Tok::Bottom
                }
                c if c.is_alphabetic() || c == '_' || c == '#' || c == '$' => self.ident(),
                '.' if self.peek(1) == Some('.') && self.peek(2) == Some('.') => {
                    self.pos += 3;
                    Tok::Ellipsis
                }
                _ => self.punct(c)?,
            };
            tokens.push(Token {
                tok,
                line,
                newline_before,
            });
            newline_before = false;
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn err(&self, msg: impl fmt::Display) -> String {
        format!("line {}: {}", self.line, msg)
    }

    fn ident(&mut self) -> Tok {
        let start = self.pos;
        self.pos += 1;
        while matches!(self.peek(0), Some(c) if c.is_alphanumeric() || c == '_' || c == '$') {
            self.pos += 1;
        }
        Tok::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) -> Result<Tok, String> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() || c == '_' {
                self.pos += 1;
            } else if c == '.' && !is_float && matches!(self.peek(1), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                self.pos += 1;
            } else if (c == 'e' || c == 'E') && self.pos > start {
                is_float = true;
                self.pos += 1;
                if matches!(self.peek(0), Some('+') | Some('-')) {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            text.parse()
                .map(Tok::Float)
                .map_err(|_| self.err(format!("invalid number {}", text)))
        } else {
            text.parse()
                .map(Tok::Int)
                .map_err(|_| self.err(format!("invalid number {}", text)))
        }
    }

    fn string(&mut self) -> Result<Tok, String> {
        if self.peek(1) == Some('"') && self.peek(2) == Some('"') {
            return Err(self.err("multi-line strings are not supported"));
        }
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(self.err("unterminated string"));
            };
            self.pos += 1;
            match c {
                '"' => return Ok(Tok::Str(out)),
                '\n' => return Err(self.err("newline in string")),
                '\\' => {
                    let Some(esc) = self.peek(0) else {
                        return Err(self.err("unterminated string"));
                    };
                    self.pos += 1;
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        'u' => {
                            let hex: String = (0..4).filter_map(|i| self.peek(i)).collect();
                            let code = u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| self.err(format!("invalid escape \\u{}", hex)))?;
                            self.pos += 4;
                            out.push(code);
                        }
                        '(' => return Err(self.err("string interpolation is not supported")),
                        other => return Err(self.err(format!("unknown escape \\{}", other))),
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn punct(&mut self, c: char) -> Result<Tok, String> {
        let next = self.peek(1);
        let (tok, len) = match (c, next) {
            ('<', Some('=')) => (Tok::Le, 2),
            ('>', Some('=')) => (Tok::Ge, 2),
            ('!', Some('=')) => (Tok::Ne, 2),
            ('!', Some('~')) => (Tok::NotMatch, 2),
            ('=', Some('~')) => (Tok::Match, 2),
            ('{', _) => (Tok::LBrace, 1),
            ('}', _) => (Tok::RBrace, 1),
            ('[', _) => (Tok::LBrack, 1),
            (']', _) => (Tok::RBrack, 1),
            ('(', _) => (Tok::LParen, 1),
            (')', _) => (Tok::RParen, 1),
            (':', _) => (Tok::Colon, 1),
            (',', _) => (Tok::Comma, 1),
            ('.', _) => (Tok::Dot, 1),
            ('?', _) => (Tok::Question, 1),
            ('!', _) => (Tok::Bang, 1),
            ('&', _) => (Tok::Amp, 1),
            ('|', _) => (Tok::Pipe, 1),
            ('*', _) => (Tok::Star, 1),
            ('-', _) => (Tok::Minus, 1),
            ('<', _) => (Tok::Lt, 1),
            ('>', _) => (Tok::Gt, 1),
            (other, _) => return Err(self.err(format!("unexpected character {:?}", other))),
        };
        self.pos += len;
        Ok(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_field_tokens() {
        assert_eq!(
            toks(r#"#A: { "x-y"?: >=1 & <=10 }"#),
            vec![
                Tok::Ident("#A".into()),
                Tok::Colon,
                Tok::LBrace,
                Tok::Str("x-y".into()),
                Tok::Question,
                Tok::Colon,
                Tok::Ge,
                Tok::Int(1),
                Tok::Amp,
                Tok::Le,
                Tok::Int(10),
                Tok::RBrace,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_special_tokens() {
        assert_eq!(
            toks(r#"_|_ _ [...] =~"^a\\d" !~"b" 1.5 -2"#),
            vec![
                Tok::Bottom,
                Tok::Ident("_".into()),
                Tok::LBrack,
                Tok::Ellipsis,
                Tok::RBrack,
                Tok::Match,
                Tok::Str("^a\\d".into()),
                Tok::NotMatch,
                Tok::Str("b".into()),
                Tok::Float(1.5),
                Tok::Minus,
                Tok::Int(2),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_and_comments() {
        let tokens = tokenize("a: 1 // one\nb: 2").unwrap();
        assert!(!tokens[0].newline_before);
        let b = &tokens[3];
        assert_eq!(b.tok, Tok::Ident("b".into()));
        assert!(b.newline_before);
        assert_eq!(b.line, 2);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("\"a\\(b)\"").is_err());
        assert!(tokenize("a: @").is_err());
    }
}
