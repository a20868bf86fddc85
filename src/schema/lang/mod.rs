//! Constraint language for schema fragments
//!
//! A subset of CUE large enough for the Gemara schemas:
//!
//! - packages and imports of the `strings`, `list` and `time` builtins
//! - definitions (`#Name`), optional (`?`) and required (`!`) fields
//! - closed definitions, `...` to reopen, embedding, `[pattern]: value`
//! - kinds, literals, bounds (`>=`, `=~`, ...), `&`, `|` with `*` defaults
//! - lists with `...T` tails
//!
//! Comprehensions, `let`, string interpolation and arithmetic are rejected
//! at parse time.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod package;
pub mod parser;
pub mod value;

pub use package::Package;

/// Failure to turn fragments into a package
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error in {fragment}: {message}")]
    Syntax { fragment: String, message: String },

    #[error("package name mismatch: fragments declare {}", .0.join(", "))]
    PackageMismatch(Vec<String>),

    #[error("schema build failed: {0}")]
    Build(String),
}
