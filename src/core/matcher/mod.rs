//! Matcher language pipeline
//!
//! ```text
//! source ──> lexer::to_postfix ──> ast::build ──> compiler ──> vm::evaluate
//!            (tokens, RPN)         (Expr tree)    (Instruction list)   (Value)
//! ```
//!
//! Compilation happens once per model; the resulting [`CompiledMatcher`] is
//! immutable and evaluated against a fresh [`Environment`] per request row.

pub mod ast;
pub mod compiler;
pub mod env;
pub mod lexer;
pub mod ops;
pub mod value;
pub mod vm;

pub use ast::{Expr, DEFAULT_MAX_DEPTH};
pub use compiler::{CompiledMatcher, Instruction};
pub use env::{Environment, Function, FunctionRegistry};
pub use lexer::Token;
pub use ops::{BinaryOp, UnaryOp};
pub use value::Value;
pub use vm::{evaluate, evaluate_bool};
