//! Expression tree to stack-machine instructions

use super::ast::{self, Expr};
use super::lexer;
use super::ops::{BinaryOp, UnaryOp};
use super::value::Value;
use crate::core::error::MatcherSyntaxError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    PushConst(Value),
    FetchVar(String),
    /// Resolve `key`, then each attribute of `path` in turn
    FetchAttr { key: String, path: Vec<String> },
    Unary(UnaryOp),
    Binary(BinaryOp),
    Call { name: String, arity: usize },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::PushConst(v) => write!(f, "push {}", v),
            Instruction::FetchVar(name) => write!(f, "fetch {}", name),
            Instruction::FetchAttr { key, path } => write!(f, "fetch {}.{}", key, path.join(".")),
            Instruction::Unary(op) => write!(f, "unary {}", op),
            Instruction::Binary(op) => write!(f, "binary {}", op),
            Instruction::Call { name, arity } => write!(f, "call {}/{}", name, arity),
        }
    }
}

/// An immutable, shareable matcher program
///
/// Only obtainable through [`CompiledMatcher::compile`], so every instance
/// is a well-formed postfix program.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    source: Arc<str>,
    program: Arc<[Instruction]>,
}

impl CompiledMatcher {
    /// Run the full pipeline: tokenize, reduce, build, linearize
    ///
    /// # Examples
    ///
    /// ```
    /// use enforcer_rs::core::matcher::CompiledMatcher;
    ///
    /// let matcher = CompiledMatcher::compile("r.sub == p.sub").unwrap();
    /// assert_eq!(matcher.instructions().len(), 3);
    ///
    /// assert!(CompiledMatcher::compile("r.sub ==").is_err());
    /// ```
    pub fn compile(source: &str) -> Result<Self, MatcherSyntaxError> {
        Self::compile_with_depth(source, ast::DEFAULT_MAX_DEPTH)
    }

    /// Like [`compile`](Self::compile) with a custom nesting bound
    pub fn compile_with_depth(source: &str, max_depth: usize) -> Result<Self, MatcherSyntaxError> {
        let tokens = lexer::to_postfix(source)?;
        let expr = ast::build(tokens, max_depth)?;
        let matcher = Self::from_expr(source, &expr);
        debug!(
            "Compiled matcher '{}' into {} instructions",
            source,
            matcher.program.len()
        );
        Ok(matcher)
    }

    fn from_expr(source: &str, expr: &Expr) -> Self {
        let mut program = Vec::new();
        emit(expr, &mut program);
        CompiledMatcher {
            source: Arc::from(source),
            program: program.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.program
    }
}

impl PartialEq for CompiledMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.program == other.program
    }
}

/// Post-order linearization: operands first, then the consuming instruction
fn emit(expr: &Expr, out: &mut Vec<Instruction>) {
    match expr {
        Expr::Number(n) => out.push(Instruction::PushConst(Value::Number(*n))),
        Expr::Str(s) => out.push(Instruction::PushConst(Value::String(s.clone()))),
        Expr::Var(name) => out.push(Instruction::FetchVar(name.clone())),
        Expr::Attr { key, path } => out.push(Instruction::FetchAttr {
            key: key.clone(),
            path: path.clone(),
        }),
        Expr::Unary { op, expr } => {
            emit(expr, out);
            out.push(Instruction::Unary(*op));
        }
        Expr::Binary { op, lhs, rhs } => {
            emit(lhs, out);
            emit(rhs, out);
            out.push(Instruction::Binary(*op));
        }
        Expr::Call { name, args } => {
            for arg in args {
                emit(arg, out);
            }
            out.push(Instruction::Call {
                name: name.clone(),
                arity: args.len(),
            });
        }
    }
}
