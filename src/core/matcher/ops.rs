//! Operator set and typed operator semantics
//!
//! All operators are strict: the VM has already evaluated both operands by
//! the time [`BinaryOp::apply`] runs.

use super::value::Value;
use crate::core::error::EvalError;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Pos,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// Binding strength of prefix operators
pub const UNARY_PRECEDENCE: u8 = 6;

/// Binding strength of `.`
pub const DOT_PRECEDENCE: u8 = 7;

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
        }
    }

    pub fn apply(self, operand: Value) -> Result<Value, EvalError> {
        match (self, operand) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Pos, Value::Number(n)) => Ok(Value::Number(n)),
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (op, other) => Err(EvalError::type_error(
                op.symbol(),
                format!("cannot apply to {}", other.type_name()),
            )),
        }
    }
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// `||` < `&&` < relational < additive < multiplicative
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
        }
    }

    pub fn apply(self, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
        use BinaryOp::*;

        match self {
            Mul | Div | Add | Sub => {
                let (a, b) = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => (*a, *b),
                    _ => return Err(self.mismatch(&lhs, &rhs)),
                };
                let result = match self {
                    Mul => a * b,
                    Add => a + b,
                    Sub => a - b,
                    _ => {
                        if b == 0.0 {
                            return Err(EvalError::ArithmeticError {
                                op: self.symbol().to_string(),
                                detail: "division by zero".to_string(),
                            });
                        }
                        a / b
                    }
                };
                Ok(Value::Number(result))
            }
            Lt | Le | Gt | Ge => {
                let ordering = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => return Err(self.mismatch(&lhs, &rhs)),
                };
                let holds = match ordering {
                    Some(Ordering::Less) => matches!(self, Lt | Le),
                    Some(Ordering::Equal) => matches!(self, Le | Ge),
                    Some(Ordering::Greater) => matches!(self, Gt | Ge),
                    None => false,
                };
                Ok(Value::Bool(holds))
            }
            Eq | Ne => {
                let equal = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => a == b,
                    (Value::String(a), Value::String(b)) => a == b,
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    _ => return Err(self.mismatch(&lhs, &rhs)),
                };
                Ok(Value::Bool(if self == Eq { equal } else { !equal }))
            }
            And | Or => match (&lhs, &rhs) {
                (Value::Bool(a), Value::Bool(b)) => {
                    Ok(Value::Bool(if self == And { *a && *b } else { *a || *b }))
                }
                _ => Err(self.mismatch(&lhs, &rhs)),
            },
        }
    }

    fn mismatch(self, lhs: &Value, rhs: &Value) -> EvalError {
        EvalError::type_error(
            self.symbol(),
            format!(
                "cannot apply to {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        )
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_unary() {
        assert_eq!(UnaryOp::Not.apply(Value::Bool(true)), Ok(Value::Bool(false)));
        assert_eq!(UnaryOp::Neg.apply(num(2.0)), Ok(num(-2.0)));
        assert_eq!(UnaryOp::Pos.apply(num(2.0)), Ok(num(2.0)));
        assert!(matches!(
            UnaryOp::Not.apply(num(1.0)),
            Err(EvalError::TypeError { .. })
        ));
        assert!(matches!(
            UnaryOp::Neg.apply(s("x")),
            Err(EvalError::TypeError { .. })
        ));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(BinaryOp::Add.apply(num(1.0), num(2.0)), Ok(num(3.0)));
        assert_eq!(BinaryOp::Sub.apply(num(1.0), num(2.0)), Ok(num(-1.0)));
        assert_eq!(BinaryOp::Mul.apply(num(3.0), num(2.0)), Ok(num(6.0)));
        assert_eq!(BinaryOp::Div.apply(num(3.0), num(2.0)), Ok(num(1.5)));
        assert!(matches!(
            BinaryOp::Div.apply(num(1.0), num(0.0)),
            Err(EvalError::ArithmeticError { .. })
        ));
        assert!(matches!(
            BinaryOp::Add.apply(s("a"), s("b")),
            Err(EvalError::TypeError { .. })
        ));
    }

    #[test]
    fn test_relational() {
        assert_eq!(BinaryOp::Lt.apply(num(1.0), num(2.0)), Ok(Value::Bool(true)));
        assert_eq!(BinaryOp::Ge.apply(num(2.0), num(2.0)), Ok(Value::Bool(true)));
        assert_eq!(BinaryOp::Gt.apply(num(2.0), num(2.0)), Ok(Value::Bool(false)));
        assert_eq!(BinaryOp::Le.apply(s("abc"), s("abd")), Ok(Value::Bool(true)));
        assert_eq!(BinaryOp::Gt.apply(s("b"), s("abc")), Ok(Value::Bool(true)));
        assert!(matches!(
            BinaryOp::Lt.apply(s("1"), num(2.0)),
            Err(EvalError::TypeError { .. })
        ));
        assert!(matches!(
            BinaryOp::Lt.apply(Value::Bool(true), Value::Bool(false)),
            Err(EvalError::TypeError { .. })
        ));
    }

    #[test]
    fn test_equality() {
        assert_eq!(BinaryOp::Eq.apply(s("a"), s("a")), Ok(Value::Bool(true)));
        assert_eq!(BinaryOp::Ne.apply(s("a"), s("b")), Ok(Value::Bool(true)));
        assert_eq!(BinaryOp::Eq.apply(num(1.0), num(1.0)), Ok(Value::Bool(true)));
        assert_eq!(
            BinaryOp::Eq.apply(Value::Bool(true), Value::Bool(true)),
            Ok(Value::Bool(true))
        );
        // No implicit coercion between "1" and 1
        assert!(matches!(
            BinaryOp::Eq.apply(s("1"), num(1.0)),
            Err(EvalError::TypeError { .. })
        ));
    }

    #[test]
    fn test_logical() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(BinaryOp::And.apply(t.clone(), f.clone()), Ok(f.clone()));
        assert_eq!(BinaryOp::Or.apply(t.clone(), f.clone()), Ok(t.clone()));
        assert!(matches!(
            BinaryOp::And.apply(t, s("yes")),
            Err(EvalError::TypeError { .. })
        ));
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < BinaryOp::Eq.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
        assert!(BinaryOp::Mul.precedence() < UNARY_PRECEDENCE);
        assert!(UNARY_PRECEDENCE < DOT_PRECEDENCE);
    }
}
