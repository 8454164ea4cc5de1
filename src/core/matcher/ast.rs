//! Expression tree and its construction from a postfix token stream

use super::lexer::{Token, TokenKind};
use super::ops::{BinaryOp, UnaryOp};
use crate::core::error::{MatcherSyntaxError, Position};

/// Default bound on expression nesting
///
/// Depth is the height of the tree. Binary operators are left-associative,
/// so a flat chain such as `a && b && c` nests on its left spine and each
/// extra clause adds one level. Dotted access and parentheses add none.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Var(String),
    /// `key.attr1.attr2...`
    Attr {
        key: String,
        path: Vec<String>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// Reduce a postfix stream into a single expression
///
/// Uses an explicit node stack, so arbitrarily long inputs never recurse.
/// Each node's nesting depth is tracked alongside it and bounded by
/// `max_depth`, which keeps the recursive compiler pass shallow.
pub fn build(tokens: Vec<Token>, max_depth: usize) -> Result<Expr, MatcherSyntaxError> {
    let mut stack: Vec<(Expr, usize)> = Vec::new();
    let mut last: Option<(String, Position)> = None;

    for token in tokens {
        let text = token.to_string();
        let position = token.position;

        let (node, depth) = match token.kind {
            TokenKind::Number(n) => (Expr::Number(n), 1),
            TokenKind::Str(s) => (Expr::Str(s), 1),
            TokenKind::Ident(name) => (Expr::Var(name), 1),
            TokenKind::Dot => {
                let (rhs, lhs) = pop_two(&mut stack, &text, position)?;
                let attr = match rhs.0 {
                    Expr::Var(name) => name,
                    _ => {
                        return Err(MatcherSyntaxError::unexpected(
                            text,
                            position,
                            "attribute name must be an identifier",
                        ))
                    }
                };
                match lhs.0 {
                    Expr::Var(key) => (
                        Expr::Attr {
                            key,
                            path: vec![attr],
                        },
                        1,
                    ),
                    Expr::Attr { key, mut path } => {
                        path.push(attr);
                        (Expr::Attr { key, path }, 1)
                    }
                    _ => {
                        return Err(MatcherSyntaxError::unexpected(
                            text,
                            position,
                            "only identifiers support attribute access",
                        ))
                    }
                }
            }
            TokenKind::Unary(op) => {
                let (expr, depth) = pop_one(&mut stack, &text, position, 1)?;
                (
                    Expr::Unary {
                        op,
                        expr: Box::new(expr),
                    },
                    depth + 1,
                )
            }
            TokenKind::Binary(op) => {
                let (rhs, lhs) = pop_two(&mut stack, &text, position)?;
                let depth = lhs.1.max(rhs.1) + 1;
                (
                    Expr::Binary {
                        op,
                        lhs: Box::new(lhs.0),
                        rhs: Box::new(rhs.0),
                    },
                    depth,
                )
            }
            TokenKind::Call { name, arity } => {
                if stack.len() < arity {
                    return Err(MatcherSyntaxError::ArityMismatch {
                        token: text,
                        position,
                        expected: arity,
                        found: stack.len(),
                    });
                }
                let split = stack.len() - arity;
                let mut depth = 0;
                let args = stack
                    .split_off(split)
                    .into_iter()
                    .map(|(arg, d)| {
                        depth = depth.max(d);
                        arg
                    })
                    .collect();
                (Expr::Call { name, args }, depth + 1)
            }
        };

        if depth > max_depth {
            return Err(MatcherSyntaxError::TooDeep {
                token: text,
                position,
                limit: max_depth,
            });
        }
        stack.push((node, depth));
        last = Some((text, position));
    }

    let count = stack.len();
    match (stack.pop(), count) {
        (Some((expr, _)), 1) => Ok(expr),
        (_, 0) => Err(MatcherSyntaxError::unexpected(
            "",
            Position::START,
            "empty expression",
        )),
        _ => {
            let (text, position) = last.unwrap_or_else(|| (String::new(), Position::START));
            Err(MatcherSyntaxError::unexpected(
                text,
                position,
                format!("expression does not reduce to a single value ({} left)", count),
            ))
        }
    }
}

fn pop_one(
    stack: &mut Vec<(Expr, usize)>,
    text: &str,
    position: Position,
    expected: usize,
) -> Result<(Expr, usize), MatcherSyntaxError> {
    let found = stack.len();
    stack.pop().ok_or_else(|| MatcherSyntaxError::ArityMismatch {
        token: text.to_string(),
        position,
        expected,
        found,
    })
}

/// Pops `(rhs, lhs)`; rhs sits above lhs on the stack
fn pop_two(
    stack: &mut Vec<(Expr, usize)>,
    text: &str,
    position: Position,
) -> Result<((Expr, usize), (Expr, usize)), MatcherSyntaxError> {
    if stack.len() < 2 {
        return Err(MatcherSyntaxError::ArityMismatch {
            token: text.to_string(),
            position,
            expected: 2,
            found: stack.len(),
        });
    }
    let rhs = pop_one(stack, text, position, 2)?;
    let lhs = pop_one(stack, text, position, 2)?;
    Ok((rhs, lhs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::lexer::to_postfix;

    fn parse(source: &str) -> Result<Expr, MatcherSyntaxError> {
        build(to_postfix(source)?, DEFAULT_MAX_DEPTH)
    }

    fn attr(key: &str, path: &[&str]) -> Expr {
        Expr::Attr {
            key: key.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_binary_tree_shape() {
        let expr = parse("r.sub == p.sub").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Eq,
                lhs: Box::new(attr("r", &["sub"])),
                rhs: Box::new(attr("p", &["sub"])),
            }
        );
    }

    #[test]
    fn test_operand_order_preserved() {
        let expr = parse("a - b").unwrap();
        match expr {
            Expr::Binary { op, lhs, rhs } => {
                assert_eq!(op, BinaryOp::Sub);
                assert_eq!(*lhs, Expr::Var("a".to_string()));
                assert_eq!(*rhs, Expr::Var("b".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_deep_dotted_access() {
        assert_eq!(parse("r.a.b.c").unwrap(), attr("r", &["a", "b", "c"]));
    }

    #[test]
    fn test_call_arguments_in_order() {
        let expr = parse("g(r.sub, \"admin\", 3)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "g".to_string(),
                args: vec![
                    attr("r", &["sub"]),
                    Expr::Str("admin".to_string()),
                    Expr::Number(3.0)
                ],
            }
        );
        assert_eq!(
            parse("now()").unwrap(),
            Expr::Call {
                name: "now".to_string(),
                args: vec![]
            }
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(
            parse("!r.ok").unwrap(),
            Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(attr("r", &["ok"])),
            }
        );
    }

    #[test]
    fn test_missing_rhs_reports_operator_position() {
        let err = parse("r.sub ==").unwrap_err();
        assert!(matches!(
            err,
            MatcherSyntaxError::ArityMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert_eq!(err.token(), "==");
        assert_eq!(err.position(), Position::new(1, 7));
    }

    #[test]
    fn test_dangling_unary() {
        let err = parse("!").unwrap_err();
        assert_eq!(err.token(), "!");
        assert!(matches!(err, MatcherSyntaxError::ArityMismatch { .. }));
    }

    #[test]
    fn test_invalid_attribute_access() {
        assert!(parse("r.\"sub\"").is_err());
        assert!(parse("r.1").is_err());
        assert!(parse("f(a).b").is_err());
        assert!(parse("(a + b).c").is_err());
    }

    #[test]
    fn test_empty_expression() {
        let err = parse("").unwrap_err();
        assert_eq!(err.position(), Position::START);
        assert!(parse("   ").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}a{}", "(".repeat(10), ")".repeat(10));
        assert!(parse(&deep).is_ok());

        let nested = (0..20).fold("a".to_string(), |acc, _| format!("!({})", acc));
        assert!(build(to_postfix(&nested).unwrap(), 50).is_ok());
        let err = build(to_postfix(&nested).unwrap(), 10).unwrap_err();
        assert!(matches!(err, MatcherSyntaxError::TooDeep { limit: 10, .. }));
    }

    #[test]
    fn test_long_chain_depth() {
        // Left-associative chains nest on the left
        let chain = vec!["a == b"; 50].join(" && ");
        assert!(parse(&chain).is_ok());
        assert!(build(to_postfix(&chain).unwrap(), 20).is_err());
    }

    #[test]
    fn test_chain_length_counts_toward_default_limit() {
        // n clauses of `x == y` give height n + 1
        let fits = vec!["x == y"; DEFAULT_MAX_DEPTH - 1].join(" && ");
        assert!(parse(&fits).is_ok());

        let too_long = vec!["x == y"; DEFAULT_MAX_DEPTH].join(" && ");
        assert!(matches!(
            parse(&too_long),
            Err(MatcherSyntaxError::TooDeep { limit: DEFAULT_MAX_DEPTH, .. })
        ));
        assert!(build(to_postfix(&too_long).unwrap(), DEFAULT_MAX_DEPTH + 1).is_ok());
    }
}
