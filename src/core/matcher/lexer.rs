//! Matcher tokenizer and postfix reducer
//!
//! Scans the matcher source once and emits tokens directly in postfix (RPN)
//! order using an operator-precedence stack. Every token keeps its source
//! position so later stages can report errors against the original text.

use super::ops::{BinaryOp, UnaryOp, DOT_PRECEDENCE, UNARY_PRECEDENCE};
use crate::core::error::{MatcherSyntaxError, Position};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    /// Dotted attribute access
    Dot,
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Function call with the number of arguments found in the source
    Call { name: String, arity: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            TokenKind::Binary(op) => op.precedence(),
            TokenKind::Unary(_) => UNARY_PRECEDENCE,
            TokenKind::Dot => DOT_PRECEDENCE,
            _ => 0,
        }
    }

    fn is_right_assoc(&self) -> bool {
        matches!(self.kind, TokenKind::Unary(_))
    }
}

/// Renders the token as it appeared in the source
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Call { name, .. } => write!(f, "{}(...)", name),
            _ => f.write_str(&self.lexeme),
        }
    }
}

/// Tokenize `source` into postfix order
///
/// # Examples
///
/// ```
/// use enforcer_rs::core::matcher::lexer::to_postfix;
///
/// let rpn: Vec<String> = to_postfix("a + b * c")
///     .unwrap()
///     .iter()
///     .map(|t| t.lexeme.clone())
///     .collect();
/// assert_eq!(rpn, ["a", "b", "c", "*", "+"]);
/// ```
pub fn to_postfix(source: &str) -> Result<Vec<Token>, MatcherSyntaxError> {
    Reducer::new(source).run()
}

/// Entries on the operator stack
enum Pending {
    Op(Token),
    Paren(Position),
    Func {
        name: String,
        position: Position,
        commas: usize,
    },
}

struct Reducer {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    col: usize,
    output: Vec<Token>,
    stack: Vec<Pending>,
    /// An operand (or prefix operator) must come next
    expect_operand: bool,
    /// The previous token was an opening parenthesis
    after_open: bool,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Reducer {
    fn new(source: &str) -> Self {
        Reducer {
            chars: source.chars().collect(),
            idx: 0,
            line: 1,
            col: 1,
            output: Vec::new(),
            stack: Vec::new(),
            expect_operand: true,
            after_open: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn run(mut self) -> Result<Vec<Token>, MatcherSyntaxError> {
        while let Some(c) = self.peek() {
            let position = self.position();
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '0'..='9' => {
                    let token = self.number(position)?;
                    self.operand(token)?;
                }
                '"' => {
                    let token = self.string(position)?;
                    self.operand(token)?;
                }
                c if is_ident_start(c) => self.identifier(position)?,
                '(' => {
                    self.bump();
                    self.open_paren(position)?;
                }
                ')' => {
                    self.bump();
                    self.close_paren(position)?;
                }
                ',' => {
                    self.bump();
                    self.comma(position)?;
                }
                '.' => {
                    self.bump();
                    self.binary(Token::new(TokenKind::Dot, ".", position))?;
                }
                _ => self.operator(position)?,
            }
        }
        self.finish()
    }

    fn operand(&mut self, token: Token) -> Result<(), MatcherSyntaxError> {
        if !self.expect_operand {
            return Err(MatcherSyntaxError::unexpected(
                token.to_string(),
                token.position,
                "expected an operator",
            ));
        }
        self.output.push(token);
        self.expect_operand = false;
        self.after_open = false;
        Ok(())
    }

    fn number(&mut self, position: Position) -> Result<Token, MatcherSyntaxError> {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            lexeme.push(c);
            self.bump();
        }

        let has_fraction = self.peek() == Some('.')
            && self
                .chars
                .get(self.idx + 1)
                .is_some_and(|c| c.is_ascii_digit());
        if has_fraction {
            lexeme.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                lexeme.push(c);
                self.bump();
            }
        }

        if self.peek().is_some_and(is_ident_start) {
            return Err(MatcherSyntaxError::unexpected(
                lexeme,
                position,
                "invalid numeric literal",
            ));
        }

        match lexeme.parse::<f64>() {
            Ok(n) => Ok(Token::new(TokenKind::Number(n), lexeme, position)),
            Err(_) => Err(MatcherSyntaxError::unexpected(
                lexeme,
                position,
                "invalid numeric literal",
            )),
        }
    }

    /// Double-quoted string; `\"` and `\\` are the only escapes
    fn string(&mut self, position: Position) -> Result<Token, MatcherSyntaxError> {
        let mut lexeme = String::from('"');
        let mut value = String::new();
        self.bump();

        loop {
            match self.bump() {
                Some('"') => {
                    lexeme.push('"');
                    return Ok(Token::new(TokenKind::Str(value), lexeme, position));
                }
                Some('\\') => {
                    lexeme.push('\\');
                    match self.peek() {
                        Some(c @ ('"' | '\\')) => {
                            self.bump();
                            lexeme.push(c);
                            value.push(c);
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) => {
                    lexeme.push(c);
                    value.push(c);
                }
                None => {
                    return Err(MatcherSyntaxError::unexpected(
                        lexeme,
                        position,
                        "unterminated string literal",
                    ))
                }
            }
        }
    }

    /// Identifier, or the name and opening parenthesis of a call
    fn identifier(&mut self, position: Position) -> Result<(), MatcherSyntaxError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_char(c) {
                break;
            }
            name.push(c);
            self.bump();
        }
        if self.peek() == Some('?') {
            name.push('?');
            self.bump();
        }

        let mut lookahead = self.idx;
        while self.chars.get(lookahead).is_some_and(|c| c.is_whitespace()) {
            lookahead += 1;
        }
        if self.chars.get(lookahead) != Some(&'(') {
            return self.operand(Token::new(TokenKind::Ident(name.clone()), name, position));
        }

        if !self.expect_operand {
            return Err(MatcherSyntaxError::unexpected(
                format!("{}(", name),
                position,
                "expected an operator",
            ));
        }
        while self.idx <= lookahead {
            self.bump();
        }
        self.stack.push(Pending::Func {
            name,
            position,
            commas: 0,
        });
        self.expect_operand = true;
        self.after_open = true;
        Ok(())
    }

    fn open_paren(&mut self, position: Position) -> Result<(), MatcherSyntaxError> {
        if !self.expect_operand {
            return Err(MatcherSyntaxError::unexpected(
                "(",
                position,
                "expected an operator",
            ));
        }
        self.stack.push(Pending::Paren(position));
        self.after_open = true;
        Ok(())
    }

    fn close_paren(&mut self, position: Position) -> Result<(), MatcherSyntaxError> {
        let empty = self.after_open;
        if self.expect_operand && !empty {
            return Err(MatcherSyntaxError::unexpected(
                ")",
                position,
                "expected an operand",
            ));
        }

        loop {
            match self.stack.pop() {
                Some(Pending::Op(token)) => self.output.push(token),
                Some(Pending::Paren(_)) => {
                    if empty {
                        return Err(MatcherSyntaxError::unexpected(
                            ")",
                            position,
                            "empty parentheses",
                        ));
                    }
                    break;
                }
                Some(Pending::Func {
                    name,
                    position: call_position,
                    commas,
                }) => {
                    let arity = if empty { 0 } else { commas + 1 };
                    self.output.push(Token::new(
                        TokenKind::Call {
                            name: name.clone(),
                            arity,
                        },
                        name,
                        call_position,
                    ));
                    break;
                }
                None => {
                    return Err(MatcherSyntaxError::unexpected(
                        ")",
                        position,
                        "unmatched closing parenthesis",
                    ))
                }
            }
        }

        self.expect_operand = false;
        self.after_open = false;
        Ok(())
    }

    fn comma(&mut self, position: Position) -> Result<(), MatcherSyntaxError> {
        if self.expect_operand {
            return Err(MatcherSyntaxError::unexpected(
                ",",
                position,
                "expected an argument",
            ));
        }

        loop {
            match self.stack.last() {
                Some(Pending::Op(_)) => {
                    if let Some(Pending::Op(token)) = self.stack.pop() {
                        self.output.push(token);
                    }
                }
                Some(Pending::Func { .. }) => break,
                _ => {
                    return Err(MatcherSyntaxError::unexpected(
                        ",",
                        position,
                        "argument separator outside of a function call",
                    ))
                }
            }
        }
        if let Some(Pending::Func { commas, .. }) = self.stack.last_mut() {
            *commas += 1;
        }

        self.expect_operand = true;
        self.after_open = false;
        Ok(())
    }

    fn operator(&mut self, position: Position) -> Result<(), MatcherSyntaxError> {
        let Some(c) = self.bump() else {
            return Ok(());
        };
        let next = self.peek();

        let binary = match (c, next) {
            ('&', Some('&')) => Some(BinaryOp::And),
            ('|', Some('|')) => Some(BinaryOp::Or),
            ('=', Some('=')) => Some(BinaryOp::Eq),
            ('!', Some('=')) => Some(BinaryOp::Ne),
            ('<', Some('=')) => Some(BinaryOp::Le),
            ('>', Some('=')) => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = binary {
            self.bump();
            return self.binary(Token::new(TokenKind::Binary(op), op.symbol(), position));
        }

        let kind = match c {
            '!' | '+' | '-' if self.expect_operand => {
                let op = match c {
                    '!' => UnaryOp::Not,
                    '+' => UnaryOp::Pos,
                    _ => UnaryOp::Neg,
                };
                return self.unary(Token::new(TokenKind::Unary(op), op.symbol(), position));
            }
            '+' => TokenKind::Binary(BinaryOp::Add),
            '-' => TokenKind::Binary(BinaryOp::Sub),
            '*' => TokenKind::Binary(BinaryOp::Mul),
            '/' => TokenKind::Binary(BinaryOp::Div),
            '<' => TokenKind::Binary(BinaryOp::Lt),
            '>' => TokenKind::Binary(BinaryOp::Gt),
            '=' => {
                return Err(MatcherSyntaxError::unexpected(
                    "=",
                    position,
                    "assignment is not supported, use '=='",
                ))
            }
            other => {
                return Err(MatcherSyntaxError::unexpected(
                    other.to_string(),
                    position,
                    "unexpected character",
                ))
            }
        };
        self.binary(Token::new(kind, c.to_string(), position))
    }

    fn unary(&mut self, token: Token) -> Result<(), MatcherSyntaxError> {
        self.stack.push(Pending::Op(token));
        self.after_open = false;
        Ok(())
    }

    fn binary(&mut self, token: Token) -> Result<(), MatcherSyntaxError> {
        if self.expect_operand {
            return Err(MatcherSyntaxError::unexpected(
                token.to_string(),
                token.position,
                "expected an operand",
            ));
        }

        let precedence = token.precedence();
        while let Some(Pending::Op(top)) = self.stack.last() {
            let top_precedence = top.precedence();
            let pops = top_precedence > precedence
                || (top_precedence == precedence && !top.is_right_assoc());
            if !pops {
                break;
            }
            if let Some(Pending::Op(popped)) = self.stack.pop() {
                self.output.push(popped);
            }
        }

        self.stack.push(Pending::Op(token));
        self.expect_operand = true;
        self.after_open = false;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token>, MatcherSyntaxError> {
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::Op(token) => self.output.push(token),
                Pending::Paren(position) => {
                    return Err(MatcherSyntaxError::unexpected(
                        "(",
                        position,
                        "unclosed parenthesis",
                    ))
                }
                Pending::Func { name, position, .. } => {
                    return Err(MatcherSyntaxError::unexpected(
                        format!("{}(", name),
                        position,
                        "unclosed function call",
                    ))
                }
            }
        }
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpn(source: &str) -> Vec<String> {
        to_postfix(source)
            .unwrap()
            .iter()
            .map(|t| match &t.kind {
                TokenKind::Call { name, arity } => format!("{}/{}", name, arity),
                TokenKind::Unary(op) => format!("u{}", op),
                _ => t.lexeme.clone(),
            })
            .collect()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(rpn("a || b && c"), ["a", "b", "c", "&&", "||"]);
        assert_eq!(rpn("a == b && c == d"), ["a", "b", "==", "c", "d", "==", "&&"]);
        assert_eq!(rpn("1 + 2 * 3 < 7"), ["1", "2", "3", "*", "+", "7", "<"]);
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(rpn("a - b - c"), ["a", "b", "-", "c", "-"]);
        assert_eq!(rpn("a / b * c"), ["a", "b", "/", "c", "*"]);
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(rpn("(a + b) * c"), ["a", "b", "+", "c", "*"]);
        assert_eq!(rpn("((a))"), ["a"]);
    }

    #[test]
    fn test_dotted_access() {
        assert_eq!(rpn("r.sub == p.sub"), ["r", "sub", ".", "p", "sub", ".", "=="]);
        assert_eq!(rpn("r.a.b.c"), ["r", "a", ".", "b", ".", "c", "."]);
    }

    #[test]
    fn test_unary() {
        assert_eq!(rpn("!a && b"), ["a", "u!", "b", "&&"]);
        assert_eq!(rpn("--a"), ["a", "u-", "u-"]);
        assert_eq!(rpn("-r.age + 1"), ["r", "age", ".", "u-", "1", "+"]);
        assert_eq!(rpn("a - -1"), ["a", "1", "u-", "-"]);
        assert_eq!(rpn("!(a || b)"), ["a", "b", "||", "u!"]);
    }

    #[test]
    fn test_calls() {
        assert_eq!(
            rpn("g(r.sub, p.sub) && f()"),
            ["r", "sub", ".", "p", "sub", ".", "g/2", "f/0", "&&"]
        );
        assert_eq!(
            rpn("regex_match?(r.obj, \"^/a\")"),
            ["r", "obj", ".", "\"^/a\"", "regex_match?/2"]
        );
        assert_eq!(rpn("f(g(a), b + c)"), ["a", "g/1", "b", "c", "+", "f/2"]);
        assert_eq!(rpn("f (a)"), ["a", "f/1"]);
    }

    #[test]
    fn test_literals() {
        let tokens = to_postfix("1.5 == \"say \\\"hi\\\"\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number(1.5));
        assert_eq!(tokens[1].kind, TokenKind::Str("say \"hi\"".to_string()));

        let tokens = to_postfix("\"a\\\\b\\n\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str("a\\b\\n".to_string()));
    }

    #[test]
    fn test_positions() {
        let tokens = to_postfix("a ==\n  b").unwrap();
        assert_eq!(tokens[0].position, Position::new(1, 1));
        assert_eq!(tokens[1].position, Position::new(2, 3));
        assert_eq!(tokens[2].position, Position::new(1, 3));
    }

    #[test]
    fn test_errors() {
        let cases = [
            ("a b", "b", Position::new(1, 3)),
            ("a == == b", "==", Position::new(1, 6)),
            ("(a", "(", Position::new(1, 1)),
            ("a)", ")", Position::new(1, 2)),
            ("f(a,)", ")", Position::new(1, 5)),
            ("f(,a)", ",", Position::new(1, 3)),
            ("a, b", ",", Position::new(1, 2)),
            ("\"open", "\"open", Position::new(1, 1)),
            ("a = b", "=", Position::new(1, 3)),
            ("a & b", "&", Position::new(1, 3)),
            ("a ! b", "!", Position::new(1, 3)),
            ("()", ")", Position::new(1, 2)),
            ("12ab", "12", Position::new(1, 1)),
            ("a $ b", "$", Position::new(1, 3)),
            ("f(a", "f(", Position::new(1, 1)),
        ];
        for (source, token, position) in cases {
            let err = to_postfix(source).unwrap_err();
            assert_eq!(err.token(), token, "{}", source);
            assert_eq!(err.position(), position, "{}", source);
        }
    }

    #[test]
    fn test_missing_operand_is_left_to_builder() {
        // Trailing operators are reported by the AST builder with an arity error
        assert_eq!(rpn("r.sub =="), ["r", "sub", ".", "=="]);
        assert!(to_postfix("").unwrap().is_empty());
    }
}
