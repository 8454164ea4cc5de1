use std::fmt;
use thiserror::Error;

/// A 1-based line/column location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const START: Position = Position { line: 1, col: 1 };

    pub fn new(line: usize, col: usize) -> Self {
        Position { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Model configuration text could not be parsed or failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("config syntax error at {line}:{col}: {reason}")]
pub struct ConfigSyntaxError {
    pub reason: String,
    pub line: usize,
    pub col: usize,
}

impl ConfigSyntaxError {
    pub fn new(reason: impl Into<String>, position: Position) -> Self {
        ConfigSyntaxError {
            reason: reason.into(),
            line: position.line,
            col: position.col,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }
}

/// Matcher expression could not be compiled
///
/// No partially usable program is ever produced when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherSyntaxError {
    #[error("unexpected '{token}' at {position}: {reason}")]
    UnexpectedToken {
        token: String,
        position: Position,
        reason: String,
    },

    #[error("'{token}' at {position} expects {expected} operand(s), found {found}")]
    ArityMismatch {
        token: String,
        position: Position,
        expected: usize,
        found: usize,
    },

    #[error("expression nested deeper than {limit} levels at '{token}' ({position})")]
    TooDeep {
        token: String,
        position: Position,
        limit: usize,
    },
}

impl MatcherSyntaxError {
    pub fn unexpected(
        token: impl Into<String>,
        position: Position,
        reason: impl Into<String>,
    ) -> Self {
        MatcherSyntaxError::UnexpectedToken {
            token: token.into(),
            position,
            reason: reason.into(),
        }
    }

    /// Source text of the offending token
    pub fn token(&self) -> &str {
        match self {
            MatcherSyntaxError::UnexpectedToken { token, .. }
            | MatcherSyntaxError::ArityMismatch { token, .. }
            | MatcherSyntaxError::TooDeep { token, .. } => token,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            MatcherSyntaxError::UnexpectedToken { position, .. }
            | MatcherSyntaxError::ArityMismatch { position, .. }
            | MatcherSyntaxError::TooDeep { position, .. } => *position,
        }
    }
}

/// Failure while executing a compiled matcher against one environment
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("undefined attribute '{attr}' on '{path}'")]
    UndefinedAttribute { path: String, attr: String },

    #[error("undefined function {name}/{arity}")]
    UndefinedFunction { name: String, arity: usize },

    #[error("type error in '{op}': {detail}")]
    TypeError { op: String, detail: String },

    #[error("arithmetic error in '{op}': {detail}")]
    ArithmeticError { op: String, detail: String },

    #[error("function {name} failed: {reason}")]
    FunctionFailed { name: String, reason: String },

    #[error("operand stack underflow at instruction {0}")]
    StackUnderflow(usize),
}

impl EvalError {
    pub fn type_error(op: impl Into<String>, detail: impl Into<String>) -> Self {
        EvalError::TypeError {
            op: op.into(),
            detail: detail.into(),
        }
    }
}

/// Model text parsed but does not describe a usable model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigSyntaxError),

    #[error("missing section [{0}]")]
    MissingSection(&'static str),

    #[error("invalid [{section}] entry '{key}': {reason}")]
    InvalidDefinition {
        section: &'static str,
        key: String,
        reason: String,
    },

    #[error("unsupported policy effect: {0}")]
    UnsupportedEffect(String),

    #[error("invalid matcher: {0}")]
    Matcher(#[from] MatcherSyntaxError),
}

#[derive(Error, Debug)]
pub enum EnforcerError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("request has {found} value(s), request definition expects {expected}")]
    RequestArity { expected: usize, found: usize },

    #[error("policy '{key}' has {found} value(s), definition expects {expected}")]
    PolicyArity {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown policy definition: {0}")]
    UnknownPolicyKey(String),

    #[error("unknown role definition: {0}")]
    UnknownRoleDefinition(String),

    #[error("invalid policy effect '{0}' (must be allow or deny)")]
    InvalidEffect(String),

    #[error("model source not set")]
    MissingModel,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ConfigSyntaxError> for EnforcerError {
    fn from(err: ConfigSyntaxError) -> Self {
        EnforcerError::Model(ModelError::Config(err))
    }
}

impl From<MatcherSyntaxError> for EnforcerError {
    fn from(err: MatcherSyntaxError) -> Self {
        EnforcerError::Model(ModelError::Matcher(err))
    }
}

pub type Result<T> = std::result::Result<T, EnforcerError>;
