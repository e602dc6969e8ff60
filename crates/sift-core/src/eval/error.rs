use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error at offset {offset}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("unresolved identifier: {0}")]
    UnresolvedIdentifier(String),
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("date arithmetic out of range")]
    DateOutOfRange,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("malformed program: {0}")]
    Malformed(&'static str),
}
