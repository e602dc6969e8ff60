#[cfg(feature = "legacy-oracle")]
mod legacy;
mod parser;
mod safety;
mod scope;
mod select;
mod shadow;
mod source;
mod tree;

use crate::eval::{EvalError, SyntaxError};
use thiserror::Error;

#[cfg(feature = "legacy-oracle")]
pub use legacy::LegacyFilter;
pub use parser::{parse_filter, parse_filter_args, FilterSource, ParsedFilter};
pub use safety::{check_safety, Confirm, SAFETY_PROMPT};
pub use scope::needs_completed_partition;
pub use select::{Filter, FilterSettings, FilterStats};
pub use shadow::{Oracle, Predicate, Shadowed};
pub use source::{MemorySource, TaskSource};
pub use tree::{
    Node, TAG_ATTMOD, TAG_ATTRIBUTE, TAG_ID, TAG_IMPLICIT, TAG_INFIX, TAG_OP, TAG_OPERAND,
    TAG_PATTERN, TAG_ROOT, TAG_TAG, TAG_UUID, TAG_WORD,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("empty tag token")]
    EmptyTag,
    #[error("invalid tag: {0}")]
    InvalidTag(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("unknown attribute modifier: {0}")]
    InvalidModifier(String),
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("missing operand after '{0}'")]
    MissingOperand(String),
    #[error("task ids and uuids cannot be operands of an expression: {0}")]
    SelectorOperand(String),
    #[error("unterminated quote")]
    UnterminatedQuote,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("command has no filter and would modify every task; refusing")]
    SafetyViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    Syntax,
    Eval,
    Safety,
}

impl FilterError {
    pub fn kind(&self) -> FilterErrorKind {
        match self {
            FilterError::Syntax(_) => FilterErrorKind::Syntax,
            FilterError::Eval(_) => FilterErrorKind::Eval,
            FilterError::SafetyViolation => FilterErrorKind::Safety,
        }
    }
}
