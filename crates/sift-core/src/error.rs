use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("invalid attribute name: {0}")]
    InvalidAttributeName(String),
    #[error("attribute is managed by the store: {0}")]
    ReadOnlyAttribute(String),
}
