//! Domain errors raised by dataset transforms.
//!
//! Command handlers wrap these in `anyhow` with file context; library callers
//! can match on the variants directly.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("Dataset has no header row")]
    EmptyHeader,

    #[error("Column '{0}' not found in header")]
    MissingColumn(String),

    #[error("No row has '{key}' in key column '{key_column}'")]
    UnknownKey { key: String, key_column: String },

    #[error("Rule for '{key}' references unknown column '{column}'")]
    UnknownColumn { key: String, column: String },

    #[error("Key '{key}' matches {count} rows; refusing to pick one")]
    DuplicateKey { key: String, count: usize },
}
