//! Formula compile errors.

use thiserror::Error;

/// A formula or filter predicate that could not be compiled.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message} (at offset {offset})")]
pub struct FormulaError {
    pub message: String,
    /// Byte offset into the source text.
    pub offset: usize,
}

impl FormulaError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        FormulaError {
            message: message.into(),
            offset,
        }
    }
}
