//! Error types for tallyline core.

use thiserror::Error;

/// Errors that can occur while aggregating or transposing a table
#[derive(Error, Debug)]
pub enum TallylineError {
    #[error("Invalid column spec `{spec}`: {message}")]
    SpecSyntax { spec: String, message: String },

    #[error("Unknown column `{column}`: {message}")]
    ColumnResolution { column: String, message: String },

    #[error("Cannot compile `{formula}`: {message}")]
    FormulaCompile { formula: String, message: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl TallylineError {
    pub(crate) fn spec(spec: &str, message: impl Into<String>) -> Self {
        TallylineError::SpecSyntax {
            spec: spec.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn column(column: &str, message: impl Into<String>) -> Self {
        TallylineError::ColumnResolution {
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn formula(formula: &str, message: impl Into<String>) -> Self {
        TallylineError::FormulaCompile {
            formula: formula.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TallylineError>;
