//! Numeric-expression engine API.
//!
//! - [`Value`], [`parse_cell`] - typed cell values and cell-text parsing
//! - [`parse_formula`], [`Expr`] - formula language and its typed tree
//! - [`evaluate`], [`SequenceSource`] - per-group interpretation
//! - [`OutputFormat`], [`format_value`] - per-column rendering
//! - [`RowFilter`] - Rhai row predicates

mod ast;
mod error;
mod eval;
mod filter;
mod format;
mod lexer;
mod parser;
mod value;

pub use ast::{BLOCK_NAME, BLOCK_POSITION, BinaryOp, Expr};
pub use error::FormulaError;
pub use eval::{Evaluated, SequenceSource, evaluate};
pub use filter::RowFilter;
pub use format::{
    AngleMode, DurationStyle, FloatStyle, NumericFormatContext, OutputFormat, Printf,
    format_evaluated, format_number, format_value,
};
pub use lexer::{Spanned, Token, tokenize};
pub use parser::parse_formula;
pub(crate) use value::symbolic_operand;
pub use value::{ParseMode, Value, parse_cell, parse_date, parse_duration, parse_number};
