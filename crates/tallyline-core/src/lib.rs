//! tallyline-core - column specs, grouping, sorting, transposition and table adapters.

pub mod aggregate;
pub mod error;
pub mod group;
pub mod resolve;
pub mod separator;
pub mod sort;
pub mod spec;
pub mod storage;
pub mod table;
pub mod transpose;

pub use aggregate::{AggregateConfig, TransposeConfig, aggregate, transpose_table};
pub use error::{Result, TallylineError};
pub use table::{MemorySource, Row, Table, TableSink, TableSource};

pub use tallyline_engine::engine::NumericFormatContext;
