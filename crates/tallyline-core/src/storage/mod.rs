//! Text-format adapters implementing [`TableSource`](crate::table::TableSource)
//! and [`TableSink`](crate::table::TableSink).

pub mod csv;
pub mod pipe;

pub use csv::{CsvSink, CsvSource};
pub use pipe::{PipeSink, PipeSource};
