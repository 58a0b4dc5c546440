//! Table model and host capabilities.

use crate::error::{Result, TallylineError};

/// One source or result row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Row {
    /// Horizontal rule between blocks.
    Separator,
    Cells(Vec<String>),
}

impl Row {
    pub fn cells<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Row {
        Row::Cells(cells.into_iter().map(Into::into).collect())
    }

    pub fn as_cells(&self) -> Option<&[String]> {
        match self {
            Row::Cells(cells) => Some(cells),
            Row::Separator => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Row::Separator)
    }
}

/// A table: optional header plus body rows. The rule that conventionally
/// follows a header is implied by `header` and never stored in `rows`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Option<Vec<String>>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    /// Number of columns: the widest of the header and every data row.
    pub fn width(&self) -> usize {
        let header = self.header.as_ref().map_or(0, Vec::len);
        self.rows
            .iter()
            .filter_map(Row::as_cells)
            .map(<[String]>::len)
            .fold(header, usize::max)
    }

    /// Data rows only, separators skipped.
    pub fn data_rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().filter_map(Row::as_cells)
    }
}

/// Looks up a named table in whatever document the host holds.
pub trait TableSource {
    /// Resolve `name`; an empty name selects the first table.
    fn resolve(&self, name: &str) -> Result<Table>;
}

/// Renders a result table back into the host's text format.
pub trait TableSink {
    fn render(&self, table: &Table) -> String;
}

/// Named tables held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    tables: Vec<(String, Table)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, table: Table) -> Self {
        self.insert(name, table);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        let name = name.into();
        match self.tables.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = table,
            None => self.tables.push((name, table)),
        }
    }
}

impl TableSource for MemorySource {
    fn resolve(&self, name: &str) -> Result<Table> {
        let found = if name.is_empty() {
            self.tables.first()
        } else {
            self.tables.iter().find(|(n, _)| n == name)
        };
        found
            .map(|(_, table)| table.clone())
            .ok_or_else(|| TallylineError::TableNotFound(name.to_string()))
    }
}
