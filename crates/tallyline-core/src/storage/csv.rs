//! CSV tables

use std::path::Path;

use tallyline_engine::engine::parse_number;

use crate::error::{Result, TallylineError};
use crate::table::{Row, Table, TableSink, TableSource};

/// A CSV document holding one unnamed table.
#[derive(Clone, Debug)]
pub struct CsvSource {
    table: Table,
}

impl CsvSource {
    /// Parse CSV text. Blank lines are skipped.
    pub fn new(content: &str, has_header: bool) -> Result<Self> {
        let mut rows = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            rows.push(parse_csv_line(line).map_err(|message| TallylineError::Parse {
                line: index + 1,
                message,
            })?);
        }

        let header = if has_header && !rows.is_empty() {
            Some(rows.remove(0))
        } else {
            None
        };
        Ok(Self {
            table: Table::new(header, rows.into_iter().map(Row::Cells).collect()),
        })
    }

    pub fn from_path(path: &Path, has_header: bool) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::new(&content, has_header)
    }
}

impl TableSource for CsvSource {
    fn resolve(&self, name: &str) -> Result<Table> {
        if name.is_empty() {
            Ok(self.table.clone())
        } else {
            Err(TallylineError::TableNotFound(name.to_string()))
        }
    }
}

/// Parse a single CSV line, handling quoted fields
pub(crate) fn parse_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    let finish = |current: &mut String, quoted: bool| {
        let field = std::mem::take(current);
        if quoted { field } else { field.trim().to_string() }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    fields.push(finish(&mut current, field_was_quoted));
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(finish(&mut current, field_was_quoted));
    Ok(fields)
}

/// Escape a field for CSV output
pub(crate) fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps; numbers pass.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '+' | '-' | '@'))
        && parse_number(field.trim()).is_none()
    {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}

/// Writes tables as CSV. Separator rows have no CSV form and are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvSink;

impl TableSink for CsvSink {
    fn render(&self, table: &Table) -> String {
        let line = |cells: &[String]| {
            cells
                .iter()
                .map(|c| escape_csv_field(c))
                .collect::<Vec<_>>()
                .join(",")
        };

        let mut out = String::new();
        for cells in table.header.as_deref().into_iter().chain(table.data_rows()) {
            out.push_str(&line(cells));
            out.push('\n');
        }
        out
    }
}
