//! Pipe tables (`| a | b |`) as written in org and markdown documents.
//!
//! A document may hold several tables; a `#+NAME: x` line directly above a
//! table names it. Rule lines (`|---+---|`, `|---|:--:|`) are separators, and
//! a first row followed by a rule is the header.

use std::path::Path;

use log::debug;
use tallyline_engine::engine::parse_number;

use crate::error::{Result, TallylineError};
use crate::table::{Row, Table, TableSink, TableSource};

#[derive(Clone, Debug)]
struct NamedTable {
    name: Option<String>,
    table: Table,
}

/// Every pipe table found in a document.
#[derive(Clone, Debug, Default)]
pub struct PipeSource {
    tables: Vec<NamedTable>,
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_rule(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("|-")
        || split_cells(line).iter().all(|cell| {
            cell.contains('-') && cell.chars().all(|c| matches!(c, '-' | ':'))
        })
}

fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn name_directive(line: &str) -> Option<&str> {
    let line = line.trim();
    let prefix = line.get(..7)?;
    prefix
        .eq_ignore_ascii_case("#+name:")
        .then(|| line[7..].trim())
        .filter(|name| !name.is_empty())
}

fn build_table(lines: &[&str]) -> Table {
    let mut rows: Vec<Row> = lines
        .iter()
        .map(|line| {
            if is_rule(line) {
                Row::Separator
            } else {
                Row::Cells(split_cells(line))
            }
        })
        .collect();

    let first = rows.iter().position(|r| !r.is_separator()).unwrap_or(rows.len());
    rows.drain(..first);
    while rows.last().is_some_and(Row::is_separator) {
        rows.pop();
    }

    let header = match (rows.first(), rows.get(1)) {
        (Some(Row::Cells(cells)), Some(Row::Separator)) => {
            let header = cells.clone();
            rows.drain(..2);
            Some(header)
        }
        _ => None,
    };
    Table::new(header, rows)
}

impl PipeSource {
    pub fn new(document: &str) -> Self {
        let lines: Vec<&str> = document.lines().collect();
        let mut tables = Vec::new();
        let mut pending_name: Option<String> = None;
        let mut i = 0;

        while i < lines.len() {
            if is_table_line(lines[i]) {
                let start = i;
                while i < lines.len() && is_table_line(lines[i]) {
                    i += 1;
                }
                tables.push(NamedTable {
                    name: pending_name.take(),
                    table: build_table(&lines[start..i]),
                });
                continue;
            }
            match name_directive(lines[i]) {
                Some(name) => pending_name = Some(name.to_string()),
                // Other `#+` keywords may sit between a name and its table.
                None if lines[i].trim_start().starts_with("#+") => {}
                None => pending_name = None,
            }
            i += 1;
        }

        debug!("found {} pipe tables", tables.len());
        Self { tables }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(&content))
    }

    /// Names of the named tables, in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().filter_map(|t| t.name.as_deref())
    }
}

impl TableSource for PipeSource {
    fn resolve(&self, name: &str) -> Result<Table> {
        let found = if name.is_empty() {
            self.tables.first()
        } else {
            self.tables.iter().find(|t| t.name.as_deref() == Some(name))
        };
        found
            .map(|t| t.table.clone())
            .ok_or_else(|| TallylineError::TableNotFound(name.to_string()))
    }
}

/// Renders aligned org-style pipe tables. Numeric cells are right-aligned.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipeSink;

impl TableSink for PipeSink {
    fn render(&self, table: &Table) -> String {
        let width = table.width();
        let mut widths = vec![1usize; width];
        for cells in table.header.as_deref().into_iter().chain(table.data_rows()) {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let rule = format!(
            "|{}|\n",
            widths
                .iter()
                .map(|w| "-".repeat(w + 2))
                .collect::<Vec<_>>()
                .join("+")
        );
        let line = |cells: &[String], align_numbers: bool| {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let cell = cells.get(i).map_or("", String::as_str);
                    if align_numbers && parse_number(cell).is_some() {
                        format!("{:>w$}", cell)
                    } else {
                        format!("{:<w$}", cell)
                    }
                })
                .collect();
            format!("| {} |\n", padded.join(" | "))
        };

        let mut out = String::new();
        if let Some(header) = &table.header {
            out.push_str(&line(header, false));
            out.push_str(&rule);
        }
        for row in &table.rows {
            match row {
                Row::Separator => out.push_str(&rule),
                Row::Cells(cells) => out.push_str(&line(cells, true)),
            }
        }
        out
    }
}
