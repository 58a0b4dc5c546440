//! Row/column transposition.

use log::debug;
use tallyline_engine::engine::{BLOCK_NAME, BLOCK_POSITION, RowFilter};

use crate::table::{Row, Table};

enum Source<'a> {
    Data { cells: &'a [String], block: usize },
    Separator,
}

fn read(cells: &[String], position: usize, block: usize) -> String {
    if position == BLOCK_POSITION {
        return block.to_string();
    }
    cells.get(position - 1).cloned().unwrap_or_default()
}

/// Turn each selected column into a row. Every accepted source row becomes a
/// column, a source separator becomes an empty column, and the header (when
/// present) becomes the first column. A selected column that is empty in
/// every accepted data row comes out as a separator. The result has no header.
pub fn transpose(table: &Table, columns: &[usize], filter: Option<&RowFilter>) -> Table {
    let mut block = 0;
    let mut sources = Vec::new();
    for row in &table.rows {
        match row {
            Row::Separator => {
                block += 1;
                sources.push(Source::Separator);
            }
            Row::Cells(cells) => {
                if filter.is_none_or(|f| f.accepts(cells, block)) {
                    sources.push(Source::Data {
                        cells: cells.as_slice(),
                        block,
                    });
                }
            }
        }
    }

    let rows: Vec<Row> = columns
        .iter()
        .map(|&position| {
            let mut empty = true;
            let mut out = Vec::with_capacity(sources.len() + 1);
            if let Some(header) = &table.header {
                out.push(if position == BLOCK_POSITION {
                    BLOCK_NAME.to_string()
                } else {
                    header.get(position - 1).cloned().unwrap_or_default()
                });
            }
            for source in &sources {
                match source {
                    Source::Separator => out.push(String::new()),
                    Source::Data { cells, block } => {
                        let cell = read(cells, position, *block);
                        empty &= cell.trim().is_empty();
                        out.push(cell);
                    }
                }
            }
            if empty { Row::Separator } else { Row::Cells(out) }
        })
        .collect();

    debug!(
        "transposed {} columns across {} source rows",
        columns.len(),
        sources.len()
    );
    Table::new(None, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(row: &Row) -> Vec<&str> {
        row.as_cells()
            .map(|c| c.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_header_becomes_first_column() {
        let table = Table::new(
            Some(vec!["Day".into(), "Level".into()]),
            vec![Row::cells(["Monday", "30"]), Row::Separator, Row::cells(["Tuesday", "51"])],
        );
        let out = transpose(&table, &[1, 2], None);
        assert!(out.header.is_none());
        assert_eq!(cells(&out.rows[0]), vec!["Day", "Monday", "", "Tuesday"]);
        assert_eq!(cells(&out.rows[1]), vec!["Level", "30", "", "51"]);
    }

    #[test]
    fn test_empty_column_becomes_separator() {
        let table = Table::new(None, vec![Row::cells(["a", "", "1"]), Row::cells(["b", " ", "2"])]);
        let out = transpose(&table, &[1, 2, 3], None);
        assert_eq!(out.rows[1], Row::Separator);
        assert_eq!(cells(&out.rows[2]), vec!["1", "2"]);
    }

    #[test]
    fn test_block_index_row() {
        let table = Table::new(
            Some(vec!["x".into()]),
            vec![Row::cells(["a"]), Row::Separator, Row::cells(["b"])],
        );
        let out = transpose(&table, &[0], None);
        assert_eq!(cells(&out.rows[0]), vec!["hline", "0", "", "1"]);
    }

    #[test]
    fn test_filter_and_reorder() {
        let table = Table::new(None, vec![Row::cells(["a", "1"]), Row::cells(["b", "5"])]);
        let filter = RowFilter::compile("$2 > 2", |name, _| (name == "$2").then_some(2)).unwrap();
        let out = transpose(&table, &[2, 1], Some(&filter));
        assert_eq!(cells(&out.rows[0]), vec!["5"]);
        assert_eq!(cells(&out.rows[1]), vec!["b"]);
    }

    #[test]
    fn test_transpose_twice_restores_rows() {
        let table = Table::new(None, vec![Row::cells(["a", "1"]), Row::cells(["b", "2"])]);
        let once = transpose(&table, &[1, 2], None);
        let twice = transpose(&once, &[1, 2], None);
        assert_eq!(twice, table);
    }
}
