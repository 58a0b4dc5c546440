//! Multi-key stable sorting of output rows.

use std::cmp::Ordering;

use tallyline_engine::engine::{Value, parse_date, parse_duration, parse_number};

/// How a sort key is read from a rendered cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Alphabetic,
    Numeric,
    /// Dates and durations, compared in seconds.
    Time,
}

/// A typed key extracted from a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
}

impl SortKey {
    pub fn extract(self, text: &str) -> SortValue {
        let text = text.trim();
        match self {
            SortKey::Alphabetic => SortValue::Text(text.to_string()),
            SortKey::Numeric => SortValue::Number(parse_number(text).unwrap_or(0.0)),
            SortKey::Time => {
                let seconds = match parse_date(text) {
                    Some(date @ Value::Date { .. }) => date.as_f64().map(|days| days * 86_400.0),
                    _ => parse_duration(text),
                };
                SortValue::Number(seconds.unwrap_or(0.0))
            }
        }
    }
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        }
    }
}

/// Sort instruction attached to one output column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortDirective {
    /// Lower sorts first; `None` after every explicit strength.
    pub strength: Option<u32>,
    /// Output column index.
    pub column: usize,
    pub descending: bool,
    pub key: SortKey,
}

impl SortDirective {
    pub fn compare(&self, a: &SortValue, b: &SortValue) -> Ordering {
        let ordering = a.compare(b);
        if self.descending { ordering.reverse() } else { ordering }
    }
}

/// Order directives by precedence: strength ascending, absent strengths
/// last, column index as the final tie-break.
pub fn order_directives(mut directives: Vec<SortDirective>) -> Vec<SortDirective> {
    directives.sort_by_key(|d| (d.strength.is_none(), d.strength, d.column));
    directives
}

/// Rendered cell access for rows being sorted.
pub trait CellText {
    fn cell_text(&self, column: usize) -> &str;
}

impl CellText for Vec<String> {
    fn cell_text(&self, column: usize) -> &str {
        self.get(column).map_or("", String::as_str)
    }
}

/// Extract every directive's key from a row.
pub fn extract_keys<T: CellText>(row: &T, directives: &[SortDirective]) -> Vec<SortValue> {
    directives
        .iter()
        .map(|d| d.key.extract(row.cell_text(d.column)))
        .collect()
}

/// Stable sort; rows equal under every directive keep their input order.
/// `directives` must already be in precedence order.
pub fn sort_rows<T: CellText>(rows: Vec<T>, directives: &[SortDirective]) -> Vec<T> {
    if directives.is_empty() {
        return rows;
    }
    let mut keyed: Vec<(Vec<SortValue>, T)> = rows
        .into_iter()
        .map(|row| (extract_keys(&row, directives), row))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        directives
            .iter()
            .zip(a.iter().zip(b))
            .map(|(d, (x, y))| d.compare(x, y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    keyed.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows<const N: usize>(data: &[[&str; N]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn directive(column: usize, key: SortKey, descending: bool, strength: Option<u32>) -> SortDirective {
        SortDirective {
            strength,
            column,
            descending,
            key,
        }
    }

    #[test]
    fn test_order_directives() {
        let ordered = order_directives(vec![
            directive(0, SortKey::Alphabetic, false, None),
            directive(3, SortKey::Numeric, false, Some(2)),
            directive(1, SortKey::Numeric, false, Some(1)),
            directive(2, SortKey::Numeric, false, Some(1)),
        ]);
        let columns: Vec<usize> = ordered.iter().map(|d| d.column).collect();
        assert_eq!(columns, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_numeric_sort_is_stable() {
        let data = rows(&[["a", "2"], ["b", "1"], ["c", "2"], ["d", "x"]]);
        let sorted = sort_rows(data, &[directive(1, SortKey::Numeric, false, None)]);
        let names: Vec<&str> = sorted.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_descending_and_tie_break_order() {
        let data = rows(&[["x", "1"], ["y", "2"], ["x", "2"], ["y", "1"]]);
        let by_name_then_num = sort_rows(
            data.clone(),
            &[
                directive(0, SortKey::Alphabetic, false, None),
                directive(1, SortKey::Numeric, true, None),
            ],
        );
        assert_eq!(by_name_then_num, rows(&[["x", "2"], ["x", "1"], ["y", "2"], ["y", "1"]]));

        let by_num_then_name = sort_rows(
            data,
            &[
                directive(1, SortKey::Numeric, true, None),
                directive(0, SortKey::Alphabetic, false, None),
            ],
        );
        assert_eq!(by_num_then_name, rows(&[["x", "2"], ["y", "2"], ["x", "1"], ["y", "1"]]));
    }

    #[test]
    fn test_time_keys() {
        assert_eq!(SortKey::Time.extract("01:30:00"), SortValue::Number(5400.0));
        assert_eq!(SortKey::Time.extract("1970-01-02"), SortValue::Number(86_400.0));
        assert_eq!(SortKey::Time.extract("soon"), SortValue::Number(0.0));

        let data = rows(&[["2024-02-01"], ["2023-12-31 23:00"], ["2024-01-15"]]);
        let sorted = sort_rows(data, &[directive(0, SortKey::Time, false, None)]);
        assert_eq!(sorted, rows(&[["2023-12-31 23:00"], ["2024-01-15"], ["2024-02-01"]]));
    }
}
