//! tallyline_engine - value model, formula language, aggregates and row filters.

pub mod builtins;
pub mod engine;

#[cfg(test)]
mod tests {
    use crate::engine::*;

    struct Group {
        columns: Vec<Vec<Value>>,
    }

    impl SequenceSource for Group {
        fn sequence(&self, position: usize) -> &[Value] {
            self.columns.get(position).map(Vec::as_slice).unwrap_or(&[])
        }

        fn row_count(&self) -> usize {
            self.columns.iter().map(Vec::len).max().unwrap_or(0)
        }
    }

    fn group(columns: Vec<Vec<&str>>) -> Group {
        Group {
            columns: columns
                .into_iter()
                .map(|cells| {
                    cells
                        .into_iter()
                        .map(|c| parse_cell(c, ParseMode::default()))
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .collect(),
        }
    }

    fn compile(formula: &str) -> Expr {
        parse_formula(formula)
            .unwrap()
            .resolve(&mut |name: &str, _quoted: bool| -> Result<usize, String> {
                match name {
                    "hline" => Ok(0),
                    "Day" | "$1" => Ok(1),
                    "Level" | "$2" => Ok(2),
                    "Quantity" | "$3" => Ok(3),
                    other => Err(other.to_string()),
                }
            })
            .unwrap()
    }

    fn run(formula: &str, group: &Group, segment: &str) -> String {
        let format = OutputFormat::parse(segment).unwrap();
        let ctx = NumericFormatContext::default();
        let result = evaluate(&compile(formula), group, format.angle_mode(&ctx));
        format_evaluated(&result, &format, &ctx)
    }

    #[test]
    fn test_positional_rendering() {
        assert_eq!(compile("vsum(Level*Level)").to_string(), "sum($2*$2)");
        assert_eq!(compile("mean('Quantity') + hline").to_string(), "mean($3)+hline");
        assert_eq!(compile("$1").as_column(), Some(1));
        assert_eq!(compile("sum(Level) / count()").columns().into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_unresolved_name_is_an_error() {
        let result = parse_formula("sum(Nope)")
            .unwrap()
            .resolve(&mut |name: &str, _quoted: bool| -> Result<usize, String> {
                Err(name.to_string())
            });
        assert_eq!(result.unwrap_err(), "Nope");
    }

    #[test]
    fn test_monday_group() {
        let monday = group(vec![vec!["0", "0"], vec!["Monday", "Monday"], vec!["30", "25"], vec!["11", "3"]]);
        assert_eq!(run("mean(Level)", &monday, ""), "27.5");
        assert_eq!(run("sum(Quantity)", &monday, ""), "14");
        assert_eq!(run("count()", &monday, ""), "2");
        assert_eq!(run("sum(Level*Quantity)", &monday, ""), "405");
        assert_eq!(run("meane(Level)", &monday, "f1"), "27.5 +/- 2.5");
    }

    #[test]
    fn test_duration_sums() {
        let times = group(vec![vec![], vec!["1:30", "0:45", ""]]);
        assert_eq!(run("sum(Day)", &times, ""), "02:15:00");
        assert_eq!(run("sum(Day)", &times, "U"), "02:15");
        assert_eq!(run("sum(Day)", &times, "t"), "2.25");
        assert_eq!(run("mean(Day)", &times, ""), "01:07:30");
    }

    #[test]
    fn test_date_arithmetic() {
        let dates = group(vec![vec![], vec!["2024-01-01", "2024-01-11"]]);
        assert_eq!(run("span(Day)", &dates, ""), "10");
        assert_eq!(run("max(Day)", &dates, ""), "2024-01-11");
        assert_eq!(run("min(Day) + 3", &dates, ""), "2024-01-04");
    }

    #[test]
    fn test_symbolic_text() {
        let names = group(vec![vec![], vec!["apple", "pear"]]);
        assert_eq!(run("sum(Day)", &names, ""), "apple + pear");
        assert_eq!(run("Day", &names, ""), "[apple, pear]");
    }

    #[test]
    fn test_numbers_only_mode() {
        let format = OutputFormat::parse("N").unwrap();
        let mode = format.parse_mode();
        let values: Vec<Value> = ["3", "x", "4"]
            .iter()
            .map(|c| parse_cell(c, mode))
            .collect();
        let group = Group {
            columns: vec![Vec::new(), values],
        };
        assert_eq!(run("sum(Day)", &group, "N"), "7");
        assert_eq!(run("mean(Day)", &group, "N"), "2.33333333333");
    }
}
