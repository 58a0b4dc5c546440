use tallyline_core::storage::{PipeSink, PipeSource};
use tallyline_core::{
    AggregateConfig, MemorySource, Row, Table, TableSink, TableSource, TransposeConfig, aggregate,
    transpose_table,
};

fn table(header: &[&str], rows: &[&[&str]]) -> Table {
    Table::new(
        Some(header.iter().map(|h| h.to_string()).collect()),
        rows.iter().map(|r| Row::cells(r.iter().copied())).collect(),
    )
}

fn body(table: &Table) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| match row {
            Row::Separator => vec!["-".to_string()],
            Row::Cells(cells) => cells.clone(),
        })
        .collect()
}

fn expect(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn sales() -> Table {
    table(
        &["Day", "Level", "Quantity"],
        &[
            &["Monday", "30", "11"],
            &["Monday", "25", "3"],
            &["Tuesday", "51", "12"],
        ],
    )
}

#[test]
fn test_mean_and_sum_per_day() {
    let out = aggregate(&sales(), &AggregateConfig::new("Day mean(Level) sum(Quantity)")).unwrap();
    assert_eq!(
        body(&out),
        expect(&[&["Monday", "27.5", "14"], &["Tuesday", "51", "12"]])
    );
}

#[test]
fn test_filter_excludes_monday_thirty() {
    let config = AggregateConfig {
        row_filter: Some("Level > 30".to_string()),
        ..AggregateConfig::new("Day list(Level)")
    };
    let out = aggregate(&sales(), &config).unwrap();
    assert_eq!(body(&out), expect(&[&["Tuesday", "51"]]));

    let config = AggregateConfig {
        row_filter: Some("Level >= 25 && Day != \"Tuesday\"".to_string()),
        ..AggregateConfig::new("Day list(Level)")
    };
    let out = aggregate(&sales(), &config).unwrap();
    assert_eq!(body(&out), expect(&[&["Monday", "30, 25"]]));
}

#[test]
fn test_sum_of_squares() {
    let squares = table(&["X"], &[&["2"], &["3"]]);
    let out = aggregate(&squares, &AggregateConfig::new("sum(X*X) vsum($1^2)")).unwrap();
    assert_eq!(body(&out), expect(&[&["13", "13"]]));
}

#[test]
fn test_commutative_aggregates_ignore_row_order() {
    let specs = "Day sum(Level) mean(Quantity) max(Level) count()";
    let forward = aggregate(&sales(), &AggregateConfig::new(specs)).unwrap();

    let mut reordered = sales();
    reordered.rows.swap(0, 1);
    let backward = aggregate(&reordered, &AggregateConfig::new(specs)).unwrap();
    assert_eq!(body(&forward), body(&backward));

    let lists = aggregate(&reordered, &AggregateConfig::new("Day list(Level)")).unwrap();
    assert_eq!(body(&lists)[0], vec!["Monday", "25, 30"]);
}

#[test]
fn test_separators_partition_like_grouping() {
    let data = table(
        &["Region", "City", "Sales"],
        &[
            &["north", "a", "1"],
            &["south", "b", "2"],
            &["north", "c", "3"],
            &["south", "d", "4"],
            &["east", "e", "5"],
        ],
    );
    let config = AggregateConfig {
        separator_depth: Some(1),
        ..AggregateConfig::new("Region;^a City sum(Sales)")
    };
    let out = aggregate(&data, &config).unwrap();

    let mut blocks: Vec<Vec<String>> = vec![Vec::new()];
    for row in &out.rows {
        match row {
            Row::Separator => blocks.push(Vec::new()),
            Row::Cells(cells) => {
                let block = blocks.last_mut().unwrap();
                if !block.contains(&cells[0]) {
                    block.push(cells[0].clone());
                }
            }
        }
    }
    assert_eq!(blocks, vec![vec!["east"], vec!["north"], vec!["south"]]);

    let by_region = aggregate(&data, &AggregateConfig::new("Region;^a")).unwrap();
    assert_eq!(by_region.rows.len(), blocks.len());
}

#[test]
fn test_stable_sort_keeps_group_order() {
    let out = aggregate(&sales(), &AggregateConfig::new("Day count();^n")).unwrap();
    assert_eq!(body(&out), expect(&[&["Tuesday", "1"], &["Monday", "2"]]));

    let tie = table(&["k", "v"], &[&["b", "1"], &["a", "1"], &["c", "1"]]);
    let out = aggregate(&tie, &AggregateConfig::new("k sum(v);^n")).unwrap();
    let keys: Vec<String> = body(&out).into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(keys, vec!["b", "a", "c"]);
}

#[test]
fn test_transpose_twice_reproduces_content() {
    let data = Table::new(
        None,
        vec![Row::cells(["a", "1", "x"]), Row::cells(["b", "2", "y"])],
    );
    let once = transpose_table(&data, &TransposeConfig::default()).unwrap();
    assert_eq!(
        body(&once),
        expect(&[&["a", "b"], &["1", "2"], &["x", "y"]])
    );
    let twice = transpose_table(&once, &TransposeConfig::default()).unwrap();
    assert_eq!(twice, data);
}

#[test]
fn test_pipe_document_end_to_end() {
    let document = "\
#+NAME: hours
| Who   | Task   | Time |
|-------+--------+------|
| alice | build  | 1:30 |
| bob   | review | 0:45 |
| alice | review | 2:00 |
";
    let source = PipeSource::new(document);
    let input = source.resolve("hours").unwrap();
    let out = aggregate(&input, &AggregateConfig::new("Who;^a sum(Time);'total' sum(Time);U;'hh:mm'")).unwrap();

    let expected = "\
| Who   | total    | hh:mm |
|-------+----------+-------|
| alice | 03:30:00 | 03:30 |
| bob   | 00:45:00 | 00:45 |
";
    assert_eq!(PipeSink.render(&out), expected);
}

#[test]
fn test_memory_source_lookup() {
    let source = MemorySource::new().with_table("sales", sales());
    let input = source.resolve("sales").unwrap();
    let out = aggregate(&input, &AggregateConfig::new("count() sum(Quantity)")).unwrap();
    assert_eq!(body(&out), expect(&[&["3", "26"]]));
}
