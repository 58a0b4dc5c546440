//! The aggregation and transposition pipelines.
//!
//! Every fatal error (spec syntax, column resolution, formula or filter
//! compilation) is raised before the first group is computed.

use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tallyline_engine::engine::{
    NumericFormatContext, ParseMode, RowFilter, SequenceSource, Value, evaluate, format_evaluated,
    parse_cell,
};

use crate::error::{Result, TallylineError};
use crate::group::{Group, group_rows};
use crate::resolve::Resolver;
use crate::separator::separator_positions;
use crate::sort::{SortDirective, order_directives, sort_rows};
use crate::spec::{ColumnKind, ColumnSpec, parse_spec_list};
use crate::table::{Row, Table};
use crate::transpose::transpose;

/// Settings for one aggregation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Whitespace-separated column specs.
    pub column_specs: String,
    pub row_filter: Option<String>,
    /// Number of leading sort directives whose changes start a new block.
    pub separator_depth: Option<usize>,
    pub format: NumericFormatContext,
}

impl AggregateConfig {
    pub fn new(column_specs: impl Into<String>) -> Self {
        Self {
            column_specs: column_specs.into(),
            ..Self::default()
        }
    }
}

/// Settings for one transposition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransposeConfig {
    /// Columns to turn into rows; all columns when absent.
    pub columns: Option<String>,
    pub row_filter: Option<String>,
}

type SequenceCache = FxHashMap<(usize, ParseMode), Vec<Value>>;

/// One group's parsed columns, viewed under a single parse mode.
struct GroupView<'a> {
    cache: &'a SequenceCache,
    mode: ParseMode,
    row_count: usize,
}

impl SequenceSource for GroupView<'_> {
    fn sequence(&self, position: usize) -> &[Value] {
        self.cache
            .get(&(position, self.mode))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn row_count(&self) -> usize {
        self.row_count
    }
}

/// Parse each referenced column of `group` once per parse mode.
fn fill_cache(cache: &mut SequenceCache, group: &Group, spec: &ColumnSpec) {
    let mode = spec.format.parse_mode();
    for &position in &spec.referenced_positions {
        cache.entry((position, mode)).or_insert_with(|| {
            group
                .rows
                .iter()
                .map(|row| parse_cell(&row.cell(position), mode))
                .filter(|value| !value.is_empty())
                .collect()
        });
    }
}

fn compute_row(group: &Group, specs: &[ColumnSpec], ctx: &NumericFormatContext) -> Vec<String> {
    let mut cache = SequenceCache::default();
    specs
        .iter()
        .map(|spec| match &spec.kind {
            ColumnKind::Key(position) => group
                .rows
                .first()
                .map(|row| row.cell(*position))
                .unwrap_or_default(),
            ColumnKind::Literal => spec.formula.clone(),
            ColumnKind::List(position) => group
                .rows
                .iter()
                .map(|row| row.cell(*position))
                .collect::<Vec<_>>()
                .join(", "),
            ColumnKind::Formula(expr) => {
                fill_cache(&mut cache, group, spec);
                let view = GroupView {
                    cache: &cache,
                    mode: spec.format.parse_mode(),
                    row_count: group.rows.len(),
                };
                let result = evaluate(expr, &view, spec.format.angle_mode(ctx));
                format_evaluated(&result, &spec.format, ctx)
            }
        })
        .collect()
}

fn compile_filter(resolver: &Resolver, expression: Option<&str>) -> Result<Option<RowFilter>> {
    expression
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| resolver.row_filter(e))
        .transpose()
}

/// Group `table` by its key columns and compute one output row per group.
pub fn aggregate(table: &Table, config: &AggregateConfig) -> Result<Table> {
    let raw = parse_spec_list(&config.column_specs)?;
    if raw.is_empty() {
        return Err(TallylineError::spec(&config.column_specs, "no column specs given"));
    }

    let resolver = Resolver::new(table);
    let specs = raw
        .into_iter()
        .map(|raw| resolver.column_spec(raw))
        .collect::<Result<Vec<_>>>()?;
    let filter = compile_filter(&resolver, config.row_filter.as_deref())?;

    let mut keys: Vec<usize> = Vec::new();
    for position in specs.iter().filter_map(ColumnSpec::key_position) {
        if !keys.contains(&position) {
            keys.push(position);
        }
    }
    debug!(
        "{} column specs, key columns {:?}: {:?}",
        specs.len(),
        keys,
        specs.iter().map(|s| s.positional_formula.as_str()).collect::<Vec<_>>()
    );

    let groups = group_rows(table, &keys, filter.as_ref());
    let rows: Vec<Vec<String>> = groups
        .iter()
        .map(|group| compute_row(group, &specs, &config.format))
        .collect();

    let directives = order_directives(
        specs
            .iter()
            .enumerate()
            .filter_map(|(column, spec)| {
                spec.sort.map(|sort| SortDirective {
                    strength: sort.strength,
                    column,
                    descending: sort.descending,
                    key: sort.key,
                })
            })
            .collect(),
    );
    debug!("sort directives: {:?}", directives);
    let rows = sort_rows(rows, &directives);
    let separators = separator_positions(&rows, &directives, config.separator_depth.unwrap_or(0));

    let visible: Vec<usize> = specs
        .iter()
        .enumerate()
        .filter(|(_, spec)| !spec.invisible)
        .map(|(i, _)| i)
        .collect();
    let header = visible.iter().map(|&i| specs[i].header().to_string()).collect();

    let mut out = Vec::with_capacity(rows.len() + separators.len());
    // Positions come back ascending, so one pass interleaves them.
    let mut separators = separators.into_iter().peekable();
    for (i, mut row) in rows.into_iter().enumerate() {
        if separators.next_if_eq(&i).is_some() {
            out.push(Row::Separator);
        }
        out.push(Row::Cells(
            visible.iter().map(|&c| std::mem::take(&mut row[c])).collect(),
        ));
    }
    Ok(Table::new(Some(header), out))
}

/// Transpose `table` after resolving the configured column list and filter.
pub fn transpose_table(table: &Table, config: &TransposeConfig) -> Result<Table> {
    let resolver = Resolver::new(table);
    let columns = match config.columns.as_deref() {
        Some(list) if !list.trim().is_empty() => resolver.column_list(list)?,
        _ => (1..=resolver.width()).collect(),
    };
    let filter = compile_filter(&resolver, config.row_filter.as_deref())?;
    Ok(transpose(table, &columns, filter.as_ref()))
}
