//! Column reference resolution.
//!
//! Positions are 1-based (`$1` is the first column) and position `0` is the
//! block-index pseudo-column `hline`.

use std::collections::BTreeSet;

use tallyline_engine::builtins::{Aggregate, Function};
use tallyline_engine::engine::{BLOCK_NAME, BLOCK_POSITION, Expr, RowFilter, parse_formula};

use crate::error::{Result, TallylineError};
use crate::spec::{ColumnKind, ColumnSpec, RawColumnSpec, split_spec_list, unquote};
use crate::table::Table;

/// A formula with every column reference resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedFormula {
    pub expr: Expr,
    pub positional: String,
    pub positions: BTreeSet<usize>,
}

/// Resolves column references against one table's header and width.
#[derive(Clone, Debug)]
pub struct Resolver {
    header: Option<Vec<String>>,
    width: usize,
}

impl Resolver {
    pub fn new(table: &Table) -> Self {
        Self {
            header: table.header.clone(),
            width: table.width(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Resolve `$N`, `hline`, or a header name (bare or quoted) to a position.
    pub fn resolve_column(&self, name: &str, quoted: bool) -> Result<usize> {
        if !quoted {
            if name == BLOCK_NAME {
                return Ok(BLOCK_POSITION);
            }
            if let Some(digits) = name.strip_prefix('$') {
                let position: usize = digits
                    .parse()
                    .map_err(|_| TallylineError::column(name, "invalid column position"))?;
                if position == 0 || position > self.width {
                    return Err(TallylineError::column(
                        name,
                        format!("position out of range (table has {} columns)", self.width),
                    ));
                }
                return Ok(position);
            }
        }

        let Some(header) = &self.header else {
            return Err(TallylineError::column(
                name,
                "table has no header, use $N to refer to columns",
            ));
        };
        header
            .iter()
            .position(|h| h == name)
            .map(|i| i + 1)
            .ok_or_else(|| TallylineError::column(name, "no such column in the header"))
    }

    /// Parse a formula and resolve every column it names.
    pub fn rewrite_formula(&self, formula: &str) -> Result<ResolvedFormula> {
        let parsed =
            parse_formula(formula).map_err(|e| TallylineError::formula(formula, e.to_string()))?;
        let is_reference = matches!(parsed, Expr::Name { .. });

        let expr = parsed
            .resolve(&mut |name: &str, quoted: bool| self.resolve_column(name, quoted))
            .map_err(|err| match err {
                TallylineError::ColumnResolution { column, message } if !is_reference => {
                    TallylineError::formula(formula, format!("unknown column `{}`: {}", column, message))
                }
                other => other,
            })?;

        Ok(ResolvedFormula {
            positional: expr.to_string(),
            positions: expr.columns(),
            expr,
        })
    }

    /// Build an output column from a parsed spec.
    pub fn column_spec(&self, raw: RawColumnSpec) -> Result<ColumnSpec> {
        let RawColumnSpec {
            formula,
            format,
            sort,
            invisible,
            name,
            ..
        } = raw;

        if format.literal {
            return Ok(ColumnSpec {
                positional_formula: formula.clone(),
                referenced_positions: BTreeSet::new(),
                kind: ColumnKind::Literal,
                formula,
                format,
                sort,
                invisible,
                name,
            });
        }

        let resolved = self.rewrite_formula(&formula)?;
        let kind = match &resolved.expr {
            Expr::Column(position) => ColumnKind::Key(*position),
            Expr::Call {
                function: Function::Aggregate(Aggregate::List),
                args,
            } if args.len() == 1 => match args[0].as_column() {
                Some(position) => ColumnKind::List(position),
                None => ColumnKind::Formula(resolved.expr.clone()),
            },
            expr => ColumnKind::Formula(expr.clone()),
        };

        Ok(ColumnSpec {
            formula,
            format,
            sort,
            invisible,
            name,
            positional_formula: resolved.positional,
            referenced_positions: resolved.positions,
            kind,
        })
    }

    /// Compile a row filter against this table's columns.
    pub fn row_filter(&self, expression: &str) -> Result<RowFilter> {
        RowFilter::compile(expression, |name, quoted| {
            self.resolve_column(name, quoted).ok()
        })
        .map_err(|e| TallylineError::formula(expression, e.to_string()))
    }

    /// Resolve a whitespace-separated column list (transposer input).
    pub fn column_list(&self, list: &str) -> Result<Vec<usize>> {
        split_spec_list(list)?
            .iter()
            .map(|item| match unquote(item) {
                Some(name) => self.resolve_column(name, true),
                None => self.resolve_column(item, false),
            })
            .collect()
    }
}
