//! Partitioning of source rows into groups by key columns.

use log::{debug, trace};
use rustc_hash::FxHashMap;
use tallyline_engine::engine::{BLOCK_POSITION, RowFilter};

use crate::table::{Row, Table};

/// A source row together with the index of the block it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupedRow {
    pub cells: Vec<String>,
    pub block: usize,
}

impl GroupedRow {
    /// Cell text at a 1-based position; `hline` reads the block index.
    pub fn cell(&self, position: usize) -> String {
        if position == BLOCK_POSITION {
            return self.block.to_string();
        }
        self.cells.get(position - 1).cloned().unwrap_or_default()
    }
}

/// Rows sharing one key tuple, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub key: Vec<String>,
    pub rows: Vec<GroupedRow>,
}

/// Incremental grouper. Groups come out in first-occurrence order.
pub struct Grouper<'a> {
    keys: Vec<usize>,
    filter: Option<&'a RowFilter>,
    index: FxHashMap<Vec<String>, usize>,
    groups: Vec<Group>,
}

impl<'a> Grouper<'a> {
    pub fn new(keys: Vec<usize>, filter: Option<&'a RowFilter>) -> Self {
        Self {
            keys,
            filter,
            index: FxHashMap::default(),
            groups: Vec::new(),
        }
    }

    /// Add one row. Returns `false` when the filter discarded it.
    pub fn add_row(&mut self, cells: Vec<String>, block: usize) -> bool {
        if self.filter.is_some_and(|filter| !filter.accepts(&cells, block)) {
            trace!("row discarded by filter: {:?}", cells);
            return false;
        }

        let row = GroupedRow { cells, block };
        let key: Vec<String> = self.keys.iter().map(|&p| row.cell(p)).collect();
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.groups.len();
                self.index.insert(key.clone(), slot);
                self.groups.push(Group {
                    key,
                    rows: Vec::new(),
                });
                slot
            }
        };
        self.groups[slot].rows.push(row);
        true
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }
}

/// Group every data row of `table`. The block index starts at 0 and grows by
/// one per separator. Without key columns there is always exactly one group,
/// even when no row survives the filter.
pub fn group_rows(table: &Table, keys: &[usize], filter: Option<&RowFilter>) -> Vec<Group> {
    let mut grouper = Grouper::new(keys.to_vec(), filter);
    let mut block = 0;
    let mut discarded = 0usize;

    for row in &table.rows {
        match row {
            Row::Separator => block += 1,
            Row::Cells(cells) => {
                if !grouper.add_row(cells.clone(), block) {
                    discarded += 1;
                }
            }
        }
    }

    let mut groups = grouper.into_groups();
    if keys.is_empty() && groups.is_empty() {
        groups.push(Group {
            key: Vec::new(),
            rows: Vec::new(),
        });
    }
    debug!(
        "grouped on {:?}: {} groups, {} rows discarded",
        keys,
        groups.len(),
        discarded
    );
    groups
}
