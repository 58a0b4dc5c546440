//! Block separators between sorted output rows.

use crate::sort::{CellText, SortDirective, SortValue, extract_keys};

/// Indices of the rows that need a separator in front of them: wherever the
/// keys of the first `depth` directives change between neighbours. `depth` is
/// clamped to the number of directives.
pub fn separator_positions<T: CellText>(
    rows: &[T],
    directives: &[SortDirective],
    depth: usize,
) -> Vec<usize> {
    let depth = depth.min(directives.len());
    if depth == 0 {
        return Vec::new();
    }
    let major = &directives[..depth];

    let keys: Vec<Vec<SortValue>> = rows.iter().map(|row| extract_keys(row, major)).collect();
    keys.windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] != pair[1])
        .map(|(i, _)| i + 1)
        .collect()
}
