//! Group (managerial-unit) filtering.
//!
//! Source spreadsheets often carry pre-aggregated "Total ..." rows baked
//! into the data. Those rows must never enter a group slice, even when the
//! requested group id is literally that text, or aggregates would be
//! double-counted.

use crate::columns::ResolvedColumns;
use crate::table::RawTable;
use std::collections::BTreeSet;

fn is_total_row(value: &str) -> bool {
    value.trim().to_lowercase().starts_with("total")
}

/// Distinct group identifiers present in the table, sorted, with synthetic
/// total rows excluded. Empty when the group column is unresolved.
pub fn unique_groups(table: &RawTable, columns: &ResolvedColumns) -> Vec<String> {
    let Some(group_col) = columns.group.as_deref() else {
        return Vec::new();
    };

    let mut groups = BTreeSet::new();
    for row in 0..table.row_count() {
        let Some(cell) = table.cell(row, group_col) else {
            continue;
        };
        if cell.is_empty() {
            continue;
        }
        let name = cell.display();
        if !is_total_row(&name) {
            groups.insert(name);
        }
    }
    groups.into_iter().collect()
}

/// Row indices belonging to one group, in table order.
///
/// Returns an empty slice when the group column is unresolved or nothing
/// matches. Rows whose group value starts with "total" (any case) are
/// always excluded.
pub fn filter_group(table: &RawTable, columns: &ResolvedColumns, group: &str) -> Vec<usize> {
    let Some(group_col) = columns.group.as_deref() else {
        return Vec::new();
    };

    (0..table.row_count())
        .filter(|&row| {
            table
                .cell(row, group_col)
                .map(|cell| {
                    let name = cell.display();
                    name == group && !is_total_row(&name)
                })
                .unwrap_or(false)
        })
        .collect()
}
