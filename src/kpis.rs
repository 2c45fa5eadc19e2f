//! Per-group KPI aggregation and the derived monthly series.

use crate::columns::{month_label, ResolvedColumns};
use crate::groups::filter_group;
use crate::table::RawTable;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    Success,
    NoData,
    Error,
}

/// Headline metrics for one group. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    /// Sum of the most recent monthly value column over the group slice.
    pub current_value: f64,
    /// Consolidated quantity column when resolved, else the sum of all
    /// monthly quantity columns.
    pub total_quantity: i64,
    pub distinct_material_count: usize,
    /// `current_value / max(1, distinct_material_count)`.
    pub average_value_per_material: f64,
    /// Percentage change between the first and last monthly value columns;
    /// 0 when fewer than two columns or the first total is not positive.
    pub period_change_pct: f64,
    pub status: KpiStatus,
}

impl KpiRecord {
    fn zeroed(status: KpiStatus) -> Self {
        Self {
            current_value: 0.0,
            total_quantity: 0,
            distinct_material_count: 0,
            average_value_per_material: 0.0,
            period_change_pct: 0.0,
            status,
        }
    }
}

/// One point of the monthly series: period label "01".."12" plus the
/// group's total for that period. Chronological order is semantically
/// significant; the series is never re-sorted by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub label: String,
    pub total: f64,
}

/// A material and its value total across all monthly value columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaterialTotal {
    pub material: String,
    pub total: f64,
}

pub fn compute_kpis(table: &RawTable, columns: &ResolvedColumns, group: &str) -> KpiRecord {
    let rows = filter_group(table, columns, group);
    if rows.is_empty() {
        return KpiRecord::zeroed(KpiStatus::NoData);
    }

    let value_cols = &columns.value_columns;

    let current_value = match value_cols.last() {
        Some(last) => table.column_sum(&rows, last),
        None => 0.0,
    };

    let total_quantity = match columns.quantity.as_deref() {
        Some(col) => table.column_sum(&rows, col),
        None => columns
            .quantity_columns
            .iter()
            .map(|col| table.column_sum(&rows, col))
            .sum(),
    };

    let distinct_material_count = distinct_materials(table, columns, &rows).len();

    let average_value_per_material = current_value / distinct_material_count.max(1) as f64;

    let mut period_change_pct = 0.0;
    if value_cols.len() >= 2 {
        let first = table.column_sum(&rows, &value_cols[0]);
        let last = table.column_sum(&rows, &value_cols[value_cols.len() - 1]);
        if first > 0.0 {
            period_change_pct = (last - first) / first * 100.0;
        }
    }

    let record = KpiRecord {
        current_value,
        total_quantity: total_quantity.round() as i64,
        distinct_material_count,
        average_value_per_material,
        period_change_pct,
        status: KpiStatus::Success,
    };

    // Numeric failure degrades to a zeroed record instead of escaping.
    if !record.current_value.is_finite()
        || !record.average_value_per_material.is_finite()
        || !record.period_change_pct.is_finite()
    {
        return KpiRecord::zeroed(KpiStatus::Error);
    }
    record
}

/// Per-period totals for the group, one entry per resolved value column,
/// chronologically ordered. Empty when the group slice is empty or no
/// value column resolved.
pub fn monthly_evolution(
    table: &RawTable,
    columns: &ResolvedColumns,
    group: &str,
) -> Vec<MonthlyTotal> {
    let rows = filter_group(table, columns, group);
    if rows.is_empty() {
        return Vec::new();
    }
    monthly_totals(table, columns, &rows)
}

pub(crate) fn monthly_totals(
    table: &RawTable,
    columns: &ResolvedColumns,
    rows: &[usize],
) -> Vec<MonthlyTotal> {
    columns
        .value_columns
        .iter()
        .enumerate()
        .map(|(i, col)| MonthlyTotal {
            label: month_label(col, i),
            total: table.column_sum(rows, col),
        })
        .collect()
}

/// Top `n` materials by value total across all monthly value columns,
/// descending. Ties keep discovery order.
pub fn top_materials(
    table: &RawTable,
    columns: &ResolvedColumns,
    group: &str,
    n: usize,
) -> Vec<MaterialTotal> {
    let rows = filter_group(table, columns, group);
    let mut totals = material_totals(table, columns, &rows);
    totals.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
    totals.truncate(n);
    totals
}

/// Value totals per distinct material, in material-discovery order.
pub(crate) fn material_totals(
    table: &RawTable,
    columns: &ResolvedColumns,
    rows: &[usize],
) -> Vec<MaterialTotal> {
    let Some(material_col) = columns.material.as_deref() else {
        return Vec::new();
    };
    if columns.value_columns.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    for &row in rows {
        if let Some(cell) = table.cell(row, material_col) {
            if cell.is_empty() {
                continue;
            }
            let id = cell.display();
            if seen.insert(id.clone()) {
                order.push(id);
            }
        }
    }

    order
        .into_iter()
        .map(|material| {
            let material_rows: Vec<usize> = rows
                .iter()
                .copied()
                .filter(|&row| {
                    table
                        .cell(row, material_col)
                        .map(|c| c.display() == material)
                        .unwrap_or(false)
                })
                .collect();
            let total = columns
                .value_columns
                .iter()
                .map(|col| table.column_sum(&material_rows, col))
                .sum();
            MaterialTotal { material, total }
        })
        .collect()
}

/// Per-material monthly value series, used by the anomaly detector.
pub(crate) fn material_series(
    table: &RawTable,
    columns: &ResolvedColumns,
    rows: &[usize],
    material_col: &str,
    material: &str,
) -> Vec<f64> {
    let material_rows: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|&row| {
            table
                .cell(row, material_col)
                .map(|c| c.display() == material)
                .unwrap_or(false)
        })
        .collect();
    columns
        .value_columns
        .iter()
        .map(|col| table.column_sum(&material_rows, col))
        .collect()
}

fn distinct_materials(
    table: &RawTable,
    columns: &ResolvedColumns,
    rows: &[usize],
) -> BTreeSet<String> {
    let Some(material_col) = columns.material.as_deref() else {
        return BTreeSet::new();
    };
    rows.iter()
        .filter_map(|&row| table.cell(row, material_col))
        .filter(|cell| !cell.is_empty())
        .map(|cell| cell.display())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn table() -> RawTable {
        let headers = vec![
            "Gerência".to_string(),
            "Material".to_string(),
            "Quantidade".to_string(),
            "Valor Mês 01".to_string(),
            "Valor Mês 02".to_string(),
            "Valor Mês 03".to_string(),
        ];
        let rows = vec![
            vec![
                Cell::Text("Ops".into()),
                Cell::Text("A".into()),
                Cell::Number(100.0),
                Cell::Number(100_000.0),
                Cell::Number(110_000.0),
                Cell::Number(95_000.0),
            ],
            vec![
                Cell::Text("Ops".into()),
                Cell::Text("B".into()),
                Cell::Number(200.0),
                Cell::Number(200_000.0),
                Cell::Number(180_000.0),
                Cell::Number(190_000.0),
            ],
            vec![
                Cell::Text("QA".into()),
                Cell::Text("C".into()),
                Cell::Number(50.0),
                Cell::Number(50_000.0),
                Cell::Number(55_000.0),
                Cell::Number(48_000.0),
            ],
        ];
        RawTable::new(headers, rows)
    }

    #[test]
    fn test_compute_kpis() {
        let table = table();
        let cols = ResolvedColumns::resolve(&table);
        let kpis = compute_kpis(&table, &cols, "Ops");

        assert_eq!(kpis.status, KpiStatus::Success);
        assert!((kpis.current_value - 285_000.0).abs() < 1e-9);
        assert_eq!(kpis.total_quantity, 300);
        assert_eq!(kpis.distinct_material_count, 2);
        assert!((kpis.average_value_per_material - 142_500.0).abs() < 1e-9);
        // (285000 - 300000) / 300000 * 100
        assert!((kpis.period_change_pct - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_average_divisor_floors_at_one() {
        let headers = vec![
            "Gerência".to_string(),
            "Material".to_string(),
            "Valor Mês 01".to_string(),
        ];
        let rows = vec![vec![
            Cell::Text("Ops".into()),
            Cell::Empty,
            Cell::Number(500.0),
        ]];
        let table = RawTable::new(headers, rows);
        let cols = ResolvedColumns::resolve(&table);
        let kpis = compute_kpis(&table, &cols, "Ops");
        assert_eq!(kpis.distinct_material_count, 0);
        assert!((kpis.average_value_per_material - kpis.current_value).abs() < 1e-9);
    }

    #[test]
    fn test_empty_group_is_no_data() {
        let table = table();
        let cols = ResolvedColumns::resolve(&table);
        let kpis = compute_kpis(&table, &cols, "Nonexistent");
        assert_eq!(kpis.status, KpiStatus::NoData);
        assert_eq!(kpis.current_value, 0.0);
        assert_eq!(kpis.total_quantity, 0);
    }

    #[test]
    fn test_monthly_evolution_labels_and_order() {
        let table = table();
        let cols = ResolvedColumns::resolve(&table);
        let series = monthly_evolution(&table, &cols, "Ops");
        let labels: Vec<&str> = series.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["01", "02", "03"]);
        assert!((series[0].total - 300_000.0).abs() < 1e-9);
        assert!((series[2].total - 285_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_materials_descending() {
        let table = table();
        let cols = ResolvedColumns::resolve(&table);
        let top = top_materials(&table, &cols, "Ops", 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].material, "B");
        assert!((top[0].total - 570_000.0).abs() < 1e-9);
        assert_eq!(top[1].material, "A");
    }

    #[test]
    fn test_quantity_falls_back_to_monthly_columns() {
        let headers = vec![
            "Gerência".to_string(),
            "Material".to_string(),
            "Jan_Qtd".to_string(),
            "Fev_Qtd".to_string(),
            "Jan_Valor".to_string(),
            "Fev_Valor".to_string(),
        ];
        let rows = vec![vec![
            Cell::Text("Ops".into()),
            Cell::Text("A".into()),
            Cell::Number(10.0),
            Cell::Number(15.0),
            Cell::Number(1_000.0),
            Cell::Number(1_200.0),
        ]];
        let table = RawTable::new(headers, rows);
        let cols = ResolvedColumns::resolve(&table);
        let kpis = compute_kpis(&table, &cols, "Ops");
        assert_eq!(kpis.total_quantity, 25);
        assert!((kpis.period_change_pct - 20.0).abs() < 1e-9);
    }
}
