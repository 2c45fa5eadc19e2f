//! Statistical anomaly detection over the group slice.
//!
//! Two detectors run per group: a z-score test over each material's
//! monthly value series (z > 2 flags, z > 3 escalates severity) and a
//! sudden-growth test over the aggregate monthly totals (> 50% jump flags,
//! > 100% escalates). A zero-variance material series never flags; the
//! division is guarded, not merely avoided.

use crate::columns::{month_label, ResolvedColumns};
use crate::forecast::{mean, std_dev};
use crate::groups::filter_group;
use crate::kpis::{material_series, material_totals, monthly_totals};
use crate::table::RawTable;
use serde::{Deserialize, Serialize};

const Z_FLAG: f64 = 2.0;
const Z_HIGH: f64 = 3.0;
const GROWTH_FLAG_PCT: f64 = 50.0;
const GROWTH_HIGH_PCT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Success,
    InsufficientData,
    NoData,
}

/// A single detected anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// One material's monthly value sits more than two standard deviations
    /// from that material's own mean.
    OutlierValue {
        material: String,
        period: String,
        value: f64,
        expected: f64,
        deviation_pct: f64,
        severity: Severity,
    },
    /// The aggregate total jumped more than 50% between consecutive
    /// periods.
    SuddenGrowth {
        period_prev: String,
        period_curr: String,
        value_prev: f64,
        value_curr: f64,
        growth_pct: f64,
        severity: Severity,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub status: AnomalyStatus,
    pub anomalies: Vec<Anomaly>,
    pub interpretation: String,
}

impl AnomalyReport {
    fn empty(status: AnomalyStatus, interpretation: impl Into<String>) -> Self {
        Self {
            status,
            anomalies: Vec::new(),
            interpretation: interpretation.into(),
        }
    }
}

pub fn detect(table: &RawTable, columns: &ResolvedColumns, group: &str) -> AnomalyReport {
    let rows = filter_group(table, columns, group);
    if rows.is_empty() {
        return AnomalyReport::empty(AnomalyStatus::NoData, "Nenhum dado encontrado.");
    }

    if columns.value_columns.len() < 3 {
        return AnomalyReport::empty(
            AnomalyStatus::InsufficientData,
            "Dados insuficientes para detecção robusta de anomalias.",
        );
    }

    let mut anomalies = Vec::new();

    // Per-material outliers, in material-discovery order.
    if let Some(material_col) = columns.material.as_deref() {
        for entry in material_totals(table, columns, &rows) {
            let series = material_series(table, columns, &rows, material_col, &entry.material);
            let mu = mean(&series);
            let sigma = std_dev(&series);
            if sigma <= 0.0 {
                continue;
            }
            for (i, &value) in series.iter().enumerate() {
                let z = (value - mu).abs() / sigma;
                if z > Z_FLAG {
                    anomalies.push(Anomaly::OutlierValue {
                        material: entry.material.clone(),
                        period: month_label(&columns.value_columns[i], i),
                        value,
                        expected: mu,
                        deviation_pct: (value - mu) / (mu.abs() + 1e-9) * 100.0,
                        severity: if z > Z_HIGH {
                            Severity::High
                        } else {
                            Severity::Medium
                        },
                    });
                }
            }
        }
    }

    // Sudden growth over the aggregate series, chronological.
    let totals = monthly_totals(table, columns, &rows);
    for pair in totals.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.total <= 0.0 {
            continue;
        }
        let growth_pct = (curr.total - prev.total) / prev.total * 100.0;
        if growth_pct > GROWTH_FLAG_PCT {
            anomalies.push(Anomaly::SuddenGrowth {
                period_prev: prev.label.clone(),
                period_curr: curr.label.clone(),
                value_prev: prev.total,
                value_curr: curr.total,
                growth_pct,
                severity: if growth_pct > GROWTH_HIGH_PCT {
                    Severity::High
                } else {
                    Severity::Medium
                },
            });
        }
    }

    let interpretation = interpret(&anomalies);
    AnomalyReport {
        status: AnomalyStatus::Success,
        anomalies,
        interpretation,
    }
}

fn severity_of(anomaly: &Anomaly) -> Severity {
    match anomaly {
        Anomaly::OutlierValue { severity, .. } | Anomaly::SuddenGrowth { severity, .. } => {
            *severity
        }
    }
}

fn interpret(anomalies: &[Anomaly]) -> String {
    if anomalies.is_empty() {
        return "Nenhuma anomalia significativa detectada nos dados.".to_string();
    }
    let high = anomalies
        .iter()
        .filter(|a| severity_of(a) == Severity::High)
        .count();
    let medium = anomalies.len() - high;

    let mut parts = vec![format!("Detectadas {} anomalias", anomalies.len())];
    if high > 0 {
        parts.push(format!("{} de alta severidade", high));
    }
    if medium > 0 {
        parts.push(format!("{} de média severidade", medium));
    }
    format!("{}.", parts.join(", "))
}
