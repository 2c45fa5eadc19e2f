//! Rule-based prescriptive recommendations.
//!
//! Three rule families run over the group slice: stock-reduction for the
//! highest-value materials (priority split at the 80th percentile of all
//! per-material totals), trend control (recent three-period mean vs. the
//! prior mean) and an audit trigger when the most recent period's total
//! crosses the high-value threshold.

use crate::columns::ResolvedColumns;
use crate::forecast::mean;
use crate::groups::filter_group;
use crate::kpis::{material_totals, monthly_totals};
use crate::table::RawTable;
use crate::utils::format_currency;
use serde::{Deserialize, Serialize};

const TOP_MATERIALS: usize = 5;
const PRIORITY_PERCENTILE: f64 = 80.0;
const AUDIT_THRESHOLD: f64 = 1_000_000.0;
const DECLINE_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ReduceStock,
    GrowthControl,
    MaintainStrategy,
    Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptiveStatus {
    Success,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    /// Material the action targets, when material-specific.
    pub material: Option<String>,
    pub action: String,
    pub rationale: String,
    /// Estimated financial impact of following the action, ≥ 0.
    pub estimated_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub status: PrescriptiveStatus,
    pub recommendations: Vec<Recommendation>,
    pub total_estimated_impact: f64,
    pub interpretation: String,
}

pub fn recommend(table: &RawTable, columns: &ResolvedColumns, group: &str) -> RecommendationReport {
    let rows = filter_group(table, columns, group);
    if rows.is_empty() {
        return RecommendationReport {
            status: PrescriptiveStatus::NoData,
            recommendations: Vec::new(),
            total_estimated_impact: 0.0,
            interpretation: "Nenhum dado encontrado.".to_string(),
        };
    }

    let mut recommendations = Vec::new();

    // Stock reduction for the highest-value materials.
    let totals = material_totals(table, columns, &rows);
    if !totals.is_empty() {
        let values: Vec<f64> = totals.iter().map(|t| t.total).collect();
        let p80 = if values.len() >= 2 {
            percentile(&values, PRIORITY_PERCENTILE)
        } else {
            values.iter().cloned().fold(f64::MIN, f64::max)
        };

        let mut ranked = totals.clone();
        ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));

        for entry in ranked.into_iter().take(TOP_MATERIALS) {
            if entry.total <= 0.0 {
                continue;
            }
            let priority = if entry.total >= p80 {
                Priority::High
            } else {
                Priority::Medium
            };
            let factor = if priority == Priority::High { 0.3 } else { 0.2 };
            recommendations.push(Recommendation {
                kind: RecommendationKind::ReduceStock,
                priority,
                material: Some(entry.material.clone()),
                action: format!("Priorizar redução do estoque de {}", entry.material),
                rationale: format!(
                    "Material de alto impacto (acumulado: {}). Considerar remanejamento ou liquidação.",
                    format_currency(entry.total)
                ),
                estimated_impact: entry.total * factor,
            });
        }
    }

    // Recent-trend control: mean of the last 3 periods vs. the prior mean.
    let series = monthly_totals(table, columns, &rows);
    if series.len() >= 3 {
        let values: Vec<f64> = series.iter().map(|m| m.total).collect();
        let recent = mean(&values[values.len() - 3..]);
        let prior_slice = &values[..values.len() - 3];
        let prior = if prior_slice.is_empty() {
            0.0
        } else {
            mean(prior_slice)
        };
        let delta = recent - prior;

        if delta > 0.0 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::GrowthControl,
                priority: Priority::Medium,
                material: None,
                action: "Implementar controles para reduzir crescimento do estoque".to_string(),
                rationale: format!(
                    "Tendência de crescimento detectada (Δ ≈ {}). Revisar políticas de compra.",
                    format_currency(delta)
                ),
                estimated_impact: delta.max(0.0) * 0.5,
            });
        } else if prior > 0.0 && (prior - recent) / prior > DECLINE_RATIO {
            recommendations.push(Recommendation {
                kind: RecommendationKind::MaintainStrategy,
                priority: Priority::Low,
                material: None,
                action: "Manter estratégia atual de redução".to_string(),
                rationale: "Tendência positiva de redução (>10% vs. período anterior)."
                    .to_string(),
                estimated_impact: delta.abs(),
            });
        }
    }

    // Audit trigger on the most recent period's total.
    if let Some(last) = columns.value_columns.last() {
        let current = table.column_sum(&rows, last);
        if current > AUDIT_THRESHOLD {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Audit,
                priority: Priority::High,
                material: None,
                action: "Realizar auditoria completa do estoque".to_string(),
                rationale: format!(
                    "Valor atual elevado ({}). Auditoria pode identificar oportunidades.",
                    format_currency(current)
                ),
                estimated_impact: current * 0.15,
            });
        }
    }

    let total_estimated_impact = recommendations.iter().map(|r| r.estimated_impact).sum();
    let interpretation = interpret(&recommendations);

    RecommendationReport {
        status: PrescriptiveStatus::Success,
        recommendations,
        total_estimated_impact,
        interpretation,
    }
}

/// Linear-interpolated percentile over an unsorted sample, numpy
/// `percentile` semantics.
fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

fn interpret(recommendations: &[Recommendation]) -> String {
    if recommendations.is_empty() {
        return "Nenhuma recomendação específica gerada. Situação aparenta estar sob controle."
            .to_string();
    }
    let high = recommendations
        .iter()
        .filter(|r| r.priority == Priority::High)
        .count();
    if high > 0 {
        format!(
            "Geradas {} recomendações, sendo {} de alta prioridade (ação imediata).",
            recommendations.len(),
            high
        )
    } else {
        format!(
            "Geradas {} recomendações para otimização contínua do estoque.",
            recommendations.len()
        )
    }
}
