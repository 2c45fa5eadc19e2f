//! Trend fitting and short-horizon projection of the group's monthly
//! totals.
//!
//! The model is an ordinary least-squares line over index positions,
//! projected three periods ahead and clamped at zero (stock value cannot
//! go negative). Trend classification compares the slope against ±5% of
//! the mean historical value; confidence is the absolute Pearson
//! correlation of index vs. value, clamped to [0.3, 0.95].

use crate::columns::{month_label, ResolvedColumns};
use crate::groups::filter_group;
use crate::kpis::monthly_totals;
use crate::table::RawTable;
use crate::utils::format_currency_compact;
use serde::{Deserialize, Serialize};

const HORIZON: usize = 3;
const MIN_PERIODS: usize = 3;
const TREND_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Growth,
    Decline,
    Stable,
    Undefined,
}

impl TrendClass {
    /// Portuguese label used by narratives and the summary template.
    pub fn label(self) -> &'static str {
        match self {
            TrendClass::Growth => "crescimento",
            TrendClass::Decline => "redução",
            TrendClass::Stable => "estável",
            TrendClass::Undefined => "indefinida",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub status: ForecastStatus,
    pub message: Option<String>,
    /// Up to three projected totals, chronological, each clamped ≥ 0.
    pub predictions: Vec<f64>,
    pub trend: TrendClass,
    /// Goodness-of-fit estimate in [0.3, 0.95].
    pub confidence: f64,
    pub historical: Vec<f64>,
    pub labels: Vec<String>,
    /// Period labels for the projected values, continuing after `labels`.
    pub projection_labels: Vec<String>,
    pub slope: f64,
    pub narrative: String,
}

impl ForecastResult {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: ForecastStatus::Error,
            message: Some(message.into()),
            predictions: Vec::new(),
            trend: TrendClass::Undefined,
            confidence: 0.3,
            historical: Vec::new(),
            labels: Vec::new(),
            projection_labels: Vec::new(),
            slope: 0.0,
            narrative: String::new(),
        }
    }
}

pub fn forecast(table: &RawTable, columns: &ResolvedColumns, group: &str) -> ForecastResult {
    let rows = filter_group(table, columns, group);
    if rows.is_empty() {
        return ForecastResult::error(format!("Nenhum dado encontrado para a gerência {}", group));
    }

    if columns.value_columns.len() < MIN_PERIODS {
        return ForecastResult::error(
            "Dados insuficientes para análise preditiva (mínimo 3 meses)",
        );
    }

    let series = monthly_totals(table, columns, &rows);
    let values: Vec<f64> = series.iter().map(|m| m.total).collect();
    let labels: Vec<String> = series.iter().map(|m| m.label.clone()).collect();
    let n = values.len();
    let last = values[n - 1];

    if std_dev(&values) < f64::EPSILON {
        // Flat series: the projection is trivially the last value.
        let predictions = vec![last; HORIZON];
        let narrative = interpret(&predictions, last, TrendClass::Stable);
        return ForecastResult {
            status: ForecastStatus::Warning,
            message: Some("Valores constantes detectados - sem variação para análise".into()),
            predictions,
            trend: TrendClass::Stable,
            confidence: 0.3,
            historical: values,
            labels,
            projection_labels: projection_labels(columns),
            slope: 0.0,
            narrative,
        };
    }

    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let (slope, intercept) = least_squares(&xs, &values);

    let predictions: Vec<f64> = (n..n + HORIZON)
        .map(|x| (slope * x as f64 + intercept).max(0.0))
        .collect();

    let mean = mean(&values);
    let relative = slope / (mean + 1e-9);
    let trend = if relative > TREND_THRESHOLD {
        TrendClass::Growth
    } else if relative < -TREND_THRESHOLD {
        TrendClass::Decline
    } else {
        TrendClass::Stable
    };

    let confidence = pearson(&xs, &values)
        .map(|r| r.abs().clamp(0.3, 0.95))
        .unwrap_or(0.5);

    let narrative = interpret(&predictions, last, trend);

    ForecastResult {
        status: ForecastStatus::Success,
        message: None,
        predictions,
        trend,
        confidence,
        historical: values,
        labels,
        projection_labels: projection_labels(columns),
        slope,
        narrative,
    }
}

/// Monthly labels for the projected periods, continuing after the last
/// historical label and wrapping after December.
fn projection_labels(columns: &ResolvedColumns) -> Vec<String> {
    let last = columns
        .value_columns
        .last()
        .map(|col| month_label(col, columns.value_columns.len() - 1))
        .and_then(|l| l.parse::<u32>().ok())
        .unwrap_or(columns.value_columns.len() as u32);
    (1..=HORIZON as u32)
        .map(|i| format!("{:02}", (last + i - 1) % 12 + 1))
        .collect()
}

fn interpret(predictions: &[f64], current: f64, trend: TrendClass) -> String {
    let Some(&final_value) = predictions.last() else {
        return "Não foi possível gerar interpretação.".to_string();
    };
    let change_pct = (final_value - current) / (current.abs() + 1e-9) * 100.0;
    match trend {
        TrendClass::Growth => format!(
            "Tendência de crescimento detectada. Previsão de aumento de {:.1}% (até {}) nos próximos 3 meses.",
            change_pct,
            format_currency_compact(final_value)
        ),
        TrendClass::Decline => format!(
            "Tendência de redução detectada. Previsão de diminuição de {:.1}% (até {}) nos próximos 3 meses.",
            change_pct.abs(),
            format_currency_compact(final_value)
        ),
        _ => format!(
            "Tendência estável. Variação prevista de {:.1}% nos próximos 3 meses.",
            change_pct
        ),
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn least_squares(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mx = mean(xs);
    let my = mean(ys);
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx == 0.0 || n == 0.0 {
        return (0.0, my);
    }
    let slope = sxy / sxx;
    (slope, my - slope * mx)
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let sx = std_dev(xs);
    let sy = std_dev(ys);
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let cov = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / xs.len() as f64;
    Some(cov / (sx * sy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn table_with_values(values: &[[f64; 3]]) -> RawTable {
        let headers = vec![
            "Gerência".to_string(),
            "Material".to_string(),
            "Valor Mês 01".to_string(),
            "Valor Mês 02".to_string(),
            "Valor Mês 03".to_string(),
        ];
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                vec![
                    Cell::Text("Ops".into()),
                    Cell::Text(format!("M{:03}", i + 1)),
                    Cell::Number(v[0]),
                    Cell::Number(v[1]),
                    Cell::Number(v[2]),
                ]
            })
            .collect();
        RawTable::new(headers, rows)
    }

    #[test]
    fn test_growth_series() {
        let table = table_with_values(&[[100.0, 200.0, 300.0]]);
        let cols = ResolvedColumns::resolve(&table);
        let result = forecast(&table, &cols, "Ops");
        assert_eq!(result.status, ForecastStatus::Success);
        assert_eq!(result.trend, TrendClass::Growth);
        assert_eq!(result.predictions.len(), 3);
        // Perfectly linear series: exact projection, maximal confidence.
        assert!((result.slope - 100.0).abs() < 1e-9);
        assert!((result.predictions[0] - 400.0).abs() < 1e-9);
        assert!((result.confidence - 0.95).abs() < 1e-9);
        assert_eq!(result.projection_labels, vec!["04", "05", "06"]);
        assert!(result.narrative.contains("crescimento"));
    }

    #[test]
    fn test_predictions_never_negative() {
        let table = table_with_values(&[[300.0, 150.0, 10.0]]);
        let cols = ResolvedColumns::resolve(&table);
        let result = forecast(&table, &cols, "Ops");
        assert_eq!(result.trend, TrendClass::Decline);
        assert!(result.predictions.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_flat_series_short_circuits() {
        let table = table_with_values(&[[500.0, 500.0, 500.0]]);
        let cols = ResolvedColumns::resolve(&table);
        let result = forecast(&table, &cols, "Ops");
        assert_eq!(result.status, ForecastStatus::Warning);
        assert_eq!(result.trend, TrendClass::Stable);
        assert_eq!(result.predictions, vec![500.0, 500.0, 500.0]);
        assert_eq!(result.projection_labels, vec!["04", "05", "06"]);
    }

    #[test]
    fn test_insufficient_periods() {
        let headers = vec![
            "Gerência".to_string(),
            "Material".to_string(),
            "Valor Mês 01".to_string(),
            "Valor Mês 02".to_string(),
        ];
        let rows = vec![vec![
            Cell::Text("Ops".into()),
            Cell::Text("A".into()),
            Cell::Number(10.0),
            Cell::Number(20.0),
        ]];
        let table = RawTable::new(headers, rows);
        let cols = ResolvedColumns::resolve(&table);
        let result = forecast(&table, &cols, "Ops");
        assert_eq!(result.status, ForecastStatus::Error);
        assert!(result.predictions.is_empty());
        assert_eq!(result.trend, TrendClass::Undefined);
    }

    #[test]
    fn test_empty_group() {
        let table = table_with_values(&[[1.0, 2.0, 3.0]]);
        let cols = ResolvedColumns::resolve(&table);
        let result = forecast(&table, &cols, "QA");
        assert_eq!(result.status, ForecastStatus::Error);
        assert!(result.projection_labels.is_empty());
    }

    #[test]
    fn test_confidence_tighter_for_more_linear_series() {
        let linear = table_with_values(&[[100.0, 200.0, 300.0]]);
        let noisy = table_with_values(&[[100.0, 300.0, 150.0]]);
        let lc = ResolvedColumns::resolve(&linear);
        let nc = ResolvedColumns::resolve(&noisy);
        let conf_linear = forecast(&linear, &lc, "Ops").confidence;
        let conf_noisy = forecast(&noisy, &nc, "Ops").confidence;
        assert!(conf_linear >= conf_noisy);
    }

    #[test]
    fn test_projection_labels_wrap() {
        let headers: Vec<String> = vec![
            "Gerência".into(),
            "Valor Mês 11".into(),
            "Valor Mês 12".into(),
        ];
        let table = RawTable::new(headers, vec![]);
        let cols = ResolvedColumns::resolve(&table);
        assert_eq!(projection_labels(&cols), vec!["01", "02", "03"]);
    }
}
