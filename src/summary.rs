//! Executive-summary composition.
//!
//! A summary is produced by any [`SummaryGenerator`] (the OpenAI-backed one
//! lives behind the `openai` feature) with a deterministic template fallback,
//! so callers always receive text. The result records its provenance so
//! downstream consumers can tell generated prose from the template.

use crate::error::Result;
use crate::kpis::MaterialTotal;
use crate::utils::{format_currency, format_integer};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

/// Everything a generator needs to write a summary for one group.
///
/// Derives `JsonSchema` so the payload contract can be handed to an LLM
/// verbatim via [`SummaryPayload::schema_as_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryPayload {
    /// Group the summary describes.
    pub group: String,
    /// Period labels aligned with `monthly_totals`.
    pub monthly_labels: Vec<String>,
    /// Aggregate value per period, chronological.
    pub monthly_totals: Vec<f64>,
    /// Most recent period's aggregate value.
    pub current_value: f64,
    /// Distinct materials in the group.
    pub material_count: usize,
    /// Total quantity in stock across the group.
    pub total_quantity: i64,
    /// Highest-value material and its accumulated value, when any.
    pub top_material: Option<MaterialTotal>,
    pub anomaly_count: usize,
    pub recommendation_count: usize,
}

impl SummaryPayload {
    /// JSON Schema for the payload, pretty-printed.
    pub fn schema_as_json() -> Result<String> {
        let schema = schema_for!(SummaryPayload);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

/// Where a summary's text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SummarySource {
    Generated { model: String },
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Success,
    NoData,
}

/// Structured metrics reported alongside the narrative, so consumers never
/// have to parse numbers back out of the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub current_value: f64,
    pub material_count: usize,
    pub total_quantity: i64,
    pub top_material: Option<MaterialTotal>,
    /// Qualitative trend label over the monthly totals.
    pub trend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub status: SummaryStatus,
    pub text: String,
    #[serde(flatten)]
    pub source: SummarySource,
    pub metrics: SummaryMetrics,
}

/// A text generator for group summaries.
pub trait SummaryGenerator {
    /// Whether the generator can currently serve requests.
    fn is_available(&self) -> bool;

    /// Model identifier reported in [`SummarySource::Generated`].
    fn model(&self) -> &str;

    fn generate(&self, payload: &SummaryPayload) -> Result<String>;
}

/// Compose a summary, preferring `generator` and falling back to the
/// deterministic template on unavailability or error. Never fails.
pub fn summarize(payload: &SummaryPayload, generator: Option<&dyn SummaryGenerator>) -> SummaryResult {
    let status = if payload.monthly_totals.is_empty() {
        SummaryStatus::NoData
    } else {
        SummaryStatus::Success
    };
    let metrics = metrics_from(payload);

    if let Some(gen) = generator {
        if gen.is_available() {
            match gen.generate(payload) {
                Ok(text) => {
                    return SummaryResult {
                        status,
                        text,
                        source: SummarySource::Generated {
                            model: gen.model().to_string(),
                        },
                        metrics,
                    }
                }
                Err(e) => {
                    log::warn!(
                        "summary generation failed for '{}', using template: {}",
                        payload.group,
                        e
                    );
                }
            }
        }
    }
    SummaryResult {
        status,
        text: template_summary(payload),
        source: SummarySource::Template,
        metrics,
    }
}

fn metrics_from(payload: &SummaryPayload) -> SummaryMetrics {
    SummaryMetrics {
        current_value: payload.current_value,
        material_count: payload.material_count,
        total_quantity: payload.total_quantity,
        top_material: payload.top_material.clone(),
        trend: qualitative_trend(&payload.monthly_totals).to_string(),
    }
}

/// Qualitative trend over the monthly totals: mean of the last three
/// periods against the prior mean, with a ±10% dead band.
fn qualitative_trend(totals: &[f64]) -> &'static str {
    if totals.is_empty() {
        return "indefinida";
    }
    let (recent, prior) = recent_vs_prior(totals);
    if recent > prior * 1.1 {
        "crescimento"
    } else if recent < prior * 0.9 {
        "redução"
    } else {
        "estável"
    }
}

fn recent_vs_prior(totals: &[f64]) -> (f64, f64) {
    let recent_start = totals.len().saturating_sub(3);
    let recent = slice_mean(&totals[recent_start..]);
    let prior = if recent_start == 0 {
        recent
    } else {
        slice_mean(&totals[..recent_start])
    };
    (recent, prior)
}

/// Deterministic Portuguese summary built only from the payload.
pub fn template_summary(payload: &SummaryPayload) -> String {
    if payload.monthly_totals.is_empty() {
        return format!(
            "Não há dados suficientes para resumir a gerência {}.",
            payload.group
        );
    }

    let totals = &payload.monthly_totals;
    let (recent, prior) = recent_vs_prior(totals);

    let trend = if recent > prior * 1.1 {
        "tendência de crescimento do excesso"
    } else if recent < prior * 0.9 {
        "tendência de redução do excesso"
    } else {
        "estabilidade no nível de excesso"
    };

    let volume = if payload.current_value > 1_000_000.0 {
        "um volume financeiro elevado"
    } else if payload.current_value > 100_000.0 {
        "um volume financeiro moderado"
    } else {
        "um volume financeiro controlado"
    };

    // Always between two and three steps, most urgent first.
    let mut steps = vec!["revisar os materiais de maior valor acumulado"];
    if recent > prior * 1.1 {
        steps.push("restringir novas compras até normalização");
    } else if recent < prior * 0.9 {
        steps.push("manter a política atual de escoamento");
    }
    if payload.current_value > 1_000_000.0 {
        steps.push("agendar auditoria do estoque");
    }
    steps.push("revisar políticas de compra e estoque");
    steps.truncate(3);

    let top = match &payload.top_material {
        Some(t) => format!(
            " Material de maior impacto: {} ({} acumulado).",
            t.material,
            format_currency(t.total)
        ),
        None => String::new(),
    };

    format!(
        "A gerência {} apresenta {} ao longo de {} períodos, com {} ({} no período atual) \
         distribuído entre {} materiais e {} unidades em estoque.{} Próximos passos: {}.",
        payload.group,
        trend,
        totals.len(),
        volume,
        format_currency(payload.current_value),
        format_integer(payload.material_count as i64),
        format_integer(payload.total_quantity),
        top,
        steps.join("; ")
    )
}

fn slice_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    fn payload(totals: Vec<f64>) -> SummaryPayload {
        let labels = (1..=totals.len()).map(|m| format!("{:02}", m)).collect();
        let current = totals.last().copied().unwrap_or(0.0);
        SummaryPayload {
            group: "Ops".to_string(),
            monthly_labels: labels,
            monthly_totals: totals,
            current_value: current,
            material_count: 4,
            total_quantity: 120,
            top_material: Some(MaterialTotal {
                material: "Bomba".to_string(),
                total: 900.0,
            }),
            anomaly_count: 0,
            recommendation_count: 2,
        }
    }

    struct FailingGenerator;

    impl SummaryGenerator for FailingGenerator {
        fn is_available(&self) -> bool {
            true
        }
        fn model(&self) -> &str {
            "test-model"
        }
        fn generate(&self, _payload: &SummaryPayload) -> Result<String> {
            Err(AnalysisError::ExternalUnavailable("down".to_string()))
        }
    }

    struct EchoGenerator;

    impl SummaryGenerator for EchoGenerator {
        fn is_available(&self) -> bool {
            true
        }
        fn model(&self) -> &str {
            "echo-1"
        }
        fn generate(&self, payload: &SummaryPayload) -> Result<String> {
            Ok(format!("resumo de {}", payload.group))
        }
    }

    #[test]
    fn test_template_on_empty_series() {
        let result = summarize(&payload(vec![]), None);
        assert_eq!(result.status, SummaryStatus::NoData);
        assert_eq!(result.source, SummarySource::Template);
        assert!(result.text.contains("Não há dados suficientes"));
        assert_eq!(result.metrics.trend, "indefinida");
    }

    #[test]
    fn test_result_carries_structured_metrics() {
        let result = summarize(&payload(vec![100.0, 100.0, 100.0, 300.0, 300.0, 300.0]), None);
        assert_eq!(result.status, SummaryStatus::Success);
        assert!((result.metrics.current_value - 300.0).abs() < 1e-9);
        assert_eq!(result.metrics.material_count, 4);
        assert_eq!(result.metrics.total_quantity, 120);
        assert_eq!(
            result.metrics.top_material.as_ref().map(|t| t.material.as_str()),
            Some("Bomba")
        );
        assert_eq!(result.metrics.trend, "crescimento");
    }

    #[test]
    fn test_template_lists_at_least_two_steps() {
        // Stable trend, modest value: the floor is still two steps.
        let text = template_summary(&payload(vec![50_000.0, 50_000.0, 50_000.0]));
        let steps = text.rsplit("Próximos passos: ").next().unwrap();
        assert!(steps.trim_end_matches('.').split("; ").count() >= 2);
        assert!(text.contains("revisar políticas de compra e estoque"));
    }

    #[test]
    fn test_template_caps_steps_at_three() {
        let mut p = payload(vec![100.0, 100.0, 100.0, 300.0, 300.0, 300.0]);
        p.current_value = 2_000_000.0;
        let text = template_summary(&p);
        let steps = text.rsplit("Próximos passos: ").next().unwrap();
        assert_eq!(steps.trim_end_matches('.').split("; ").count(), 3);
    }

    #[test]
    fn test_template_detects_growth() {
        let text = template_summary(&payload(vec![100.0, 100.0, 100.0, 300.0, 300.0, 300.0]));
        assert!(text.contains("tendência de crescimento"));
        assert!(text.contains("restringir novas compras"));
        assert!(text.contains("Material de maior impacto: Bomba"));
        assert!(text.contains("120 unidades"));
    }

    #[test]
    fn test_template_detects_reduction() {
        let text = template_summary(&payload(vec![300.0, 300.0, 300.0, 100.0, 100.0, 100.0]));
        assert!(text.contains("tendência de redução"));
    }

    #[test]
    fn test_template_stable_short_series() {
        // With three periods or fewer, recent equals prior and reads stable.
        let text = template_summary(&payload(vec![100.0, 110.0, 105.0]));
        assert!(text.contains("estabilidade"));
    }

    #[test]
    fn test_generator_failure_falls_back_to_template() {
        let result = summarize(&payload(vec![100.0, 200.0, 300.0]), Some(&FailingGenerator));
        assert_eq!(result.source, SummarySource::Template);
        assert!(result.text.contains("Ops"));
    }

    #[test]
    fn test_generator_success_records_model() {
        let result = summarize(&payload(vec![100.0, 200.0, 300.0]), Some(&EchoGenerator));
        assert_eq!(
            result.source,
            SummarySource::Generated {
                model: "echo-1".to_string()
            }
        );
        assert_eq!(result.text, "resumo de Ops");
    }

    #[test]
    fn test_payload_schema_includes_fields() {
        let schema = SummaryPayload::schema_as_json().unwrap();
        assert!(schema.contains("monthly_totals"));
        assert!(schema.contains("material_count"));
        assert!(schema.contains("top_material"));
    }
}
