//! Per-group analysis orchestration.
//!
//! [`ExcessStockAnalyzer`] resolves the table's columns once and runs the
//! full pipeline (KPIs, forecast, anomalies, recommendations, summary) for
//! each group independently, so one group's bad data never blocks another.

use crate::anomaly::{self, AnomalyReport};
use crate::columns::ResolvedColumns;
use crate::error::{AnalysisError, Result};
use crate::forecast::{self, ForecastResult};
use crate::groups::{filter_group, unique_groups};
use crate::kpis::{compute_kpis, monthly_evolution, top_materials, KpiRecord, MaterialTotal, MonthlyTotal};
use crate::prescriptive::{self, RecommendationReport};
use crate::summary::{summarize, SummaryGenerator, SummaryPayload, SummaryResult};
use crate::table::RawTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const TOP_MATERIALS: usize = 10;

/// Runtime configuration for the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// API key for the summary model; `None` keeps summaries template-only.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    /// Upper bound on any single summary request.
    pub timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            timeout: Duration::from_secs(30),
        }
    }
}

impl AnalyzerConfig {
    /// Read `OPENAI_API_KEY` and `OPENAI_MODEL` from the environment,
    /// keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Success,
    NoData,
}

/// Full analysis bundle for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAnalysis {
    pub group: String,
    pub timestamp: DateTime<Utc>,
    pub status: GroupStatus,
    pub kpis: KpiRecord,
    pub monthly_series: Vec<MonthlyTotal>,
    pub top_materials: Vec<MaterialTotal>,
    pub forecast: ForecastResult,
    pub anomalies: AnomalyReport,
    pub recommendations: RecommendationReport,
    pub summary: SummaryResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllGroupsAnalysis {
    pub timestamp: DateTime<Utc>,
    /// Groups in the order they were analyzed (sorted).
    pub groups: Vec<String>,
    pub analyses: BTreeMap<String, GroupAnalysis>,
}

pub struct ExcessStockAnalyzer {
    generator: Option<Box<dyn SummaryGenerator>>,
}

impl ExcessStockAnalyzer {
    /// Build an analyzer from configuration. With the `openai` feature
    /// enabled and an API key present this wires up the OpenAI generator;
    /// otherwise summaries come from the template.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        #[cfg(feature = "openai")]
        if let Some(key) = config.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            let client = crate::llm::OpenAiClient::with_options(
                key.clone(),
                config.model.clone(),
                config.temperature,
                config.timeout,
            )?;
            return Ok(Self {
                generator: Some(Box::new(client)),
            });
        }

        #[cfg(not(feature = "openai"))]
        if config.api_key.is_some() {
            log::warn!("API key configured but the 'openai' feature is disabled; summaries use the template");
        }

        let _ = config;
        Ok(Self { generator: None })
    }

    /// Analyzer with a caller-supplied summary generator.
    pub fn with_generator(generator: Box<dyn SummaryGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Analyzer that only ever uses the template summary.
    pub fn template_only() -> Self {
        Self { generator: None }
    }

    /// Analyze a single group against already-resolved columns.
    pub fn analyze_group(
        &self,
        table: &RawTable,
        columns: &ResolvedColumns,
        group: &str,
    ) -> GroupAnalysis {
        let timestamp = Utc::now();
        let rows = filter_group(table, columns, group);
        if rows.is_empty() {
            log::debug!("group '{}' has no analyzable rows", group);
        }
        let status = if rows.is_empty() {
            GroupStatus::NoData
        } else {
            GroupStatus::Success
        };

        let kpis = compute_kpis(table, columns, group);
        let monthly_series = monthly_evolution(table, columns, group);
        let top = top_materials(table, columns, group, TOP_MATERIALS);
        let forecast = forecast::forecast(table, columns, group);
        let anomalies = anomaly::detect(table, columns, group);
        let recommendations = prescriptive::recommend(table, columns, group);

        let payload = SummaryPayload {
            group: group.to_string(),
            monthly_labels: monthly_series.iter().map(|m| m.label.clone()).collect(),
            monthly_totals: monthly_series.iter().map(|m| m.total).collect(),
            current_value: kpis.current_value,
            material_count: kpis.distinct_material_count,
            total_quantity: kpis.total_quantity,
            top_material: top.first().cloned(),
            anomaly_count: anomalies.anomalies.len(),
            recommendation_count: recommendations.recommendations.len(),
        };
        let summary = summarize(&payload, self.generator.as_deref());

        log::info!(
            "analyzed group '{}': {} rows, current value {:.2}",
            group,
            rows.len(),
            kpis.current_value
        );

        GroupAnalysis {
            group: group.to_string(),
            timestamp,
            status,
            kpis,
            monthly_series,
            top_materials: top,
            forecast,
            anomalies,
            recommendations,
            summary,
        }
    }

    /// Analyze every group in the table.
    ///
    /// Fails only when required columns cannot be resolved; per-group
    /// degradation is recorded inside each [`GroupAnalysis`] instead.
    pub fn analyze_all(&self, table: &RawTable) -> Result<AllGroupsAnalysis> {
        let columns = ResolvedColumns::resolve(table);
        if !columns.is_analyzable() {
            return Err(AnalysisError::MissingColumns(
                columns.missing_roles().join(", "),
            ));
        }

        let groups = unique_groups(table, &columns);
        log::info!("analyzing {} groups", groups.len());

        let mut analyses = BTreeMap::new();
        for group in &groups {
            let analysis = self.analyze_group(table, &columns, group);
            analyses.insert(group.clone(), analysis);
        }

        Ok(AllGroupsAnalysis {
            timestamp: Utc::now(),
            groups,
            analyses,
        })
    }
}
