//! # Excess Stock Analyzer
//!
//! A library for turning raw excess-inventory spreadsheets (CSV exports with
//! one row per material and one value column per month) into per-group
//! analytics: KPIs, monthly evolution, trend forecasts, anomaly flags,
//! prescriptive recommendations and an executive summary.
//!
//! ## Core Concepts
//!
//! - **Raw table**: headers plus typed cells, loaded from CSV with tolerant
//!   numeric parsing (Brazilian formats like `1.234,56` included)
//! - **Column resolution**: role columns (group, material, area, quantity)
//!   are found by alias, monthly value/quantity columns by header patterns
//! - **Group**: one management unit (`Gerência`); every analysis runs per
//!   group, with synthetic `Total*` rows excluded
//! - **Degradation over failure**: thin or empty groups produce records with
//!   explicit statuses instead of errors; only unresolvable required columns
//!   abort a run
//!
//! ## Example
//!
//! ```rust,ignore
//! use excess_stock_analyzer::*;
//!
//! let table = RawTable::from_csv_path("estoque.csv")?;
//! let analyzer = ExcessStockAnalyzer::new(AnalyzerConfig::from_env())?;
//! let report = analyzer.analyze_all(&table)?;
//!
//! for (group, analysis) in &report.analyses {
//!     println!("{}: {}", group, analysis.summary.text);
//! }
//! ```

pub mod analyzer;
pub mod anomaly;
pub mod columns;
pub mod error;
pub mod forecast;
pub mod groups;
pub mod kpis;
pub mod prescriptive;
pub mod summary;
pub mod table;
pub mod utils;

#[cfg(feature = "openai")]
pub mod llm;

pub use analyzer::{
    AllGroupsAnalysis, AnalyzerConfig, ExcessStockAnalyzer, GroupAnalysis, GroupStatus,
};
pub use anomaly::{Anomaly, AnomalyReport, AnomalyStatus, Severity};
pub use columns::ResolvedColumns;
pub use error::{AnalysisError, Result};
pub use forecast::{ForecastResult, ForecastStatus, TrendClass};
pub use groups::unique_groups;
pub use kpis::{KpiRecord, KpiStatus, MaterialTotal, MonthlyTotal};
pub use prescriptive::{
    Priority, Recommendation, RecommendationKind, RecommendationReport,
};
pub use summary::{
    SummaryGenerator, SummaryMetrics, SummaryPayload, SummaryResult, SummarySource, SummaryStatus,
};
pub use table::{Cell, RawTable};

/// Analyze a table end to end with template-only summaries.
pub fn analyze_table(table: &RawTable) -> Result<AllGroupsAnalysis> {
    ExcessStockAnalyzer::template_only().analyze_all(table)
}

/// Load a CSV file and analyze it with template-only summaries.
pub fn analyze_csv_path<P: AsRef<std::path::Path>>(path: P) -> Result<AllGroupsAnalysis> {
    let table = RawTable::from_csv_path(path)?;
    analyze_table(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
Gerência,Material,Quantidade,Valor Mês 01,Valor Mês 02,Valor Mês 03
Ops,Bomba Centrífuga,100,\"50000\",\"55000\",\"60000\"
Ops,Válvula,50,\"30000\",\"28000\",\"27000\"
QA,Sensor,20,\"5000\",\"4800\",\"4500\"
Total Geral,,170,\"85000\",\"87800\",\"91500\"
";

    #[test]
    fn test_end_to_end_from_csv() {
        let table = RawTable::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let report = analyze_table(&table).unwrap();

        assert_eq!(report.groups, vec!["Ops".to_string(), "QA".to_string()]);

        let ops = &report.analyses["Ops"];
        assert_eq!(ops.status, GroupStatus::Success);
        assert!((ops.kpis.current_value - 87_000.0).abs() < 1e-9);
        assert_eq!(ops.kpis.total_quantity, 150);
        assert_eq!(ops.kpis.distinct_material_count, 2);
        assert_eq!(ops.monthly_series.len(), 3);
        assert_eq!(ops.forecast.predictions.len(), 3);
        assert!(!ops.summary.text.is_empty());
        assert_eq!(ops.summary.source, SummarySource::Template);

        // Synthetic total rows never become a group.
        assert!(!report.analyses.contains_key("Total Geral"));
    }

    #[test]
    fn test_end_to_end_group_isolation() {
        let table = RawTable::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let report = analyze_table(&table).unwrap();

        let qa = &report.analyses["QA"];
        assert!((qa.kpis.current_value - 4_500.0).abs() < 1e-9);
        assert_eq!(qa.top_materials.len(), 1);
        assert_eq!(qa.top_materials[0].material, "Sensor");
    }
}
