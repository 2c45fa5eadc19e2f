//! Dynamic column resolution.
//!
//! Input spreadsheets name their columns inconsistently ("Valor Mês 01",
//! "Jan_Valor", "valor_mes3", ...). The resolver locates the semantic
//! columns once per table: the group (managerial unit) column, material,
//! area and consolidated quantity columns by alias, and the chronologically
//! ordered monthly value/quantity column sets by a prioritized list of
//! matching strategies. Resolution is a pure function of the header list.

use crate::table::RawTable;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Aliases for the managerial-unit column, matched case-insensitively by
/// substring. First matching column wins.
pub const GROUP_ALIASES: &[&str] = &["gerência", "gerencia"];
pub const AREA_ALIASES: &[&str] = &["área", "area"];
pub const MATERIAL_ALIASES: &[&str] = &["material"];
pub const QUANTITY_ALIASES: &[&str] = &["quantidade", "qtd"];

/// Portuguese three-letter month abbreviations in calendar order.
pub const PT_MONTHS: &[&str] = &[
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Matches headers carrying an explicit month number, e.g. "Valor Mês 01",
/// "valor mes 3", "Mês 12".
static MONTH_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:valor\s*m[eê]s|m[eê]s)\s*(\d{1,2})").unwrap());

/// The semantic columns chosen for one table. Computed once and reused by
/// every per-group computation on that table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumns {
    /// Managerial-unit column; analysis is scoped by its values.
    pub group: Option<String>,
    pub material: Option<String>,
    pub area: Option<String>,
    /// Consolidated quantity column, excluding monthly quantity columns.
    pub quantity: Option<String>,
    /// Monthly value columns in chronological order.
    pub value_columns: Vec<String>,
    /// Monthly quantity columns in chronological order.
    pub quantity_columns: Vec<String>,
}

impl ResolvedColumns {
    pub fn resolve(table: &RawTable) -> Self {
        let headers = table.headers();
        let quantity_columns = month_quantity_columns(headers);
        let quantity = find_first_by_alias(headers, QUANTITY_ALIASES, &quantity_columns);

        Self {
            group: find_first_by_alias(headers, GROUP_ALIASES, &[]),
            material: find_first_by_alias(headers, MATERIAL_ALIASES, &[]),
            area: find_first_by_alias(headers, AREA_ALIASES, &[]),
            quantity,
            value_columns: month_value_columns(headers),
            quantity_columns,
        }
    }

    /// True when the minimum for any per-group analysis is present: a group
    /// column, a material column and at least one monthly value column.
    pub fn is_analyzable(&self) -> bool {
        self.group.is_some() && self.material.is_some() && !self.value_columns.is_empty()
    }

    /// Names of roles that failed to resolve, for diagnostics.
    pub fn missing_roles(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.group.is_none() {
            missing.push("group");
        }
        if self.material.is_none() {
            missing.push("material");
        }
        if self.value_columns.is_empty() {
            missing.push("monthly values");
        }
        missing
    }
}

fn find_first_by_alias(
    headers: &[String],
    aliases: &[&str],
    excluded: &[String],
) -> Option<String> {
    headers
        .iter()
        .filter(|h| !excluded.contains(h))
        .find(|h| {
            let lower = h.trim().to_lowercase();
            aliases.iter().any(|a| lower.contains(a))
        })
        .cloned()
}

/// Detects monthly value columns, in chronological order.
///
/// Strategies are tried in priority order; the first one that matches any
/// column wins and its results are sorted by extracted month number:
///   1. Explicit month-number headers via [`MONTH_RX`].
///   2. Month-abbreviation prefix ("Jan_Valor", "fev valor").
///   3. Catch-all: "valor" plus a two-digit or space-delimited month number.
pub fn month_value_columns(headers: &[String]) -> Vec<String> {
    // Strategy 1: explicit month-number token.
    let mut matches: Vec<(u32, String)> = headers
        .iter()
        .filter_map(|h| {
            let caps = MONTH_RX.captures(h)?;
            let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
            Some((number, h.clone()))
        })
        .collect();

    if matches.is_empty() {
        // Strategy 2: month abbreviation immediately before a value marker.
        matches = headers
            .iter()
            .filter_map(|h| {
                let lower = h.trim().to_lowercase();
                if !lower.contains("valor") {
                    return None;
                }
                month_prefix_index(&lower).map(|idx| (idx, h.clone()))
            })
            .collect();
    }

    if matches.is_empty() {
        // Strategy 3: any value marker alongside a month number.
        matches = headers
            .iter()
            .filter_map(|h| {
                let lower = h.trim().to_lowercase();
                if !lower.contains("valor") {
                    return None;
                }
                bare_month_number(&lower).map(|n| (n, h.clone()))
            })
            .collect();
    }

    matches.sort_by_key(|(n, _)| *n);
    matches.into_iter().map(|(_, h)| h).collect()
}

/// Detects monthly quantity columns ("Jan_Qtd".."Dez_Qtd"), in
/// chronological order. Independent from value-column resolution.
pub fn month_quantity_columns(headers: &[String]) -> Vec<String> {
    let mut matches: Vec<(u32, String)> = headers
        .iter()
        .filter_map(|h| {
            let lower = h.trim().to_lowercase();
            if !QUANTITY_ALIASES.iter().any(|a| lower.contains(a)) {
                return None;
            }
            month_prefix_index(&lower).map(|idx| (idx, h.clone()))
        })
        .collect();
    matches.sort_by_key(|(n, _)| *n);
    matches.into_iter().map(|(_, h)| h).collect()
}

/// Calendar index (1-12) when the header starts with a month abbreviation
/// followed by `_` or a space.
fn month_prefix_index(lower: &str) -> Option<u32> {
    PT_MONTHS.iter().enumerate().find_map(|(i, m)| {
        let underscored = format!("{}_", m);
        let spaced = format!("{} ", m);
        if lower.starts_with(&underscored) || lower.starts_with(&spaced) {
            Some(i as u32 + 1)
        } else {
            None
        }
    })
}

/// Month number from a catch-all header: zero-padded "01".."12" anywhere,
/// or a bare 1-12 delimited by spaces.
fn bare_month_number(lower: &str) -> Option<u32> {
    (1..=12).find(|mm| {
        let padded = format!("{:02}", mm);
        let spaced = format!(" {} ", mm);
        lower.contains(&padded) || lower.contains(&spaced)
    })
}

/// Period label ("01".."12") for a resolved value column, used by the
/// monthly series and anomaly records. Falls back to the column's 1-based
/// position when the name carries no month information.
pub fn month_label(column: &str, position: usize) -> String {
    if let Some(caps) = MONTH_RX.captures(column) {
        if let Ok(n) = caps[1].parse::<u32>() {
            return format!("{:02}", n);
        }
    }
    let lower = column.trim().to_lowercase();
    if let Some(idx) = month_prefix_index(&lower) {
        return format!("{:02}", idx);
    }
    format!("{:02}", position + 1)
}
