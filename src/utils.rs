//! Locale-aware formatting helpers for narrative text.
//!
//! Report narratives use Brazilian number formatting (`R$ 1.234.567,89`),
//! matching the spreadsheets the pipeline ingests.

/// Formats a monetary value as Brazilian currency.
///
/// Non-finite inputs render as `R$ 0,00` so narrative templates never fail.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "R$ 0,00".to_string();
    }
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u128;
    let whole = cents / 100;
    let frac = cents % 100;
    let digits = whole.to_string();
    let grouped = group_thousands(&digits, '.');
    let sign = if negative { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, frac)
}

/// Formats an integer with `.` thousands separators.
pub fn format_integer(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let grouped = group_thousands(&digits, '.');
    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Compact currency form used in short summaries (`R$ 1.2M`, `R$ 450.0K`).
pub fn format_currency_compact(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "R$ 0".to_string();
    }
    if value >= 1_000_000.0 {
        format!("R$ {:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("R$ {:.1}K", value / 1_000.0)
    } else {
        format!("R$ {:.0}", value)
    }
}

fn group_thousands(digits: &str, sep: char) -> String {
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(*b as char);
    }
    out
}
