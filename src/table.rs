//! Raw table model and CSV ingestion.
//!
//! Input spreadsheets are schema-tolerant: column names vary across known
//! conventions and cells mix text, numbers and blanks. The table stores
//! every cell as-is; numeric coercion happens at aggregation time, with
//! non-numeric and missing values treated as zero.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Parses a raw CSV field into a cell. Plain numeric fields become
    /// `Number`; everything else is kept as text for later coercion.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Cell::Number(n),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    /// Coerces the cell to a number.
    ///
    /// Text is trimmed and accepted in both `1234.56` and Brazilian
    /// `1.234,56` forms, with an optional `R$` prefix. Returns `None` for
    /// blanks and non-numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Empty => None,
            Cell::Text(s) => parse_number(s),
        }
    }

    /// Coercion with the aggregation default: missing/non-numeric is 0.
    pub fn numeric_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Display form used when a cell is treated as an identifier
    /// (group names, material codes).
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Cell::Empty => String::new(),
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if let Some(stripped) = s.strip_prefix("R$") {
        s = stripped.trim_start();
    }
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<f64>() {
        return Some(n);
    }
    // Brazilian convention: '.' groups thousands, ',' is the decimal mark.
    if s.contains(',') {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect();
        return normalized.parse::<f64>().ok();
    }
    None
}

/// An ordered table of rows sharing one header set.
///
/// Rows are stored positionally; lookups go through the header index. The
/// table is immutable after construction and shared read-only by all
/// per-group computations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawTableData")]
pub struct RawTable {
    headers: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

/// Wire form of [`RawTable`]; the header index is rebuilt on the way in.
#[derive(Deserialize)]
struct RawTableData {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl From<RawTableData> for RawTable {
    fn from(data: RawTableData) -> Self {
        RawTable::new(data.headers, data.rows)
    }
}

impl RawTable {
    /// Builds a table from headers and rows. Short rows are padded with
    /// empty cells; extra trailing cells are dropped.
    pub fn new(headers: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        let index = build_index(&headers);
        Self {
            headers,
            index,
            rows,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact header name. First occurrence wins
    /// when a header repeats.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Coerced sum of one column over a subset of rows.
    pub fn column_sum(&self, rows: &[usize], column: &str) -> f64 {
        let Some(col) = self.column_index(column) else {
            return 0.0;
        };
        rows.iter()
            .filter_map(|&r| self.rows.get(r))
            .map(|row| row[col].numeric_or_zero())
            .sum()
    }

    /// Reads a table from CSV. The first record is the header row; every
    /// field is ingested as-is and coerced later.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::from_field).collect());
        }

        Ok(Self::new(headers, rows))
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }
}

fn build_index(headers: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(headers.len());
    for (i, h) in headers.iter().enumerate() {
        index.entry(h.clone()).or_insert(i);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_coercion() {
        assert_eq!(Cell::from_field("42").as_number(), Some(42.0));
        assert_eq!(Cell::from_field("  1234.5 ").as_number(), Some(1234.5));
        assert_eq!(Cell::Text("1.234,56".into()).as_number(), Some(1234.56));
        assert_eq!(Cell::Text("R$ 2.500,00".into()).as_number(), Some(2500.0));
        assert_eq!(Cell::Text("n/a".into()).as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
        assert_eq!(Cell::Text("abc".into()).numeric_or_zero(), 0.0);
    }

    #[test]
    fn test_from_csv_reader() {
        let data = "Gerência,Material,Valor Mês 01\nOps,M001,100\nOps,M002,\n";
        let table = RawTable::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.cell(0, "Valor Mês 01"),
            Some(&Cell::Number(100.0))
        );
        assert_eq!(table.cell(1, "Valor Mês 01"), Some(&Cell::Empty));
        assert_eq!(table.column_sum(&[0, 1], "Valor Mês 01"), 100.0);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let data = "A,B,C\n1,2\n";
        let table = RawTable::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(table.cell(0, "C"), Some(&Cell::Empty));
    }

    #[test]
    fn test_deserialized_table_keeps_column_lookups() {
        let data = "Gerência,Material,Valor Mês 01\nOps,M001,100\nOps,M002,200\n";
        let table = RawTable::from_csv_reader(data.as_bytes()).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let restored: RawTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.column_index("Material"), Some(1));
        assert_eq!(restored.column_sum(&[0, 1], "Valor Mês 01"), 300.0);
    }

    #[test]
    fn test_column_sum_missing_column() {
        let table = RawTable::new(vec!["A".into()], vec![vec![Cell::Number(1.0)]]);
        assert_eq!(table.column_sum(&[0], "B"), 0.0);
    }
}
