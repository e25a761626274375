// In-memory reference table: header row, records and per-cell fills
use serde::Serialize;

use crate::types::{Result, ScanError};

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl CellValue {
    /// String form used for identifier comparisons.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Real(f) => f.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real(f) => Some(*f),
            CellValue::Text(s) => s.trim().parse().ok(),
            CellValue::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// Cell colour written back by annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fill {
    Pass,
    Fail,
}

impl Fill {
    pub fn from_verdict(passed: bool) -> Self {
        if passed {
            Fill::Pass
        } else {
            Fill::Fail
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            Fill::Pass => "00FF00",
            Fill::Fail => "FF0000",
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        match hex.trim().to_ascii_uppercase().as_str() {
            "00FF00" => Some(Fill::Pass),
            "FF0000" => Some(Fill::Fail),
            _ => None,
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    /// Backing-store identity of the record (SQLite rowid).
    pub id: i64,
    cells: Vec<CellValue>,
    fills: Vec<Option<Fill>>,
}

impl ReferenceRow {
    pub fn cell(&self, column: usize) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn fill(&self, column: usize) -> Option<Fill> {
        self.fills.get(column).copied().flatten()
    }
}

/// Fill state of every record, taken before a change that may be rolled back.
#[derive(Debug, Clone)]
pub struct FillSnapshot(Vec<Vec<Option<Fill>>>);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    columns: Vec<String>,
    rows: Vec<ReferenceRow>,
}

impl ReferenceTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a record. Short rows are padded with empty cells.
    pub fn push_row(&mut self, id: i64, mut cells: Vec<CellValue>) -> Result<()> {
        if cells.len() > self.columns.len() {
            return Err(ScanError::RecordShape {
                record: id,
                cells: cells.len(),
                columns: self.columns.len(),
            });
        }
        cells.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(ReferenceRow {
            id,
            fills: vec![None; cells.len()],
            cells,
        });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    /// Case-sensitive exact header match.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ScanError::MissingColumn(name.to_string()))
    }

    pub fn value<'a>(&self, row: &'a ReferenceRow, column: &str) -> Option<&'a CellValue> {
        self.column_index(column).map(|i| row.cell(i))
    }

    pub fn set_fill(&mut self, row: usize, column: usize, fill: Fill) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.fills.get_mut(column)) {
            *slot = Some(fill);
        }
    }

    pub fn fill_snapshot(&self) -> FillSnapshot {
        FillSnapshot(self.rows.iter().map(|r| r.fills.clone()).collect())
    }

    pub fn restore_fills(&mut self, snapshot: FillSnapshot) {
        for (row, fills) in self.rows.iter_mut().zip(snapshot.0) {
            row.fills = fills;
        }
    }

    /// Every coloured cell as (record id, column name, fill).
    pub fn fills(&self) -> Vec<(i64, &str, Fill)> {
        self.rows
            .iter()
            .flat_map(|row| {
                row.fills.iter().enumerate().filter_map(move |(i, fill)| {
                    fill.map(|f| (row.id, self.columns[i].as_str(), f))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReferenceTable {
        let mut t = ReferenceTable::new(vec!["SYSTEM_KEY".into(), "FLP_Length".into()]);
        t.push_row(1, vec![CellValue::Text("SK1".into()), CellValue::Real(120.5)]).unwrap();
        t.push_row(2, vec![CellValue::Integer(77)]).unwrap();
        t
    }

    #[test]
    fn test_cell_text_forms() {
        assert_eq!(CellValue::Integer(77).to_text(), "77");
        assert_eq!(CellValue::Real(1234.0).to_text(), "1234");
        assert_eq!(CellValue::Real(12.5).to_text(), "12.5");
        assert_eq!(CellValue::Empty.to_text(), "");
        assert_eq!(CellValue::Text(" 3.5 ".into()).as_f64(), Some(3.5));
    }

    #[test]
    fn test_short_rows_padded_and_columns_exact() {
        let t = table();
        assert_eq!(t.rows()[1].cell(1), &CellValue::Empty);
        assert_eq!(t.column_index("SYSTEM_KEY"), Some(0));
        assert_eq!(t.column_index("system_key"), None);
        assert!(matches!(t.require_column("nope"), Err(ScanError::MissingColumn(_))));
    }

    #[test]
    fn test_fills_listed_by_record() {
        let mut t = table();
        t.set_fill(1, 1, Fill::Fail);
        t.set_fill(0, 0, Fill::Pass);
        t.set_fill(9, 0, Fill::Pass);
        assert_eq!(t.fills(), vec![(1, "SYSTEM_KEY", Fill::Pass), (2, "FLP_Length", Fill::Fail)]);
    }

    #[test]
    fn test_overlong_record_rejected() {
        let mut t = table();
        let err = t
            .push_row(3, vec![CellValue::Integer(1), CellValue::Integer(2), CellValue::Integer(3)])
            .unwrap_err();
        assert!(matches!(err, ScanError::RecordShape { record: 3, cells: 3, columns: 2 }));
        assert_eq!(t.rows().len(), 2);
    }

    #[test]
    fn test_restore_fills_undoes_later_colouring() {
        let mut t = table();
        t.set_fill(0, 0, Fill::Pass);
        let snapshot = t.fill_snapshot();

        t.set_fill(0, 0, Fill::Fail);
        t.set_fill(1, 1, Fill::Fail);
        t.restore_fills(snapshot);

        assert_eq!(t.fills(), vec![(1, "SYSTEM_KEY", Fill::Pass)]);
    }

    #[test]
    fn test_fill_hex_round_trip() {
        assert_eq!(Fill::from_hex(Fill::Pass.hex()), Some(Fill::Pass));
        assert_eq!(Fill::from_hex("ff0000"), Some(Fill::Fail));
        assert_eq!(Fill::from_hex("123456"), None);
    }
}
