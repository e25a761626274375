// Date parsing for extracted fields and reference cells
use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::storage::CellValue;

const REFERENCE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const REFERENCE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse an extracted date in the template's fixed format (e.g. `%d-%b-%y`).
pub fn parse_document_date(raw: &str, format: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), format)
}

/// Calendar date of a reference cell: ISO text, or a spreadsheet serial day number.
pub fn reference_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Text(text) => {
            let text = text.trim();
            REFERENCE_DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .or_else(|| {
                    REFERENCE_DATETIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                        .map(|dt| dt.date())
                })
        }
        CellValue::Integer(serial) => from_serial(*serial as f64),
        CellValue::Real(serial) => from_serial(*serial),
        CellValue::Empty => None,
    }
}

// Spreadsheet serial days count from 1899-12-30
fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("05-Mar-24")]
    #[case(" 05-Mar-24 ")]
    #[case("05-mar-24")]
    fn test_document_date_format(#[case] raw: &str) {
        assert_eq!(
            parse_document_date(raw, "%d-%b-%y").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[rstest]
    #[case("2024-03-05")]
    #[case("5 March 2024")]
    #[case("")]
    fn test_document_date_rejects_other_formats(#[case] raw: &str) {
        assert!(parse_document_date(raw, "%d-%b-%y").is_err());
    }

    #[rstest]
    #[case(CellValue::Text("2024-03-05".into()))]
    #[case(CellValue::Text("2024-03-05 00:00:00".into()))]
    #[case(CellValue::Text("2024-03-05T08:30:00".into()))]
    #[case(CellValue::Integer(45356))]
    #[case(CellValue::Real(45356.0))]
    fn test_reference_date_forms(#[case] cell: CellValue) {
        assert_eq!(reference_date(&cell), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn test_reference_date_missing() {
        assert_eq!(reference_date(&CellValue::Empty), None);
        assert_eq!(reference_date(&CellValue::Text("soon".into())), None);
    }
}
