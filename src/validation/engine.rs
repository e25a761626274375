// Cross-validation of extracted rows against the reference store
use indexmap::IndexMap;
use serde::Serialize;

use super::dates::{parse_document_date, reference_date};
use super::span_id::SpanId;
use crate::config::{FieldConfig, ReferenceConfig, ScanConfig};
use crate::pdf_extraction::{ExtractedRow, ExtractedTable};
use crate::storage::{ReferenceRow, ReferenceTable};
use crate::types::Result;

const LENGTH_EPSILON: f64 = 1e-6;

/// Why a field failed beyond a plain mismatch (unparseable or missing input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Field name -> pass/fail for one extracted row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerdictMap {
    matched: bool,
    fields: IndexMap<String, bool>,
    issues: Vec<FieldIssue>,
}

impl VerdictMap {
    /// An empty verdict for a row that found its reference record.
    pub fn matched() -> Self {
        Self {
            matched: true,
            ..Self::default()
        }
    }

    /// The degenerate verdict when no reference record matches.
    pub fn no_match(sentinel: &str) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(sentinel.to_string(), false);
        Self {
            matched: false,
            fields,
            issues: Vec::new(),
        }
    }

    pub fn set(&mut self, field: &str, passed: bool) {
        self.fields.insert(field.to_string(), passed);
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.set(field, false);
        self.issue(field, message);
    }

    fn issue(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_match(&self) -> bool {
        self.matched
    }

    pub fn get(&self, field: &str) -> Option<bool> {
        self.fields.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn all_passed(&self) -> bool {
        !self.fields.is_empty() && self.fields.values().all(|v| *v)
    }
}

/// Verdict for one extracted row plus the key its annotation is filed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowVerdict {
    pub filter_key: String,
    pub verdict: VerdictMap,
}

pub struct ValidationEngine {
    fields: FieldConfig,
    reference: ReferenceConfig,
}

impl ValidationEngine {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            fields: config.fields.clone(),
            reference: config.reference.clone(),
        }
    }

    pub fn validate_table(
        &self,
        table: &ExtractedTable,
        store: &ReferenceTable,
        auxiliary_text: &str,
    ) -> Result<Vec<RowVerdict>> {
        table
            .rows()?
            .iter()
            .map(|row| {
                Ok(RowVerdict {
                    filter_key: row
                        .get(&self.fields.system_key)
                        .map(|k| k.trim().to_string())
                        .unwrap_or_default(),
                    verdict: self.validate_row(row, store, auxiliary_text)?,
                })
            })
            .collect()
    }

    /// Compare every validated field of `row` against its reference record.
    /// Checks are independent; a failure never hides another field's status.
    pub fn validate_row(
        &self,
        row: &ExtractedRow,
        store: &ReferenceTable,
        auxiliary_text: &str,
    ) -> Result<VerdictMap> {
        let Some(record) = self.find_record(row, store)? else {
            tracing::info!(
                key = row.get(&self.fields.system_key).unwrap_or_default(),
                "no reference record matches"
            );
            return Ok(VerdictMap::no_match(&self.reference.no_match_key));
        };

        let reference = &self.reference;
        let fields = &self.fields;
        let lookup = RecordView { store, record };
        let mut verdict = VerdictMap::matched();

        self.compare_text(
            &mut verdict,
            &lookup,
            &reference.system_key,
            row.get(&fields.system_key),
        );
        self.compare_text(
            &mut verdict,
            &lookup,
            &reference.site_id,
            row.nth_containing(&fields.site_hint, 0),
        );
        self.compare_text(
            &mut verdict,
            &lookup,
            &reference.site_name,
            row.nth_containing(&fields.site_hint, 1),
        );

        self.check_span(&mut verdict, &lookup, row.get(&fields.span_id));
        self.check_dates(&mut verdict, &lookup, row);
        self.check_length(
            &mut verdict,
            &lookup,
            row.nth_containing(&fields.length_hint, 0),
        );

        let activation = row.nth_containing(&fields.activation_hint, 0);
        let signing = row.nth_containing(&fields.signing_hint, 0);
        match (activation, signing) {
            (Some(a), Some(s)) => verdict.set(&reference.signing_date, a == s),
            _ => verdict.fail(&reference.signing_date, "activation or signing date column missing"),
        }

        let signer = fields.expected_signer.trim();
        if signer.is_empty() {
            verdict.fail(&reference.signing_person, "no expected signer configured");
        } else {
            verdict.set(&reference.signing_person, auxiliary_text.contains(signer));
        }

        tracing::debug!(
            record = record.id,
            passed = verdict.iter().filter(|(_, ok)| *ok).count(),
            total = verdict.len(),
            "row validated"
        );
        Ok(verdict)
    }

    /// First record whose primary key or site id equals the row's. Multiple matches are fine.
    fn find_record<'a>(
        &self,
        row: &ExtractedRow,
        store: &'a ReferenceTable,
    ) -> Result<Option<&'a ReferenceRow>> {
        let key_col = store.require_column(&self.reference.system_key)?;
        let site_col = store.require_column(&self.reference.site_id)?;

        let key = non_empty(row.get(&self.fields.system_key));
        let site = non_empty(row.get(&self.fields.origin_site_id));

        let matches = |cell: usize, wanted: Option<&str>, r: &ReferenceRow| {
            wanted.map_or(false, |w| r.cell(cell).to_text().trim() == w)
        };

        let mut candidates = store
            .rows()
            .iter()
            .filter(|r| matches(key_col, key, *r) || matches(site_col, site, *r));

        let first = candidates.next();
        let extra = candidates.count();
        if extra > 0 {
            tracing::debug!(extra, "several reference records match, using the first");
        }
        Ok(first)
    }

    fn compare_text(
        &self,
        verdict: &mut VerdictMap,
        lookup: &RecordView<'_>,
        column: &str,
        extracted: Option<&str>,
    ) {
        let Some(extracted) = extracted else {
            verdict.fail(column, "field not found in extracted table");
            return;
        };
        match lookup.text(column) {
            Some(expected) => verdict.set(column, expected.trim() == extracted.trim()),
            None => verdict.fail(column, format!("reference store has no column '{}'", column)),
        }
    }

    fn check_span(&self, verdict: &mut VerdictMap, lookup: &RecordView<'_>, span: Option<&str>) {
        let reference = &self.reference;
        let delimiter = &self.fields.span_delimiter;

        let Some(span) = span.map(str::trim) else {
            for column in [&reference.far_end_id, &reference.ring_id, &reference.span_id] {
                verdict.fail(column, "span identifier not found in extracted table");
            }
            return;
        };

        match SpanId::parse(span, delimiter) {
            Some(parsed) => {
                self.compare_text(verdict, lookup, &reference.far_end_id, Some(parsed.far_end_id.as_str()));
                self.compare_text(verdict, lookup, &reference.ring_id, Some(parsed.ring_id.as_str()));
            }
            None => {
                let message = format!("span identifier '{}' has fewer than six parts", span);
                verdict.fail(&reference.far_end_id, message.clone());
                verdict.fail(&reference.ring_id, message);
            }
        }

        // The literal composite and the one rebuilt from its parts must both agree
        let parts = (
            lookup.text(&reference.ring_id),
            lookup.text(&reference.site_id),
            lookup.text(&reference.far_end_id),
        );
        let rebuilt = match parts {
            (Some(ring), Some(site), Some(far)) => {
                Some(SpanId::compose(ring.trim(), site.trim(), far.trim(), delimiter))
            }
            _ => None,
        };

        match (lookup.text(&reference.span_id), rebuilt) {
            (Some(literal), Some(rebuilt)) => {
                let consistent = literal.trim() == span && rebuilt == span;
                verdict.set(&reference.span_id, consistent);
            }
            _ => verdict.fail(&reference.span_id, "reference store lacks span identifier columns"),
        }
    }

    fn check_dates(&self, verdict: &mut VerdictMap, lookup: &RecordView<'_>, row: &ExtractedRow) {
        let column = &self.reference.date;
        let format = &self.fields.date_format;

        let expected = lookup.value(column).and_then(|cell| reference_date(&cell));
        if expected.is_none() {
            verdict.issue(column, "reference date missing or unreadable");
        }

        // Both dates are checked against the one authoritative reference date
        let mut passed = expected.is_some();
        for (label, hint) in [
            ("activation date", &self.fields.activation_hint),
            ("signing date", &self.fields.signing_hint),
        ] {
            let Some(raw) = row.nth_containing(hint, 0) else {
                verdict.issue(column, format!("{} not found in extracted table", label));
                passed = false;
                continue;
            };
            match parse_document_date(raw, format) {
                Ok(date) => passed &= Some(date) == expected,
                Err(e) => {
                    verdict.issue(column, format!("{} '{}' does not match {}: {}", label, raw, format, e));
                    passed = false;
                }
            }
        }

        verdict.set(column, passed);
    }

    fn check_length(&self, verdict: &mut VerdictMap, lookup: &RecordView<'_>, raw: Option<&str>) {
        let column = &self.reference.length;

        let Some(raw) = raw else {
            verdict.fail(column, "length field not found in extracted table");
            return;
        };
        let extracted = match raw.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                verdict.fail(column, format!("length '{}' is not a number", raw));
                return;
            }
        };

        match lookup.value(column).and_then(|cell| cell.as_f64()) {
            Some(expected) => verdict.set(column, (expected - extracted).abs() < LENGTH_EPSILON),
            None => verdict.fail(column, "reference length missing or not numeric"),
        }
    }
}

/// One reference record viewed through the table's header.
struct RecordView<'a> {
    store: &'a ReferenceTable,
    record: &'a ReferenceRow,
}

impl RecordView<'_> {
    fn value(&self, column: &str) -> Option<crate::storage::CellValue> {
        self.store.value(self.record, column).cloned()
    }

    fn text(&self, column: &str) -> Option<String> {
        self.store.value(self.record, column).map(|c| c.to_text())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
