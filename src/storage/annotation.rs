// Writes verdicts back onto the reference store as cell fills
use serde::Serialize;

use super::reference_table::{Fill, ReferenceTable};
use super::ReferenceStore;
use crate::config::ScanConfig;
use crate::types::Result;
use crate::validation::{RowVerdict, VerdictMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnnotationOutcome {
    Annotated {
        record_id: i64,
        cells: usize,
        /// Verdict fields with no reference column; reported, never coloured.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        unresolved: Vec<String>,
    },
    /// No record carries the filter key; nothing was coloured.
    RecordNotFound,
    /// The verdict had no matching record, so there is nothing to colour.
    Skipped,
}

pub struct AnnotationWriter {
    key_column: String,
}

impl AnnotationWriter {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            key_column: config.reference.system_key.clone(),
        }
    }

    /// Colour the first record whose primary key equals `filter_key`, then
    /// persist. A failed persist leaves the in-memory fills as they were.
    pub fn annotate(
        &self,
        store: &mut ReferenceStore,
        verdict: &VerdictMap,
        filter_key: &str,
    ) -> Result<AnnotationOutcome> {
        if !verdict.is_match() {
            tracing::debug!(key = filter_key, "verdict has no record, skipping annotation");
            return Ok(AnnotationOutcome::Skipped);
        }
        store.update(|table| self.stage(table, verdict, filter_key))
    }

    /// Annotate every row of one document under a single persist.
    /// Either all of the document's fills reach the backend or none do.
    pub fn annotate_all(
        &self,
        store: &mut ReferenceStore,
        verdicts: &[RowVerdict],
    ) -> Result<Vec<AnnotationOutcome>> {
        if !verdicts.iter().any(|r| r.verdict.is_match()) {
            return Ok(vec![AnnotationOutcome::Skipped; verdicts.len()]);
        }
        store.update(|table| {
            verdicts
                .iter()
                .map(|r| self.stage(table, &r.verdict, &r.filter_key))
                .collect()
        })
    }

    /// Set the fills for one verdict without persisting.
    pub fn stage(
        &self,
        table: &mut ReferenceTable,
        verdict: &VerdictMap,
        filter_key: &str,
    ) -> Result<AnnotationOutcome> {
        if !verdict.is_match() {
            return Ok(AnnotationOutcome::Skipped);
        }

        let key_col = table.require_column(&self.key_column)?;
        let mut targets = Vec::with_capacity(verdict.len());
        let mut unresolved = Vec::new();
        for (field, passed) in verdict.iter() {
            match table.column_index(field) {
                Some(column) => targets.push((column, Fill::from_verdict(passed))),
                None => unresolved.push(field.to_string()),
            }
        }

        let filter_key = filter_key.trim();
        let found = table
            .rows()
            .iter()
            .enumerate()
            .find(|(_, row)| !filter_key.is_empty() && row.cell(key_col).to_text().trim() == filter_key)
            .map(|(index, row)| (index, row.id));

        let Some((index, record_id)) = found else {
            tracing::warn!(key = filter_key, "no reference record carries this key, nothing annotated");
            return Ok(AnnotationOutcome::RecordNotFound);
        };

        if !unresolved.is_empty() {
            tracing::warn!(record_id, fields = ?unresolved, "verdict fields without a reference column left uncoloured");
        }
        for (column, fill) in &targets {
            table.set_fill(index, *column, *fill);
        }
        Ok(AnnotationOutcome::Annotated {
            record_id,
            cells: targets.len(),
            unresolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CellValue, ReferenceTable, StoreBackend};
    use crate::types::ScanError;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Keeps the table in memory and records persists; `fail` reports a full disk instead.
    struct MemoryBackend {
        table: ReferenceTable,
        persisted: Arc<Mutex<Vec<ReferenceTable>>>,
        fail: bool,
    }

    impl StoreBackend for MemoryBackend {
        fn load(&mut self) -> Result<ReferenceTable> {
            Ok(self.table.clone())
        }

        fn persist(&mut self, table: &ReferenceTable) -> Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
            }
            self.persisted.lock().unwrap().push(table.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn store() -> (ReferenceStore, Arc<Mutex<Vec<ReferenceTable>>>) {
        store_with(false)
    }

    fn store_with(fail: bool) -> (ReferenceStore, Arc<Mutex<Vec<ReferenceTable>>>) {
        let mut table = ReferenceTable::new(vec![
            "SYSTEM_KEY".into(),
            "SITE_ID".into(),
            "FLP_Length".into(),
        ]);
        let text = |s: &str| CellValue::Text(s.to_string());
        table.push_row(1, vec![text("SK1"), text("S1"), CellValue::Real(10.0)]).unwrap();
        table.push_row(2, vec![text("SK2"), text("S2"), CellValue::Real(20.0)]).unwrap();
        table.push_row(3, vec![text("SK2"), text("S3"), CellValue::Real(30.0)]).unwrap();

        let persisted = Arc::new(Mutex::new(Vec::new()));
        let backend = MemoryBackend {
            table,
            persisted: persisted.clone(),
            fail,
        };
        (ReferenceStore::open(Box::new(backend)).unwrap(), persisted)
    }

    fn verdict(fields: &[(&str, bool)]) -> VerdictMap {
        let mut verdict = VerdictMap::matched();
        for (field, passed) in fields {
            verdict.set(field, *passed);
        }
        verdict
    }

    #[test]
    fn test_first_matching_record_coloured() {
        let (mut store, persisted) = store();
        let v = verdict(&[("SYSTEM_KEY", true), ("FLP_Length", false)]);

        let outcome = AnnotationWriter::new(&ScanConfig::default())
            .annotate(&mut store, &v, "SK2")
            .unwrap();

        assert_eq!(
            outcome,
            AnnotationOutcome::Annotated {
                record_id: 2,
                cells: 2,
                unresolved: vec![]
            }
        );
        let rows = store.table().rows();
        assert_eq!(rows[1].fill(0), Some(Fill::Pass));
        assert_eq!(rows[1].fill(2), Some(Fill::Fail));
        assert_eq!(rows[1].fill(1), None);
        // Only the first record with the key
        assert_eq!(rows[2].fill(0), None);
        assert_eq!(rows[0].fill(0), None);
        assert_eq!(persisted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_key_leaves_fills_unchanged() {
        let (mut store, persisted) = store();
        let v = verdict(&[("SYSTEM_KEY", true)]);

        let outcome = AnnotationWriter::new(&ScanConfig::default())
            .annotate(&mut store, &v, "SK404")
            .unwrap();

        assert_eq!(outcome, AnnotationOutcome::RecordNotFound);
        assert!(store.table().fills().is_empty());
        assert_eq!(persisted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_field_column_reported_not_fatal() {
        let (mut store, persisted) = store();
        let v = verdict(&[("SYSTEM_KEY", true), ("Signing_Person", false)]);

        let outcome = AnnotationWriter::new(&ScanConfig::default())
            .annotate(&mut store, &v, "SK1")
            .unwrap();

        assert_eq!(
            outcome,
            AnnotationOutcome::Annotated {
                record_id: 1,
                cells: 1,
                unresolved: vec!["Signing_Person".to_string()]
            }
        );
        assert_eq!(store.table().fills(), vec![(1, "SYSTEM_KEY", Fill::Pass)]);
        assert_eq!(persisted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_key_column_mutates_nothing() {
        let mut table = ReferenceTable::new(vec!["SITE_ID".into()]);
        table.push_row(1, vec![CellValue::Text("S1".into())]).unwrap();
        let persisted = Arc::new(Mutex::new(Vec::new()));
        let backend = MemoryBackend {
            table,
            persisted: persisted.clone(),
            fail: false,
        };
        let mut store = ReferenceStore::open(Box::new(backend)).unwrap();

        let err = AnnotationWriter::new(&ScanConfig::default())
            .annotate(&mut store, &verdict(&[("SITE_ID", true)]), "SK1")
            .unwrap_err();

        assert!(matches!(err, ScanError::MissingColumn(c) if c == "SYSTEM_KEY"));
        assert!(store.table().fills().is_empty());
        assert!(persisted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_persist_keeps_fills_out_of_memory() {
        let (mut store, _) = store_with(true);
        let v = verdict(&[("SYSTEM_KEY", false)]);

        let err = AnnotationWriter::new(&ScanConfig::default())
            .annotate(&mut store, &v, "SK1")
            .unwrap_err();

        assert!(matches!(err, ScanError::Io(_)));
        assert!(store.table().fills().is_empty());
    }

    #[test]
    fn test_document_rows_share_one_persist() {
        let (mut store, persisted) = store();
        let rows = vec![
            RowVerdict {
                filter_key: "SK1".into(),
                verdict: verdict(&[("SYSTEM_KEY", true)]),
            },
            RowVerdict {
                filter_key: "SK404".into(),
                verdict: verdict(&[("SYSTEM_KEY", true)]),
            },
            RowVerdict {
                filter_key: "SK2".into(),
                verdict: VerdictMap::no_match("match_found"),
            },
        ];

        let outcomes = AnnotationWriter::new(&ScanConfig::default())
            .annotate_all(&mut store, &rows)
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], AnnotationOutcome::Annotated { record_id: 1, .. }));
        assert_eq!(outcomes[1], AnnotationOutcome::RecordNotFound);
        assert_eq!(outcomes[2], AnnotationOutcome::Skipped);
        assert_eq!(persisted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_persist_drops_every_row_of_the_document() {
        let (mut store, _) = store_with(true);
        let rows = vec![
            RowVerdict {
                filter_key: "SK1".into(),
                verdict: verdict(&[("SYSTEM_KEY", true)]),
            },
            RowVerdict {
                filter_key: "SK2".into(),
                verdict: verdict(&[("FLP_Length", false)]),
            },
        ];

        let result = AnnotationWriter::new(&ScanConfig::default()).annotate_all(&mut store, &rows);

        assert!(matches!(result, Err(ScanError::Io(_))));
        assert!(store.table().fills().is_empty());
    }

    #[test]
    fn test_no_match_verdict_skipped() {
        let (mut store, persisted) = store();
        let v = VerdictMap::no_match("match_found");

        let outcome = AnnotationWriter::new(&ScanConfig::default())
            .annotate(&mut store, &v, "SK1")
            .unwrap();

        assert_eq!(outcome, AnnotationOutcome::Skipped);
        assert!(store.table().fills().is_empty());
        assert!(persisted.lock().unwrap().is_empty());
    }
}
