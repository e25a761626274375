// Storage layer - the reference store and its annotations
pub mod annotation;
pub mod reference_table;
pub mod sqlite_store;

pub use annotation::{AnnotationOutcome, AnnotationWriter};
pub use reference_table::{CellValue, Fill, FillSnapshot, ReferenceRow, ReferenceTable};
pub use sqlite_store::SqliteBackend;

use crate::types::Result;

/// Backing medium of the reference store.
pub trait StoreBackend: Send {
    fn load(&mut self) -> Result<ReferenceTable>;

    /// Write the table's full fill state back. Records are never touched.
    fn persist(&mut self, table: &ReferenceTable) -> Result<()>;

    fn describe(&self) -> String;
}

/// The reference table loaded once, plus the backend it is persisted to.
pub struct ReferenceStore {
    table: ReferenceTable,
    backend: Box<dyn StoreBackend>,
}

impl ReferenceStore {
    pub fn open(mut backend: Box<dyn StoreBackend>) -> Result<Self> {
        let table = backend.load()?;
        tracing::info!(
            store = %backend.describe(),
            columns = table.columns().len(),
            records = table.rows().len(),
            "reference store loaded"
        );
        Ok(Self { table, backend })
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// Apply `change` to the table and persist the result. When either step
    /// fails the fills are rolled back, so memory never holds unpersisted colour.
    pub fn update<T>(&mut self, change: impl FnOnce(&mut ReferenceTable) -> Result<T>) -> Result<T> {
        let snapshot = self.table.fill_snapshot();
        let result = change(&mut self.table).and_then(|value| {
            self.backend.persist(&self.table)?;
            Ok(value)
        });

        if let Err(e) = &result {
            tracing::warn!(store = %self.backend.describe(), error = %e, "store update rolled back");
            self.table.restore_fills(snapshot);
        }
        result
    }
}
