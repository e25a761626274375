// SQLite reference store backend
//
// Records live in a user table (header row = its columns, row order = rowid).
// Cell colours live in a side table so the records themselves never change.
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::reference_table::{CellValue, Fill, ReferenceTable};
use super::StoreBackend;
use crate::types::{Result, ScanError};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

pub struct SqliteBackend {
    conn: Connection,
    table: String,
    disk_path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open a database file, or an in-memory one when `path` is None.
    pub fn new(path: Option<&Path>, table: &str) -> Result<Self> {
        let conn = if let Some(p) = path {
            Connection::open(p)?
        } else {
            Connection::open_in_memory()?
        };

        let mut backend = Self::from_connection(conn, table)?;
        backend.disk_path = path.map(|p| p.to_path_buf());
        Ok(backend)
    }

    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        if !IDENTIFIER_RE.is_match(table) {
            return Err(ScanError::InvalidIdentifier(table.to_string()));
        }

        Self::create_schema(&conn)?;

        Ok(Self {
            conn,
            table: table.to_string(),
            disk_path: None,
        })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cell_fills (
                record_rowid INTEGER NOT NULL,
                column_name TEXT NOT NULL,
                fill TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (record_rowid, column_name)
            );
        "#,
        )?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn load_columns(&self) -> Result<Vec<String>> {
        let stmt = self
            .conn
            .prepare(&format!("SELECT * FROM \"{}\" LIMIT 0", self.table))?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    fn load_fills(&self, table: &mut ReferenceTable) -> Result<()> {
        let row_index: HashMap<i64, usize> = table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT record_rowid, column_name, fill FROM cell_fills")?;
        let fills = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        for fill in fills {
            let (record, column, hex) = fill?;
            let target = row_index.get(&record).copied().zip(table.column_index(&column));
            match (target, Fill::from_hex(&hex)) {
                (Some((row, col)), Some(fill)) => table.set_fill(row, col, fill),
                _ => tracing::warn!(record, column = %column, fill = %hex, "ignoring stale cell fill"),
            }
        }

        Ok(())
    }
}

impl StoreBackend for SqliteBackend {
    fn load(&mut self) -> Result<ReferenceTable> {
        let columns = self.load_columns()?;
        let width = columns.len();
        let mut table = ReferenceTable::new(columns);

        {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT rowid, * FROM \"{}\" ORDER BY rowid", self.table))?;
            let mut rows = stmt.query([])?;

            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let mut cells = Vec::with_capacity(width);
                for i in 0..width {
                    cells.push(cell_from_ref(row.get_ref(i + 1)?));
                }
                table.push_row(id, cells)?;
            }
        }

        self.load_fills(&mut table)?;
        Ok(table)
    }

    fn persist(&mut self, table: &ReferenceTable) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM cell_fills", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO cell_fills (record_rowid, column_name, fill) VALUES (?1, ?2, ?3)",
            )?;
            for (record, column, fill) in table.fills() {
                insert.execute(params![record, column, fill.hex()])?;
            }
        }
        tx.commit()?;

        tracing::debug!(store = %self.describe(), "reference store persisted");
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.disk_path {
            Some(p) => format!("sqlite:{}#{}", p.display(), self.table),
            None => format!("sqlite::memory:#{}", self.table),
        }
    }
}

fn cell_from_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Empty,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ReferenceStore;

    fn seeded(conn: &Connection) {
        conn.execute_batch(
            r#"
            CREATE TABLE records (SYSTEM_KEY TEXT, SITE_ID TEXT, FLP_Length REAL, BAA_TLP TEXT, note BLOB);
            INSERT INTO records VALUES ('SK1', 'S1', 120.5, '2024-03-05', NULL);
            INSERT INTO records VALUES ('SK2', 'S2', 80, '2024-01-01 00:00:00', x'6869');
        "#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_header_and_values() {
        let conn = Connection::open_in_memory().unwrap();
        seeded(&conn);
        let mut backend = SqliteBackend::from_connection(conn, "records").unwrap();

        let table = backend.load().unwrap();

        assert_eq!(table.columns(), &["SYSTEM_KEY", "SITE_ID", "FLP_Length", "BAA_TLP", "note"]);
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].cell(2), &CellValue::Real(120.5));
        assert_eq!(table.rows()[1].cell(2), &CellValue::Real(80.0));
        assert_eq!(table.rows()[0].cell(4), &CellValue::Empty);
        assert_eq!(table.rows()[1].cell(4), &CellValue::Text("hi".into()));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteBackend::from_connection(conn, "records; DROP TABLE x").err().unwrap();
        assert!(matches!(err, ScanError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_fills_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            seeded(&conn);
        }

        {
            let backend = SqliteBackend::new(Some(&path), "records").unwrap();
            let mut store = ReferenceStore::open(Box::new(backend)).unwrap();
            store
                .update(|table| {
                    table.set_fill(1, 0, Fill::Fail);
                    table.set_fill(1, 2, Fill::Pass);
                    Ok(())
                })
                .unwrap();
        }

        let mut backend = SqliteBackend::new(Some(&path), "records").unwrap();
        let table = backend.load().unwrap();
        assert_eq!(table.rows()[1].fill(0), Some(Fill::Fail));
        assert_eq!(table.rows()[1].fill(2), Some(Fill::Pass));
        assert_eq!(table.rows()[0].fill(0), None);
        assert_eq!(table.rows().len(), 2);
    }
}
