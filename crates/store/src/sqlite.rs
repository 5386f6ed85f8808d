// Reference tables stored in SQLite

use std::path::Path;
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::error::StoreError;
use crate::model::{DocumentReference, FieldReference, Upserted};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS document_reference (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    name TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS document_reference_name_category
    ON document_reference (casefold(name), category);

CREATE TABLE IF NOT EXISTS field_reference (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER REFERENCES document_reference(id),  -- nullable, always set by refsync
    name TEXT NOT NULL,
    category TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS field_reference_document_name_category
    ON field_reference (document_id, casefold(trim(name)), category);
"#;

const DOCUMENT_COLUMNS: &str = "id, category, name";
const FIELD_COLUMNS: &str = "id, document_id, name, category";

/// An open connection to the reference database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and make sure both
    /// reference tables and their unique indexes exist.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        log::debug!("opened reference database {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        register_casefold(&conn)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Raw connection, for inspection and test setup.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin the run's transaction. `BEGIN IMMEDIATE` takes the write lock
    /// up front so a concurrent writer waits on the busy timeout at the start
    /// rather than failing halfway through.
    pub fn begin(&mut self) -> Result<StoreTx<'_>, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(StoreTx { tx })
    }

    pub fn documents(&self, category: &str) -> Result<Vec<DocumentReference>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_reference WHERE category = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![category], document_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn fields(&self, category: &str) -> Result<Vec<FieldReference>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM field_reference WHERE category = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![category], field_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

/// The single transaction a reconciliation run works in.
///
/// Dropping it without calling [`StoreTx::commit`] rolls everything back.
pub struct StoreTx<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTx<'_> {
    /// Case-insensitive lookup by name within `category`. With `trim`, both
    /// the stored and the given name are trimmed before comparing.
    pub fn find_document(
        &self,
        category: &str,
        name: &str,
        trim: bool,
    ) -> Result<Option<DocumentReference>, StoreError> {
        let predicate = if trim {
            "casefold(trim(name)) = casefold(trim(?1))"
        } else {
            "casefold(name) = casefold(?1)"
        };
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_reference \
             WHERE {predicate} AND category = ?2 ORDER BY id LIMIT 1"
        );
        Ok(self
            .tx
            .query_row(&sql, params![name, category], document_from_row)
            .optional()?)
    }

    /// Insert a document unless one with the same lowercase name already
    /// exists in `category`. The new id is available immediately, before
    /// commit.
    pub fn insert_document(&self, category: &str, name: &str) -> Result<Upserted, StoreError> {
        let changed = self.tx.execute(
            "INSERT INTO document_reference (category, name) VALUES (?1, ?2) \
             ON CONFLICT DO NOTHING",
            params![category, name],
        )?;
        if changed == 1 {
            return Ok(Upserted { id: self.tx.last_insert_rowid(), inserted: true });
        }

        match self.find_document(category, name, false)? {
            Some(existing) => Ok(Upserted { id: existing.id, inserted: false }),
            None => Err(StoreError::Conflict(format!(
                "document '{name}' in category '{category}'"
            ))),
        }
    }

    /// Lookup of a field under `document_id`, case-insensitive with both
    /// sides trimmed.
    pub fn find_field(
        &self,
        document_id: i64,
        category: &str,
        name: &str,
    ) -> Result<Option<FieldReference>, StoreError> {
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM field_reference \
             WHERE document_id = ?1 AND casefold(trim(name)) = casefold(trim(?2)) AND category = ?3 \
             ORDER BY id LIMIT 1"
        );
        Ok(self
            .tx
            .query_row(&sql, params![document_id, name, category], field_from_row)
            .optional()?)
    }

    pub fn insert_field(
        &self,
        document_id: i64,
        category: &str,
        name: &str,
    ) -> Result<Upserted, StoreError> {
        let changed = self.tx.execute(
            "INSERT INTO field_reference (document_id, name, category) VALUES (?1, ?2, ?3) \
             ON CONFLICT DO NOTHING",
            params![document_id, name, category],
        )?;
        if changed == 1 {
            return Ok(Upserted { id: self.tx.last_insert_rowid(), inserted: true });
        }

        match self.find_field(document_id, category, name)? {
            Some(existing) => Ok(Upserted { id: existing.id, inserted: false }),
            None => Err(StoreError::Conflict(format!(
                "field '{name}' of document {document_id} in category '{category}'"
            ))),
        }
    }

    pub fn commit(self) -> Result<(), StoreError> {
        Ok(self.tx.commit()?)
    }

    pub fn rollback(self) -> Result<(), StoreError> {
        Ok(self.tx.rollback()?)
    }
}

/// `casefold(text)`: Unicode lowercase. SQLite's own `lower()` folds ASCII
/// only. The unique indexes are built on it, so every connection that writes
/// the reference tables must register it first.
fn register_casefold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentReference> {
    Ok(DocumentReference {
        id: row.get(0)?,
        category: row.get(1)?,
        name: row.get(2)?,
    })
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FieldReference> {
    Ok(FieldReference {
        id: row.get(0)?,
        document_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
    })
}
