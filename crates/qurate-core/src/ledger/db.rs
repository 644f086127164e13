use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{AuditEntry, DocumentChange, OperationKind};

use super::migrations::MIGRATIONS;

/// Bounds on a ledger read.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerFilter {
    pub kind: Option<OperationKind>,
    pub limit: Option<usize>,
}

/// The append-only audit ledger, backed by SQLite.
///
/// Every destructive operation against the collection lands here as one
/// entry; reads always go back to the database, so a re-read replays the
/// ledger rather than any in-memory cache. The ledger file is the only
/// durable state the engine owns.
#[derive(Debug)]
pub struct AuditLedger {
    conn: Connection,
}

impl AuditLedger {
    /// Open (or create) a ledger at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let ledger = Self { conn };
        ledger.apply_migrations()?;
        Ok(ledger)
    }

    /// Open an in-memory ledger (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let ledger = Self { conn };
        ledger.apply_migrations()?;
        Ok(ledger)
    }

    fn apply_migrations(&self) -> Result<()> {
        // Create migrations table if it doesn't exist
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        // Get applied migrations
        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        // Apply pending migrations
        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying ledger migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }

    /// Durably persist `entry` and return its operation id.
    ///
    /// Atomic: the operation row and every document snapshot land in one
    /// transaction, so a partially recorded multi-document operation can
    /// never exist.
    pub fn append(&mut self, entry: &AuditEntry) -> Result<String> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO audit_operations (operation_id, performed_at, kind, metadata)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                entry.operation_id,
                entry.performed_at.to_rfc3339(),
                entry.kind.as_str(),
                entry.metadata.to_string(),
            ],
        )?;

        for (position, change) in entry.documents.iter().enumerate() {
            let before = change
                .before
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let after = change
                .after
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT INTO audit_documents
                     (operation_id, position, document_id, before_state, after_state)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    entry.operation_id,
                    position as i64,
                    change.document_id,
                    before,
                    after,
                ],
            )?;
        }

        tx.commit()?;

        log::debug!(
            "Appended audit entry {} (kind {}, {} document(s))",
            entry.operation_id,
            entry.kind,
            entry.documents.len()
        );
        Ok(entry.operation_id.clone())
    }

    /// Entries most recent first, optionally bounded by kind and count.
    ///
    /// Re-queries the database on every call, so the sequence is
    /// restartable and reflects appends made since the last read.
    pub fn list(&self, filter: &LedgerFilter) -> Result<Vec<AuditEntry>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = filter.limit.map_or(-1_i64, |l| l as i64);

        let ops: Vec<OperationRow> = match filter.kind {
            Some(kind) => {
                let mut stmt = self.conn.prepare(
                    "SELECT operation_id, performed_at, kind, metadata
                     FROM audit_operations
                     WHERE kind = ?1
                     ORDER BY rowid DESC
                     LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![kind.as_str(), limit], row_to_operation)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT operation_id, performed_at, kind, metadata
                     FROM audit_operations
                     ORDER BY rowid DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit], row_to_operation)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        ops.into_iter()
            .map(|op| {
                let documents = self.documents_for(&op.operation_id)?;
                build_entry(op, documents)
            })
            .collect()
    }

    /// Look up a single entry by operation id.
    pub fn get(&self, operation_id: &str) -> Result<Option<AuditEntry>> {
        let op = self
            .conn
            .query_row(
                "SELECT operation_id, performed_at, kind, metadata
                 FROM audit_operations
                 WHERE operation_id = ?1",
                [operation_id],
                row_to_operation,
            )
            .optional()?;

        match op {
            Some(op) => {
                let documents = self.documents_for(&op.operation_id)?;
                Ok(Some(build_entry(op, documents)?))
            }
            None => Ok(None),
        }
    }

    /// The most recently appended entry, if any.
    pub fn latest(&self) -> Result<Option<AuditEntry>> {
        let filter = LedgerFilter {
            kind: None,
            limit: Some(1),
        };
        Ok(self.list(&filter)?.into_iter().next())
    }

    /// Total number of recorded operations.
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM audit_operations", [], |row| {
                    row.get(0)
                })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn documents_for(&self, operation_id: &str) -> Result<Vec<DocumentChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT document_id, before_state, after_state
             FROM audit_documents
             WHERE operation_id = ?1
             ORDER BY position",
        )?;
        let rows: Vec<(String, Option<String>, Option<String>)> = stmt
            .query_map([operation_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(document_id, before, after)| {
                Ok(DocumentChange {
                    document_id,
                    before: before.as_deref().map(serde_json::from_str).transpose()?,
                    after: after.as_deref().map(serde_json::from_str).transpose()?,
                })
            })
            .collect()
    }
}

struct OperationRow {
    operation_id: String,
    performed_at: String,
    kind: String,
    metadata: String,
}

fn row_to_operation(row: &rusqlite::Row) -> rusqlite::Result<OperationRow> {
    Ok(OperationRow {
        operation_id: row.get(0)?,
        performed_at: row.get(1)?,
        kind: row.get(2)?,
        metadata: row.get(3)?,
    })
}

fn build_entry(op: OperationRow, documents: Vec<DocumentChange>) -> Result<AuditEntry> {
    let performed_at = DateTime::parse_from_rfc3339(&op.performed_at)
        .map_err(|e| Error::InvalidInput(format!("bad ledger timestamp: {e}")))?
        .with_timezone(&Utc);
    let kind: OperationKind = op.kind.parse()?;
    let metadata = serde_json::from_str(&op.metadata)?;
    Ok(AuditEntry {
        operation_id: op.operation_id,
        performed_at,
        kind,
        documents,
        metadata,
    })
}
