/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Logical operations, one row each. Append-only: rows are never updated
-- or deleted, and rowid order is the ledger order.
CREATE TABLE IF NOT EXISTS audit_operations (
    operation_id TEXT PRIMARY KEY,
    performed_at TEXT NOT NULL,
    kind TEXT NOT NULL,
    metadata TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_operations_kind ON audit_operations(kind);

-- Affected-document snapshots, ordered within their operation.
-- before_state / after_state hold full record JSON, or NULL for
-- did-not-exist / was-deleted respectively.
CREATE TABLE IF NOT EXISTS audit_documents (
    operation_id TEXT NOT NULL REFERENCES audit_operations(operation_id),
    position INTEGER NOT NULL,
    document_id TEXT NOT NULL,
    before_state TEXT,
    after_state TEXT,
    PRIMARY KEY (operation_id, position)
);

CREATE INDEX IF NOT EXISTS idx_audit_documents_document_id ON audit_documents(document_id);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: MIGRATION_001,
}];
