use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::model::record::QaRecord;

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Update,
    Delete,
    Merge,
    Insert,
    /// A replay of another entry's before-states; metadata names the
    /// undone operation.
    Undo,
}

impl OperationKind {
    pub const ALL: [Self; 5] = [
        Self::Update,
        Self::Delete,
        Self::Merge,
        Self::Insert,
        Self::Undo,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Merge => "merge",
            Self::Insert => "insert",
            Self::Undo => "undo",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "unknown operation kind '{s}' (expected one of: update, delete, merge, insert, undo)"
                ))
            })
    }
}

/// Before/after snapshots of one document touched by an operation.
///
/// Snapshots are deep copies: they stay valid after the originating
/// record is mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub document_id: String,

    /// State before the mutation; `None` when the document did not exist.
    pub before: Option<QaRecord>,

    /// State after the mutation; `None` when the document was deleted.
    pub after: Option<QaRecord>,
}

impl DocumentChange {
    #[must_use]
    pub fn updated(before: QaRecord, after: QaRecord) -> Self {
        Self {
            document_id: after.id.clone(),
            before: Some(before),
            after: Some(after),
        }
    }

    #[must_use]
    pub fn deleted(before: QaRecord) -> Self {
        Self {
            document_id: before.id.clone(),
            before: Some(before),
            after: None,
        }
    }

    #[must_use]
    pub fn inserted(after: QaRecord) -> Self {
        Self {
            document_id: after.id.clone(),
            before: None,
            after: Some(after),
        }
    }

    /// A document covered by the operation but left untouched (the
    /// survivor of a keep-one decision).
    #[must_use]
    pub fn unchanged(state: QaRecord) -> Self {
        Self {
            document_id: state.id.clone(),
            before: Some(state.clone()),
            after: Some(state),
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// One reversible operation in the audit ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique id, generated at construction.
    pub operation_id: String,

    pub performed_at: DateTime<Utc>,

    pub kind: OperationKind,

    /// Ordered snapshots, one per touched document, in mutation order.
    pub documents: Vec<DocumentChange>,

    /// Free-form context: strategy, threshold, undone operation id,
    /// partial-failure detail.
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        kind: OperationKind,
        documents: Vec<DocumentChange>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            performed_at: Utc::now(),
            kind,
            documents,
            metadata,
        }
    }

    #[must_use]
    pub fn document_ids(&self) -> Vec<&str> {
        self.documents
            .iter()
            .map(|c| c.document_id.as_str())
            .collect()
    }

    /// The operation id this entry undoes, when it is an undo entry.
    #[must_use]
    pub fn undone_operation(&self) -> Option<&str> {
        self.metadata.get("undone_operation").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> QaRecord {
        QaRecord::new(id.to_string(), "q".to_string(), "a".to_string())
    }

    #[test]
    fn test_operation_kind_round_trip() {
        for kind in OperationKind::ALL {
            let parsed: OperationKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("merge-all".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_document_change_constructors() {
        let deleted = DocumentChange::deleted(record("qa-1"));
        assert_eq!(deleted.document_id, "qa-1");
        assert!(deleted.before.is_some());
        assert!(deleted.after.is_none());
        assert!(!deleted.is_noop());

        let unchanged = DocumentChange::unchanged(record("qa-2"));
        assert!(unchanged.is_noop());

        let inserted = DocumentChange::inserted(record("qa-3"));
        assert!(inserted.before.is_none());
    }

    #[test]
    fn test_entries_get_unique_ids() {
        let a = AuditEntry::new(OperationKind::Delete, vec![], serde_json::Value::Null);
        let b = AuditEntry::new(OperationKind::Delete, vec![], serde_json::Value::Null);
        assert_ne!(a.operation_id, b.operation_id);
    }

    #[test]
    fn test_snapshots_survive_source_mutation() {
        let mut original = record("qa-1");
        let change = DocumentChange::deleted(original.clone());

        original.answer = "rewritten".to_string();
        assert_eq!(change.before.as_ref().unwrap().answer, "a");
    }

    #[test]
    fn test_undone_operation_metadata() {
        let entry = AuditEntry::new(
            OperationKind::Undo,
            vec![],
            serde_json::json!({ "undone_operation": "op-42" }),
        );
        assert_eq!(entry.undone_operation(), Some("op-42"));

        let plain = AuditEntry::new(OperationKind::Delete, vec![], serde_json::Value::Null);
        assert!(plain.undone_operation().is_none());
    }
}
