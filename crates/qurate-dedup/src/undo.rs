//! Replay-based undo of audited operations.
//!
//! Undo re-applies an entry's before-states verbatim: records that were
//! deleted come back (version, embedding, timestamps intact), rewritten
//! records return to their prior content, and inserted records are
//! removed. The undo itself lands in the ledger as a new entry with the
//! snapshot sides swapped, so undoing an undo redoes the operation.
//!
//! Before anything is touched, every covered document is checked against
//! the entry's recorded after-state. Any mismatch means later operations
//! or external writes have moved the collection on, and the undo is
//! refused with `StaleUndo` rather than silently clobbering newer state.

use serde_json::json;

use qurate_core::error::{Error, Result};
use qurate_core::ledger::AuditLedger;
use qurate_core::model::{AuditEntry, OperationKind};
use qurate_core::store::DocumentStore;

use crate::execute::{ApplyOutcome, MutationExecutor, Step};

/// Undo the operation with the given id. Returns the operation id of the
/// newly appended undo entry.
pub async fn undo_operation<S>(
    store: &S,
    ledger: &mut AuditLedger,
    operation_id: &str,
) -> Result<String>
where
    S: DocumentStore + ?Sized,
{
    let entry = ledger
        .get(operation_id)?
        .ok_or_else(|| Error::not_found("audit entry", operation_id))?;

    check_freshness(store, &entry).await?;

    let steps = replay_steps(&entry);
    let metadata = json!({
        "reason": "undo",
        "undone_operation": entry.operation_id,
        "undone_kind": entry.kind.as_str(),
    });

    let mut executor = MutationExecutor::new(store, ledger);
    match executor
        .run_steps(OperationKind::Undo, steps, metadata)
        .await?
    {
        ApplyOutcome::Applied { operation_id } => Ok(operation_id),
        ApplyOutcome::Skipped => Err(Error::InvalidInput(format!(
            "operation {operation_id} has no effect to undo"
        ))),
    }
}

/// Undo the most recently appended entry.
pub async fn undo_last<S>(store: &S, ledger: &mut AuditLedger) -> Result<String>
where
    S: DocumentStore + ?Sized,
{
    let entry = ledger
        .latest()?
        .ok_or_else(|| Error::not_found("audit entry", "latest"))?;
    undo_operation(store, ledger, &entry.operation_id).await
}

/// Every document must still match its recorded after-state; checked in
/// full before any mutation so a stale undo touches nothing.
async fn check_freshness<S>(store: &S, entry: &AuditEntry) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    for change in &entry.documents {
        let current = store.get(&change.document_id).await?;
        if current != change.after {
            log::warn!(
                "Refusing undo of {}: document {} has changed since",
                entry.operation_id,
                change.document_id
            );
            return Err(Error::StaleUndo {
                operation_id: entry.operation_id.clone(),
                document_id: change.document_id.clone(),
            });
        }
    }
    Ok(())
}

/// Replay plan: each document goes from its after-state back to its
/// before-state, in the original mutation order. No-op rows (the
/// survivor coverage of a keep-one entry) replay without a storage call
/// so their snapshots stay symmetric for redo.
fn replay_steps(entry: &AuditEntry) -> Vec<Step> {
    entry
        .documents
        .iter()
        .map(|change| match (&change.before, &change.after) {
            (Some(before), Some(after)) if before == after => Step::Keep {
                state: before.clone(),
            },
            (Some(before), after) => Step::Write {
                before: after.clone(),
                record: before.clone(),
            },
            (None, Some(after)) => Step::Delete {
                id: change.document_id.clone(),
                before: Some(after.clone()),
            },
            (None, None) => Step::Delete {
                id: change.document_id.clone(),
                before: None,
            },
        })
        .collect()
}
