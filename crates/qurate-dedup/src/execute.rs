//! Applies resolutions to the store under audit.
//!
//! The executor re-reads the current state of every affected document,
//! performs the mutations in order, and records exactly what happened as
//! one ledger entry. A skip touches nothing and records nothing. When a
//! mutation fails partway through, already-applied changes are kept: the
//! entry covers the applied portion, and the caller gets a
//! `PartialApply` error naming the rest.

use std::fmt;

use serde_json::json;

use qurate_core::error::{ApplyFailure, Error, Result};
use qurate_core::ledger::AuditLedger;
use qurate_core::model::{
    Action, AuditEntry, ClusterMethod, DocumentChange, OperationKind, QaRecord, Resolution,
    Strategy,
};
use qurate_core::store::{DocumentStore, RecordPatch};

/// What an apply call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No storage effect, no ledger entry.
    Skipped,
    /// Every mutation applied and recorded under `operation_id`.
    Applied { operation_id: String },
}

impl ApplyOutcome {
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            Self::Skipped => None,
            Self::Applied { operation_id } => Some(operation_id),
        }
    }
}

/// One planned storage mutation. `Keep` covers a document in the audit
/// entry without a storage call; `Write` replaces when a before-state
/// exists and inserts otherwise.
pub(crate) enum Step {
    Keep {
        state: QaRecord,
    },
    Write {
        before: Option<QaRecord>,
        record: QaRecord,
    },
    Delete {
        id: String,
        before: Option<QaRecord>,
    },
}

impl Step {
    fn document_id(&self) -> &str {
        match self {
            Self::Keep { state } => &state.id,
            Self::Write { record, .. } => &record.id,
            Self::Delete { id, .. } => id,
        }
    }
}

pub struct MutationExecutor<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    ledger: &'a mut AuditLedger,
}

impl<S: DocumentStore + ?Sized> fmt::Debug for MutationExecutor<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationExecutor").finish_non_exhaustive()
    }
}

impl<'a, S: DocumentStore + ?Sized> MutationExecutor<'a, S> {
    pub fn new(store: &'a S, ledger: &'a mut AuditLedger) -> Self {
        Self { store, ledger }
    }

    /// Apply `resolution`, consuming it.
    ///
    /// Affected documents are re-read first, so stale scan snapshots
    /// never overwrite newer state: a survivor that has since been
    /// deleted fails the whole apply before any mutation, and a
    /// discarded record that is already gone becomes a no-op.
    pub async fn execute(&mut self, resolution: Resolution) -> Result<ApplyOutcome> {
        let Resolution {
            strategy,
            cluster_method,
            threshold,
            action,
        } = resolution;

        match action {
            Action::Skip => {
                log::debug!("Resolution skipped; nothing to apply");
                Ok(ApplyOutcome::Skipped)
            }
            Action::KeepOne {
                survivor,
                discarded,
            } => {
                let metadata = resolution_metadata(
                    strategy,
                    cluster_method,
                    threshold,
                    &survivor.id,
                    discarded.len() + 1,
                );

                let current = self
                    .store
                    .get(&survivor.id)
                    .await?
                    .ok_or_else(|| Error::not_found("survivor record", survivor.id.clone()))?;

                let mut steps = Vec::with_capacity(discarded.len() + 1);
                steps.push(Step::Keep { state: current });
                for record in discarded {
                    let before = self.store.get(&record.id).await?;
                    steps.push(Step::Delete {
                        id: record.id,
                        before,
                    });
                }
                self.run_steps(OperationKind::Delete, steps, metadata).await
            }
            Action::Merge {
                merged,
                survivor_id,
                discarded,
            } => {
                let in_place = merged.id == survivor_id;
                let member_count = discarded.len() + usize::from(in_place);
                let metadata = resolution_metadata(
                    strategy,
                    cluster_method,
                    threshold,
                    &survivor_id,
                    member_count,
                );

                let write = if in_place {
                    let before = self
                        .store
                        .get(&merged.id)
                        .await?
                        .ok_or_else(|| Error::not_found("survivor record", merged.id.clone()))?;
                    Step::Write {
                        before: Some(before),
                        record: merged,
                    }
                } else {
                    // Fresh id: an insert, which fails rather than
                    // clobbering an existing document.
                    Step::Write {
                        before: None,
                        record: merged,
                    }
                };

                let mut steps = Vec::with_capacity(discarded.len() + 1);
                steps.push(write);
                for record in discarded {
                    let before = self.store.get(&record.id).await?;
                    steps.push(Step::Delete {
                        id: record.id,
                        before,
                    });
                }
                self.run_steps(OperationKind::Merge, steps, metadata).await
            }
        }
    }

    /// Audited single-record edit. Fails without a ledger entry when the
    /// record does not exist or the patch is empty.
    pub async fn update_record(&mut self, id: &str, patch: &RecordPatch) -> Result<ApplyOutcome> {
        if patch.is_empty() {
            return Err(Error::InvalidInput(
                "empty patch: nothing to update".to_string(),
            ));
        }
        let before = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found("record", id))?;
        if !self.store.update(id, patch).await? {
            return Err(Error::not_found("record", id));
        }
        let after = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found("record", id))?;

        let entry = AuditEntry::new(
            OperationKind::Update,
            vec![DocumentChange::updated(before, after)],
            json!({ "reason": "manual-edit", "fields": patch_fields(patch) }),
        );
        let operation_id = self.ledger.append(&entry)?;
        log::info!("Updated record {id} (operation {operation_id})");
        Ok(ApplyOutcome::Applied { operation_id })
    }

    /// Audited single-record delete.
    pub async fn delete_record(&mut self, id: &str) -> Result<ApplyOutcome> {
        let before = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found("record", id))?;
        if !self.store.delete(id).await? {
            log::warn!("Record {id} was already gone at delete time");
        }

        let entry = AuditEntry::new(
            OperationKind::Delete,
            vec![DocumentChange::deleted(before)],
            json!({ "reason": "manual-delete" }),
        );
        let operation_id = self.ledger.append(&entry)?;
        log::info!("Deleted record {id} (operation {operation_id})");
        Ok(ApplyOutcome::Applied { operation_id })
    }

    /// Audited insert of a new record.
    pub async fn insert_record(&mut self, record: &QaRecord) -> Result<ApplyOutcome> {
        self.store.insert(record).await?;

        let entry = AuditEntry::new(
            OperationKind::Insert,
            vec![DocumentChange::inserted(record.clone())],
            json!({ "reason": "manual-insert" }),
        );
        let operation_id = self.ledger.append(&entry)?;
        log::info!("Inserted record {} (operation {operation_id})", record.id);
        Ok(ApplyOutcome::Applied { operation_id })
    }

    /// Audited batch delete under one entry; the caller supplies the
    /// metadata naming why (placeholder pruning, for instance). Ids that
    /// no longer exist become no-ops.
    pub async fn delete_many(
        &mut self,
        ids: &[String],
        metadata: serde_json::Value,
    ) -> Result<ApplyOutcome> {
        let mut steps = Vec::with_capacity(ids.len());
        for id in ids {
            let before = self.store.get(id).await?;
            steps.push(Step::Delete {
                id: id.clone(),
                before,
            });
        }
        self.run_steps(OperationKind::Delete, steps, metadata).await
    }

    /// Run mutations in order, stopping at the first failure, and record
    /// the applied portion as one entry. No entry is written when nothing
    /// actually changed.
    pub(crate) async fn run_steps(
        &mut self,
        kind: OperationKind,
        steps: Vec<Step>,
        mut metadata: serde_json::Value,
    ) -> Result<ApplyOutcome> {
        let attempted = steps.len();
        let mut changes: Vec<DocumentChange> = Vec::with_capacity(attempted);
        let mut failed: Option<(ApplyFailure, Error)> = None;
        let mut not_attempted: Vec<String> = Vec::new();

        for step in steps {
            if failed.is_some() {
                not_attempted.push(step.document_id().to_string());
                continue;
            }
            let document_id = step.document_id().to_string();
            match self.apply_step(step).await {
                Ok(change) => changes.push(change),
                Err(err) => {
                    log::error!("Mutation failed for {document_id}: {err}");
                    failed = Some((
                        ApplyFailure {
                            document_id,
                            message: err.to_string(),
                        },
                        err,
                    ));
                }
            }
        }

        let mutated = changes.iter().any(|c| !c.is_noop());

        if let Some((failure, source)) = failed {
            if !mutated {
                // Nothing real was applied, so there is nothing to record.
                return Err(source);
            }

            let mut failures = vec![failure];
            for id in not_attempted {
                failures.push(ApplyFailure {
                    document_id: id,
                    message: "not attempted: an earlier mutation failed".to_string(),
                });
            }
            annotate_partial(&mut metadata, &failures);

            let entry = AuditEntry::new(kind, changes, metadata);
            let operation_id = self.ledger.append(&entry)?;
            log::warn!(
                "Operation {operation_id} recorded partially: {} of {attempted} mutation(s) failed",
                failures.len()
            );
            return Err(Error::PartialApply {
                operation_id,
                attempted,
                failures,
            });
        }

        if !mutated {
            log::info!("All planned mutations were already satisfied; no entry written");
            return Ok(ApplyOutcome::Skipped);
        }

        let entry = AuditEntry::new(kind, changes, metadata);
        let operation_id = self.ledger.append(&entry)?;
        log::info!(
            "Applied {kind} operation {operation_id} covering {} document(s)",
            entry.documents.len()
        );
        Ok(ApplyOutcome::Applied { operation_id })
    }

    async fn apply_step(&self, step: Step) -> Result<DocumentChange> {
        match step {
            Step::Keep { state } => Ok(DocumentChange::unchanged(state)),
            Step::Write {
                before: Some(before),
                record,
            } => {
                if self.store.replace(&record).await? {
                    Ok(DocumentChange::updated(before, record))
                } else {
                    Err(Error::not_found("record", record.id))
                }
            }
            Step::Write {
                before: None,
                record,
            } => {
                self.store.insert(&record).await?;
                Ok(DocumentChange::inserted(record))
            }
            Step::Delete {
                id,
                before: Some(before),
            } => {
                if !self.store.delete(&id).await? {
                    // Vanished since the snapshot; the end state is what
                    // we wanted anyway.
                    log::warn!("Record {id} was already gone at delete time");
                }
                Ok(DocumentChange::deleted(before))
            }
            Step::Delete { id, before: None } => Ok(DocumentChange {
                document_id: id,
                before: None,
                after: None,
            }),
        }
    }
}

fn resolution_metadata(
    strategy: Strategy,
    cluster_method: ClusterMethod,
    threshold: Option<f64>,
    survivor_id: &str,
    member_count: usize,
) -> serde_json::Value {
    json!({
        "reason": "duplicate-resolution",
        "strategy": strategy.as_str(),
        "cluster_method": cluster_method.as_str(),
        "threshold": threshold,
        "survivor": survivor_id,
        "member_count": member_count,
    })
}

fn annotate_partial(metadata: &mut serde_json::Value, failures: &[ApplyFailure]) {
    if let serde_json::Value::Object(map) = metadata {
        map.insert("partial".to_string(), json!(true));
        map.insert(
            "failed".to_string(),
            json!(failures.iter().map(ToString::to_string).collect::<Vec<_>>()),
        );
    }
}

fn patch_fields(patch: &RecordPatch) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if patch.question.is_some() {
        fields.push("question");
    }
    if patch.answer.is_some() {
        fields.push("answer");
    }
    if patch.category.is_some() {
        fields.push("category");
    }
    if patch.source_file.is_some() {
        fields.push("source_file");
    }
    if patch.document_date.is_some() {
        fields.push("document_date");
    }
    fields
}
