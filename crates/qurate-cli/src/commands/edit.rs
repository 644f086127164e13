//! Single-record mutations: add, update, delete.
//!
//! All three go through the `MutationExecutor` so each change lands in
//! the audit ledger and can be undone like any bulk operation.

use anyhow::Result;
use chrono::NaiveDate;
use uuid::Uuid;

use qurate_core::model::QaRecord;
use qurate_core::store::{DocumentStore, RecordPatch};
use qurate_dedup::{ApplyOutcome, Config, MutationExecutor};

use super::{confirm, open_ledger, open_store, render};

pub async fn run_add(
    config: &Config,
    question: String,
    answer: String,
    category: Option<String>,
    source: Option<String>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let store = open_store(config)?;
    let mut ledger = open_ledger(config)?;

    let mut record = QaRecord::new(Uuid::new_v4().to_string(), question, answer);
    record.category = category;
    record.source_file = source;
    record.document_date = date;

    let mut executor = MutationExecutor::new(&store, &mut ledger);
    let outcome = executor.insert_record(&record).await?;

    println!("✓ Added {}", record.id);
    if let Some(operation_id) = outcome.operation_id() {
        println!("  recorded as operation {operation_id}");
    }

    Ok(())
}

pub async fn run_update(
    config: &Config,
    id: &str,
    question: Option<String>,
    answer: Option<String>,
    category: Option<String>,
    source: Option<String>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let patch = RecordPatch {
        question,
        answer,
        category,
        source_file: source,
        document_date: date,
    };
    if patch.is_empty() {
        anyhow::bail!(
            "nothing to update; pass at least one of --question, --answer, \
             --category, --source, --date"
        );
    }

    let store = open_store(config)?;
    let mut ledger = open_ledger(config)?;
    let mut executor = MutationExecutor::new(&store, &mut ledger);

    match executor.update_record(id, &patch).await? {
        ApplyOutcome::Applied { operation_id } => {
            println!("✓ Updated {id} (operation {operation_id})");
        }
        ApplyOutcome::Skipped => println!("No change"),
    }

    Ok(())
}

pub async fn run_delete(config: &Config, id: &str, yes: bool) -> Result<()> {
    let store = open_store(config)?;
    let record = store
        .get(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record with id '{id}'"))?;

    println!("{}", render::record_line(&record));
    if !yes && !confirm("Delete this record?")? {
        println!("Aborted");
        return Ok(());
    }

    let mut ledger = open_ledger(config)?;
    let mut executor = MutationExecutor::new(&store, &mut ledger);
    match executor.delete_record(id).await? {
        ApplyOutcome::Applied { operation_id } => {
            println!("✓ Deleted {id} (operation {operation_id})");
            println!("  undo with 'qurate audit undo {operation_id}'");
        }
        ApplyOutcome::Skipped => println!("Record was already gone"),
    }

    Ok(())
}
