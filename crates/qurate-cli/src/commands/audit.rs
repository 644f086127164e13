use anyhow::Result;

use qurate_core::ledger::LedgerFilter;
use qurate_core::model::OperationKind;
use qurate_dedup::{undo_operation, Config};

use super::{open_ledger, open_store, render};

pub fn run_audit_list(config: &Config, kind: Option<String>, limit: usize) -> Result<()> {
    let kind = kind.map(|k| k.parse::<OperationKind>()).transpose()?;
    let ledger = open_ledger(config)?;
    let entries = ledger.list(&LedgerFilter {
        kind,
        limit: Some(limit),
    })?;

    if entries.is_empty() {
        println!("No operations recorded");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", render::entry_line(entry));
    }
    println!("\n{} of {} operation(s)", entries.len(), ledger.count()?);
    println!("Run 'qurate audit show <operation-id>' for document snapshots");

    Ok(())
}

pub fn run_audit_show(config: &Config, operation_id: &str) -> Result<()> {
    let ledger = open_ledger(config)?;
    let entry = ledger.get(operation_id)?.ok_or_else(|| {
        anyhow::anyhow!("no audit entry with operation id '{operation_id}'")
    })?;

    println!("Operation: {}", entry.operation_id);
    println!("Kind:      {}", entry.kind);
    println!(
        "Performed: {}",
        entry.performed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !entry.metadata.is_null() {
        println!("Metadata:  {}", serde_json::to_string_pretty(&entry.metadata)?);
    }

    println!("\nDocuments ({}):", entry.documents.len());
    for change in &entry.documents {
        println!("\n  {}  {}", change.document_id, render::change_summary(change));
        if let Some(before) = &change.before {
            println!(
                "    before: v{}  {}",
                before.version,
                render::truncate(&before.question, 56)
            );
        }
        if let Some(after) = &change.after {
            println!(
                "    after:  v{}  {}",
                after.version,
                render::truncate(&after.question, 56)
            );
        }
    }

    if let Some(undone) = entry.undone_operation() {
        println!("\nThis entry undoes operation {undone}");
    }

    Ok(())
}

pub async fn run_audit_undo(
    config: &Config,
    operation_id: Option<String>,
    last: bool,
    yes: bool,
) -> Result<()> {
    if operation_id.is_some() == last {
        anyhow::bail!("pass exactly one of an operation id or --last");
    }

    let store = open_store(config)?;
    let mut ledger = open_ledger(config)?;

    // Resolve --last to a concrete entry up front so the prompt can show
    // what would be reverted.
    let target = match &operation_id {
        Some(id) => ledger
            .get(id)?
            .ok_or_else(|| anyhow::anyhow!("no audit entry with operation id '{id}'"))?,
        None => ledger
            .latest()?
            .ok_or_else(|| anyhow::anyhow!("the ledger has no operations to undo"))?,
    };

    println!("{}", render::entry_line(&target));
    if !yes && !super::confirm("Undo this operation?")? {
        println!("Aborted");
        return Ok(());
    }

    let undo_id = undo_operation(&store, &mut ledger, &target.operation_id).await?;
    println!("✓ Undo recorded as operation {undo_id}");
    println!("  'qurate audit undo {undo_id}' reapplies the original change");

    Ok(())
}
