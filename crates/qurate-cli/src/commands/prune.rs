use anyhow::Result;
use serde_json::json;

use qurate_core::model::QaRecord;
use qurate_core::store::RecordFilter;
use qurate_dedup::{fetch_all, ApplyOutcome, Config, MutationExecutor};

use super::{confirm, open_ledger, open_store, render};

/// Answer texts treated as "no real answer" when the operator names none.
const DEFAULT_PLACEHOLDERS: [&str; 3] = ["unanswered", "N/A", ""];

fn effective_placeholders(placeholders: Vec<String>) -> Vec<String> {
    let mut placeholders = if placeholders.is_empty() {
        DEFAULT_PLACEHOLDERS.iter().map(|s| (*s).to_string()).collect()
    } else {
        placeholders
    };
    placeholders.sort();
    placeholders.dedup();
    placeholders
}

pub async fn run_prune(config: &Config, placeholders: Vec<String>, yes: bool) -> Result<()> {
    let placeholders = effective_placeholders(placeholders);

    let store = open_store(config)?;

    // One filtered fetch per placeholder; the answer match is exact and
    // pushed down to the backend.
    let mut doomed: Vec<QaRecord> = Vec::new();
    for placeholder in &placeholders {
        let filter = RecordFilter {
            answer: Some(placeholder.clone()),
            ..RecordFilter::default()
        };
        let matches = fetch_all(&store, &filter, config.batch_size, Some(config.max_fetch)).await?;
        doomed.extend(matches);
    }
    doomed.sort_by(|a, b| a.id.cmp(&b.id));
    doomed.dedup_by(|a, b| a.id == b.id);

    if doomed.is_empty() {
        println!("✓ No unanswered records (placeholders: {placeholders:?})");
        return Ok(());
    }

    println!("Unanswered records ({}):\n", doomed.len());
    for record in &doomed {
        println!(
            "  {}  {}  (answer: {:?})",
            record.id,
            render::truncate(&record.question, 48),
            record.answer
        );
    }

    if !yes && !confirm(&format!("\nDelete {} record(s)?", doomed.len()))? {
        println!("Aborted");
        return Ok(());
    }

    let ids: Vec<String> = doomed.iter().map(|r| r.id.clone()).collect();
    let metadata = json!({
        "reason": "prune-unanswered",
        "placeholders": placeholders,
    });

    let mut ledger = open_ledger(config)?;
    let mut executor = MutationExecutor::new(&store, &mut ledger);
    match executor.delete_many(&ids, metadata).await? {
        ApplyOutcome::Applied { operation_id } => {
            println!("✓ Deleted {} record(s) (operation {operation_id})", ids.len());
            println!("  undo with 'qurate audit undo {operation_id}'");
        }
        ApplyOutcome::Skipped => println!("Nothing was deleted"),
    }

    Ok(())
}
