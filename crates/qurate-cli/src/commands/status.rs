use anyhow::Result;
use std::collections::HashMap;

use qurate_core::store::RecordFilter;
use qurate_dedup::{config, fetch_all, Config};

use super::{open_ledger, open_store};

pub async fn run_status(config: &Config) -> Result<()> {
    println!("\n📊 Qurate Status\n");

    let config_path = config::config_file_path();
    let marker = if config_path.exists() {
        ""
    } else {
        " (not created)"
    };
    println!("  Config file: {}{marker}", config_path.display());

    if config.is_configured() {
        let store = open_store(config)?;
        match store.ping().await {
            Ok(()) => {
                println!("  Collection: {}/{} ✓", config.keyspace, config.collection);
                show_collection_stats(config, &store).await?;
            }
            Err(e) => println!("  Collection: unreachable ✗ ({e})"),
        }
    } else {
        println!("  Collection: not configured");
        println!("\n  Run 'qurate config init' and set endpoint/token to connect");
    }

    let ledger = open_ledger(config)?;
    println!("\n  Ledger: {}", config.ledger_path.display());
    println!("  Recorded operations: {}", ledger.count()?);
    if let Some(latest) = ledger.latest()? {
        println!(
            "  Last operation: {} at {} ({})",
            latest.kind,
            latest.performed_at.format("%Y-%m-%d %H:%M:%S"),
            latest.operation_id
        );
    }

    Ok(())
}

async fn show_collection_stats(config: &Config, store: &qurate_store::DataApiStore) -> Result<()> {
    let records = fetch_all(
        store,
        &RecordFilter::default(),
        config.batch_size,
        Some(config.max_fetch),
    )
    .await?;

    // The whole-collection read is capped, so a full collection shows as
    // a lower bound rather than an exact count.
    if records.len() >= config.max_fetch {
        println!("  Records: {}+ (first {} fetched)", records.len(), config.max_fetch);
    } else {
        println!("  Records: {}", records.len());
    }

    let mut categories: HashMap<&str, usize> = HashMap::new();
    let mut embedded = 0usize;
    let mut unanswered = 0usize;
    for record in &records {
        *categories
            .entry(record.category.as_deref().unwrap_or("(uncategorized)"))
            .or_default() += 1;
        if record.has_embedding() {
            embedded += 1;
        }
        if record.answer.trim().is_empty() {
            unanswered += 1;
        }
    }
    println!("  With embeddings: {embedded}");
    if unanswered > 0 {
        println!("  Empty answers: {unanswered}");
    }

    if !categories.is_empty() {
        let mut counts: Vec<_> = categories.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        println!("  Categories:");
        for (category, count) in counts.into_iter().take(8) {
            println!("    {category}: {count}");
        }
    }

    Ok(())
}
