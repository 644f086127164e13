use anyhow::Result;
use chrono::NaiveDate;

use qurate_core::store::RecordFilter;
use qurate_dedup::{fetch_all, Config};

use super::{open_store, render};

pub async fn run_list(
    config: &Config,
    category: Option<String>,
    source: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    limit: usize,
) -> Result<()> {
    let store = open_store(config)?;
    let filter = RecordFilter {
        category,
        source_file: source,
        date_from,
        date_to,
        answer: None,
    };
    let records = fetch_all(&store, &filter, config.batch_size, Some(limit)).await?;

    if records.is_empty() {
        println!("No records matched");
        return Ok(());
    }

    for record in &records {
        println!("{}", render::record_line(record));
    }
    println!("\n{} record(s)", records.len());
    if records.len() == limit {
        println!("(listing capped at {limit}; raise --limit to see more)");
    }

    Ok(())
}
