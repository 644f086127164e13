use anyhow::Result;

use qurate_core::keyword::{self, SearchField};
use qurate_core::store::RecordFilter;
use qurate_dedup::{fetch_all, Config};

use super::{open_store, render};

pub async fn run_search(
    config: &Config,
    term: &str,
    field: &str,
    category: Option<String>,
    limit: usize,
) -> Result<()> {
    let field: SearchField = field.parse()?;

    let store = open_store(config)?;
    let scope = RecordFilter {
        category,
        ..RecordFilter::default()
    };
    let records = fetch_all(&store, &scope, config.batch_size, Some(config.max_fetch)).await?;
    let scanned = records.len();
    let hits = keyword::filter_records(records, term, field);

    if hits.is_empty() {
        println!("No matches for '{term}' in {scanned} record(s)");
        return Ok(());
    }

    for record in hits.iter().take(limit) {
        println!("{}", render::record_line(record));
    }
    if hits.len() > limit {
        println!("\n{} match(es), showing first {limit}", hits.len());
    } else {
        println!("\n{} match(es)", hits.len());
    }

    Ok(())
}
