use anyhow::Result;

use qurate_core::store::{DocumentStore, RecordFilter};
use qurate_dedup::Config;

use super::{open_store, render};

pub async fn run_similar(
    config: &Config,
    id: &str,
    threshold: Option<f64>,
    limit: usize,
) -> Result<()> {
    let store = open_store(config)?;
    let record = store
        .get(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record with id '{id}'"))?;
    let Some(vector) = record.embedding.as_deref() else {
        anyhow::bail!("record '{id}' has no embedding to search with");
    };
    let threshold = threshold.unwrap_or(config.similarity_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("threshold {threshold} out of range (expected 0.0 ..= 1.0)");
    }

    println!("Records similar to {} (threshold {threshold:.2})", record.id);
    println!("  query: {}", render::truncate(&record.question, 64));

    let neighbors = store
        .vector_neighbors(vector, threshold, limit, Some(id), &RecordFilter::default())
        .await?;

    if neighbors.is_empty() {
        println!("\nNo records scored at or above the threshold");
        return Ok(());
    }
    println!();
    for neighbor in &neighbors {
        println!("  {:.4}  {}", neighbor.score, render::record_line(&neighbor.record));
    }
    println!("\n{} neighbor(s)", neighbors.len());

    Ok(())
}
