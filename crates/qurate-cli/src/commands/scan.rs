use anyhow::Result;

use qurate_core::store::RecordFilter;
use qurate_dedup::{scan, Config, ScanMethod, ScanOptions};

use super::{open_store, render};

/// Build scan options from configuration plus command-line overrides.
///
/// Whole-collection scans are still bounded by `max_fetch` unless the
/// operator narrows further with `--sample`.
pub fn scan_options(
    config: &Config,
    method: &str,
    threshold: Option<f64>,
    category: Option<String>,
    source: Option<String>,
    sample: Option<usize>,
) -> Result<ScanOptions> {
    let method: ScanMethod = method.parse()?;
    let mut options = ScanOptions::new(method);
    options.threshold = threshold.unwrap_or(config.duplicate_threshold);
    options.scope = RecordFilter {
        category,
        source_file: source,
        ..RecordFilter::default()
    };
    options.batch_size = config.batch_size;
    options.neighbor_limit = config.neighbor_limit;
    options.sample = Some(sample.unwrap_or(config.max_fetch));
    Ok(options)
}

pub async fn run_scan(
    config: &Config,
    method: &str,
    threshold: Option<f64>,
    category: Option<String>,
    source: Option<String>,
    sample: Option<usize>,
    json: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let options = scan_options(config, method, threshold, category, source, sample)?;

    if json {
        let report = scan(&store, &options).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("⏳ Scanning for duplicates ({} method)...", options.method);
    let report = scan(&store, &options).await?;

    if report.is_clean() {
        println!("\n✓ No duplicates found in {} record(s)", report.scanned);
        return Ok(());
    }

    for (i, cluster) in report.clusters.iter().enumerate() {
        render::print_cluster(i + 1, cluster);
    }
    println!(
        "\n📊 {} cluster(s) across {} scanned record(s); {} record(s) removable",
        report.clusters.len(),
        report.scanned,
        report.removable()
    );
    if options.sample == Some(report.scanned) {
        println!("(scan hit its record cap; raise --sample to scan more)");
    }
    println!("\nRun 'qurate apply' to resolve them");

    Ok(())
}
