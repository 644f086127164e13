use anyhow::Result;
use std::io::Write;

use qurate_core::model::{Cluster, ResolveContext, Strategy};
use qurate_dedup::{resolve, scan, ApplyOutcome, Config, MutationExecutor};

use super::scan::scan_options;
use super::{open_ledger, open_store, render};

/// Selection and resolution flags for `qurate apply`.
#[derive(Debug, clap::Args)]
pub struct ApplyArgs {
    /// Detection method: exact, semantic, or both
    #[arg(long, default_value = "exact")]
    pub method: String,

    /// Resolution strategy: keep-first, keep-most-recent,
    /// keep-longest-answer, keep-preferred-source, or manual
    #[arg(long, default_value = "keep-first")]
    pub strategy: String,

    /// Similarity floor for semantic clustering (default from config)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Only scan records in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only scan records from this source file
    #[arg(long)]
    pub source: Option<String>,

    /// Stop fetching after this many records
    #[arg(long)]
    pub sample: Option<usize>,

    /// Ordered source label for keep-preferred-source (repeatable;
    /// overrides the configured list)
    #[arg(long = "preferred-source")]
    pub preferred_sources: Vec<String>,

    /// Synthesize a merged record instead of keeping the survivor verbatim
    #[arg(long)]
    pub consolidate: bool,

    /// With --consolidate, write the merge under a fresh id
    #[arg(long)]
    pub new_id: bool,

    /// Apply every cluster without prompting
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// What the operator chose for one cluster.
enum Verdict {
    Apply,
    Skip,
    Quit,
}

pub async fn run_apply(config: &Config, args: ApplyArgs) -> Result<()> {
    let strategy: Strategy = args.strategy.parse()?;
    if strategy == Strategy::Manual && args.yes {
        anyhow::bail!("--strategy manual needs a per-cluster survivor choice; drop --yes");
    }
    if args.new_id && !args.consolidate {
        anyhow::bail!("--new-id only applies with --consolidate");
    }

    let store = open_store(config)?;
    let mut ledger = open_ledger(config)?;
    let options = scan_options(
        config,
        &args.method,
        args.threshold,
        args.category,
        args.source,
        args.sample,
    )?;

    println!("⏳ Scanning for duplicates ({} method)...", options.method);
    let report = scan(&store, &options).await?;
    if report.is_clean() {
        println!("\n✓ No duplicates found in {} record(s)", report.scanned);
        return Ok(());
    }
    println!(
        "\n📊 {} cluster(s) across {} scanned record(s), strategy {strategy}",
        report.clusters.len(),
        report.scanned
    );

    let preferred_sources = if args.preferred_sources.is_empty() {
        config.preferred_sources.clone()
    } else {
        args.preferred_sources
    };

    let mut executor = MutationExecutor::new(&store, &mut ledger);
    let mut applied = 0usize;
    let mut skipped = 0usize;

    for (i, cluster) in report.clusters.iter().enumerate() {
        render::print_cluster(i + 1, cluster);

        let mut context = ResolveContext {
            preferred_sources: preferred_sources.clone(),
            choice: None,
            consolidate: args.consolidate,
            assign_new_id: args.new_id,
        };
        if strategy == Strategy::Manual {
            context.choice = Some(prompt_survivor(cluster)?);
        }

        let resolution = resolve(cluster, strategy, &context)?;
        println!("  plan: {}", resolution.describe());

        let verdict = if args.yes {
            Verdict::Apply
        } else {
            prompt_verdict()?
        };
        match verdict {
            Verdict::Skip => {
                skipped += 1;
                println!("  skipped");
                continue;
            }
            Verdict::Quit => {
                println!("  stopping early");
                break;
            }
            Verdict::Apply => {}
        }

        match executor.execute(resolution).await? {
            ApplyOutcome::Applied { operation_id } => {
                applied += 1;
                println!("  ✓ applied (operation {operation_id})");
            }
            ApplyOutcome::Skipped => {
                skipped += 1;
                println!("  nothing to change");
            }
        }
    }

    println!("\n📊 Applied {applied} cluster(s), skipped {skipped}");
    if applied > 0 {
        println!("Run 'qurate audit list' to review, 'qurate audit undo --last' to revert");
    }

    Ok(())
}

fn prompt_verdict() -> Result<Verdict> {
    loop {
        print!("  apply this cluster? [y/n/q] ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            // EOF on stdin, same as quitting
            return Ok(Verdict::Quit);
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(Verdict::Apply),
            "n" | "no" | "" => return Ok(Verdict::Skip),
            "q" | "quit" => return Ok(Verdict::Quit),
            _ => println!("  please answer y, n, or q"),
        }
    }
}

fn prompt_survivor(cluster: &Cluster) -> Result<String> {
    loop {
        print!("  survivor id: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            anyhow::bail!("stdin closed while waiting for a survivor id");
        }
        let id = line.trim();
        if cluster.contains(id) {
            return Ok(id.to_string());
        }
        println!("  '{id}' is not a member of this cluster");
    }
}
