use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use qurate_dedup::Config;

mod commands;

use commands::ApplyArgs;

#[derive(Debug, Parser)]
#[command(name = "qurate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the audit ledger (default: ~/.local/share/qurate/ledger.db)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Scan the collection for duplicate question-answer records
    ///
    /// Fetches records in pages and groups them into duplicate clusters.
    /// Two detection methods are available:
    ///
    /// - exact: normalizes question text (case, whitespace, punctuation)
    ///   and groups records whose normal forms collide
    /// - semantic: runs a similarity search per embedded record and
    ///   keeps pairs scoring at or above the threshold, then joins
    ///   overlapping pairs into clusters
    ///
    /// Use --method both to run the two detectors in one pass. Records
    /// without embeddings are skipped by the semantic detector, and the
    /// fetch stops at the configured max_fetch cap unless --sample
    /// narrows it further.
    ///
    /// The scan only reports; nothing is modified. Use 'qurate apply'
    /// to resolve the clusters it finds.
    ///
    /// Output:
    /// - One block per cluster with member ids, versions, questions,
    ///   and answer previews
    /// - Summary line with cluster, record, and removable counts
    Scan {
        /// Detection method: exact, semantic, or both
        #[arg(long, default_value = "exact")]
        method: String,

        /// Similarity floor for semantic clustering (default from config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Only scan records in this category
        #[arg(long)]
        category: Option<String>,

        /// Only scan records from this source file
        #[arg(long)]
        source: Option<String>,

        /// Stop fetching after this many records
        #[arg(long)]
        sample: Option<usize>,

        /// Emit the report as JSON instead of the cluster listing
        #[arg(long)]
        json: bool,
    },
    /// Scan, resolve, and apply duplicate cleanup
    Apply(ApplyArgs),
    /// Merge specific records as one duplicate group
    Merge {
        /// Record ids to merge (at least two)
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,

        /// Resolution strategy
        #[arg(long, default_value = "keep-first")]
        strategy: String,

        /// Survivor id, required with --strategy manual
        #[arg(long)]
        keep: Option<String>,

        /// Synthesize a merged record instead of keeping the survivor verbatim
        #[arg(long)]
        consolidate: bool,

        /// With --consolidate, write the merge under a fresh id
        #[arg(long)]
        new_id: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List records with optional filters
    List {
        /// Only records in this category
        #[arg(long)]
        category: Option<String>,

        /// Only records from this source file
        #[arg(long)]
        source: Option<String>,

        /// Inclusive document-date lower bound (YYYY-MM-DD)
        #[arg(long)]
        date_from: Option<NaiveDate>,

        /// Inclusive document-date upper bound (YYYY-MM-DD)
        #[arg(long)]
        date_to: Option<NaiveDate>,

        /// Maximum records to list
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one record in full
    Show {
        /// Record id
        id: String,
    },
    /// Keyword search over question and answer text
    Search {
        /// Text to look for (case-insensitive substring)
        term: String,

        /// Where to match: question, answer, or both
        #[arg(long, default_value = "both")]
        field: String,

        /// Only records in this category
        #[arg(long)]
        category: Option<String>,

        /// Maximum matches to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Find records semantically similar to one record
    Similar {
        /// Record id whose embedding seeds the search
        id: String,

        /// Similarity floor (default from config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum neighbors to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Add a new record
    Add {
        #[arg(long)]
        question: String,

        #[arg(long)]
        answer: String,

        #[arg(long)]
        category: Option<String>,

        /// Source file label
        #[arg(long)]
        source: Option<String>,

        /// Document date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Update fields of a record
    Update {
        /// Record id
        id: String,

        #[arg(long)]
        question: Option<String>,

        #[arg(long)]
        answer: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// Source file label
        #[arg(long)]
        source: Option<String>,

        /// Document date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a record
    Delete {
        /// Record id
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Remove records whose answer is empty or a placeholder
    PruneUnanswered {
        /// Placeholder answer to treat as unanswered (repeatable;
        /// replaces the built-in list)
        #[arg(long = "placeholder")]
        placeholders: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show collection and ledger status
    Status,
    /// Inspect and undo recorded operations
    #[command(subcommand)]
    Audit(AuditCommands),
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, clap::Subcommand)]
enum AuditCommands {
    /// List recorded operations, most recent first
    List {
        /// Filter by kind: update, delete, merge, insert, or undo
        #[arg(long)]
        kind: Option<String>,

        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one operation with its document snapshots
    Show {
        /// Operation id
        operation_id: String,
    },
    /// Undo an operation by replaying its snapshots in reverse
    Undo {
        /// Operation id to undo
        operation_id: Option<String>,

        /// Undo the most recent operation instead
        #[arg(long)]
        last: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommands {
    /// Create the config file with defaults
    Init,
    /// Show the current effective configuration
    Show,
    /// Show the config file path
    Path,
    /// Show example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.ledger {
        Some(path) => Config::load_with_ledger_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Scan {
            method,
            threshold,
            category,
            source,
            sample,
            json,
        } => {
            commands::run_scan(&config, &method, threshold, category, source, sample, json)
                .await?;
        }
        Commands::Apply(args) => {
            commands::run_apply(&config, args).await?;
        }
        Commands::Merge {
            ids,
            strategy,
            keep,
            consolidate,
            new_id,
            yes,
        } => {
            commands::run_merge(&config, ids, &strategy, keep, consolidate, new_id, yes).await?;
        }
        Commands::List {
            category,
            source,
            date_from,
            date_to,
            limit,
        } => {
            commands::run_list(&config, category, source, date_from, date_to, limit).await?;
        }
        Commands::Show { id } => {
            commands::run_show(&config, &id).await?;
        }
        Commands::Search {
            term,
            field,
            category,
            limit,
        } => {
            commands::run_search(&config, &term, &field, category, limit).await?;
        }
        Commands::Similar {
            id,
            threshold,
            limit,
        } => {
            commands::run_similar(&config, &id, threshold, limit).await?;
        }
        Commands::Add {
            question,
            answer,
            category,
            source,
            date,
        } => {
            commands::run_add(&config, question, answer, category, source, date).await?;
        }
        Commands::Update {
            id,
            question,
            answer,
            category,
            source,
            date,
        } => {
            commands::run_update(&config, &id, question, answer, category, source, date).await?;
        }
        Commands::Delete { id, yes } => {
            commands::run_delete(&config, &id, yes).await?;
        }
        Commands::PruneUnanswered { placeholders, yes } => {
            commands::run_prune(&config, placeholders, yes).await?;
        }
        Commands::Status => {
            commands::run_status(&config).await?;
        }
        Commands::Audit(cmd) => match cmd {
            AuditCommands::List { kind, limit } => {
                commands::run_audit_list(&config, kind, limit)?;
            }
            AuditCommands::Show { operation_id } => {
                commands::run_audit_show(&config, &operation_id)?;
            }
            AuditCommands::Undo {
                operation_id,
                last,
                yes,
            } => {
                commands::run_audit_undo(&config, operation_id, last, yes).await?;
            }
        },
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Init => commands::config::init_config()?,
            ConfigCommands::Show => commands::config::show_config(&config)?,
            ConfigCommands::Path => commands::config::show_path()?,
            ConfigCommands::Example => commands::config::show_example()?,
        },
    }

    Ok(())
}
