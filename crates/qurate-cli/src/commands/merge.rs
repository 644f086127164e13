use anyhow::Result;

use qurate_core::model::{Cluster, ResolveContext, Strategy};
use qurate_core::store::DocumentStore;
use qurate_dedup::{resolve, ApplyOutcome, Config, MutationExecutor};

use super::{confirm, open_ledger, open_store, render};

pub async fn run_merge(
    config: &Config,
    ids: Vec<String>,
    strategy: &str,
    keep: Option<String>,
    consolidate: bool,
    new_id: bool,
    yes: bool,
) -> Result<()> {
    let strategy: Strategy = strategy.parse()?;
    if new_id && !consolidate {
        anyhow::bail!("--new-id only applies with --consolidate");
    }

    let mut ids = ids;
    ids.sort();
    ids.dedup();
    if ids.len() < 2 {
        anyhow::bail!("need at least two distinct record ids");
    }

    match (&keep, strategy) {
        (Some(keep), Strategy::Manual) if !ids.contains(keep) => {
            anyhow::bail!("--keep id '{keep}' is not among the listed records");
        }
        (Some(_), Strategy::Manual) | (None, _) => {}
        (Some(_), _) => anyhow::bail!("--keep only applies with --strategy manual"),
    }
    if strategy == Strategy::Manual && keep.is_none() {
        anyhow::bail!("pass --keep <id> with --strategy manual");
    }

    let store = open_store(config)?;
    let mut ledger = open_ledger(config)?;

    let mut members = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for id in &ids {
        match store.get(id).await? {
            Some(record) => members.push(record),
            None => missing.push(id.clone()),
        }
    }
    if !missing.is_empty() {
        anyhow::bail!("no record(s) with id(s): {}", missing.join(", "));
    }

    // The operator vouches for the grouping, so the cluster is recorded
    // as an exact one even when the question texts differ.
    let cluster = Cluster::exact(members);
    render::print_cluster(1, &cluster);

    let context = ResolveContext {
        preferred_sources: config.preferred_sources.clone(),
        choice: keep,
        consolidate,
        assign_new_id: new_id,
    };
    let resolution = resolve(&cluster, strategy, &context)?;
    println!("  plan: {}", resolution.describe());

    if !yes && !confirm("Apply this merge?")? {
        println!("Aborted");
        return Ok(());
    }

    let mut executor = MutationExecutor::new(&store, &mut ledger);
    match executor.execute(resolution).await? {
        ApplyOutcome::Applied { operation_id } => {
            println!("✓ Merged (operation {operation_id})");
            println!("  undo with 'qurate audit undo {operation_id}'");
        }
        ApplyOutcome::Skipped => println!("Nothing to change"),
    }

    Ok(())
}
