use std::io::Write;

use anyhow::Result;
use qurate_core::ledger::AuditLedger;
use qurate_dedup::Config;
use qurate_store::{DataApiSettings, DataApiStore};

pub mod apply;
pub mod audit;
pub mod config;
pub mod edit;
pub mod list;
pub mod merge;
pub mod prune;
pub mod render;
pub mod scan;
pub mod search;
pub mod show;
pub mod similar;
pub mod status;

pub use apply::{run_apply, ApplyArgs};
pub use audit::{run_audit_list, run_audit_show, run_audit_undo};
pub use edit::{run_add, run_delete, run_update};
pub use list::run_list;
pub use merge::run_merge;
pub use prune::run_prune;
pub use scan::run_scan;
pub use search::run_search;
pub use show::run_show;
pub use similar::run_similar;
pub use status::run_status;

/// Build the document store from configuration.
pub(crate) fn open_store(config: &Config) -> Result<DataApiStore> {
    let (endpoint, token) = config.require_connection()?;
    log::debug!(
        "document store target: {}/{}",
        config.keyspace,
        config.collection
    );
    Ok(DataApiStore::new(DataApiSettings {
        endpoint: endpoint.to_string(),
        token: token.to_string(),
        keyspace: config.keyspace.clone(),
        collection: config.collection.clone(),
        request_timeout: config.request_timeout(),
        max_retries: config.max_retries,
    })?)
}

/// Open the audit ledger, creating its directory if needed.
pub(crate) fn open_ledger(config: &Config) -> Result<AuditLedger> {
    if let Some(parent) = config.ledger_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    log::debug!("opening ledger at {}", config.ledger_path.display());
    Ok(AuditLedger::open(&config.ledger_path)?)
}

/// Ask a yes/no question on stdin, defaulting to no.
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
