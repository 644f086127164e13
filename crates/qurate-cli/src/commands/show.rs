use anyhow::Result;

use qurate_core::store::DocumentStore;
use qurate_dedup::Config;

use super::{open_store, render};

pub async fn run_show(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config)?;
    match store.get(id).await? {
        Some(record) => {
            render::print_record(&record);
            Ok(())
        }
        None => anyhow::bail!("no record with id '{id}'"),
    }
}
