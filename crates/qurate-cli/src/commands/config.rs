use anyhow::Result;

use qurate_dedup::{config, Config};

/// Show the current effective configuration.
pub fn show_config(cfg: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());
    let exists = config::config_file_path().exists();
    println!(
        "File exists: {}\n",
        if exists { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!(
        "  endpoint: {}",
        cfg.endpoint.as_deref().unwrap_or("<not set>")
    );
    println!(
        "  token: {}",
        cfg.token.as_deref().map_or("<not set>", |_| "<set>")
    );
    println!("  keyspace: {}", cfg.keyspace);
    println!("  collection: {}", cfg.collection);
    println!("  ledger_path: {}", cfg.ledger_path.display());
    println!("  similarity_threshold: {}", cfg.similarity_threshold);
    println!("  duplicate_threshold: {}", cfg.duplicate_threshold);
    println!("  batch_size: {}", cfg.batch_size);
    println!("  neighbor_limit: {}", cfg.neighbor_limit);
    println!("  max_fetch: {}", cfg.max_fetch);
    println!("  preferred_sources: {:?}", cfg.preferred_sources);
    println!("  request_timeout_secs: {}", cfg.request_timeout_secs);
    println!("  max_retries: {}", cfg.max_retries);

    println!("\nPriority: CLI args > ENV vars (QURATE_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to set the endpoint and token.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
