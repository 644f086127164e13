use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for qurate.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (QURATE_* prefix)
/// 3. Config file (~/.config/qurate/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Document API endpoint URL (required for collection access).
    ///
    /// Can be set via:
    /// - ENV: QURATE_ENDPOINT
    /// - Config: endpoint = "https://..."
    pub endpoint: Option<String>,

    /// Application token for the document API.
    ///
    /// Can be set via:
    /// - ENV: QURATE_TOKEN
    /// - Config: token = "..."
    pub token: Option<String>,

    /// Keyspace holding the collection.
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Collection of question-answer records.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Path to the SQLite audit ledger.
    ///
    /// Can be set via:
    /// - CLI: --ledger /path/to/ledger.db
    /// - ENV: QURATE_LEDGER_PATH
    /// - Default: ~/.local/share/qurate/ledger.db
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Similarity floor for the `similar` command.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Similarity floor for semantic duplicate scans.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Page size for batched fetches.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-record cap on similarity candidates during a scan.
    #[serde(default = "default_neighbor_limit")]
    pub neighbor_limit: usize,

    /// Upper bound on records pulled by whole-collection reads.
    #[serde(default = "default_max_fetch")]
    pub max_fetch: usize,

    /// Ordered source labels for the keep-preferred-source strategy.
    #[serde(default)]
    pub preferred_sources: Vec<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient backend failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            keyspace: default_keyspace(),
            collection: default_collection(),
            ledger_path: default_ledger_path(),
            similarity_threshold: default_similarity_threshold(),
            duplicate_threshold: default_duplicate_threshold(),
            batch_size: default_batch_size(),
            neighbor_limit: default_neighbor_limit(),
            max_fetch: default_max_fetch(),
            preferred_sources: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/qurate/config.toml
    /// Reads environment variables with QURATE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        // If config file exists, load it
        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        // Set up environment variable scanning with QURATE_ prefix
        let env_opts = env::Options::with_top_level("qurate");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with a custom ledger path.
    ///
    /// This is used when the --ledger CLI flag is provided.
    pub fn load_with_ledger_path(ledger_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.ledger_path = ledger_path;
        Ok(config)
    }

    /// Whether enough is configured to reach the document API.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.token.is_some()
    }

    /// Endpoint and token, or a setup hint when either is missing.
    pub fn require_connection(&self) -> Result<(&str, &str)> {
        match (&self.endpoint, &self.token) {
            (Some(endpoint), Some(token)) => Ok((endpoint, token)),
            _ => anyhow::bail!(
                "no endpoint/token configured; set QURATE_ENDPOINT and QURATE_TOKEN \
                 or run 'qurate config init' and edit the config file"
            ),
        }
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_keyspace() -> String {
    "default_keyspace".to_string()
}

fn default_collection() -> String {
    "qa_records".to_string()
}

/// Get the default ledger path.
///
/// Returns: ~/.local/share/qurate/ledger.db (or platform equivalent)
fn default_ledger_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qurate")
        .join("ledger.db")
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_duplicate_threshold() -> f64 {
    0.90
}

fn default_batch_size() -> usize {
    100
}

fn default_neighbor_limit() -> usize {
    20
}

fn default_max_fetch() -> usize {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/qurate/config.toml
/// - macOS: ~/Library/Application Support/qurate/config.toml
/// - Windows: %APPDATA%\qurate\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qurate")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Qurate Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (QURATE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Document API endpoint for the record collection
#
# Can also be set via:
# - Environment: QURATE_ENDPOINT=https://your-db-region.apps.example.com
endpoint = "https://your-database-endpoint-here"

# Application token for the document API
#
# Can also be set via:
# - Environment: QURATE_TOKEN=AppToken:...
token = "your-application-token-here"

# Keyspace and collection holding the question-answer records
#keyspace = "default_keyspace"
#collection = "qa_records"

# Path to the SQLite audit ledger
#
# Every destructive operation is recorded here and can be undone
#
# Can also be set via:
# - CLI: qurate --ledger /custom/ledger.db ...
# - Environment: QURATE_LEDGER_PATH=/custom/ledger.db
#
# Default: Platform-specific data directory
#ledger_path = "/path/to/custom/ledger.db"

# Similarity floor for the `similar` command (0.0 to 1.0)
#similarity_threshold = 0.85

# Similarity floor for semantic duplicate scans (0.0 to 1.0)
#duplicate_threshold = 0.90

# Page size for batched collection fetches
#batch_size = 100

# Per-record cap on similarity candidates during a scan
#neighbor_limit = 20

# Upper bound on records pulled by whole-collection reads
#max_fetch = 2000

# Ordered source labels for the keep-preferred-source strategy
#preferred_sources = ["policies_2024.pdf", "handbook.pdf"]

# HTTP request timeout in seconds
#request_timeout_secs = 30

# Retries for transient backend failures
#max_retries = 3
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    // Create parent directory
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    // Write default config
    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.endpoint.is_none());
        assert!(!config.is_configured());
        assert!(!config.ledger_path.as_os_str().is_empty());
        assert_eq!(config.keyspace, "default_keyspace");
        assert_eq!(config.collection, "qa_records");
        assert_eq!(config.duplicate_threshold, 0.90);
        assert_eq!(config.similarity_threshold, 0.85);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_fetch, 2000);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_custom_ledger_path() {
        let custom_path = PathBuf::from("/tmp/test-ledger.db");
        let config = Config::load_with_ledger_path(custom_path.clone());
        assert!(config.is_ok());
        assert_eq!(config.unwrap().ledger_path, custom_path);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert!(config.is_configured());
        // Commented-out keys fall back to defaults.
        assert_eq!(config.batch_size, 100);
        assert!(config.preferred_sources.is_empty());
    }

    #[test]
    fn test_require_connection_hint() {
        let err = Config::default().require_connection().unwrap_err();
        assert!(err.to_string().contains("QURATE_ENDPOINT"));

        let config = Config {
            endpoint: Some("https://db.example.com".to_string()),
            token: Some("token".to_string()),
            ..Default::default()
        };
        let (endpoint, token) = config.require_connection().unwrap();
        assert_eq!(endpoint, "https://db.example.com");
        assert_eq!(token, "token");
    }
}
