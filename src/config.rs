//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSWEEP_CONFIG` (environment variable)
//! 2. `~/.config/mailsweep/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsweep\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Remote provider settings.
    pub provider: ProviderConfig,
    /// Network resilience tuning.
    pub network: NetworkConfig,
    /// Local storage locations.
    pub storage: StorageConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the state directory for the database, attachments and rules.
    pub state_dir: Option<PathBuf>,
    /// Override the cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Remote provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the mailbox REST API.
    pub api_base_url: String,
    /// Path to the persisted OAuth token state.
    pub token_file: Option<PathBuf>,
}

/// Network resilience tuning.
///
/// The provider API is a remote dependency outside our control, so every
/// call carries a hard timeout and a bounded retry with exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Hard per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Number of retries after the first failed attempt.
    pub max_retries: u32,
    /// Base backoff in milliseconds; doubles on each retry.
    pub retry_backoff_ms: u64,
    /// Maximum total duration of one run in seconds; the ingestion loop
    /// stops early when exceeded and leaves the rest for the next run.
    pub max_run_secs: u64,
}

/// Local storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. Defaults to `<state_dir>/mail.db`.
    pub database: Option<PathBuf>,
    /// Directory for decoded attachment files. Defaults to `<state_dir>/attachments`.
    pub attachments_dir: Option<PathBuf>,
    /// Rule list for the filtering command. Defaults to `<state_dir>/rules.json`.
    pub rules_file: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            state_dir: None,
            cache_dir: None,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            token_file: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_run_secs: 300,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILSWEEP_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailsweep").join("config.toml"))
}

/// Return the state directory holding the database, attachments and rules.
pub fn state_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.state_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsweep")
}

/// Return the SQLite database path.
pub fn db_path(config: &Config) -> PathBuf {
    config
        .storage
        .database
        .clone()
        .unwrap_or_else(|| state_dir(config).join("mail.db"))
}

/// Return the base directory for decoded attachment files.
pub fn attachments_dir(config: &Config) -> PathBuf {
    config
        .storage
        .attachments_dir
        .clone()
        .unwrap_or_else(|| state_dir(config).join("attachments"))
}

/// Return the rules file path.
pub fn rules_path(config: &Config) -> PathBuf {
    config
        .storage
        .rules_file
        .clone()
        .unwrap_or_else(|| state_dir(config).join("rules.json"))
}

/// Return the persisted token state path.
pub fn token_path(config: &Config) -> PathBuf {
    config
        .provider
        .token_file
        .clone()
        .unwrap_or_else(|| state_dir(config).join("token.json"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsweep")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.network.request_timeout_secs, 30);
        assert_eq!(cfg.network.max_retries, 3);
        assert!(cfg.provider.api_base_url.starts_with("https://"));
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
        assert_eq!(parsed.provider.api_base_url, cfg.provider.api_base_url);
        assert_eq!(parsed.network.max_run_secs, cfg.network.max_run_secs);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[network]\nmax_retries = 7\n").expect("deserialize");
        assert_eq!(parsed.network.max_retries, 7);
        assert_eq!(parsed.network.request_timeout_secs, 30);
        assert_eq!(parsed.general.log_level, "warn");
    }

    #[test]
    fn test_storage_paths_derive_from_state_dir() {
        let mut cfg = Config::default();
        cfg.general.state_dir = Some(PathBuf::from("/tmp/sweep-state"));
        assert_eq!(db_path(&cfg), PathBuf::from("/tmp/sweep-state/mail.db"));
        assert_eq!(
            attachments_dir(&cfg),
            PathBuf::from("/tmp/sweep-state/attachments")
        );
        assert_eq!(rules_path(&cfg), PathBuf::from("/tmp/sweep-state/rules.json"));
        assert_eq!(token_path(&cfg), PathBuf::from("/tmp/sweep-state/token.json"));
    }
}
