//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$UNSUBLY_CONFIG` (environment variable)
//! 2. `~/.config/unsubly/config.toml` (Linux/macOS)
//!    `%APPDATA%\unsubly\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::message::Folder;

/// Gmail caps `maxResults` on `messages.list` at 500.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mail provider connection settings.
    pub gmail: GmailConfig,
    /// Scan tuning.
    pub scan: ScanConfig,
    /// Names of persisted artifacts.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override data directory for link artifacts, timing history and logs.
    pub data_dir: Option<PathBuf>,
}

/// Mail provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// Base URL of the Gmail REST API.
    pub api_base: String,
    /// Mailbox owner; `me` is the authenticated user.
    pub user_id: String,
    /// JSON file holding the OAuth access token (`token` or `access_token`).
    pub token_file: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Scan tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Budget used when none is given on the command line.
    pub default_budget: usize,
    /// Folders scanned when none is selected on the command line.
    pub folders: Vec<Folder>,
    /// Message ids requested per listing page (1..=500).
    pub page_size: u32,
    /// First backoff interval after a rate-limit response.
    pub backoff_secs: u64,
    /// Upper bound for the escalating backoff interval.
    pub max_backoff_secs: u64,
    /// How many times a rate-limited request is retried.
    pub max_rate_limit_retries: u32,
    /// Only accept body links mentioning "unsubscribe".
    pub strict_phrases: bool,
}

/// Names of persisted artifacts. Relative paths live in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `domain: link` lines for links found in message bodies.
    pub body_links_file: PathBuf,
    /// `domain: link` lines for `List-Unsubscribe` header links.
    pub header_links_file: PathBuf,
    /// Historical seconds-per-message samples, one per line.
    pub timing_samples_file: PathBuf,
    /// Current average seconds-per-message.
    pub average_file: PathBuf,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            data_dir: None,
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            user_id: "me".to_string(),
            token_file: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_budget: 100,
            folders: vec![Folder::Inbox],
            page_size: 100,
            backoff_secs: 2,
            max_backoff_secs: 64,
            max_rate_limit_retries: 1,
            strict_phrases: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            body_links_file: PathBuf::from("unsubscribe_links.txt"),
            header_links_file: PathBuf::from("header_unsubscribe_links.txt"),
            timing_samples_file: PathBuf::from("timing_samples.txt"),
            average_file: PathBuf::from("cumulative_average_time.txt"),
        }
    }
}

impl ScanConfig {
    /// Page size clamped to what the provider accepts.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs.max(self.backoff_secs))
    }
}

// ── Load / save ─────────────────────────────────────────────────

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

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("UNSUBLY_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("unsubly").join("config.toml"))
}

/// Return the data directory for link artifacts, timing history and logs.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("unsubly")
}

/// Resolve an artifact name against the data directory.
pub fn artifact_path(config: &Config, name: &std::path::Path) -> PathBuf {
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        data_dir(config).join(name)
    }
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    data_dir(config).join("unsubly.log")
}
