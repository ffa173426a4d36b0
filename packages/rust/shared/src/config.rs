//! Application configuration for Intake.
//!
//! User config lives at `~/.intake/intake.toml`.
//! CLI flags (and their environment variables) override config file values,
//! which override defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "intake.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".intake";

// ---------------------------------------------------------------------------
// Config structs (matching intake.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where data lives.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload limits.
    #[serde(default)]
    pub uploads: UploadsConfig,

    /// Notification addresses.
    #[serde(default)]
    pub email: EmailConfig,

    /// Background object watcher.
    #[serde(default)]
    pub watcher: WatcherConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the database and the object store.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Bucket that receives uploaded documents.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Name of the logical search index.
    #[serde(default = "default_index_name")]
    pub index_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bucket: default_bucket(),
            index_name: default_index_name(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.intake/data".into()
}
fn default_bucket() -> String {
    "intake-data".into()
}
fn default_index_name() -> String {
    "documents".into()
}

/// `[uploads]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Maximum accepted upload size in MiB.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Accepted file extensions (lower-case, with leading dot).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_max_file_size_mb() -> u64 {
    50
}
fn default_allowed_extensions() -> Vec<String> {
    [
        // documents
        ".pdf", ".doc", ".docx", ".txt", ".json", ".csv", ".xlsx", ".pptx",
        // images
        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg", ".tiff", ".tif",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address on every outgoing message.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Recipient of contact-form notifications.
    #[serde(default = "default_admin_address")]
    pub admin_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: default_from_address(),
            admin_address: default_admin_address(),
        }
    }
}

fn default_from_address() -> String {
    "noreply@example.com".into()
}
fn default_admin_address() -> String {
    "admin@example.com".into()
}

/// `[watcher]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Seconds between object listings.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds to wait after a failed pass.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Objects modified within this many seconds count as new.
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,

    /// Key prefix to watch.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            recent_window_secs: default_recent_window_secs(),
            prefix: default_prefix(),
        }
    }
}

/// Upper bound for every watcher duration (one week).
pub const MAX_WATCH_SECS: u64 = 7 * 24 * 60 * 60;

fn default_interval_secs() -> u64 {
    30
}
fn default_error_backoff_secs() -> u64 {
    60
}
fn default_recent_window_secs() -> u64 {
    300
}
fn default_prefix() -> String {
    "documents/".into()
}

// ---------------------------------------------------------------------------
// Service config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime service configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory for the database and object store (home-expanded).
    pub data_dir: PathBuf,
    /// Bucket for uploaded documents.
    pub bucket: String,
    /// Logical search index name.
    pub index_name: String,
    /// Maximum upload size in bytes.
    pub max_file_size: u64,
    /// Accepted file extensions.
    pub allowed_extensions: BTreeSet<String>,
    /// Sender address.
    pub from_address: String,
    /// Admin recipient address.
    pub admin_address: String,
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            data_dir: expand_home(&config.storage.data_dir),
            bucket: config.storage.bucket.clone(),
            index_name: config.storage.index_name.clone(),
            max_file_size: config.uploads.max_file_size_mb * 1024 * 1024,
            allowed_extensions: config
                .uploads
                .allowed_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            from_address: config.email.from_address.clone(),
            admin_address: config.email.admin_address.clone(),
        }
    }
}

impl ServiceConfig {
    /// Path of the libSQL database file inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("intake.db")
    }

    /// Root of the filesystem object store inside the data directory.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.intake/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| IntakeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.intake/intake.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IntakeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| IntakeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IntakeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IntakeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IntakeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations that cannot work at runtime.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    for (field, value) in [
        ("email.from_address", &config.email.from_address),
        ("email.admin_address", &config.email.admin_address),
    ] {
        if !value.contains('@') {
            return Err(IntakeError::config(format!(
                "{field} must be an email address (got '{value}')"
            )));
        }
    }

    if config.uploads.max_file_size_mb == 0 {
        return Err(IntakeError::config("uploads.max_file_size_mb must be positive"));
    }

    if let Some(bad) = config
        .uploads
        .allowed_extensions
        .iter()
        .find(|e| !e.starts_with('.'))
    {
        return Err(IntakeError::config(format!(
            "allowed extension '{bad}' must start with a dot"
        )));
    }

    if config.storage.bucket.trim().is_empty() {
        return Err(IntakeError::config("storage.bucket must not be empty"));
    }

    for (field, value, min) in [
        ("watcher.interval_secs", config.watcher.interval_secs, 1),
        ("watcher.error_backoff_secs", config.watcher.error_backoff_secs, 1),
        ("watcher.recent_window_secs", config.watcher.recent_window_secs, 0),
    ] {
        if !(min..=MAX_WATCH_SECS).contains(&value) {
            return Err(IntakeError::config(format!(
                "{field} must be between {min} and {MAX_WATCH_SECS} (got {value})"
            )));
        }
    }

    Ok(())
}
