//! Configuration loading and root folder resolution
//!
//! Bootstrap settings (root folder, port, public URL, logging) resolve in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CALIQUEST_ROOT_FOLDER`, then `CALIQUEST_ROOT`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal; it logs a warning and
//! the next tier applies. Runtime settings live in the database `settings`
//! table and are read with [`RuntimeSettings::load`].

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::db::settings::get_setting;
use crate::progress::{MapCompletionRule, ProgressPolicy};
use crate::Result;

/// Upper bound for session and password reset lifetimes (ten years)
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Primary root folder environment variable
pub const ROOT_FOLDER_ENV: &str = "CALIQUEST_ROOT_FOLDER";
/// Alternative root folder environment variable
pub const ROOT_ENV: &str = "CALIQUEST_ROOT";

pub const DEFAULT_PORT: u16 = 5800;

/// Compiled defaults for the current platform
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/caliquest (or /var/lib/caliquest)
            dirs::data_local_dir()
                .map(|d| d.join("caliquest"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/caliquest"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("caliquest"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/caliquest"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("caliquest"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\caliquest"))
        } else {
            PathBuf::from("./caliquest_data")
        };

        Self {
            root_folder,
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Contents of `<config dir>/caliquest/<module>.toml`
///
/// Every field is optional; absent fields fall through to the next tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Base URL used when building links to stored media
    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolves the root folder and loads the optional TOML file
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_file: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use an explicit config file instead of the platform location
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Platform config file path for this module, if one exists
    fn config_file_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_file {
            return Some(path.clone());
        }

        let file_name = format!("{}.toml", self.module_name);
        let user_config = dirs::config_dir().map(|d| d.join("caliquest").join(&file_name));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/caliquest").join(&file_name);
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load the TOML config, or defaults when missing or invalid
    pub fn load_toml(&self) -> TomlConfig {
        let Some(path) = self.config_file_path() else {
            debug!("No config file for module '{}', using defaults", self.module_name);
            return TomlConfig::default();
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                return TomlConfig::default();
            }
        };

        match toml::from_str::<TomlConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        self.resolve_with(&self.load_toml())
    }

    fn resolve_with(&self, toml: &TomlConfig) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &toml.root_folder {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }

    /// Resolve every bootstrap setting at once
    pub fn bootstrap(&self, cli_port: Option<u16>) -> BootstrapConfig {
        let toml = self.load_toml();
        let root_folder = self.resolve_with(&toml);
        let port = cli_port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let public_base_url = toml
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        BootstrapConfig {
            root_folder,
            port,
            public_base_url,
            logging: toml.logging,
        }
    }
}

/// Fully resolved bootstrap configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub public_base_url: String,
    pub logging: LoggingConfig,
}

/// Creates the root folder layout and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("caliquest.db")
    }

    /// Directory holding uploaded blobs
    pub fn media_path(&self) -> PathBuf {
        self.root.join("media")
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Create the root and media directories (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.media_path())?;
        Ok(())
    }
}

/// Runtime settings from the database `settings` table
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub session_ttl_seconds: i64,
    pub password_reset_ttl_seconds: i64,
    pub max_upload_bytes: usize,
    pub enforce_unlock: bool,
    pub map_completion_rule: MapCompletionRule,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 30 * 24 * 60 * 60,
            password_reset_ttl_seconds: 60 * 60,
            max_upload_bytes: 200 * 1024 * 1024,
            enforce_unlock: true,
            map_completion_rule: MapCompletionRule::FirstLevel,
        }
    }
}

async fn setting_or<T: FromStr>(pool: &SqlitePool, key: &str, default: T) -> Result<T> {
    let Some(raw) = get_setting(pool, key).await? else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) => Ok(value),
        Err(_) => {
            warn!("Setting '{}' has invalid value '{}', using default", key, raw);
            Ok(default)
        }
    }
}

/// Like [`setting_or`], also falling back when the value is outside `range`
async fn ranged_setting_or(
    pool: &SqlitePool,
    key: &str,
    default: i64,
    range: std::ops::RangeInclusive<i64>,
) -> Result<i64> {
    let value = setting_or(pool, key, default).await?;
    if range.contains(&value) {
        Ok(value)
    } else {
        warn!(
            "Setting '{}' value {} outside {}..={}, using default",
            key,
            value,
            range.start(),
            range.end()
        );
        Ok(default)
    }
}

impl RuntimeSettings {
    /// Read settings, falling back to defaults for missing or invalid values
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            session_ttl_seconds: ranged_setting_or(
                pool,
                "session_ttl_seconds",
                defaults.session_ttl_seconds,
                1..=MAX_TTL_SECONDS,
            )
            .await?,
            password_reset_ttl_seconds: ranged_setting_or(
                pool,
                "password_reset_ttl_seconds",
                defaults.password_reset_ttl_seconds,
                1..=MAX_TTL_SECONDS,
            )
            .await?,
            max_upload_bytes: setting_or(pool, "max_upload_bytes", defaults.max_upload_bytes).await?,
            enforce_unlock: setting_or(pool, "enforce_unlock", defaults.enforce_unlock).await?,
            map_completion_rule: setting_or(pool, "map_completion_rule", defaults.map_completion_rule)
                .await?,
        })
    }

    /// Progression policy derived from these settings
    pub fn progress_policy(&self) -> ProgressPolicy {
        ProgressPolicy {
            enforce_unlock: self.enforce_unlock,
            map_completion: self.map_completion_rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_database, settings::set_setting};

    #[tokio::test]
    async fn test_runtime_settings_match_seeded_defaults() {
        let pool = init_memory_database().await.unwrap();
        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings, RuntimeSettings::default());
    }

    #[tokio::test]
    async fn test_runtime_settings_invalid_value_falls_back() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "enforce_unlock", "false").await.unwrap();
        set_setting(&pool, "max_upload_bytes", "lots").await.unwrap();

        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert!(!settings.enforce_unlock);
        assert_eq!(settings.max_upload_bytes, RuntimeSettings::default().max_upload_bytes);
    }

    #[tokio::test]
    async fn test_runtime_settings_out_of_range_ttl_falls_back() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "session_ttl_seconds", &i64::MAX.to_string()).await.unwrap();
        set_setting(&pool, "password_reset_ttl_seconds", "0").await.unwrap();

        let settings = RuntimeSettings::load(&pool).await.unwrap();
        let defaults = RuntimeSettings::default();
        assert_eq!(settings.session_ttl_seconds, defaults.session_ttl_seconds);
        assert_eq!(settings.password_reset_ttl_seconds, defaults.password_reset_ttl_seconds);

        set_setting(&pool, "session_ttl_seconds", &MAX_TTL_SECONDS.to_string()).await.unwrap();
        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings.session_ttl_seconds, MAX_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_runtime_settings_map_completion_rule() {
        let pool = init_memory_database().await.unwrap();
        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings.progress_policy().map_completion, MapCompletionRule::FirstLevel);

        set_setting(&pool, "map_completion_rule", "all_levels").await.unwrap();
        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings.map_completion_rule, MapCompletionRule::AllLevels);

        set_setting(&pool, "map_completion_rule", "sometimes").await.unwrap();
        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings.map_completion_rule, MapCompletionRule::FirstLevel);
    }
}
