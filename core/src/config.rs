//! Configuration management for Postbox

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PostboxError, PostboxResult};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Storage settings
    pub storage: StorageConfig,
    /// Display settings
    pub display: DisplayConfig,
    /// Translation settings
    pub translation: TranslationConfig,
    /// Notification settings
    pub notifications: NotificationConfig,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log level
    pub log_level: String,
    /// Data directory
    pub data_dir: PathBuf,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, defaults to `<data_dir>/postbox.db`
    pub database_path: Option<PathBuf>,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Words shown to free members before the body is cut
    pub free_member_truncate_words: usize,
}

/// Translation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Translate bodies into the recipient's preferred language
    pub enabled: bool,
    /// Provider timeout (seconds)
    pub timeout_secs: u64,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send received / reply received notices
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: crate::default_data_dir(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            free_member_truncate_words: crate::DEFAULT_TRUNCATE_WORDS,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl TranslationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_flag(value: &str) -> bool {
    value == "1" || value.to_lowercase() == "true"
}

impl Config {
    /// Load configuration from file
    pub fn load(config_path: &Path) -> PostboxResult<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Return default configuration
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> PostboxResult<()> {
        // Ensure directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(log_level) = std::env::var("POSTBOX_LOG_LEVEL") {
            self.app.log_level = log_level;
        }

        if let Ok(data_dir) = std::env::var("POSTBOX_DATA_DIR") {
            self.app.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(database_path) = std::env::var("POSTBOX_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(database_path));
        }

        if let Ok(words) = std::env::var("POSTBOX_TRUNCATE_WORDS") {
            if let Ok(words) = words.parse() {
                self.display.free_member_truncate_words = words;
            }
        }

        if let Ok(enabled) = std::env::var("POSTBOX_TRANSLATION_ENABLED") {
            self.translation.enabled = env_flag(&enabled);
        }

        if let Ok(timeout) = std::env::var("POSTBOX_TRANSLATION_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse() {
                self.translation.timeout_secs = seconds;
            }
        }

        if let Ok(enabled) = std::env::var("POSTBOX_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = env_flag(&enabled);
        }
    }

    /// Get the database file path
    pub fn database_file_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| self.app.data_dir.join(crate::DB_FILENAME))
    }

    /// Validate the configuration
    pub fn validate(&self) -> PostboxResult<()> {
        if self.display.free_member_truncate_words == 0 {
            return Err(PostboxError::config("Truncation word limit cannot be zero"));
        }

        if self.translation.enabled && self.translation.timeout_secs == 0 {
            return Err(PostboxError::config("Translation timeout cannot be zero"));
        }

        Ok(())
    }
}
