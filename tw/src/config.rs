//! trackerwatch configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ipc::get_socket_path;

/// Main trackerwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Download client connection
    pub qbittorrent: QbittorrentConfig,

    /// Tracker logins and fetch limits
    pub trackers: TrackersConfig,

    /// Where added torrents go and what removal does
    pub downloads: DownloadsConfig,

    /// Store polling
    pub supervisor: SupervisorSection,

    /// Telegram notifications; disabled unless token and chat id are set
    pub telegram: TelegramConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// IPC socket
    pub ipc: IpcConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.qbittorrent.url.trim().is_empty() {
            return Err(eyre::eyre!(
                "qBittorrent URL not set. Set qbittorrent.url or the QB_URL environment variable."
            ));
        }
        reqwest::Url::parse(&self.qbittorrent.url)
            .context(format!("Invalid qBittorrent URL: {}", self.qbittorrent.url))?;
        if self.trackers.max_identity_attempts == 0 {
            return Err(eyre::eyre!("trackers.max-identity-attempts must be at least 1"));
        }
        if self.supervisor.poll_interval_ms == 0 {
            return Err(eyre::eyre!("supervisor.poll-interval-ms must be greater than 0"));
        }
        if self.telegram.token.is_empty() != self.telegram.chat_id.is_empty() {
            return Err(eyre::eyre!("telegram.token and telegram.chat-id must be set together"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: ./trackerwatch.yml
        let local_config = PathBuf::from("trackerwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/trackerwatch/trackerwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("trackerwatch").join("trackerwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Log level from the config file alone, read before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => {
                let local = PathBuf::from("trackerwatch.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir()?.join("trackerwatch").join("trackerwatch.yml")
                }
            }
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    /// Override settings from environment variables; `get` looks one up
    pub fn apply_env_with(&mut self, get: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = get(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };
        set(&mut self.qbittorrent.url, "QB_URL");
        set(&mut self.qbittorrent.username, "QB_USERNAME");
        set(&mut self.qbittorrent.password, "QB_PASSWORD");
        set(&mut self.trackers.kinozal.username, "KZ_USERNAME");
        set(&mut self.trackers.kinozal.password, "KZ_PASSWORD");
        set(&mut self.trackers.rutracker.username, "RT_USERNAME");
        set(&mut self.trackers.rutracker.password, "RT_PASSWORD");
        set(&mut self.trackers.user_agent, "USER_AGENT");
        set(&mut self.telegram.token, "TELEGRAM_TOKEN");
        set(&mut self.telegram.chat_id, "TELEGRAM_CHAT_ID");
    }
}

/// qBittorrent Web API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QbittorrentConfig {
    pub url: String,
    pub username: String,
    pub password: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for QbittorrentConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_ms: 30_000,
        }
    }
}

impl QbittorrentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Login for one tracker; empty username means anonymous
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackersConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Fetch-then-relogin rounds before giving up on a page
    #[serde(rename = "max-identity-attempts")]
    pub max_identity_attempts: u32,

    pub kinozal: Credentials,
    pub rutracker: Credentials,
}

impl Default for TrackersConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string(),
            timeout_ms: 30_000,
            max_identity_attempts: 10,
            kinozal: Credentials::default(),
            rutracker: Credentials::default(),
        }
    }
}

impl TrackersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Save path when neither the request nor the item has one
    #[serde(rename = "default-save-path")]
    pub default_save_path: String,

    /// Whether removing an item also deletes its files
    #[serde(rename = "remove-deletes-files")]
    pub remove_deletes_files: bool,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            default_save_path: String::new(),
            remove_deletes_files: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    /// How often the store is polled for watch changes, in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self { poll_interval_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,

    #[serde(rename = "chat-id")]
    pub chat_id: String,

    #[serde(rename = "api-base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl TelegramConfig {
    pub fn enabled(&self) -> bool {
        !self.token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/trackerwatch on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("trackerwatch"))
            .unwrap_or_else(|| PathBuf::from(".trackerwatch"))
            .join("items.db");
        Self { db_path }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: get_socket_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.qbittorrent.url, "http://localhost:8080");
        assert_eq!(config.trackers.max_identity_attempts, 10);
        assert_eq!(config.supervisor.poll_interval_ms, 5_000);
        assert!(config.downloads.remove_deletes_files);
        assert!(!config.telegram.enabled());
        assert!(config.storage.db_path.ends_with("trackerwatch/items.db"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

qbittorrent:
  url: http://nas:8080/qbt
  username: admin
  password: secret
  timeout-ms: 10000

trackers:
  max-identity-attempts: 3
  kinozal:
    username: kz
    password: kzpass

downloads:
  default-save-path: /data/torrents
  remove-deletes-files: false

supervisor:
  poll-interval-ms: 1000

telegram:
  token: "123:abc"
  chat-id: "42"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.qbittorrent.url, "http://nas:8080/qbt");
        assert_eq!(config.qbittorrent.timeout(), Duration::from_secs(10));
        assert_eq!(config.trackers.max_identity_attempts, 3);
        assert_eq!(config.trackers.kinozal.username, "kz");
        assert!(config.trackers.rutracker.username.is_empty());
        assert_eq!(config.downloads.default_save_path, "/data/torrents");
        assert!(!config.downloads.remove_deletes_files);
        assert_eq!(config.supervisor.poll_interval_ms, 1000);
        assert!(config.telegram.enabled());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
trackers:
  user-agent: test-agent
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.trackers.user_agent, "test-agent");
        assert_eq!(config.trackers.timeout_ms, 30_000);
        assert_eq!(config.qbittorrent.url, "http://localhost:8080");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("QB_URL", "http://env:9090"),
            ("KZ_USERNAME", "kz-env"),
            ("RT_PASSWORD", "rt-env"),
            ("TELEGRAM_CHAT_ID", "7"),
            ("USER_AGENT", ""),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();

        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.qbittorrent.url, "http://env:9090");
        assert_eq!(config.trackers.kinozal.username, "kz-env");
        assert_eq!(config.trackers.rutracker.password, "rt-env");
        assert_eq!(config.telegram.chat_id, "7");
        assert_eq!(config.trackers.user_agent, TrackersConfig::default().user_agent);
    }

    #[test]
    #[serial]
    fn test_load_explicit_file_applies_process_env() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tw.yml");
        fs::write(&path, "qbittorrent:\n  username: from-file\n").unwrap();

        // SAFETY: serialized with the other environment tests
        unsafe { std::env::set_var("QB_PASSWORD", "from-env") };
        let config = Config::load(Some(&path)).unwrap();
        unsafe { std::env::remove_var("QB_PASSWORD") };

        assert_eq!(config.qbittorrent.username, "from-file");
        assert_eq!(config.qbittorrent.password, "from-env");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp.path().join("missing.yml"))).is_err());
    }

    #[test]
    fn test_load_log_level_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tw.yml");
        fs::write(&path, "log-level: TRACE\n").unwrap();

        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("TRACE"));
    }

    #[test]
    fn test_validate_rejects_half_telegram_setup() {
        let mut config = Config::default();
        config.telegram.token = "123:abc".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.qbittorrent.url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
