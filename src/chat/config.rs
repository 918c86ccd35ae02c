//! Chat configuration.
//!
//! Stored as TOML in `~/.sealchat/config.toml`. A missing file yields the
//! defaults; fields missing from the file take their default values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::error::ChatError;

/// Default base URL of the directory and history API.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000";

/// Default address of the event relay.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:4001";

/// Default typing indicator timeout in milliseconds.
pub const DEFAULT_TYPING_TIMEOUT_MS: u64 = 3000;

/// Default maximum outgoing message length in bytes.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4096;

/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration for the chat client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Default local username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Base URL for the directory and history HTTP API.
    pub server_url: String,

    /// TCP address of the event relay.
    pub relay_addr: String,

    /// Device storage for the key pair and session token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// How long the typing indicator stays on after the last event.
    pub typing_timeout_ms: u64,

    /// Maximum outgoing message length in bytes.
    pub max_message_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            username: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            relay_addr: DEFAULT_RELAY_ADDR.to_string(),
            data_dir: None,
            typing_timeout_ms: DEFAULT_TYPING_TIMEOUT_MS,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl ChatConfig {
    /// Load the configuration from the default location.
    pub fn load() -> Result<Self, ChatError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load the configuration from `path`. Returns defaults if the file
    /// doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ChatError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save the configuration to the default location.
    pub fn save(&self) -> Result<(), ChatError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Path of the default config file.
    pub fn config_path() -> Result<PathBuf, ChatError> {
        Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Device storage directory: `data_dir` if set, else the config
    /// directory.
    pub fn data_dir(&self) -> Result<PathBuf, ChatError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_config_dir(),
        }
    }

    /// Typing indicator timeout.
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }
}

/// Get the sealchat config directory (`~/.sealchat`).
pub fn get_config_dir() -> Result<PathBuf, ChatError> {
    dirs::home_dir()
        .map(|home| home.join(".sealchat"))
        .ok_or_else(|| {
            ChatError::Config("Unable to determine home directory".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.server_url, "http://localhost:4000");
        assert_eq!(config.relay_addr, "127.0.0.1:4001");
        assert_eq!(config.typing_timeout(), Duration::from_secs(3));
        assert_eq!(config.max_message_len, 4096);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ChatConfig::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, ChatConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "username = \"alice\"\ntyping_timeout_ms = 500\n").unwrap();

        let config = ChatConfig::load_from(&path).unwrap();
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.typing_timeout(), Duration::from_millis(500));
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ChatConfig {
            username: Some("bob".to_string()),
            data_dir: Some(dir.path().join("data")),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(ChatConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_message_len = \"lots\"").unwrap();

        assert!(matches!(ChatConfig::load_from(&path), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_data_dir_override() {
        let config = ChatConfig {
            data_dir: Some(PathBuf::from("/tmp/sealchat-test")),
            ..Default::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/sealchat-test"));
    }
}
