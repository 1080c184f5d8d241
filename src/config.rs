use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";
pub const DEFAULT_APOLOGY: &str = "দুঃখিত, একটি ত্রুটি হয়েছে। আবার চেষ্টা করুন।";
pub const DEFAULT_TYPING_LABEL: &str = "টাইপ করছি";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat server, without a trailing path
    pub endpoint: String,
    pub chat_path: String,
    pub train_path: String,
    /// Zero disables the timeout
    pub request_timeout_secs: u64,
    pub title: String,
    pub typing_label: String,
    pub apology_message: String,
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chat_path: "/api/chat".to_string(),
            train_path: "/api/train".to_string(),
            request_timeout_secs: 60,
            title: "Chat".to_string(),
            typing_label: DEFAULT_TYPING_LABEL.to_string(),
            apology_message: DEFAULT_APOLOGY.to_string(),
            tick_rate_ms: 300,
        }
    }

    /// Load from the given path, or the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("invalid config file {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatbox").join("config.json"))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(50))
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.apology_message, DEFAULT_APOLOGY);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.endpoint = "http://chat.internal:9000".to_string();
        config.request_timeout_secs = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "title": "Support" }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.title, "Support");
        assert_eq!(config.chat_path, "/api/chat");
        assert_eq!(config.typing_label, DEFAULT_TYPING_LABEL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn urls_join_without_double_slashes() {
        assert_eq!(join_url("http://localhost:8000/", "/api/chat"), "http://localhost:8000/api/chat");
        assert_eq!(join_url("http://localhost:8000", "api/train"), "http://localhost:8000/api/train");
        assert_eq!(join_url("http://localhost:8000", "/api/chat"), "http://localhost:8000/api/chat");
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut config = Config::new();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(60)));
        config.request_timeout_secs = 0;
        assert_eq!(config.request_timeout(), None);
    }
}
