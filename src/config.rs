use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use crate::history::DEFAULT_MAX_TOKENS;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1234/chat";

pub const DEFAULT_PRE_MESSAGE: &str = "You are a helpful assistant. Your job is to give movie suggestions \
and to discuss movie topics with the user. If you're returning a list of movie suggestions, \
make sure to print them in a list.";

/// Environment variable that overrides the configured endpoint
pub const ENDPOINT_ENV: &str = "LLAMA_CHAT_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub pre_message: String,
    pub max_history_tokens: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pre_message: DEFAULT_PRE_MESSAGE.to_string(),
            max_history_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Config {
    /// Load from the user config directory, falling back to defaults when
    /// no file exists yet
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply environment overrides on top of the loaded values
    pub fn apply_env(&mut self) {
        self.apply_endpoint_override(std::env::var(ENDPOINT_ENV).ok());
    }

    fn apply_endpoint_override(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint;
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("llama-chat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_history_tokens, 400);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            endpoint: "http://10.0.0.5:1234/chat".to_string(),
            pre_message: "Be brief.".to_string(),
            max_history_tokens: 128,
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "max_history_tokens": 50 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.max_history_tokens, 50);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.pre_message, DEFAULT_PRE_MESSAGE);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config file"));
    }

    #[test]
    fn test_endpoint_override() {
        let mut config = Config::default();
        config.apply_endpoint_override(None);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);

        config.apply_endpoint_override(Some("  ".to_string()));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);

        config.apply_endpoint_override(Some("http://example.test/chat".to_string()));
        assert_eq!(config.endpoint, "http://example.test/chat");
    }
}
