//! Configuration loading and management for decksmith.
//!
//! Loads settings from `decksmith.toml` with environment variable overrides for sensitive data.
//! Every section has defaults, so running without a config file is allowed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the DeepSeek API key
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

const CONFIG_FILE_NAME: &str = "decksmith.toml";
const DOTENV_FILE_NAME: &str = ".env";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("API key not found. Set DEEPSEEK_API_KEY (environment or .env) or [api].deepseek_key and try again.")]
    MissingApiKey,
    #[error("generation.max_concurrency must be at least 1")]
    InvalidConcurrency,
}

/// LLM endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Model identifier (e.g., "deepseek-chat")
    pub model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
        }
    }
}

/// API keys configuration (usually loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub deepseek_key: Option<String>,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory generated decks are written to
    pub output_dir: PathBuf,
    /// Language pack file
    pub language_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_ppt"),
            language_file: PathBuf::from("language.json"),
        }
    }
}

/// Slide generation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum number of slide bodies requested from the model at once
    pub max_concurrency: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Web form server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Seconds an idle browser session is kept
    pub session_ttl_secs: u64,
    /// Most browser sessions kept at once
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".to_string(),
            session_ttl_secs: 60 * 60,
            max_sessions: 1024,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default location (decksmith.toml in cwd or home).
    ///
    /// Falls back to built-in defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
                let mut config = Config::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env();
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text without consulting the environment
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        if config.generation.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(config)
    }

    /// Override the API key from the environment, then fill a still missing
    /// key from `.env` in the working directory.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.deepseek_key = Some(key);
            }
        }
        self.apply_dotenv(Path::new(DOTENV_FILE_NAME));
    }

    /// Take the API key from a dotenv file when none is set yet.
    ///
    /// A missing or unreadable file is ignored.
    pub fn apply_dotenv(&mut self, path: &Path) {
        if self.api_key().is_ok() {
            return;
        }
        let Ok(entries) = dotenvy::from_path_iter(path) else {
            return;
        };
        for entry in entries {
            match entry {
                Ok((name, value)) if name == API_KEY_ENV && !value.trim().is_empty() => {
                    tracing::debug!(path = %path.display(), "API key loaded from dotenv file");
                    self.api.deepseek_key = Some(value);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping dotenv file");
                    return;
                }
            }
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        let home_config = dirs::home_dir()?
            .join(".config")
            .join("decksmith")
            .join(CONFIG_FILE_NAME);
        home_config.exists().then_some(home_config)
    }

    /// Get the API key, failing when none was configured
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .deepseek_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}
