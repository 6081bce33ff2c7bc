//! Runtime configuration: built-in defaults, then `config.toml` in the app data
//! directory, then environment variables.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::schema::{default_sources, SourceSchema};

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_INDEX_PATH: &str = "faiss_index";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding model; must be the same at index build and query time.
    pub model_name: String,
    pub ollama_url: String,
    /// Directory holding the persisted vector index.
    pub index_path: PathBuf,
    /// Directory holding the `<SOURCE>_cleaned.csv` tables.
    pub data_dir: PathBuf,
    pub top_k: usize,
    pub completion_model: String,
    pub completion_url: String,
    pub request_timeout_secs: u64,
    /// Completion service credential. Only read from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub sources: Vec<SourceSchema>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: crate::ollama::DEFAULT_EMBED_MODEL.to_string(),
            ollama_url: crate::ollama::DEFAULT_BASE_URL.to_string(),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            top_k: DEFAULT_TOP_K,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_url: DEFAULT_COMPLETION_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: None,
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the config file and the process environment, then validated.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = load_config_file();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup` (normally `std::env::var`). Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = get("OLLAMA_URL") {
            self.ollama_url = v;
        }
        if let Some(v) = get("FAISS_INDEX_PATH") {
            self.index_path = PathBuf::from(v);
        }
        if let Some(v) = get("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("TOP_K") {
            self.top_k = parse_env("TOP_K", &v)?;
        }
        if let Some(v) = get("COMPLETION_MODEL") {
            self.completion_model = v;
        }
        if let Some(v) = get("COMPLETION_URL") {
            self.completion_url = v;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("API_KEY") {
            self.api_key = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::Invalid("model_name is empty".into()));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".into()));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.columns.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {} has no columns",
                    source.name
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "source {} is configured twice",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

/// Path of the config file in the app data directory.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|d| d.join(CONFIG_FILENAME))
}

/// Load the config file from the app data directory. Returns defaults if missing or invalid.
pub fn load_config_file() -> Config {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

/// Load a config file. Returns defaults if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_else(|e| {
        tracing::warn!("ignoring invalid config at {}: {}", path.display(), e);
        Config::default()
    })
}

/// Save config to the app data directory. Returns the path written.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}
