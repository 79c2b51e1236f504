use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use shared::config::ClientConfig;

use crate::store::DEFAULT_STATE_FILE;

pub const CONFIG_ENV: &str = "SENTINEL_CONFIG";
pub const API_URL_ENV: &str = "SENTINEL_API_URL";
pub const STATE_ENV: &str = "SENTINEL_STATE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid API URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// YAML file shape: the client settings plus where local statistics live.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(flatten)]
    pub client: ClientConfig,
    pub state_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

/// Command-line overrides; `None` leaves the lower layers in place.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub client: ClientConfig,
    pub state_path: PathBuf,
}

impl Settings {
    /// Defaults, then YAML, then environment, then flags.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    fn resolve(
        overrides: &Overrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| lookup(CONFIG_ENV).map(PathBuf::from));

        let file = match &config_path {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                FileConfig::from_path(path)?
            }
            None => FileConfig::default(),
        };

        let mut client = file.client;
        let mut state_path = file
            .state_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));

        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            client.api_base_url = url;
        }
        if let Some(path) = lookup(STATE_ENV).filter(|p| !p.trim().is_empty()) {
            state_path = PathBuf::from(path);
        }

        if let Some(url) = &overrides.api_url {
            client.api_base_url = url.clone();
        }
        if let Some(path) = &overrides.state_path {
            state_path = path.clone();
        }

        client.api_base_url = client.api_base_url.trim().to_string();
        url::Url::parse(&client.api_base_url).map_err(|source| ConfigError::InvalidUrl {
            url: client.api_base_url.clone(),
            source,
        })?;

        Ok(Self { client, state_path })
    }
}
