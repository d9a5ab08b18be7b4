//! Console configuration.
//!
//! Loaded from a TOML file (`<config dir>/confinsights/config.toml` by
//! default). Every section and key is optional. The backend URL can be
//! overridden by `CONFINSIGHTS_BACKEND` and by `--backend`, in that order
//! of increasing precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ci_client::{ClientConfig, PollConfig};
use ci_protocol::{
    DEFAULT_API_BASE, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Environment variable overriding `backend.base_url`.
pub const BACKEND_ENV_VAR: &str = "CONFINSIGHTS_BACKEND";

const APP_DIR: &str = "confinsights";
const CONFIG_FILE: &str = "config.toml";
const LOG_FILE: &str = "confinsights.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the conformance-checking backend.
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Milliseconds between two result polls.
    pub interval_ms: u64,
    /// Poll attempts before a job times out.
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Wall-clock budget for the initial force layout.
    pub simulation_budget_ms: u64,
    /// Draw arrowheads for directed relations.
    pub directed: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            simulation_budget_ms: 3000,
            directed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub graph: GraphConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// `<config dir>/confinsights`, if the platform has a config dir.
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::app_dir().map(|d| d.join(CONFIG_FILE))
    }

    /// Where the console writes its log while the TUI owns the terminal.
    pub fn log_path() -> PathBuf {
        Self::app_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(LOG_FILE)
    }

    /// Load the config. An explicit path must exist; a missing default
    /// file just yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply the backend URL overrides: `cli` beats `env` beats the file.
    pub fn with_backend_override(mut self, cli: Option<&str>, env: Option<&str>) -> Self {
        fn usable(url: Option<&str>) -> Option<&str> {
            url.map(str::trim).filter(|u| !u.is_empty())
        }
        let chosen = usable(cli).or(usable(env));
        if let Some(url) = chosen {
            self.backend.base_url = url.to_string();
        }
        self
    }

    /// `CONFINSIGHTS_BACKEND` from the process environment.
    pub fn env_backend() -> Option<String> {
        std::env::var(BACKEND_ENV_VAR).ok()
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.backend.base_url.clone(),
            request_timeout: Duration::from_secs(self.backend.request_timeout_secs),
            poll: PollConfig {
                interval: Duration::from_millis(self.polling.interval_ms),
                max_attempts: self.polling.max_attempts,
            },
        }
    }
}
