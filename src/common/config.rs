//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::api::types::ScriptKind;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Execution session settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint template is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional key sent as `X-Api-Key` on every HTTP request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for plain HTTP requests
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Logical endpoint name -> path template, in file order
    #[serde(default, deserialize_with = "super::ordered::entries")]
    pub endpoints: Vec<(String, String)>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_http_timeout(),
            endpoints: Vec::new(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8002/".to_string()
}

fn default_http_timeout() -> u64 {
    100
}

/// Execution session settings
#[derive(Debug, Deserialize)]
pub struct ExecutionConfig {
    /// Overall deadline for one streaming run, from connect to terminal state
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Bounded wait for the graceful close handshake
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,

    /// Automation engine used when none is given on the command line
    #[serde(default)]
    pub default_script_kind: ScriptKind,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: default_run_timeout(),
            close_timeout_secs: default_close_timeout(),
            default_script_kind: ScriptKind::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

fn default_run_timeout() -> u64 {
    30
}
fn default_close_timeout() -> u64 {
    5
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
