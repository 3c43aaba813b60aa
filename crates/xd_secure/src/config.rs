//! Server configuration.
//!
//! Loaded from (later sources override earlier ones):
//! 1. Default values
//! 2. A TOML file, `xd_secure.toml` or the path in `XD_SECURE_CONFIG`
//! 3. Environment variables (`XD_SECURE_*`)
//! 4. `PORT`, for platforms that assign the listening port

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "XD_SECURE_";
pub const CONFIG_PATH_VAR: &str = "XD_SECURE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "xd_secure.toml";

#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(#[from] Box<figment::Error>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface to bind.
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Counter document location.
    pub data_file: PathBuf,

    /// Directory served for every path that is not an API route.
    pub frontend_dir: PathBuf,

    /// Requests taking longer than this are answered with 408.
    pub request_timeout_secs: u64,

    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            data_file: PathBuf::from("data.json"),
            frontend_dir: PathBuf::from("frontend"),
            request_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Config {
    /// Load from the default sources.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_figment(Self::figment(file))
    }

    pub fn figment(file: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
            .merge(Env::raw().only(&["port"]))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError(Box::new(e)))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
