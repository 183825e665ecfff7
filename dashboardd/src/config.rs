use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use shared::protocol::{DISCOVERY_URL, MARKET_URL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub help: HelpConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_nodes_file")]
    pub nodes_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelpConfig {
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
    #[serde(default = "default_market_url")]
    pub market_url: String,
    #[serde(default = "default_price_ttl")]
    pub price_ttl_secs: u64,
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_nodes_file() -> PathBuf {
    PathBuf::from("nodes.json")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("help_content")
}

fn default_discovery_url() -> String {
    DISCOVERY_URL.to_string()
}

fn default_market_url() -> String {
    MARKET_URL.to_string()
}

fn default_price_ttl() -> u64 {
    600
}

fn default_discovery_timeout() -> u64 {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            nodes_file: default_nodes_file(),
        }
    }
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            market_url: default_market_url(),
            price_ttl_secs: default_price_ttl(),
            discovery_timeout_secs: default_discovery_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
