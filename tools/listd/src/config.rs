//! Configuration file

use anyhow::{bail, Context, Result};
use listd_core::{DEFAULT_LISTEN_ADDR, DEFAULT_PLAYOUT_ADDR};
use listd_hub::DEFAULT_SLOW_CLIENT_TIMEOUT;
use listd_transport::tcp::DEFAULT_QUEUE_DEPTH;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub playout: PlayoutSection,
    pub log: LogSection,
    pub hub: HubSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address clients connect to
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayoutSection {
    /// Address of the playout service
    pub uri: String,
}

impl Default for PlayoutSection {
    fn default() -> Self {
        Self {
            uri: DEFAULT_PLAYOUT_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubSection {
    pub name: String,
    /// Messages that may wait for a slow client
    pub outbound_queue_depth: usize,
    /// How long a full client queue may take to drain before the client
    /// is dropped
    pub slow_client_timeout_ms: u64,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            name: "listd".to_string(),
            outbound_queue_depth: DEFAULT_QUEUE_DEPTH,
            slow_client_timeout_ms: DEFAULT_SLOW_CLIENT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load and check a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.log
            .level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("Unknown log level: {}", self.log.level))?;
        if self.hub.outbound_queue_depth == 0 {
            bail!("hub.outbound_queue_depth must be at least 1");
        }
        if self.hub.slow_client_timeout_ms == 0 {
            bail!("hub.slow_client_timeout_ms must be at least 1");
        }
        Ok(())
    }
}
