//! Monitor connection settings.
//!
//! Defaults work for a local QEMU started with
//! `-monitor telnet:localhost:8888,server,nowait`. A TOML file can override
//! them; command-line flags override the file.
//!
//! ```toml
//! address = "localhost:4444"
//! pacing_timeout_ms = 200
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::MonitorError;
use crate::monitor::MonitorAddress;

pub const DEFAULT_MONITOR: &str = "localhost:8888";

/// Settings for one monitor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Monitor endpoint as `host:port`.
    pub address: String,
    /// Limit on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// How long to wait for the greeting before giving up.
    pub banner_timeout: Duration,
    /// How long each read between `sendkey` commands may take before it is
    /// abandoned and the next key is sent anyway.
    pub pacing_timeout: Duration,
    /// Limit on a single write.
    pub write_timeout: Duration,
    /// Maximum bytes taken by the greeting read.
    pub banner_limit: usize,
    /// Maximum bytes taken by each pacing read.
    pub pacing_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_MONITOR.to_string(),
            connect_timeout: Duration::from_secs(5),
            banner_timeout: Duration::from_secs(5),
            pacing_timeout: Duration::from_millis(500),
            write_timeout: Duration::from_secs(10),
            banner_limit: 256,
            pacing_limit: 256,
        }
    }
}

/// On-disk form. Every key is optional; durations are milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    address: Option<String>,
    connect_timeout_ms: Option<u64>,
    banner_timeout_ms: Option<u64>,
    pacing_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    banner_limit: Option<usize>,
    pacing_limit: Option<usize>,
}

impl MonitorConfig {
    /// Parse TOML text on top of the defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).context("Failed to parse monitor config")?;
        let mut config = Self::default();
        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Loading {}", path.display()))
    }

    fn apply(&mut self, file: ConfigFile) {
        let ms = Duration::from_millis;
        if let Some(address) = file.address {
            self.address = address;
        }
        if let Some(v) = file.connect_timeout_ms {
            self.connect_timeout = ms(v);
        }
        if let Some(v) = file.banner_timeout_ms {
            self.banner_timeout = ms(v);
        }
        if let Some(v) = file.pacing_timeout_ms {
            self.pacing_timeout = ms(v);
        }
        if let Some(v) = file.write_timeout_ms {
            self.write_timeout = ms(v);
        }
        if let Some(v) = file.banner_limit {
            self.banner_limit = v;
        }
        if let Some(v) = file.pacing_limit {
            self.pacing_limit = v;
        }
    }

    /// Reject settings the socket layer cannot honor.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("connect_timeout", self.connect_timeout),
            ("banner_timeout", self.banner_timeout),
            ("pacing_timeout", self.pacing_timeout),
            ("write_timeout", self.write_timeout),
        ];
        for (name, value) in durations {
            // std sockets refuse a zero timeout
            if value.is_zero() {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        if self.banner_limit == 0 || self.pacing_limit == 0 {
            anyhow::bail!("read limits must be greater than zero");
        }
        Ok(())
    }

    /// Parsed form of `address`.
    pub fn monitor_address(&self) -> std::result::Result<MonitorAddress, MonitorError> {
        self.address.parse()
    }
}
