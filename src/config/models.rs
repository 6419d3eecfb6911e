// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub checkers: Vec<ProbeConfig>,
    #[serde(default)]
    pub observers: Vec<ProbeConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.health.validate()?;
        self.metrics.validate()?;

        for (role, probes) in [("checker", &self.checkers), ("observer", &self.observers)] {
            let mut names = HashSet::new();
            for probe in probes {
                probe.validate()?;
                if !names.insert(probe.name()) {
                    bail!("Duplicate {} name: {}", role, probe.name());
                }
            }
        }

        if self.metrics.enabled && self.metrics.path == self.server.health_path {
            bail!("Metrics path and health path must differ");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if !self.health_path.starts_with('/') {
            bail!("Health path must start with '/': {}", self.health_path);
        }
        if self.request_timeout_ms == 0 {
            bail!("Request timeout must be greater than zero");
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            health_path: default_health_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// `0` disables caching. Unset means twice the background interval when
    /// background refresh is enabled.
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,
    #[serde(default)]
    pub background: bool,
    #[serde(default = "default_background_interval_ms")]
    pub background_interval_ms: u64,
    /// Deadline for each background run. `null` leaves runs unbounded.
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: Option<u64>,
}

impl HealthConfig {
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }

    pub fn background_interval(&self) -> Duration {
        Duration::from_millis(self.background_interval_ms)
    }

    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.background && self.background_interval_ms == 0 {
            bail!("Background interval must be greater than zero");
        }
        if self.check_timeout_ms == Some(0) {
            bail!("Check timeout must be greater than zero");
        }
        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: None,
            background: false,
            background_interval_ms: default_background_interval_ms(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl MetricsConfig {
    fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            bail!("Metrics path must start with '/': {}", self.path);
        }
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    Url(UrlProbeConfig),
    Database(DatabaseProbeConfig),
}

impl ProbeConfig {
    pub fn name(&self) -> &str {
        match self {
            ProbeConfig::Url(c) => &c.name,
            ProbeConfig::Database(c) => &c.name,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name().is_empty() {
            bail!("Probe name must not be empty");
        }
        match self {
            ProbeConfig::Url(c) => c.validate(),
            ProbeConfig::Database(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlProbeConfig {
    pub name: String,
    pub url: Url,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl UrlProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.url.scheme(), "http" | "https") {
            bail!("Probe {}: unsupported url scheme {}", self.name, self.url.scheme());
        }
        if reqwest::Method::from_bytes(self.method.as_bytes()).is_err() {
            bail!("Probe {}: invalid method {}", self.name, self.method);
        }
        if self.timeout_ms == 0 {
            bail!("Probe {}: timeout must be greater than zero", self.name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseDriver {
    Mysql,
    Sqlite,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseProbeConfig {
    pub name: String,
    pub dsn: String,
    pub driver: DatabaseDriver,
    #[serde(default)]
    pub validation_query: Option<String>,
    #[serde(default)]
    pub version_query: Option<String>,
}

impl DatabaseProbeConfig {
    fn validate(&self) -> Result<()> {
        if self.dsn.is_empty() {
            bail!("Probe {}: dsn must not be empty", self.name);
        }
        if self.driver == DatabaseDriver::Custom && self.validation_query.is_none() {
            bail!("Probe {}: custom driver requires validation_query", self.name);
        }
        Ok(())
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_check_timeout_ms() -> Option<u64> {
    Some(5000)
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_background_interval_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_true() -> bool {
    true
}
