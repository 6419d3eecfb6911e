// src/config/mod.rs
mod models;

pub use models::*;

use crate::health::HealthCheckerOptions;
use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let is_yaml = matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    );

    let config = if is_yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

impl From<&HealthConfig> for HealthCheckerOptions {
    fn from(config: &HealthConfig) -> Self {
        let mut options = HealthCheckerOptions::new();
        if let Some(ttl) = config.cache_ttl() {
            options = options.with_cache_ttl(ttl);
        }
        if config.background {
            options = options.with_background(config.background_interval());
        }
        if let Some(timeout) = config.check_timeout() {
            options = options.with_check_timeout(timeout);
        }
        options
    }
}
