// src/probes/mod.rs
mod database;
mod http;

pub use self::database::{
    DatabaseProbe, MYSQL_VALIDATION_QUERY, MYSQL_VERSION_QUERY, SQLITE_VALIDATION_QUERY,
    SQLITE_VERSION_QUERY,
};
pub use self::http::UrlProbe;

use crate::config::{DatabaseDriver, DatabaseProbeConfig, ProbeConfig, UrlProbeConfig};
use crate::health::{HealthChecker, Probe, Role};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;

/// Builds a probe from its configuration.
///
/// Database pools connect lazily so an unreachable database shows up as a
/// down component instead of failing startup.
pub fn build_probe(config: &ProbeConfig) -> Result<Arc<dyn Probe>> {
    match config {
        ProbeConfig::Url(c) => Ok(Arc::new(build_url_probe(c)?)),
        ProbeConfig::Database(c) => Ok(Arc::new(build_database_probe(c)?)),
    }
}

/// Registers every configured checker and observer.
pub fn register_all(
    checker: &HealthChecker,
    checkers: &[ProbeConfig],
    observers: &[ProbeConfig],
) -> Result<()> {
    let roles = checkers
        .iter()
        .map(|c| (Role::Checker, c))
        .chain(observers.iter().map(|c| (Role::Observer, c)));

    for (role, config) in roles {
        let probe = build_probe(config)
            .with_context(|| format!("Failed to build probe {}", config.name()))?;
        match role {
            Role::Checker => checker.add_checker(config.name(), probe),
            Role::Observer => checker.add_observer(config.name(), probe),
        }
    }

    tracing::info!(
        checkers = checkers.len(),
        observers = observers.len(),
        "Registered configured components"
    );
    Ok(())
}

fn build_url_probe(config: &UrlProbeConfig) -> Result<UrlProbe> {
    let method = reqwest::Method::from_bytes(config.method.as_bytes())
        .with_context(|| format!("Invalid method {}", config.method))?;

    let mut headers = HeaderMap::new();
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("Invalid header name {}", key))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid header value for {}", key))?;
        headers.append(name, value);
    }

    Ok(UrlProbe::new(
        config.name.clone(),
        method,
        config.url.clone(),
        headers,
        config.timeout(),
    ))
}

fn build_database_probe(config: &DatabaseProbeConfig) -> Result<DatabaseProbe> {
    sqlx::any::install_default_drivers();
    let pool = sqlx::any::AnyPoolOptions::new()
        .connect_lazy(&config.dsn)
        .with_context(|| format!("Invalid dsn for {}", config.name))?;

    let (driver, validation, version) = match config.driver {
        DatabaseDriver::Mysql => ("mysql", MYSQL_VALIDATION_QUERY, MYSQL_VERSION_QUERY),
        DatabaseDriver::Sqlite => ("sqlite3", SQLITE_VALIDATION_QUERY, SQLITE_VERSION_QUERY),
        DatabaseDriver::Custom => ("custom", "", ""),
    };
    let validation = config.validation_query.as_deref().unwrap_or(validation);
    let version = config.version_query.as_deref().unwrap_or(version);

    Ok(DatabaseProbe::new(Some(pool), driver, validation, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{CheckContext, HealthCheckerOptions};

    #[tokio::test]
    async fn test_register_from_config() {
        let yaml = r#"
checkers:
  - { type: database, name: db, dsn: "sqlite::memory:", driver: sqlite }
observers:
  - { type: url, name: api, url: "http://127.0.0.1:1/health", timeout_ms: 200, headers: { x-probe: "1" } }
"#;
        let config: crate::config::Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        let checker = HealthChecker::new(HealthCheckerOptions::new(), None);
        register_all(&checker, &config.checkers, &config.observers).unwrap();
        assert_eq!(checker.registry().len(), 2);

        let health = checker.health(&CheckContext::new()).await;
        assert!(health.is_up());
        assert!(health.components()["db"].is_up());
        assert!(health.components()["api"].is_down());
    }

    #[tokio::test]
    async fn test_register_all_assigns_roles() {
        let yaml = r#"
checkers:
  - { type: database, name: db, dsn: "sqlite::memory:", driver: sqlite }
observers:
  - { type: database, name: db, dsn: "sqlite::memory:", driver: sqlite }
  - { type: url, name: api, url: "http://127.0.0.1:1/health" }
"#;
        let config: crate::config::Config = serde_yaml::from_str(yaml).unwrap();
        let checker = HealthChecker::new(HealthCheckerOptions::new(), None);
        register_all(&checker, &config.checkers, &config.observers).unwrap();

        let mut roles: Vec<_> = checker
            .registry()
            .snapshot()
            .entries()
            .map(|(name, role, _)| (name.to_string(), role))
            .collect();
        roles.sort_by(|a, b| (&a.0, a.1.as_str()).cmp(&(&b.0, b.1.as_str())));
        assert_eq!(
            roles,
            vec![
                ("api".to_string(), Role::Observer),
                ("db".to_string(), Role::Checker),
                ("db".to_string(), Role::Observer),
            ]
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = UrlProbeConfig {
            name: "api".to_string(),
            url: url::Url::parse("http://localhost/health").unwrap(),
            method: "GET".to_string(),
            headers: [("bad header".to_string(), "v".to_string())].into_iter().collect(),
            timeout_ms: 100,
        };
        assert!(build_url_probe(&config).is_err());
    }
}
