// src/probes/database.rs
use crate::health::{CheckContext, ComponentStatus, Probe};
use async_trait::async_trait;
use sqlx::{AnyPool, Connection};

pub const MYSQL_VALIDATION_QUERY: &str = "SELECT 1";
pub const MYSQL_VERSION_QUERY: &str = "SELECT VERSION()";
pub const SQLITE_VALIDATION_QUERY: &str = "SELECT 1";
pub const SQLITE_VERSION_QUERY: &str = "SELECT sqlite_version()";

/// Checks a database with a validation query (or a connection ping) and
/// reports its version when a version query is configured.
///
/// A failing version query is recorded in the `version` detail but does not
/// mark the component down.
pub struct DatabaseProbe {
    pool: Option<AnyPool>,
    driver_name: String,
    validation_query: String,
    version_query: String,
}

impl DatabaseProbe {
    pub fn new(
        pool: Option<AnyPool>,
        driver_name: impl Into<String>,
        validation_query: impl Into<String>,
        version_query: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            driver_name: driver_name.into(),
            validation_query: validation_query.into(),
            version_query: version_query.into(),
        }
    }

    pub fn mysql(pool: AnyPool) -> Self {
        Self::new(Some(pool), "mysql", MYSQL_VALIDATION_QUERY, MYSQL_VERSION_QUERY)
    }

    pub fn sqlite(pool: AnyPool) -> Self {
        Self::new(Some(pool), "sqlite3", SQLITE_VALIDATION_QUERY, SQLITE_VERSION_QUERY)
    }

    async fn validate(&self, pool: &AnyPool) -> Result<(), sqlx::Error> {
        if self.validation_query.is_empty() {
            let mut conn = pool.acquire().await?;
            conn.ping().await
        } else {
            sqlx::query(&self.validation_query).fetch_one(pool).await?;
            Ok(())
        }
    }
}

#[async_trait]
impl Probe for DatabaseProbe {
    async fn check(&self, ctx: &CheckContext) -> ComponentStatus {
        let status = ComponentStatus::new();
        let pool = match &self.pool {
            Some(pool) => pool,
            None => return status,
        };

        let validation = if self.validation_query.is_empty() {
            "ping()"
        } else {
            self.validation_query.as_str()
        };
        let status = status
            .with_detail("database", self.driver_name.as_str())
            .with_detail("validationQuery", validation);

        let validated = match ctx.run(self.validate(pool)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(err) = validated {
            tracing::debug!(database = %self.driver_name, error = %err, "Database validation failed");
            return status.mark_down().with_detail("err", err);
        }

        let status = if self.version_query.is_empty() {
            status
        } else {
            let version = ctx
                .run(sqlx::query_scalar::<_, String>(&self.version_query).fetch_one(pool))
                .await;
            match version {
                Ok(Ok(version)) => status.with_detail("version", version),
                Ok(Err(e)) => status.with_detail("version", e.to_string()),
                Err(e) => status.with_detail("version", e.to_string()),
            }
        };

        status.mark_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::any::AnyPoolOptions;

    async fn sqlite_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_up() {
        let probe = DatabaseProbe::sqlite(sqlite_pool().await);

        let status = probe.check(&CheckContext::new()).await;

        assert!(status.is_up());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["details"]["database"], "sqlite3");
        assert_eq!(json["details"]["validationQuery"], SQLITE_VALIDATION_QUERY);
        assert!(json["details"]["version"].as_str().unwrap().starts_with('3'));
    }

    #[tokio::test]
    async fn test_version_query_failure_stays_up() {
        let probe = DatabaseProbe::new(
            Some(sqlite_pool().await),
            "sqlite3",
            SQLITE_VALIDATION_QUERY,
            "SELECT version FROM missing_table",
        );

        let status = probe.check(&CheckContext::new()).await;

        assert!(status.is_up());
        let version = status.detail("version").unwrap().as_str().unwrap();
        assert!(version.contains("missing_table"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_down() {
        let probe = DatabaseProbe::new(
            Some(sqlite_pool().await),
            "sqlite3",
            "SELECT * FROM missing_table",
            SQLITE_VERSION_QUERY,
        );

        let status = probe.check(&CheckContext::new()).await;

        assert!(status.is_down());
        assert_eq!(status.detail("database"), Some(&serde_json::json!("sqlite3")));
        assert!(status.detail("err").unwrap().as_str().unwrap().contains("missing_table"));
        assert!(status.detail("version").is_none());
    }

    #[tokio::test]
    async fn test_closed_pool_is_down() {
        let pool = sqlite_pool().await;
        pool.close().await;
        let probe = DatabaseProbe::sqlite(pool);

        let status = probe.check(&CheckContext::new()).await;

        assert!(status.is_down());
        assert!(status.detail("err").is_some());
    }

    #[tokio::test]
    async fn test_ping_when_no_validation_query() {
        let probe = DatabaseProbe::new(Some(sqlite_pool().await), "sqlite3", "", "");

        let status = probe.check(&CheckContext::new()).await;

        assert!(status.is_up());
        assert_eq!(status.detail("validationQuery"), Some(&serde_json::json!("ping()")));
        assert!(status.detail("version").is_none());
    }

    #[tokio::test]
    async fn test_without_pool_is_unknown() {
        let probe = DatabaseProbe::new(None, "mysql", MYSQL_VALIDATION_QUERY, MYSQL_VERSION_QUERY);

        let status = probe.check(&CheckContext::new()).await;

        assert!(!status.is_up());
        assert!(!status.is_down());
        assert!(status.details().is_empty());
    }
}
