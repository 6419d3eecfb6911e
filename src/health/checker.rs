// src/health/checker.rs
use super::context::CheckContext;
use super::engine::{AggregationEngine, Trigger};
use super::probe::Probe;
use super::registry::Registry;
use super::status::{ComponentStatus, HealthStatus};
use crate::metrics::MetricsCollector;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthCheckerOptions {
    /// How long a result is served from cache. `Some(ZERO)` disables caching.
    pub cache_ttl: Option<Duration>,
    /// Enables the background refresh loop with the given interval.
    pub background_interval: Option<Duration>,
    /// Deadline applied to each background run.
    pub check_timeout: Option<Duration>,
}

impl HealthCheckerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_background(mut self, interval: Duration) -> Self {
        self.background_interval = Some(interval);
        self
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = Some(timeout);
        self
    }

    /// Cache TTL in effect: the explicit one, else twice the background
    /// interval, else zero.
    pub fn effective_cache_ttl(&self) -> Duration {
        match (self.cache_ttl, self.background_interval) {
            (Some(ttl), _) => ttl,
            (None, Some(interval)) => interval * 2,
            (None, None) => Duration::ZERO,
        }
    }
}

struct CacheEntry {
    result: Arc<HealthStatus>,
    expiry: Instant,
}

struct Inner {
    engine: AggregationEngine,
    cache: Mutex<Option<CacheEntry>>,
    cache_ttl: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

struct BackgroundTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Composite health checker over a set of checkers and observers.
///
/// Results are cached for the configured TTL and optionally refreshed by a
/// background loop that lives until [`HealthChecker::shutdown`] is called or
/// the checker is dropped.
pub struct HealthChecker {
    inner: Arc<Inner>,
    background: Option<BackgroundTask>,
}

impl HealthChecker {
    /// Builds a checker. When background refresh is enabled this spawns the
    /// refresh loop and must be called from within a Tokio runtime.
    pub fn new(options: HealthCheckerOptions, metrics: Option<Arc<MetricsCollector>>) -> Self {
        let registry = Arc::new(Registry::new());
        let inner = Arc::new(Inner {
            engine: AggregationEngine::new(registry, metrics.clone()),
            cache: Mutex::new(None),
            cache_ttl: options.effective_cache_ttl(),
            metrics,
        });

        let background = match options.background_interval {
            Some(interval) if interval.is_zero() => {
                warn!("Background health check interval is zero, background refresh disabled");
                None
            }
            Some(interval) => Some(Self::spawn_background(
                inner.clone(),
                interval,
                options.check_timeout,
            )),
            None => None,
        };

        Self { inner, background }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.inner.engine.registry()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.inner.cache_ttl
    }

    pub fn is_background(&self) -> bool {
        self.background.is_some()
    }

    pub fn add_checker<P>(&self, name: impl Into<String>, probe: P)
    where
        P: Probe + 'static,
    {
        self.registry().add_checker(name, probe);
    }

    pub fn add_checker_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CheckContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ComponentStatus> + Send + 'static,
    {
        self.registry().add_checker_fn(name, f);
    }

    pub fn add_observer<P>(&self, name: impl Into<String>, probe: P)
    where
        P: Probe + 'static,
    {
        self.registry().add_observer(name, probe);
    }

    pub fn add_observer_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CheckContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ComponentStatus> + Send + 'static,
    {
        self.registry().add_observer_fn(name, f);
    }

    /// Returns the health of all registered components, served from cache
    /// while the last result is fresh.
    pub async fn health(&self, ctx: &CheckContext) -> Arc<HealthStatus> {
        self.inner.health(ctx).await
    }

    /// Stops the background loop. Safe to call more than once; does nothing
    /// when background refresh was never enabled.
    pub fn shutdown(&self) {
        if let Some(background) = &self.background {
            if !background.cancel.is_cancelled() {
                info!("Health checker shutting down");
            }
            background.cancel.cancel();
        }
    }

    /// Stops the background loop and waits for it to exit.
    pub async fn close(mut self) {
        self.shutdown();
        if let Some(background) = self.background.take() {
            if let Err(e) = background.handle.await {
                warn!("Background health check task ended abnormally: {}", e);
            }
        }
    }

    fn spawn_background(
        inner: Arc<Inner>,
        interval: Duration,
        check_timeout: Option<Duration>,
    ) -> BackgroundTask {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!(
            "Starting background health checker with interval: {:?}",
            interval
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if inner.engine.registry().is_empty() {
                            debug!("No components registered, skipping background health check");
                            continue;
                        }
                        let mut ctx = CheckContext::with_cancellation(token.child_token());
                        if let Some(timeout) = check_timeout {
                            ctx = ctx.timeout(timeout);
                        }
                        inner.refresh(&ctx).await;
                    }
                    _ = token.cancelled() => {
                        debug!("Background health checker stopped");
                        break;
                    }
                }
            }
        });

        BackgroundTask { cancel, handle }
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        if let Some(background) = &self.background {
            background.cancel.cancel();
        }
    }
}

impl Inner {
    async fn health(&self, ctx: &CheckContext) -> Arc<HealthStatus> {
        if self.cache_ttl.is_zero() {
            return Arc::new(self.engine.run_triggered(ctx, Trigger::OnDemand).await);
        }

        // The lock is held across the run so concurrent misses wait for the
        // first caller and then hit the fresh entry.
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.as_ref() {
            if Instant::now() < entry.expiry {
                self.record_cache_lookup(true);
                return entry.result.clone();
            }
        }
        self.record_cache_lookup(false);

        let result = Arc::new(self.engine.run_triggered(ctx, Trigger::OnDemand).await);
        *cache = Some(CacheEntry {
            result: result.clone(),
            expiry: Instant::now() + self.cache_ttl,
        });
        result
    }

    /// Runs unconditionally and republishes the result. A run interrupted by
    /// shutdown is discarded.
    async fn refresh(&self, ctx: &CheckContext) {
        let mut cache = self.cache.lock().await;
        let result = Arc::new(self.engine.run_triggered(ctx, Trigger::Background).await);
        if ctx.is_cancelled() {
            debug!("Background health check cancelled, result discarded");
            return;
        }
        *cache = Some(CacheEntry {
            result,
            expiry: Instant::now() + self.cache_ttl,
        });
    }

    fn record_cache_lookup(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(hit);
        }
    }
}
