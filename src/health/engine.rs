// src/health/engine.rs
use super::context::CheckContext;
use super::registry::Registry;
use super::status::{ComponentStatus, HealthStatus, Role};
use crate::metrics::{MetricsCollector, Timer};
use std::sync::Arc;
use tracing::{debug, error, info_span, warn, Instrument};

/// Where an aggregation run was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    OnDemand,
    Background,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::OnDemand => "on_demand",
            Trigger::Background => "background",
        }
    }
}

/// Runs every registered probe concurrently and merges the results.
pub struct AggregationEngine {
    registry: Arc<Registry>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AggregationEngine {
    pub fn new(registry: Arc<Registry>, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Checks every probe registered at call time and computes the aggregate.
    ///
    /// Each probe runs in its own task. A probe that panics is reported as
    /// down; the others are unaffected. No timeout is applied beyond what
    /// `ctx` carries.
    pub async fn run_once(&self, ctx: &CheckContext) -> HealthStatus {
        self.run_triggered(ctx, Trigger::OnDemand).await
    }

    pub(crate) async fn run_triggered(&self, ctx: &CheckContext, trigger: Trigger) -> HealthStatus {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("health_run", %run_id, trigger = trigger.as_str());
        self.run_snapshot(ctx, trigger).instrument(span).await
    }

    async fn run_snapshot(&self, ctx: &CheckContext, trigger: Trigger) -> HealthStatus {
        let timer = Timer::new();
        let snapshot = self.registry.snapshot();
        let mut names = Vec::with_capacity(snapshot.len());
        let mut tasks = Vec::with_capacity(snapshot.len());

        for (name, role, probe) in snapshot.entries() {
            let probe = probe.clone();
            let ctx = ctx.clone();
            names.push((name.to_string(), role));
            tasks.push(tokio::spawn(
                async move { probe.check(&ctx).await }.in_current_span(),
            ));
        }

        // Wait for every probe before merging
        let results = futures::future::join_all(tasks).await;

        let merged = names.into_iter().zip(results).map(|((name, role), result)| {
            let component = match result {
                Ok(component) => component,
                Err(e) => {
                    error!(component = %name, error = %e, "Probe task failed");
                    ComponentStatus::new()
                        .mark_down()
                        .with_detail("err", format!("probe task failed: {}", e))
                }
            };
            self.observe_component(&name, role, &component);
            (name, role, component)
        });
        let health = HealthStatus::aggregate(merged.collect::<Vec<_>>());

        let elapsed = timer.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_run(trigger, &health, elapsed);
        }
        debug!(
            status = ?health.status(),
            components = health.components().len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Health check complete"
        );

        health
    }

    fn observe_component(&self, name: &str, role: Role, component: &ComponentStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.record_component(name, role, component.status());
        }

        if component.is_up() {
            debug!(component = %name, role = role.as_str(), "Component is up");
        } else {
            let err = component
                .detail("err")
                .map(|v| v.to_string())
                .unwrap_or_default();
            warn!(
                component = %name,
                role = role.as_str(),
                status = ?component.status(),
                err = %err,
                "Component is not up"
            );
        }
    }
}
