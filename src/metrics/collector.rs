// src/metrics/collector.rs
use crate::health::{HealthStatus, Role, Status, Trigger};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Aggregation metrics
    pub runs_total: IntCounterVec,
    pub run_duration_seconds: HistogramVec,
    pub status: IntGauge,

    // Component metrics
    pub component_checks_total: IntCounterVec,
    pub component_status: IntGaugeVec,

    // Cache metrics
    pub cache_lookups_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let runs_total = IntCounterVec::new(
            Opts::new("health_runs_total", "Total number of aggregation runs"),
            &["trigger", "status"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let run_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_run_duration_seconds",
                "Aggregation run duration in seconds",
            ),
            &["trigger"],
        )?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        let status = IntGauge::new(
            "health_status",
            "Aggregate health status of the last run (1=up, 0=down)",
        )?;
        registry.register(Box::new(status.clone()))?;

        let component_checks_total = IntCounterVec::new(
            Opts::new("health_component_checks_total", "Total component checks"),
            &["component", "role", "status"],
        )?;
        registry.register(Box::new(component_checks_total.clone()))?;

        let component_status = IntGaugeVec::new(
            Opts::new(
                "health_component_status",
                "Component status of the last run (1=up, 0=down, -1=unknown)",
            ),
            &["component", "role"],
        )?;
        registry.register(Box::new(component_status.clone()))?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("health_cache_lookups_total", "Total health cache lookups"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        Ok(Self {
            runs_total,
            run_duration_seconds,
            status,
            component_checks_total,
            component_status,
            cache_lookups_total,
        })
    }

    pub fn record_run(&self, trigger: Trigger, health: &HealthStatus, duration: std::time::Duration) {
        let status = status_label(health.status());
        self.runs_total
            .with_label_values(&[trigger.as_str(), status])
            .inc();

        self.run_duration_seconds
            .with_label_values(&[trigger.as_str()])
            .observe(duration.as_secs_f64());

        self.status.set(if health.is_up() { 1 } else { 0 });
    }

    pub fn record_component(&self, component: &str, role: Role, status: Status) {
        self.component_checks_total
            .with_label_values(&[component, role.as_str(), status_label(status)])
            .inc();

        let value = match status {
            Status::Up => 1,
            Status::Down => 0,
            Status::Unknown => -1,
        };
        self.component_status
            .with_label_values(&[component, role.as_str()])
            .set(value);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Up => "UP",
        Status::Down => "DOWN",
        Status::Unknown => "Unknown",
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;

    #[test]
    fn test_gather_contains_recorded_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let collector = registry.collector();

        let health = HealthStatus::aggregate(vec![(
            "db".to_string(),
            Role::Checker,
            ComponentStatus::new().mark_down(),
        )]);
        collector.record_component("db", Role::Checker, Status::Down);
        collector.record_run(Trigger::OnDemand, &health, std::time::Duration::from_millis(5));
        collector.record_cache_lookup(true);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("health_runs_total{status=\"DOWN\",trigger=\"on_demand\"} 1"));
        assert!(text.contains("health_status 0"));
        assert!(text.contains("health_component_status{component=\"db\",role=\"checker\"} 0"));
        assert!(text.contains("health_cache_lookups_total{result=\"hit\"} 1"));
    }
}
