// src/health/mod.rs
mod checker;
mod context;
mod engine;
mod probe;
mod registry;
mod status;

pub use checker::{HealthChecker, HealthCheckerOptions};
pub use context::{CheckContext, CheckError};
pub use engine::{AggregationEngine, Trigger};
pub use probe::{FnProbe, Probe};
pub use registry::{Registry, RegistrySnapshot};
pub use status::{ComponentStatus, HealthStatus, Role, Status};
