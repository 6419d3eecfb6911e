// src/lib.rs
pub mod config;
pub mod health;
pub mod metrics;
pub mod probes;
pub mod server;

pub use health::{
    CheckContext, ComponentStatus, HealthChecker, HealthCheckerOptions, HealthStatus, Probe,
    Status,
};
