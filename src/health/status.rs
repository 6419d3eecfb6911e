// src/health/status.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "Unknown")]
    Unknown,
}

/// Whether a registered probe takes part in the aggregate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Checker,
    Observer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Checker => "checker",
            Role::Observer => "observer",
        }
    }
}

/// Result of one component's health check, e.g. a database.
///
/// Starts out as `Unknown` with no details and is filled in by the probe
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    status: Status,
    #[serde(default)]
    details: HashMap<String, Value>,
}

impl ComponentStatus {
    pub fn new() -> Self {
        Self {
            status: Status::Unknown,
            details: HashMap::new(),
        }
    }

    pub fn mark_up(mut self) -> Self {
        self.status = Status::Up;
        self
    }

    pub fn mark_down(mut self) -> Self {
        self.status = Status::Down;
        self
    }

    /// Adds a detail, replacing any previous value under the same key.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn details(&self) -> &HashMap<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }

    pub fn is_down(&self) -> bool {
        self.status == Status::Down
    }
}

impl Default for ComponentStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated result of every registered component.
///
/// The verdict is always `UP` or `DOWN`; payloads carrying any other
/// top-level status are rejected on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HealthStatusRepr")]
pub struct HealthStatus {
    status: Status,
    components: HashMap<String, ComponentStatus>,
}

#[derive(Deserialize)]
struct HealthStatusRepr {
    status: Status,
    #[serde(default)]
    components: HashMap<String, ComponentStatus>,
}

impl TryFrom<HealthStatusRepr> for HealthStatus {
    type Error = String;

    fn try_from(repr: HealthStatusRepr) -> Result<Self, Self::Error> {
        match repr.status {
            Status::Up | Status::Down => Ok(Self {
                status: repr.status,
                components: repr.components,
            }),
            Status::Unknown => Err("aggregate status must be UP or DOWN".to_string()),
        }
    }
}

impl HealthStatus {
    /// Collapses per-component results into one verdict.
    ///
    /// The verdict is `DOWN` as soon as one checker is not up. Observers are
    /// reported but never change the verdict. If a name was registered in both
    /// roles the checker's status is the one kept in `components`.
    pub fn aggregate<I>(results: I) -> Self
    where
        I: IntoIterator<Item = (String, Role, ComponentStatus)>,
    {
        let mut status = Status::Up;
        let mut components = HashMap::new();

        for (name, role, component) in results {
            match role {
                Role::Checker => {
                    if !component.is_up() {
                        status = Status::Down;
                    }
                    components.insert(name, component);
                }
                Role::Observer => {
                    components.entry(name).or_insert(component);
                }
            }
        }

        Self { status, components }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn components(&self) -> &HashMap<String, ComponentStatus> {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&ComponentStatus> {
        self.components.get(name)
    }

    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }

    pub fn is_down(&self) -> bool {
        self.status == Status::Down
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::aggregate(Vec::new())
    }
}
