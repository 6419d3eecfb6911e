// src/health/registry.rs
use super::context::CheckContext;
use super::probe::{FnProbe, Probe};
use super::status::{ComponentStatus, Role};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Point-in-time view of the registered probes.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    checkers: HashMap<String, Arc<dyn Probe>>,
    observers: HashMap<String, Arc<dyn Probe>>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.checkers.len() + self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Role, &Arc<dyn Probe>)> {
        let checkers = self
            .checkers
            .iter()
            .map(|(name, probe)| (name.as_str(), Role::Checker, probe));
        let observers = self
            .observers
            .iter()
            .map(|(name, probe)| (name.as_str(), Role::Observer, probe));
        checkers.chain(observers)
    }

    fn role_map(&mut self, role: Role) -> &mut HashMap<String, Arc<dyn Probe>> {
        match role {
            Role::Checker => &mut self.checkers,
            Role::Observer => &mut self.observers,
        }
    }
}

/// Named probes split into checkers and observers.
///
/// Writers swap in a modified copy, so a running aggregation keeps reading
/// the snapshot it started with and never waits on registration.
pub struct Registry {
    entries: ArcSwap<RegistrySnapshot>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    /// Registers a probe that affects the aggregate verdict. Replaces any
    /// checker already registered under `name`.
    pub fn add_checker<P>(&self, name: impl Into<String>, probe: P)
    where
        P: Probe + 'static,
    {
        self.insert(Role::Checker, name.into(), Arc::new(probe));
    }

    pub fn add_checker_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CheckContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ComponentStatus> + Send + 'static,
    {
        self.add_checker(name, FnProbe::new(f));
    }

    /// Registers a probe that is reported but never flips the verdict to down.
    pub fn add_observer<P>(&self, name: impl Into<String>, probe: P)
    where
        P: Probe + 'static,
    {
        self.insert(Role::Observer, name.into(), Arc::new(probe));
    }

    pub fn add_observer_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CheckContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ComponentStatus> + Send + 'static,
    {
        self.add_observer(name, FnProbe::new(f));
    }

    pub fn remove_checker(&self, name: &str) -> bool {
        self.remove(Role::Checker, name)
    }

    pub fn remove_observer(&self, name: &str) -> bool {
        self.remove(Role::Observer, name)
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.entries.load_full()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    fn insert(&self, role: Role, name: String, probe: Arc<dyn Probe>) {
        let previous = self.entries.rcu(|current| {
            let mut next = RegistrySnapshot::clone(current);
            next.role_map(role).insert(name.clone(), probe.clone());
            next
        });

        let replaced = match role {
            Role::Checker => previous.checkers.contains_key(&name),
            Role::Observer => previous.observers.contains_key(&name),
        };
        if replaced {
            tracing::debug!(component = %name, role = role.as_str(), "Replaced registered probe");
        } else {
            tracing::debug!(component = %name, role = role.as_str(), "Registered probe");
        }
    }

    fn remove(&self, role: Role, name: &str) -> bool {
        let previous = self.entries.rcu(|current| {
            let mut next = RegistrySnapshot::clone(current);
            next.role_map(role).remove(name);
            next
        });

        let removed = match role {
            Role::Checker => previous.checkers.contains_key(name),
            Role::Observer => previous.observers.contains_key(name),
        };
        if removed {
            tracing::debug!(component = %name, role = role.as_str(), "Removed probe");
        }
        removed
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn up(_ctx: CheckContext) -> ComponentStatus {
        ComponentStatus::new().mark_up()
    }

    async fn down(_ctx: CheckContext) -> ComponentStatus {
        ComponentStatus::new().mark_down()
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = Registry::new();
        registry.add_checker_fn("db", up);
        registry.add_checker_fn("db", down);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);

        let (_, role, probe) = snapshot.entries().next().unwrap();
        assert_eq!(role, Role::Checker);
        assert!(probe.check(&CheckContext::new()).await.is_down());
    }

    #[test]
    fn test_same_name_in_both_roles() {
        let registry = Registry::new();
        registry.add_checker_fn("db", up);
        registry.add_observer_fn("db", up);

        assert_eq!(registry.len(), 2);
        let roles: Vec<Role> = registry.snapshot().entries().map(|(_, r, _)| r).collect();
        assert!(roles.contains(&Role::Checker));
        assert!(roles.contains(&Role::Observer));
    }

    #[test]
    fn test_snapshot_is_stable_across_mutation() {
        let registry = Registry::new();
        registry.add_checker_fn("a", up);
        let before = registry.snapshot();

        registry.add_observer_fn("b", up);
        assert!(registry.remove_checker("a"));
        assert!(!registry.remove_checker("a"));

        assert_eq!(before.len(), 1);
        assert_eq!(before.entries().next().map(|(n, _, _)| n), Some("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        registry.add_checker_fn(format!("checker-{}-{}", i, j), up);
                        let _ = registry.snapshot().len();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 200);
        assert!(!registry.is_empty());
    }
}
