//! Shared breaker state, keyed by breaker name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use super::state::BreakerSnapshot;

/// A set of named breaker states.
///
/// Breakers built from the same registry with the same name share one state,
/// so every call site guarding a dependency trips and recovers together.
/// Cloning the registry clones the handle, not the states. State lives as
/// long as the registry does; nothing is shared across processes.
///
/// # Example
///
/// ```rust
/// use slackwater::breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker};
///
/// let registry = BreakerRegistry::new();
/// let a = CircuitBreaker::new(BreakerConfig::default().with_name("proxy-list"), &registry);
/// let b = CircuitBreaker::new(BreakerConfig::default().with_name("proxy-list"), &registry);
///
/// assert_eq!(registry.names(), vec!["proxy-list".to_string()]);
/// # let _ = (a, b);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BreakerRegistry {
    entries: Arc<Mutex<HashMap<String, Arc<Mutex<BreakerSnapshot>>>>>,
}

impl BreakerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The state for `name`, created closed on first use.
    pub(crate) fn entry(&self, name: &str) -> Arc<Mutex<BreakerSnapshot>> {
        let mut entries = lock(&self.entries);
        entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BreakerSnapshot::new(Instant::now()))))
            .clone()
    }

    /// A copy of the state for `name`, if a breaker with that name exists.
    pub fn snapshot(&self, name: &str) -> Option<BreakerSnapshot> {
        let entries = lock(&self.entries);
        entries.get(name).map(|entry| lock(entry).clone())
    }

    /// Names of all known breakers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.entries).keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of known breakers.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// True when no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

/// Lock, recovering from poisoning. The guarded data is plain counters that
/// are never left half-updated by a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
