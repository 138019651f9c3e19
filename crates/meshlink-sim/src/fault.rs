//! Dynamic fault injection (§9 "Dynamic 'Err func' injection"): a named
//! site in the registry — a "fault point" — where a test can force the
//! next call, or every call, to fail. Implementations decorate each
//! operation with [`FaultInjector::eval`] at entry, mirroring the design
//! note's "evalFault at entry" guidance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use meshlink_registry::RegistryError;

type Hook = Arc<dyn Fn(&str) -> Option<RegistryError> + Send + Sync>;

enum Entry {
    FailOnce(RegistryError),
    FailAlways(RegistryError),
    Hook(Hook),
}

/// A registry of per-fault-point failure behavior. One instance is shared
/// by every node a [`crate::ClusterSimulator`] hosts, keyed by a
/// caller-chosen point name (e.g. `"upsert_machine"`, `"subscribe_machines"`).
#[derive(Default)]
pub struct FaultInjector {
    points: Mutex<HashMap<String, Entry>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call through `point` fails with `err`; the entry is then
    /// cleared automatically.
    pub fn fail_once(&self, point: impl Into<String>, err: RegistryError) {
        self.points
            .lock()
            .expect("fault injector poisoned")
            .insert(point.into(), Entry::FailOnce(err));
    }

    /// Every call through `point` fails with a freshly constructed error
    /// until [`FaultInjector::clear`] or [`FaultInjector::reset`].
    pub fn fail_always(&self, point: impl Into<String>, err: RegistryError) {
        self.points
            .lock()
            .expect("fault injector poisoned")
            .insert(point.into(), Entry::FailAlways(err));
    }

    /// Installs an arbitrary predicate: called on every `eval(point)`,
    /// returning `Some(err)` to fail that call or `None` to pass it
    /// through. More flexible than `fail_always` when the error should
    /// vary call to call (e.g. alternating success/failure).
    pub fn set_hook(
        &self,
        point: impl Into<String>,
        hook: impl Fn(&str) -> Option<RegistryError> + Send + Sync + 'static,
    ) {
        self.points
            .lock()
            .expect("fault injector poisoned")
            .insert(point.into(), Entry::Hook(Arc::new(hook)));
    }

    /// Removes any fault configured for `point`.
    pub fn clear(&self, point: &str) {
        self.points.lock().expect("fault injector poisoned").remove(point);
    }

    /// Removes every configured fault.
    pub fn reset(&self) {
        self.points.lock().expect("fault injector poisoned").clear();
    }

    /// Evaluates `point`: consumes a `FailOnce` entry and returns its
    /// error, returns a fresh error on every call for `FailAlways`, or
    /// defers to an installed hook. Returns `None` when nothing is
    /// configured for `point`.
    pub fn eval(&self, point: &str) -> Option<RegistryError> {
        let mut points = self.points.lock().expect("fault injector poisoned");
        match points.get(point) {
            Some(Entry::FailAlways(_)) => {
                // Re-borrow to clone the error without holding two
                // references into the map at once.
                if let Some(Entry::FailAlways(err)) = points.get(point) {
                    return Some(clone_registry_error(err));
                }
                None
            }
            Some(Entry::Hook(hook)) => hook(point),
            Some(Entry::FailOnce(_)) => {
                if let Some(Entry::FailOnce(err)) = points.remove(point) {
                    Some(err)
                } else {
                    None
                }
            }
            None => None,
        }
    }
}

/// `RegistryError` is not `Clone` (it wraps a version pair that is, but the
/// type as a whole isn't derived `Clone`); this reconstructs an equivalent
/// value for repeated `FailAlways` delivery.
fn clone_registry_error(err: &RegistryError) -> RegistryError {
    match err {
        RegistryError::NodeDead => RegistryError::NodeDead,
        RegistryError::Conflict { expected, found } => RegistryError::Conflict {
            expected: *expected,
            found: *found,
        },
        RegistryError::Other(msg) => RegistryError::Other(msg.clone()),
    }
}
