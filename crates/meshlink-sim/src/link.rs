//! Per-directed-edge link behavior (§4.8): latency, drop probability, and
//! an optional gate predicate that defers delivery to a later tick rather
//! than dropping it outright.

use std::sync::Arc;
use std::time::Duration;

/// Configuration for one `(from, to)` edge. The default is a perfect link:
/// no latency, no drop, no gating.
#[derive(Clone, Default)]
pub struct LinkConfig {
    pub latency: Duration,
    /// Drop probability in `[0.0, 1.0]`.
    pub drop: f64,
    /// When present, evaluated before latency/drop on every fan-out
    /// attempt; `false` defers the write to the next `tick()` rather than
    /// delivering or dropping it (§4.8: "enqueue for retry on next tick").
    pub gate: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
    /// The "`LinkCfg.Err`" hook from §4.8: when it yields `Some(_)` the
    /// write is dropped outright (no retry), distinct from `gate`'s defer.
    pub err_hook: Option<Arc<dyn Fn() -> Option<String> + Send + Sync>>,
}

impl LinkConfig {
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn with_drop(drop: f64) -> Self {
        Self {
            drop,
            ..Self::default()
        }
    }

    pub fn with_gate(gate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            gate: Some(Arc::new(gate)),
            ..Self::default()
        }
    }

    pub fn with_err_hook(err_hook: impl Fn() -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            err_hook: Some(Arc::new(err_hook)),
            ..Self::default()
        }
    }

    /// `true` if the write should be deferred to the next tick rather
    /// than evaluated for drop/delivery this round.
    pub fn should_defer(&self) -> bool {
        match &self.gate {
            Some(gate) => !gate(),
            None => false,
        }
    }

    /// `Some(reason)` if the configured error hook says this delivery
    /// should be dropped outright.
    pub fn err(&self) -> Option<String> {
        self.err_hook.as_ref().and_then(|hook| hook())
    }
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("latency", &self.latency)
            .field("drop", &self.drop)
            .field("gated", &self.gate.is_some())
            .field("err_hook", &self.err_hook.is_some())
            .finish()
    }
}
