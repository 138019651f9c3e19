//! Thread-local hit recording, enabled by the `sim` feature so a chaos run
//! can report which properties actually fired during a scenario.

use std::cell::RefCell;

use crate::kind::PropertyKind;

/// One evaluation of an `always!`/`sometimes!`/`never!` call site.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hit {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub satisfied: bool,
    pub file: &'static str,
    pub line: u32,
}

thread_local! {
    static HITS: RefCell<Vec<Hit>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn record(hit: Hit) {
    HITS.with(|hits| hits.borrow_mut().push(hit));
}

/// Drains every hit recorded on this thread since the last drain or reset.
pub fn drain() -> Vec<Hit> {
    HITS.with(|hits| std::mem::take(&mut *hits.borrow_mut()))
}

/// Clears recorded hits without returning them.
pub fn reset() {
    HITS.with(|hits| hits.borrow_mut().clear());
}

/// Returns true if `name` was ever recorded with `satisfied == true` among
/// hits currently buffered on this thread (does not drain).
pub fn sometimes_satisfied(name: &str) -> bool {
    HITS.with(|hits| {
        hits.borrow()
            .iter()
            .any(|h| h.kind == PropertyKind::Sometimes && h.name == name && h.satisfied)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_and_clears_hits() {
        reset();
        record(Hit {
            name: "x",
            kind: PropertyKind::Sometimes,
            satisfied: true,
            file: "f",
            line: 1,
        });
        let hits = drain();
        assert_eq!(hits.len(), 1);
        assert!(drain().is_empty());
    }

    #[test]
    fn sometimes_satisfied_tracks_at_least_one_true_hit() {
        reset();
        record(Hit {
            name: "coverage-me",
            kind: PropertyKind::Sometimes,
            satisfied: false,
            file: "f",
            line: 1,
        });
        assert!(!sometimes_satisfied("coverage-me"));
        record(Hit {
            name: "coverage-me",
            kind: PropertyKind::Sometimes,
            satisfied: true,
            file: "f",
            line: 2,
        });
        assert!(sometimes_satisfied("coverage-me"));
        reset();
    }
}
