//! Antithesis-style property annotations: `always!`, `sometimes!`, `never!`.
//!
//! These macros let a chaos run or a property test assert a correctness
//! condition (`always!`/`never!`) while also recording, under the `sim`
//! feature, whether a condition was ever observed true or false at all —
//! the `sometimes!` coverage signal used to catch a property that looks
//! satisfied only because it was never exercised.
//!
//! Without the `sim` feature every macro still asserts (where applicable)
//! but performs no bookkeeping, so production builds pay nothing for this
//! crate beyond the condition evaluation itself.

mod kind;
#[cfg(feature = "sim")]
mod registry;

pub use kind::PropertyKind;
#[cfg(feature = "sim")]
pub use registry::{Hit, drain, reset, sometimes_satisfied};

/// Asserts that `cond` holds every time this call site is reached.
///
/// Violating an `always!` is a bug in the system under test, not merely an
/// uninteresting input — it panics immediately with `name` and the
/// call site, matching `debug_assert!`'s style but unconditional.
#[macro_export]
macro_rules! always {
    ($cond:expr, $name:expr) => {{
        let satisfied = $cond;
        $crate::__record($name, $crate::PropertyKind::Always, satisfied, file!(), line!());
        assert!(satisfied, "ALWAYS violated: {}", $name);
    }};
}

/// Records that `cond` was observed at this call site without asserting
/// anything. A `sometimes!` that is never satisfied across a whole chaos
/// run or test suite indicates dead coverage, checkable afterwards via
/// [`sometimes_satisfied`].
#[macro_export]
macro_rules! sometimes {
    ($cond:expr, $name:expr) => {{
        let satisfied = $cond;
        $crate::__record($name, $crate::PropertyKind::Sometimes, satisfied, file!(), line!());
    }};
}

/// Asserts that `cond` never holds at this call site.
#[macro_export]
macro_rules! never {
    ($cond:expr, $name:expr) => {{
        let satisfied = $cond;
        $crate::__record($name, $crate::PropertyKind::Never, satisfied, file!(), line!());
        assert!(!satisfied, "NEVER violated: {}", $name);
    }};
}

/// Internal recording hook used by the macros above. Public only because
/// macro expansion happens in the caller's crate; not part of the stable API.
#[doc(hidden)]
pub fn __record(name: &'static str, kind: PropertyKind, satisfied: bool, file: &'static str, line: u32) {
    #[cfg(feature = "sim")]
    registry::record(Hit { name, kind, satisfied, file, line });
    #[cfg(not(feature = "sim"))]
    let _ = (name, kind, satisfied, file, line);
}

#[cfg(test)]
mod tests {
    #[test]
    fn always_passes_on_true() {
        always!(1 + 1 == 2, "arithmetic sanity");
    }

    #[test]
    #[should_panic(expected = "ALWAYS violated")]
    fn always_panics_on_false() {
        always!(1 + 1 == 3, "broken arithmetic");
    }

    #[test]
    fn sometimes_never_panics() {
        sometimes!(false, "rarely true");
    }

    #[test]
    #[should_panic(expected = "NEVER violated")]
    fn never_panics_when_condition_holds() {
        never!(true, "should not happen");
    }
}
