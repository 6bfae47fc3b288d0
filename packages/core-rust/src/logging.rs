//! Process-wide switch for verbose combinator traces.
//!
//! Combinators describe their decisions (front hit, miss, pull, push, abort)
//! through [`trace_decision!`](crate::trace_decision). Those lines are emitted
//! only while the switch is on; the switch never affects control flow.
//! Output goes through `tracing` under the `shoal` target, so the installed
//! subscriber still decides whether and where they are printed.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Turns verbose combinator traces on or off. Off by default.
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

/// Whether verbose combinator traces are currently emitted.
#[must_use]
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Emits a `tracing::debug!` line under the `shoal` target when verbose
/// traces are enabled.
#[macro_export]
macro_rules! trace_decision {
    ($($arg:tt)+) => {
        if $crate::logging::is_verbose() {
            ::tracing::debug!(target: "shoal", $($arg)+);
        }
    };
}
