//! Monotone statistics counters with observable names.
use std::fmt;

/// The counters the inliner increments as it transforms a module.
///
/// Counters only ever go up within a pass; they're reported by name at the
/// end of a compilation.
#[derive(Default)]
pub struct Statistics {
    /// Number of functions inlined.
    pub inlined: u64,

    /// Number of call sites deleted, not inlined.
    pub calls_deleted: u64,

    /// Number of functions deleted because all callers were found.
    pub deleted: u64,

    /// Number of allocas merged together.
    pub merged_allocas: u64,

    /// Number of times the callers of a caller were analyzed to see whether
    /// an inline would block a more profitable outer inline.
    pub caller_callers_analyzed: u64,
}

impl Statistics {
    pub fn new() -> Statistics {
        Statistics::default()
    }

    pub fn counters(&self) -> [(&'static str, u64); 5] {
        [
            ("NumInlined", self.inlined),
            ("NumCallsDeleted", self.calls_deleted),
            ("NumDeleted", self.deleted),
            ("NumMergedAllocas", self.merged_allocas),
            ("NumCallerCallersAnalyzed", self.caller_callers_analyzed),
        ]
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (name, value) in self.counters() {
            writeln!(f, "{} = {}", name, value)?;
        }

        Ok(())
    }
}
