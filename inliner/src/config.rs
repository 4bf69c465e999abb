//! Configuration for the inliner passes.
//!
//! The configuration is read once at pass entry and treated as immutable for
//! the duration of the pass.

/// How much detail to record about inlining of imported functions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ImportStats {
    /// Don't gather anything.
    No,
    /// A single summary at end of pass.
    Basic,
    /// A per-function log at end of pass.
    Verbose,
}

/// A type for storing the knobs the inliner recognizes.
pub struct Config {
    /// Disables reuse of previously inlined array allocas.
    ///
    /// Merging of allocas predates lifetime-marker based stack coloring in
    /// code generators; this knob exists to experiment with relying on the
    /// markers alone.
    pub disable_inlined_alloca_merging: bool,

    /// Whether and how to gather statistics about inlined imported
    /// functions.
    pub import_stats: ImportStats,

    /// Whether the IR mutator should bracket inlined allocas with lifetime
    /// markers.
    pub insert_lifetime: bool,
}

impl Config {
    pub fn new() -> Config {
        Config {
            disable_inlined_alloca_merging: false,
            import_stats: ImportStats::No,
            insert_lifetime: true,
        }
    }
}
