//! State accessible to the inliner passes.
use crate::config::Config;
use crate::import_stats::ImportedFunctionsStats;
use crate::remarks::Remarks;
use crate::stats::Statistics;

/// State that is accessible by the driver passes.
///
/// This is stored in a separate type/module so the drivers, the policy code,
/// and the sweeper can all borrow from one place without circular
/// dependencies.
pub struct State {
    pub config: Config,
    pub remarks: Remarks,
    pub stats: Statistics,
    pub import_stats: ImportedFunctionsStats,
}

impl State {
    pub fn new(config: Config) -> State {
        State {
            config,
            remarks: Remarks::new(),
            stats: Statistics::new(),
            import_stats: ImportedFunctionsStats::new(),
        }
    }
}
