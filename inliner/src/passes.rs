//! Pass entry points driving whole-module inlining.
use crate::analysis::Services;
use crate::call_graph::CallGraph;
use crate::config::ImportStats;
use crate::inline;
use crate::lazy_graph::LazyCallGraph;
use crate::state::State;
use crate::sweep::remove_dead_functions;
use ir::Module;

/// The worklist inliner: walks the call graph's strongly connected
/// components bottom-up, runs the fixed-point driver on each, then sweeps
/// dead functions at end of pass.
pub struct InlineCallSites;

impl InlineCallSites {
    pub fn run_all(
        module: &mut Module,
        state: &mut State,
        services: &mut Services,
    ) -> bool {
        if state.config.import_stats != ImportStats::No {
            state.import_stats.set_module_info(module);
        }

        let mut graph = CallGraph::new(module);
        let mut changed = false;
        let sccs = graph.strongly_connected_components();

        for scc in &sccs {
            changed |= inline::scc::inline_calls(
                scc,
                &mut graph,
                module,
                state,
                services,
            );
        }

        if state.config.import_stats != ImportStats::No {
            let verbose = state.config.import_stats == ImportStats::Verbose;

            eprintln!("{}", state.import_stats.dump(verbose));
        }

        changed |= remove_dead_functions(&mut graph, module, state, false);
        changed
    }
}

/// The lazy-graph inliner: walks the SCC postorder and keeps the SCC and
/// RefSCC views up to date as it transforms the module.
pub struct LazyInline;

impl LazyInline {
    pub fn run_all(
        module: &mut Module,
        state: &mut State,
        services: &mut Services,
    ) -> bool {
        if state.config.import_stats != ImportStats::No {
            state.import_stats.set_module_info(module);
        }

        let mut graph = LazyCallGraph::new(module);
        let mut changed = false;

        for scc in graph.postorder() {
            // Components invalidated by deletions (or re-derived into a new
            // identity) have nothing left to process.
            if !graph.scc_is_current(scc) {
                continue;
            }

            changed |= inline::lazy::inline_calls(
                scc,
                &mut graph,
                module,
                state,
                services,
            );
        }

        if state.config.import_stats != ImportStats::No {
            let verbose = state.config.import_stats == ImportStats::Verbose;

            eprintln!("{}", state.import_stats.dump(verbose));
        }

        changed
    }
}
