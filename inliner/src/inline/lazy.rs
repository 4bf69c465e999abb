//! The inliner over a lazy call graph.
//!
//! Same job as the worklist driver, different mechanics: nodes are processed
//! LIFO, calls within a node top-down, and the SCC/RefSCC views are
//! re-derived incrementally after every node that changed. Dead callees are
//! only queued while iterating and deleted once the whole component has
//! settled, because the graph views hold onto their nodes until then.
//!
//! This driver deliberately performs no alloca merging: lifetime markers are
//! emitted by the IR mutator, and stack reuse is left to marker-based stack
//! coloring in the code generator.
use crate::analysis::Services;
use crate::history::{InlineHistory, NO_HISTORY};
use crate::inline::should_inline;
use crate::lazy_graph::{LazyCallGraph, SccId};
use crate::state::State;
use indexmap::IndexSet;
use ir::inline::{inline_function, InlineInfo};
use ir::{
    merge_attributes_for_inlining, Attribute, CallSite, FunctionId,
    Instruction, Module,
};

/// Inlines calls within one SCC of the lazy graph. Returns `true` if the IR
/// was mutated.
pub fn inline_calls(
    scc: SccId,
    graph: &mut LazyCallGraph,
    module: &mut Module,
    state: &mut State,
    services: &mut Services,
) -> bool {
    // The SCC structure may change while we work, so we process from a node
    // worklist and re-check membership on every pop.
    let mut nodes: Vec<FunctionId> = graph.scc_functions(scc).to_vec();
    let mut current = scc;
    let mut calls: Vec<(CallSite, i32)> = Vec::new();
    let mut history = InlineHistory::new();
    let mut inlined_callees: IndexSet<FunctionId> = IndexSet::new();
    let mut dead: Vec<FunctionId> = Vec::new();
    let mut info = InlineInfo::new();
    let mut changed = false;

    while let Some(node) = nodes.pop() {
        if graph.lookup_scc(node) != Some(current) {
            continue;
        }

        if module
            .function(node)
            .attributes
            .contains(Attribute::OptimizeNone)
        {
            continue;
        }

        // Calls are collected in reverse instruction order so that popping
        // processes them top-down: simplifications from replacing a call
        // with its result cascade down to the decisions that follow.
        calls.clear();

        let func = module.function(node);

        for block in func.body.blocks.iter().rev() {
            for ins in block.instructions.iter().rev() {
                if let Instruction::Call(call) = ins {
                    if !module.function(call.callee).is_declaration() {
                        calls.push((
                            CallSite::new(node, call.id),
                            NO_HISTORY,
                        ));
                    }
                }
            }
        }

        let mut did_inline = false;

        while let Some((site, history_id)) = calls.pop() {
            let Some(callee) = module.call_site_callee(site) else {
                continue;
            };

            if module
                .get_function(callee)
                .map_or(true, |f| f.is_declaration())
            {
                continue;
            }

            if history_id != NO_HISTORY && history.includes(callee, history_id)
            {
                continue;
            }

            if !should_inline(module, site, state, services) {
                continue;
            }

            if !inline_function(
                module,
                site,
                &mut info,
                state.config.insert_lifetime,
            ) {
                continue;
            }

            did_inline = true;
            changed = true;
            state.stats.inlined += 1;
            inlined_callees.insert(callee);

            // Newly exposed calls to definitions join the worklist,
            // remembering the expansion that created them.
            if !info.inlined_calls.is_empty() {
                let new_history = history.add(callee, history_id);

                for &new_site in info.inlined_calls.iter().rev() {
                    let defined = module
                        .call_site_callee(new_site)
                        .and_then(|id| module.get_function(id))
                        .map_or(false, |f| !f.is_declaration());

                    if defined {
                        calls.push((new_site, new_history));
                    }
                }
            }

            merge_attributes_for_inlining(module, node, callee);

            // A local callee may have just lost its last user. Dropping the
            // body eagerly can reduce other functions to a single caller,
            // which changes their inline thresholds. Deletion itself waits:
            // the graph still holds the node.
            if module.function(callee).linkage.is_local() {
                module.function_mut(callee).purge_dead_constant_users();

                if !module.has_uses(callee) {
                    assert!(
                        !dead.contains(&callee),
                        "a function became dead twice"
                    );

                    module.function_mut(callee).drop_all_references();
                    graph.refresh_node(module, callee);
                    dead.push(callee);
                }
            }
        }

        if !did_inline {
            continue;
        }

        // The caller now reaches everything its inlined callees reached.
        // Recording those as trivial edges keeps the graph consistent until
        // the views are re-derived.
        for callee in inlined_callees.drain(..) {
            let call_targets = graph.calls_of(callee).to_vec();
            let ref_targets = graph.refs_of(callee).to_vec();

            for to in call_targets {
                graph.insert_trivial_call_edge(node, to);
            }

            for to in ref_targets {
                graph.insert_trivial_ref_edge(node, to);
            }
        }

        current = graph.update_after_change(module, node);
    }

    // All inlining across this component is done; the trivially dead
    // functions can now leave the graph and the module.
    for callee in dead {
        graph.remove_dead_function(callee);
        module.remove_function(callee);
        state.stats.deleted += 1;
    }

    changed
}
