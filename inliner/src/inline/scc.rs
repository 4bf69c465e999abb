//! The worklist inliner over call-graph SCCs.
//!
//! One invocation handles one strongly connected component: it gathers the
//! component's call sites up front, then runs a fixed-point loop in which
//! every iteration either consumes a call site (by inlining it or deleting
//! it as dead) or leaves it for a later round. New call sites exposed by an
//! inline join the list with an inline-history entry so recursion can't
//! expand forever.
use crate::allocas::InlinedArrayAllocas;
use crate::analysis::{is_trivially_dead, Services};
use crate::call_graph::{CallGraph, CallGraphScc};
use crate::history::{InlineHistory, NO_HISTORY};
use crate::inline::{inline_call_if_possible, should_inline};
use crate::remarks::{Remark, RemarkId, RemarkKind};
use crate::state::State;
use fnv::FnvHashSet;
use ir::inline::InlineInfo;
use ir::{CallSite, FunctionId, Module};

fn not_inlined_remark(
    module: &Module,
    callee: FunctionId,
    caller: FunctionId,
) -> Remark {
    Remark::new(
        RemarkKind::Missed,
        RemarkId::NotInlined,
        module.function(callee).name.clone(),
        module.function(caller).name.clone(),
    )
}

/// Inlines calls within one strongly connected component until nothing
/// changes anymore. Returns `true` if the IR was mutated.
pub fn inline_calls(
    scc: &CallGraphScc,
    graph: &mut CallGraph,
    module: &mut Module,
    state: &mut State,
    services: &mut Services,
) -> bool {
    let functions = scc.functions(graph);
    let scc_functions: FnvHashSet<FunctionId> =
        functions.iter().copied().collect();

    // Identify all call sites ahead of time so that we only inline call
    // sites in the original functions, not call sites that result from
    // inlining other functions.
    let mut call_sites: Vec<(CallSite, i32)> = Vec::new();

    for &func_id in &functions {
        let func = module.function(func_id);

        if func.is_declaration() {
            continue;
        }

        for block in &func.body.blocks {
            for ins in &block.instructions {
                // Builtins never carry a call identity, so they can never
                // end up on the worklist.
                let Some(call_id) = ins.call_id() else { continue };

                if let Some(callee) = ins.called_function() {
                    if module.function(callee).is_declaration() {
                        state.remarks.emit(Remark::new(
                            RemarkKind::Missed,
                            RemarkId::NoDefinition,
                            module.function(callee).name.clone(),
                            func.name.clone(),
                        ));
                        continue;
                    }
                }

                // Indirect calls are kept: inlining may resolve them to
                // direct calls later on.
                call_sites.push((CallSite::new(func_id, call_id), NO_HISTORY));
            }
        }
    }

    if call_sites.is_empty() {
        return false;
    }

    // Move the calls to functions in the current SCC to the end of the
    // list. Intra-SCC calls are the cycle-risk cases; handling the acyclic
    // opportunities first lets them land and reveal simplifications.
    let mut first_call_in_scc = call_sites.len();
    let mut index = 0;

    while index < first_call_in_scc {
        let intra = module
            .call_site_callee(call_sites[index].0)
            .is_some_and(|callee| scc_functions.contains(&callee));

        if intra {
            first_call_in_scc -= 1;
            call_sites.swap(index, first_call_in_scc);
        } else {
            index += 1;
        }
    }

    let mut allocas = InlinedArrayAllocas::new();
    let mut history = InlineHistory::new();
    let mut info = InlineInfo::new();
    let mut changed = false;

    loop {
        let mut local_change = false;
        let mut csi = 0;

        while csi < call_sites.len() {
            let (site, history_id) = call_sites[csi];
            let caller = site.caller;
            let callee = module.call_site_callee(site);

            if is_trivially_dead(module, site, &services.target_library) {
                // A dead call to a readonly function is deleted outright
                // instead of inlined, regardless of size.
                let caller_node = graph.lookup(caller).unwrap();

                graph.remove_call_edge_for(caller_node, site.call);

                let (block, ins_idx) = module.resolve_call_site(site).unwrap();

                module
                    .function_mut(caller)
                    .body
                    .block_mut(block)
                    .instructions
                    .remove(ins_idx);
                state.stats.calls_deleted += 1;
            } else {
                // Only direct calls to definitions can be inlined. The
                // rest stay on the list: a later inline may resolve them.
                let Some(callee) = callee else {
                    csi += 1;
                    continue;
                };

                if module
                    .get_function(callee)
                    .map_or(true, |f| f.is_declaration())
                {
                    csi += 1;
                    continue;
                }

                // If this call site was obtained by inlining another
                // function, refuse to inline a callee that's already on the
                // chain: we'd be expanding the same function forever.
                if history_id != NO_HISTORY
                    && history.includes(callee, history_id)
                {
                    csi += 1;
                    continue;
                }

                if !should_inline(module, site, state, services) {
                    state
                        .remarks
                        .emit(not_inlined_remark(module, callee, caller));
                    csi += 1;
                    continue;
                }

                if !inline_call_if_possible(
                    module,
                    site,
                    &mut info,
                    &mut allocas,
                    history_id,
                    state,
                    services,
                ) {
                    state
                        .remarks
                        .emit(not_inlined_remark(module, callee, caller));
                    csi += 1;
                    continue;
                }

                state.stats.inlined += 1;
                state.remarks.emit(Remark::new(
                    RemarkKind::Performed,
                    RemarkId::Inlined,
                    module.function(callee).name.clone(),
                    module.function(caller).name.clone(),
                ));

                // Keep the call graph in step: the consumed edge goes away
                // and every call that became visible gets one.
                let caller_node = graph.lookup(caller).unwrap();

                graph.remove_call_edge_for(caller_node, site.call);

                for &new_site in &info.inlined_calls {
                    if let Some(new_callee) = module.call_site_callee(new_site)
                    {
                        let to = graph.lookup(new_callee).unwrap();

                        graph.add_call_edge(
                            caller_node,
                            to,
                            Some(new_site.call),
                        );
                    }
                }

                // The new call sites are useful inline candidates; remember
                // they came about by inlining this callee.
                if !info.inlined_calls.is_empty() {
                    let new_history = history.add(callee, history_id);

                    for &new_site in &info.inlined_calls {
                        call_sites.push((new_site, new_history));
                    }
                }
            }

            // If we inlined or deleted the last possible call site to the
            // function, delete the function body now.
            if let Some(callee) = callee {
                let deletable = module
                    .get_function(callee)
                    .is_some_and(|f| f.linkage.is_local())
                    && !module.has_uses(callee)
                    && !scc_functions.contains(&callee);

                if deletable {
                    let node = graph.lookup(callee).unwrap();

                    // Stray graph references mean an iterator elsewhere may
                    // still reach the node; deletion then has to wait.
                    if graph.num_references(node) == 0 {
                        graph.remove_all_call_edges(node);
                        graph.remove_function(module, node);
                        state.stats.deleted += 1;
                    }
                }
            }

            // Remove the processed call site from the list. Swap-with-last
            // is only safe when the component is singular: otherwise it
            // could move an intra-SCC call ahead of the partition boundary.
            if scc.is_singular(graph) {
                call_sites.swap_remove(csi);
            } else {
                call_sites.remove(csi);
            }

            // Not incrementing `csi` revisits the element that took this
            // slot.
            local_change = true;
            changed = true;
        }

        if !local_change {
            break;
        }
    }

    changed
}
