//! Removing function definitions that nothing references anymore.
//!
//! The sweep runs at end of pass, after the SCC traversal has finished:
//! deleting nodes while the traversal holds iterators over the graph would
//! pull the rug out from under it.
use crate::call_graph::{CallGraph, NodeId};
use crate::state::State;
use fnv::FnvHashSet;
use ir::{Attribute, ComdatId, FunctionId, Module};

/// Returns `true` if the definition can be discarded now that no uses
/// remain. Only discardable linkage qualifies: an external definition may
/// be referenced from outside the module no matter what we see locally.
fn is_def_trivially_dead(module: &Module, function: FunctionId) -> bool {
    let func = module.function(function);

    (func.linkage.is_local() || func.linkage.is_link_once_odr())
        && !module.has_uses(function)
}

fn detach(
    graph: &mut CallGraph,
    external: NodeId,
    node: NodeId,
    to_remove: &mut Vec<NodeId>,
) {
    // The node loses its outgoing edges, and any edges the external node
    // recorded for it are gone too: optimization may have made those
    // irrelevant.
    graph.remove_all_call_edges(node);
    graph.remove_any_call_edge_to(external, node);
    to_remove.push(node);
}

/// Removes dead functions from the call graph and the module. With
/// `always_inline_only` set, only functions carrying the `AlwaysInline`
/// attribute are considered, so the sweep can be shared with a pass that
/// only handles mandatory inlining.
pub fn remove_dead_functions(
    graph: &mut CallGraph,
    module: &mut Module,
    state: &mut State,
    always_inline_only: bool,
) -> bool {
    let mut to_remove: Vec<NodeId> = Vec::new();
    let mut dead_in_comdats: Vec<FunctionId> = Vec::new();
    let external = graph.external_calling_node();

    for node in graph.node_ids() {
        if graph.is_removed(node) {
            continue;
        }

        let Some(function) = graph.function_of(node) else { continue };

        if module.function(function).is_declaration() {
            continue;
        }

        if always_inline_only
            && !module
                .function(function)
                .attributes
                .contains(Attribute::AlwaysInline)
        {
            continue;
        }

        // Constant data that itself died may be all that still "uses" the
        // function.
        module.function_mut(function).purge_dead_constant_users();

        if !is_def_trivially_dead(module, function) {
            continue;
        }

        // Dropping one member of a COMDAT group without the rest is
        // unsound, and the inliner never visits the non-function members of
        // a group. Defer these for per-group filtering. Local members are
        // fine: they were never visible to the linker as group members.
        let func = module.function(function);

        if !func.linkage.is_local() && func.comdat.is_some() {
            dead_in_comdats.push(function);
            continue;
        }

        detach(graph, external, node, &mut to_remove);
    }

    if !dead_in_comdats.is_empty() {
        filter_dead_comdat_functions(module, &mut dead_in_comdats);

        for function in dead_in_comdats {
            let node = graph.lookup(function).unwrap();

            detach(graph, external, node, &mut to_remove);
        }
    }

    if to_remove.is_empty() {
        return false;
    }

    // Deletion order is irrelevant; sorting just makes deduplication
    // reliable.
    to_remove.sort();
    to_remove.dedup();

    for node in to_remove {
        graph.remove_function(module, node);
        state.stats.deleted += 1;
    }

    true
}

/// Filters a list of dead COMDAT functions down to those whose entire group
/// is dead. Functions sharing a group with any live member are retained in
/// the module.
pub fn filter_dead_comdat_functions(
    module: &Module,
    functions: &mut Vec<FunctionId>,
) {
    let dead: FnvHashSet<FunctionId> = functions.iter().copied().collect();
    let mut live_groups: FnvHashSet<ComdatId> = FnvHashSet::default();

    for func in module.functions.values() {
        if let Some(comdat) = func.comdat {
            if !dead.contains(&func.id) {
                live_groups.insert(comdat);
            }
        }
    }

    functions.retain(|&f| {
        module.function(f).comdat.map_or(true, |c| !live_groups.contains(&c))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use ir::Linkage;

    fn state() -> State {
        State::new(Config::new())
    }

    fn define(
        module: &mut Module,
        name: &str,
        linkage: Linkage,
    ) -> FunctionId {
        let id = module.add_function(name, linkage);
        let entry = module.function_mut(id).body.add_start_block();

        module.function_mut(id).body.block_mut(entry).return_value(None);
        id
    }

    #[test]
    fn test_removes_unused_local_functions() {
        let mut module = Module::new("test".to_string());
        let dead = define(&mut module, "dead", Linkage::Local);
        let live = define(&mut module, "live", Linkage::External);
        let mut graph = CallGraph::new(&module);
        let mut state = state();

        assert!(remove_dead_functions(
            &mut graph,
            &mut module,
            &mut state,
            false
        ));
        assert!(module.get_function(dead).is_none());
        assert!(module.get_function(live).is_some());
        assert_eq!(state.stats.deleted, 1);
    }

    #[test]
    fn test_keeps_functions_with_uses() {
        let mut module = Module::new("test".to_string());
        let callee = define(&mut module, "callee", Linkage::Local);
        let caller = define(&mut module, "caller", Linkage::External);

        module.push_call(caller, ir::BlockId(0), None, callee, Vec::new());

        let mut graph = CallGraph::new(&module);
        let mut state = state();

        // The caller is external (not discardable), the callee is used.
        assert!(!remove_dead_functions(
            &mut graph,
            &mut module,
            &mut state,
            false
        ));
        assert!(module.get_function(callee).is_some());
    }

    #[test]
    fn test_purges_dead_constant_users() {
        let mut module = Module::new("test".to_string());
        let dead = define(&mut module, "dead", Linkage::Local);

        module.function_mut(dead).add_dead_constant_use();

        let mut graph = CallGraph::new(&module);
        let mut state = state();

        assert!(remove_dead_functions(
            &mut graph,
            &mut module,
            &mut state,
            false
        ));
        assert!(module.get_function(dead).is_none());
    }

    #[test]
    fn test_comdat_member_with_live_sibling_is_retained() {
        let mut module = Module::new("test".to_string());
        let group = module.add_comdat("G");
        let dead = define(&mut module, "dead", Linkage::LinkOnceOdr);
        let live = define(&mut module, "live", Linkage::LinkOnceOdr);
        let user = define(&mut module, "user", Linkage::External);

        module.function_mut(dead).comdat = Some(group);
        module.function_mut(live).comdat = Some(group);
        module.push_call(user, ir::BlockId(0), None, live, Vec::new());

        let mut graph = CallGraph::new(&module);
        let mut state = state();

        // `dead` is trivially dead, but its group still has a live member.
        assert!(!remove_dead_functions(
            &mut graph,
            &mut module,
            &mut state,
            false
        ));
        assert!(module.get_function(dead).is_some());
    }

    #[test]
    fn test_comdat_group_removed_as_a_unit() {
        let mut module = Module::new("test".to_string());
        let group = module.add_comdat("G");
        let first = define(&mut module, "first", Linkage::LinkOnceOdr);
        let second = define(&mut module, "second", Linkage::LinkOnceOdr);

        module.function_mut(first).comdat = Some(group);
        module.function_mut(second).comdat = Some(group);

        let mut graph = CallGraph::new(&module);
        let mut state = state();

        assert!(remove_dead_functions(
            &mut graph,
            &mut module,
            &mut state,
            false
        ));
        assert!(module.get_function(first).is_none());
        assert!(module.get_function(second).is_none());
        assert_eq!(state.stats.deleted, 2);
    }

    #[test]
    fn test_always_inline_only_mode() {
        let mut module = Module::new("test".to_string());
        let plain = define(&mut module, "plain", Linkage::Local);
        let always = define(&mut module, "always", Linkage::Local);

        module.function_mut(always).attributes.add(Attribute::AlwaysInline);

        let mut graph = CallGraph::new(&module);
        let mut state = state();

        assert!(remove_dead_functions(
            &mut graph,
            &mut module,
            &mut state,
            true
        ));
        assert!(module.get_function(plain).is_some());
        assert!(module.get_function(always).is_none());
    }
}
