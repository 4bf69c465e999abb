//! A lazily maintained call graph with nested SCC and reference-SCC views.
//!
//! The graph tracks two edge kinds: calls (direct call instructions) and
//! references (address-taking uses). SCCs are formed over call edges and
//! nest inside RefSCCs formed over both kinds. Views survive IR mutation by
//! identity: re-deriving the structure keeps the ID of every component whose
//! membership didn't change, so a driver can keep working from a postorder
//! snapshot while updating the graph underneath it.
use crate::call_graph::components;
use fnv::FnvHashMap;
use indexmap::IndexMap;
use ir::{FunctionId, Instruction, Module};

/// The ID of a strongly connected component over call edges.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct SccId(pub usize);

/// The ID of an outer component over call and reference edges.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct RefSccId(pub usize);

struct LazyNode {
    calls: Vec<FunctionId>,
    refs: Vec<FunctionId>,
}

struct SccData {
    /// The members, sorted so membership comparisons are cheap.
    functions: Vec<FunctionId>,
    ref_scc: RefSccId,
    stale: bool,
    invalidated: bool,
}

struct RefSccData {
    functions: Vec<FunctionId>,
    stale: bool,
    invalidated: bool,
}

pub struct LazyCallGraph {
    nodes: IndexMap<FunctionId, LazyNode>,
    sccs: Vec<SccData>,
    ref_sccs: Vec<RefSccData>,
    current: FnvHashMap<FunctionId, SccId>,
    current_ref: FnvHashMap<FunctionId, RefSccId>,
    postorder: Vec<SccId>,
}

impl LazyCallGraph {
    pub fn new(module: &Module) -> LazyCallGraph {
        let mut graph = LazyCallGraph {
            nodes: IndexMap::new(),
            sccs: Vec::new(),
            ref_sccs: Vec::new(),
            current: FnvHashMap::default(),
            current_ref: FnvHashMap::default(),
            postorder: Vec::new(),
        };

        for func in module.functions.values() {
            let (calls, refs) = edges_from_ir(module, func.id);

            graph.nodes.insert(func.id, LazyNode { calls, refs });
        }

        graph.derive();
        graph
    }

    /// The bottom-up order of the current SCCs: every component comes after
    /// the components it calls into.
    pub fn postorder(&self) -> Vec<SccId> {
        self.postorder.clone()
    }

    pub fn lookup_scc(&self, function: FunctionId) -> Option<SccId> {
        self.current.get(&function).copied()
    }

    pub fn scc_functions(&self, id: SccId) -> &[FunctionId] {
        &self.sccs[id.0].functions
    }

    pub fn outer_ref_scc(&self, id: SccId) -> RefSccId {
        self.sccs[id.0].ref_scc
    }

    /// A component is current when it was produced by the latest derivation
    /// and hasn't been invalidated by a deletion.
    pub fn scc_is_current(&self, id: SccId) -> bool {
        let data = &self.sccs[id.0];

        !data.stale && !data.invalidated
    }

    pub fn scc_is_invalidated(&self, id: SccId) -> bool {
        self.sccs[id.0].invalidated
    }

    pub fn ref_scc_is_invalidated(&self, id: RefSccId) -> bool {
        self.ref_sccs[id.0].invalidated
    }

    pub fn calls_of(&self, function: FunctionId) -> &[FunctionId] {
        &self.nodes[&function].calls
    }

    pub fn refs_of(&self, function: FunctionId) -> &[FunctionId] {
        &self.nodes[&function].refs
    }

    /// Records a call edge that is trivially correct because a transitive
    /// call edge already existed.
    pub fn insert_trivial_call_edge(
        &mut self,
        from: FunctionId,
        to: FunctionId,
    ) {
        let node = self.nodes.get_mut(&from).unwrap();

        if !node.calls.contains(&to) {
            node.calls.push(to);
        }
    }

    pub fn insert_trivial_ref_edge(
        &mut self,
        from: FunctionId,
        to: FunctionId,
    ) {
        let node = self.nodes.get_mut(&from).unwrap();

        if !node.refs.contains(&to) {
            node.refs.push(to);
        }
    }

    /// Re-reads a function's edges from the IR after its body changed.
    pub fn refresh_node(&mut self, module: &Module, function: FunctionId) {
        let (calls, refs) = edges_from_ir(module, function);

        if let Some(node) = self.nodes.get_mut(&function) {
            node.calls = calls;
            node.refs = refs;
        }
    }

    /// Refreshes the node and re-derives the SCC/RefSCC views, returning
    /// the (possibly new) component containing the function.
    pub fn update_after_change(
        &mut self,
        module: &Module,
        function: FunctionId,
    ) -> SccId {
        self.refresh_node(module, function);
        self.derive();
        self.lookup_scc(function).unwrap()
    }

    /// Detaches a function that became dead. Its SCC and RefSCC are marked
    /// invalidated so the surrounding walk skips them.
    pub fn remove_dead_function(&mut self, function: FunctionId) {
        if let Some(&scc) = self.current.get(&function) {
            self.sccs[scc.0].invalidated = true;
        }

        if let Some(&ref_scc) = self.current_ref.get(&function) {
            self.ref_sccs[ref_scc.0].invalidated = true;
        }

        self.nodes.shift_remove(&function);
        self.current.remove(&function);
        self.current_ref.remove(&function);
    }

    /// Recomputes both views from the current edges. Components whose
    /// membership is unchanged keep their IDs; everything else goes stale.
    fn derive(&mut self) {
        let ids: Vec<FunctionId> = self.nodes.keys().copied().collect();
        let index_of: FnvHashMap<FunctionId, usize> =
            ids.iter().enumerate().map(|(i, &f)| (f, i)).collect();
        let mut call_edges = Vec::with_capacity(ids.len());
        let mut all_edges = Vec::with_capacity(ids.len());

        for id in &ids {
            let node = &self.nodes[id];
            let calls: Vec<usize> = node
                .calls
                .iter()
                .filter_map(|t| index_of.get(t).copied())
                .collect();
            let mut all = calls.clone();

            all.extend(
                node.refs.iter().filter_map(|t| index_of.get(t).copied()),
            );
            call_edges.push(calls);
            all_edges.push(all);
        }

        let old_ref = std::mem::take(&mut self.current_ref);

        for id in old_ref.values() {
            self.ref_sccs[id.0].stale = true;
        }

        for component in components(ids.len(), &all_edges) {
            let mut functions: Vec<FunctionId> =
                component.iter().map(|&i| ids[i]).collect();

            functions.sort();

            let reuse = functions
                .first()
                .and_then(|f| old_ref.get(f))
                .copied()
                .filter(|id| {
                    let data = &self.ref_sccs[id.0];

                    !data.invalidated && data.functions == functions
                });
            let id = match reuse {
                Some(id) => {
                    self.ref_sccs[id.0].stale = false;
                    id
                }
                None => {
                    self.ref_sccs.push(RefSccData {
                        functions: functions.clone(),
                        stale: false,
                        invalidated: false,
                    });
                    RefSccId(self.ref_sccs.len() - 1)
                }
            };

            for &func in &functions {
                self.current_ref.insert(func, id);
            }
        }

        let old = std::mem::take(&mut self.current);

        for id in old.values() {
            self.sccs[id.0].stale = true;
        }

        self.postorder.clear();

        for component in components(ids.len(), &call_edges) {
            let mut functions: Vec<FunctionId> =
                component.iter().map(|&i| ids[i]).collect();

            functions.sort();

            let ref_scc = self.current_ref[&functions[0]];
            let reuse =
                functions.first().and_then(|f| old.get(f)).copied().filter(
                    |id| {
                        let data = &self.sccs[id.0];

                        !data.invalidated && data.functions == functions
                    },
                );
            let id = match reuse {
                Some(id) => {
                    self.sccs[id.0].stale = false;
                    self.sccs[id.0].ref_scc = ref_scc;
                    id
                }
                None => {
                    self.sccs.push(SccData {
                        functions: functions.clone(),
                        ref_scc,
                        stale: false,
                        invalidated: false,
                    });
                    SccId(self.sccs.len() - 1)
                }
            };

            for &func in &functions {
                self.current.insert(func, id);
            }

            self.postorder.push(id);
        }
    }
}

fn edges_from_ir(
    module: &Module,
    function: FunctionId,
) -> (Vec<FunctionId>, Vec<FunctionId>) {
    let mut calls = Vec::new();
    let mut refs = Vec::new();
    let func = module.function(function);

    for block in &func.body.blocks {
        for ins in &block.instructions {
            match ins {
                Instruction::Call(call) => {
                    if !calls.contains(&call.callee) {
                        calls.push(call.callee);
                    }
                }
                Instruction::FunctionPointer(ptr) => {
                    if !refs.contains(&ptr.function) {
                        refs.push(ptr.function);
                    }
                }
                _ => {}
            }
        }
    }

    (calls, refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::Linkage;

    fn define(module: &mut Module, name: &str) -> FunctionId {
        let id = module.add_function(name, Linkage::Local);

        module.function_mut(id).body.add_start_block();
        id
    }

    #[test]
    fn test_postorder_bottom_up() {
        let mut module = Module::new("test".to_string());
        let c = define(&mut module, "c");
        let b = define(&mut module, "b");
        let a = define(&mut module, "a");

        module.push_call(a, ir::BlockId(0), None, b, Vec::new());
        module.push_call(b, ir::BlockId(0), None, c, Vec::new());

        let graph = LazyCallGraph::new(&module);
        let order: Vec<FunctionId> = graph
            .postorder()
            .into_iter()
            .flat_map(|scc| graph.scc_functions(scc).to_vec())
            .collect();
        let pos = |f| order.iter().position(|&v| v == f).unwrap();

        assert!(pos(c) < pos(b));
        assert!(pos(b) < pos(a));
    }

    #[test]
    fn test_ref_scc_spans_reference_cycles() {
        let mut module = Module::new("test".to_string());
        let a = define(&mut module, "a");
        let b = define(&mut module, "b");
        let int = module.types.int();

        // a calls b, b only takes a's address: one RefSCC, two SCCs.
        module.push_call(a, ir::BlockId(0), None, b, Vec::new());

        let reg = module.function_mut(b).registers.alloc(int);

        module
            .function_mut(b)
            .body
            .block_mut(ir::BlockId(0))
            .function_pointer(reg, a);

        let graph = LazyCallGraph::new(&module);
        let scc_a = graph.lookup_scc(a).unwrap();
        let scc_b = graph.lookup_scc(b).unwrap();

        assert_ne!(scc_a, scc_b);
        assert_eq!(graph.outer_ref_scc(scc_a), graph.outer_ref_scc(scc_b));
    }

    #[test]
    fn test_update_preserves_unchanged_components() {
        let mut module = Module::new("test".to_string());
        let c = define(&mut module, "c");
        let b = define(&mut module, "b");
        let a = define(&mut module, "a");

        module.push_call(a, ir::BlockId(0), None, b, Vec::new());
        module.push_call(b, ir::BlockId(0), None, c, Vec::new());

        let mut graph = LazyCallGraph::new(&module);
        let scc_c = graph.lookup_scc(c).unwrap();
        let scc_a = graph.lookup_scc(a).unwrap();

        // a's body changes (the call to b disappears); c's component is
        // untouched and keeps its identity.
        module.function_mut(a).body.block_mut(ir::BlockId(0)).instructions
            .clear();

        let new_scc_a = graph.update_after_change(&module, a);

        assert_eq!(graph.lookup_scc(c), Some(scc_c));
        assert!(graph.scc_is_current(scc_c));
        assert!(graph.scc_is_current(new_scc_a));
        assert_eq!(graph.lookup_scc(a), Some(scc_a));
    }

    #[test]
    fn test_remove_dead_function_invalidates_views() {
        let mut module = Module::new("test".to_string());
        let dead = define(&mut module, "dead");
        let mut graph = LazyCallGraph::new(&module);
        let scc = graph.lookup_scc(dead).unwrap();
        let ref_scc = graph.outer_ref_scc(scc);

        graph.remove_dead_function(dead);

        assert!(graph.scc_is_invalidated(scc));
        assert!(graph.ref_scc_is_invalidated(ref_scc));
        assert!(!graph.scc_is_current(scc));
        assert_eq!(graph.lookup_scc(dead), None);
    }

    #[test]
    fn test_trivial_edges_affect_next_derivation() {
        let mut module = Module::new("test".to_string());
        let a = define(&mut module, "a");
        let b = define(&mut module, "b");

        module.push_call(a, ir::BlockId(0), None, b, Vec::new());

        let mut graph = LazyCallGraph::new(&module);

        assert_ne!(graph.lookup_scc(a), graph.lookup_scc(b));

        // A trivial back edge forms a cycle; the next derivation merges the
        // two components.
        graph.insert_trivial_call_edge(b, a);

        let merged = graph.update_after_change(&module, a);

        assert_eq!(graph.lookup_scc(b), Some(merged));
    }
}
