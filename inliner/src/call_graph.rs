//! A call graph over the functions of a module.
//!
//! Nodes live in an arena addressed by stable indices; removing a node never
//! shifts the others. An "external calling node" models calls from outside
//! the module, so reference counts answer "can anything still reach this
//! function" without special cases for linkage.
use fnv::FnvHashMap;
use ir::{CallId, Function, FunctionId, Instruction, Module};
use std::cmp::min;

/// The ID/index of a node in the call graph.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An outgoing call edge. Edges from the external calling node carry no
/// call instruction.
#[derive(Debug, Copy, Clone)]
pub struct CallEdge {
    pub call: Option<CallId>,
    pub node: NodeId,
}

struct Node {
    function: Option<FunctionId>,
    edges: Vec<CallEdge>,
    references: u32,
    removed: bool,
}

pub struct CallGraph {
    nodes: Vec<Node>,
    indexes: FnvHashMap<FunctionId, NodeId>,
    external: NodeId,
}

impl CallGraph {
    pub fn new(module: &Module) -> CallGraph {
        let mut graph = CallGraph {
            nodes: vec![Node {
                function: None,
                edges: Vec::new(),
                references: 0,
                removed: false,
            }],
            indexes: FnvHashMap::default(),
            external: NodeId(0),
        };

        for func in module.functions.values() {
            let id = NodeId(graph.nodes.len());

            graph.nodes.push(Node {
                function: Some(func.id),
                edges: Vec::new(),
                references: 0,
                removed: false,
            });
            graph.indexes.insert(func.id, id);
        }

        for func in module.functions.values() {
            let from = graph.indexes[&func.id];

            if !func.linkage.is_local() || address_taken(module, func.id) {
                graph.add_call_edge(graph.external, from, None);
            }

            for block in &func.body.blocks {
                for ins in &block.instructions {
                    if let Instruction::Call(call) = ins {
                        let to = graph.indexes[&call.callee];

                        graph.add_call_edge(from, to, Some(call.id));
                    }
                }
            }
        }

        graph
    }

    pub fn external_calling_node(&self) -> NodeId {
        self.external
    }

    pub fn lookup(&self, function: FunctionId) -> Option<NodeId> {
        self.indexes.get(&function).copied()
    }

    pub fn function_of(&self, node: NodeId) -> Option<FunctionId> {
        self.nodes[node.0].function
    }

    pub fn edges(&self, node: NodeId) -> &[CallEdge] {
        &self.nodes[node.0].edges
    }

    pub fn num_references(&self, node: NodeId) -> u32 {
        self.nodes[node.0].references
    }

    pub fn is_removed(&self, node: NodeId) -> bool {
        self.nodes[node.0].removed
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    pub fn add_call_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        call: Option<CallId>,
    ) {
        self.nodes[from.0].edges.push(CallEdge { call, node: to });
        self.nodes[to.0].references += 1;
    }

    /// Removes the edge recorded for a specific call instruction.
    pub fn remove_call_edge_for(&mut self, node: NodeId, call: CallId) {
        let index = self.nodes[node.0]
            .edges
            .iter()
            .position(|e| e.call == Some(call))
            .expect("no call edge recorded for the call site");
        let edge = self.nodes[node.0].edges.remove(index);

        self.nodes[edge.node.0].references -= 1;
    }

    pub fn remove_all_call_edges(&mut self, node: NodeId) {
        let edges = std::mem::take(&mut self.nodes[node.0].edges);

        for edge in edges {
            self.nodes[edge.node.0].references -= 1;
        }
    }

    /// Removes every edge from `from` to `to`, regardless of the call they
    /// were recorded for.
    pub fn remove_any_call_edge_to(&mut self, from: NodeId, to: NodeId) {
        let mut removed = 0;

        self.nodes[from.0].edges.retain(|e| {
            if e.node == to {
                removed += 1;
                false
            } else {
                true
            }
        });
        self.nodes[to.0].references -= removed;
    }

    pub fn has_self_edge(&self, node: NodeId) -> bool {
        self.nodes[node.0].edges.iter().any(|e| e.node == node)
    }

    /// Detaches a node and removes its function from the module, returning
    /// the function. The node must already be fully disconnected.
    pub fn remove_function(
        &mut self,
        module: &mut Module,
        node: NodeId,
    ) -> Function {
        let data = &mut self.nodes[node.0];

        assert!(!data.removed, "the node was already removed");
        assert!(data.edges.is_empty(), "the node still has outgoing edges");
        assert_eq!(data.references, 0, "the node is still referenced");

        data.removed = true;

        let function = data.function.take().unwrap();

        self.indexes.remove(&function);
        module.remove_function(function)
    }

    /// Computes the strongly connected components over the call edges,
    /// returned in bottom-up order: every component comes after the
    /// components it calls into.
    pub fn strongly_connected_components(&self) -> Vec<CallGraphScc> {
        // Removed nodes are compacted away so they can't surface as
        // spurious singleton components.
        let live: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId)
            .filter(|&node| !self.nodes[node.0].removed)
            .collect();
        let index_of: FnvHashMap<NodeId, usize> = live
            .iter()
            .enumerate()
            .map(|(index, &node)| (node, index))
            .collect();
        let edges: Vec<Vec<usize>> = live
            .iter()
            .map(|&node| {
                self.nodes[node.0]
                    .edges
                    .iter()
                    .filter_map(|e| index_of.get(&e.node).copied())
                    .collect()
            })
            .collect();

        components(live.len(), &edges)
            .into_iter()
            .map(|component| CallGraphScc {
                nodes: component.into_iter().map(|i| live[i]).collect(),
            })
            .collect()
    }
}

/// The strongly connected components of a dense graph in bottom-up order,
/// using the iterative formulation of Tarjan's algorithm so deep call
/// chains can't overflow the stack.
///
/// Shared by the arena call graph and the lazy graph: both reduce their
/// nodes to dense indices first.
pub(crate) fn components(size: usize, edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    let mut stack = Vec::new();
    let mut on_stack = vec![false; size];
    let mut low = vec![0_usize; size];
    let mut ids = vec![0_usize; size];
    let mut id = 0;

    for root in 0..size {
        if low[root] > 0 {
            continue;
        }

        let mut work = vec![(root, 0)];

        while let Some((node, edge_idx)) = work.pop() {
            if edge_idx == 0 {
                // Increment first since we use 0 to signal a lack of a
                // value in the low and ID maps.
                id += 1;

                ids[node] = id;
                low[node] = id;
                stack.push(node);
                on_stack[node] = true;
            }

            let mut recurse = false;
            let node_edges = &edges[node];

            for next_edge_idx in edge_idx..node_edges.len() {
                let next_edge = node_edges[next_edge_idx];

                if low[next_edge] == 0 {
                    work.push((node, next_edge_idx + 1));
                    work.push((next_edge, 0));
                    recurse = true;
                    break;
                } else if on_stack[next_edge] {
                    low[node] = min(low[node], ids[next_edge]);
                }
            }

            if recurse {
                continue;
            }

            if low[node] == ids[node] {
                let mut component = Vec::new();

                while let Some(connected) = stack.pop() {
                    on_stack[connected] = false;
                    component.push(connected);

                    if connected == node {
                        break;
                    }
                }

                result.push(component);
            }

            if let Some(&(last, _)) = work.last() {
                low[last] = min(low[last], low[node]);
            }
        }
    }

    result
}

fn address_taken(module: &Module, function: FunctionId) -> bool {
    if module.function(function).constant_uses() > 0 {
        return true;
    }

    module.functions.values().any(|func| {
        func.body.blocks.iter().any(|block| {
            block.instructions.iter().any(|ins| {
                matches!(
                    ins,
                    Instruction::FunctionPointer(p)
                        if p.function == function
                )
            })
        })
    })
}

/// A view of one strongly connected component of the call graph.
pub struct CallGraphScc {
    nodes: Vec<NodeId>,
}

impl CallGraphScc {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The defined functions of this component, skipping nodes that have
    /// been removed since the component was derived.
    pub fn functions(&self, graph: &CallGraph) -> Vec<FunctionId> {
        self.nodes
            .iter()
            .filter(|&&n| !graph.is_removed(n))
            .filter_map(|&n| graph.function_of(n))
            .collect()
    }

    /// A component is singular when it consists of exactly one node without
    /// a self-edge.
    pub fn is_singular(&self, graph: &CallGraph) -> bool {
        self.nodes.len() == 1 && !graph.has_self_edge(self.nodes[0])
    }
}
