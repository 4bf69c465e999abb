//! The inline-history ledger.
//!
//! When inlining a callee produces new call sites, those sites remember the
//! chain of expansions that created them. Refusing to inline a function that
//! already occurs on the chain is what keeps recursion exposed by inlining
//! from expanding forever.
use ir::FunctionId;

/// Marks a call site that wasn't produced by inlining.
pub const NO_HISTORY: i32 = -1;

/// A grow-only ledger of `(callee, parent)` entries.
///
/// Parent indices always point at earlier entries (or `NO_HISTORY`), so the
/// chains are acyclic by construction. The ledger lives for one driver
/// invocation and is discarded afterwards.
pub struct InlineHistory {
    values: Vec<(FunctionId, i32)>,
}

impl InlineHistory {
    pub fn new() -> InlineHistory {
        InlineHistory { values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Records that `callee` was expanded at a site carrying history
    /// `parent`, returning the index of the new entry.
    pub fn add(&mut self, callee: FunctionId, parent: i32) -> i32 {
        let id = self.values.len() as i32;

        debug_assert!(parent < id);
        self.values.push((callee, parent));
        id
    }

    /// Returns `true` if the chain starting at `id` contains `function`.
    pub fn includes(&self, function: FunctionId, mut id: i32) -> bool {
        while id != NO_HISTORY {
            assert!(
                (id as usize) < self.values.len(),
                "invalid inline history ID"
            );

            let (callee, parent) = self.values[id as usize];

            if callee == function {
                return true;
            }

            id = parent;
        }

        false
    }
}
