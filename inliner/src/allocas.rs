//! Reusing stack slots across bodies inlined into the same caller.
//!
//! Once a body has been inlined, its stack slots are free for reuse by the
//! next body inlined into the same caller: the two lifetimes are disjoint.
//! Only array-typed slots are merged. Scalar slots are usually no longer
//! address-taken after inlining and get promoted to registers; merging them
//! would tie their addresses together and block that promotion.
use crate::history::NO_HISTORY;
use crate::stats::Statistics;
use fnv::{FnvHashMap, FnvHashSet};
use ir::inline::InlineInfo;
use ir::{BlockId, Function, FunctionId, Instruction, Module, RegisterId, TypeId};

/// Previously inlined stack slots available for reuse, grouped by their
/// array type in insertion order.
///
/// The table lives for the duration of processing one SCC and never crosses
/// callers: candidates are checked against the entry block they reside in.
pub struct InlinedArrayAllocas {
    allocas_for_type: FnvHashMap<TypeId, Vec<RegisterId>>,
}

impl InlinedArrayAllocas {
    pub fn new() -> InlinedArrayAllocas {
        InlinedArrayAllocas { allocas_for_type: FnvHashMap::default() }
    }
}

/// Looks at the allocas the last inline introduced into `caller` and merges
/// each one into a previously inlined slot of the same array type where the
/// safety rules allow, recording the rest as candidates for the next inline.
pub fn merge_inlined_array_allocas(
    module: &mut Module,
    caller: FunctionId,
    info: &InlineInfo,
    allocas: &mut InlinedArrayAllocas,
    inline_history: i32,
    stats: &mut Statistics,
) {
    // Only merge for top-level call sites. A site produced by a prior inline
    // shares its frame with slots from that inline, so the lifetimes are not
    // provably disjoint:
    //   a() { b() }
    //   b() { x = alloca ...; c() }
    //   c() { y = alloca ... }
    // After inlining b into a, the exposed call to c must not merge y into
    // x.
    if inline_history != NO_HISTORY {
        return;
    }

    let mut used = FnvHashSet::default();

    for &alloca in &info.static_allocas {
        let Some((block, index)) = find_alloca(module.function(caller), alloca)
        else {
            continue;
        };

        let (allocated_type, alignment, dynamic) = {
            let Instruction::Alloca(ins) =
                &module.function(caller).body.block(block).instructions[index]
            else {
                unreachable!()
            };

            (ins.allocated_type, ins.alignment, ins.count.is_some())
        };

        // Dynamic array allocations are skipped, as are allocations whose
        // type isn't itself an array: merging the latter pessimizes scalar
        // replacement.
        if dynamic || !module.types.is_array(allocated_type) {
            continue;
        }

        let candidates = allocas
            .allocas_for_type
            .get(&allocated_type)
            .cloned()
            .unwrap_or_default();
        let mut merged = false;

        for available in candidates {
            let Some((avail_block, avail_index)) =
                find_alloca(module.function(caller), available)
            else {
                continue;
            };

            // The available slot has to be in the right entry block, not in
            // some other function of this SCC.
            if avail_block != block {
                continue;
            }

            // A slot can cover at most one allocation per inline: two slots
            // from the same body are live at the same time.
            if !used.insert(available) {
                continue;
            }

            let avail_alignment = {
                let Instruction::Alloca(ins) = &module
                    .function(caller)
                    .body
                    .block(avail_block)
                    .instructions[avail_index]
                else {
                    unreachable!()
                };

                ins.alignment
            };

            if alignment != avail_alignment {
                let abi = module.types.abi_alignment(allocated_type);
                let effective = if alignment == 0 { abi } else { alignment };
                let avail_effective = if avail_alignment == 0 {
                    abi
                } else {
                    avail_alignment
                };

                if effective > avail_effective {
                    let Instruction::Alloca(ins) = &mut module
                        .function_mut(caller)
                        .body
                        .block_mut(avail_block)
                        .instructions[avail_index]
                    else {
                        unreachable!()
                    };

                    ins.alignment = alignment;
                }
            }

            replace_register_uses(
                module.function_mut(caller),
                alloca,
                available,
            );
            module
                .function_mut(caller)
                .body
                .block_mut(block)
                .instructions
                .remove(index);
            stats.merged_allocas += 1;
            merged = true;
            break;
        }

        if merged {
            continue;
        }

        // No slot of the right type was free, so this alloca becomes a
        // candidate itself. It's marked used so other allocas from this same
        // inline don't merge into it.
        allocas
            .allocas_for_type
            .entry(allocated_type)
            .or_default()
            .push(alloca);
        used.insert(alloca);
    }
}

fn find_alloca(
    function: &Function,
    register: RegisterId,
) -> Option<(BlockId, usize)> {
    for (blk_idx, block) in function.body.blocks.iter().enumerate() {
        for (ins_idx, ins) in block.instructions.iter().enumerate() {
            if matches!(ins, Instruction::Alloca(a) if a.register == register)
            {
                return Some((BlockId(blk_idx), ins_idx));
            }
        }
    }

    None
}

/// Rewrites every read of `from` into a read of `to`. Only operand
/// positions are rewritten; `from` has a single definition and that's the
/// alloca being erased.
fn replace_register_uses(
    function: &mut Function,
    from: RegisterId,
    to: RegisterId,
) {
    let replace = |reg: &mut RegisterId| {
        if *reg == from {
            *reg = to;
        }
    };

    for block in &mut function.body.blocks {
        for ins in &mut block.instructions {
            match ins {
                Instruction::MoveRegister(i) => {
                    replace(&mut i.source);
                }
                Instruction::Alloca(i) => {
                    if let Some(count) = &mut i.count {
                        replace(count);
                    }
                }
                Instruction::Load(i) => {
                    replace(&mut i.pointer);
                }
                Instruction::Store(i) => {
                    replace(&mut i.pointer);
                    replace(&mut i.value);
                }
                Instruction::Call(i) => {
                    i.arguments.iter_mut().for_each(replace);
                }
                Instruction::CallIndirect(i) => {
                    replace(&mut i.pointer);
                    i.arguments.iter_mut().for_each(replace);
                }
                Instruction::CallBuiltin(i) => {
                    i.arguments.iter_mut().for_each(replace);
                }
                Instruction::Branch(i) => {
                    replace(&mut i.condition);
                }
                Instruction::Return(i) => {
                    if let Some(reg) = &mut i.register {
                        replace(reg);
                    }
                }
                Instruction::Int(_)
                | Instruction::FunctionPointer(_)
                | Instruction::Goto(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::Linkage;

    fn setup() -> (Module, FunctionId, TypeId) {
        let mut module = Module::new("test".to_string());
        let caller = module.add_function("f", Linkage::External);
        let int = module.types.int();
        let arr = module.types.array(int, 8);

        module.function_mut(caller).body.add_start_block();
        (module, caller, arr)
    }

    fn add_alloca(
        module: &mut Module,
        caller: FunctionId,
        ty: TypeId,
        alignment: u32,
    ) -> RegisterId {
        let reg = module.function_mut(caller).registers.alloc(ty);

        module
            .function_mut(caller)
            .body
            .block_mut(BlockId(0))
            .alloca(reg, ty, alignment);
        reg
    }

    fn info_for(allocas: &[RegisterId]) -> InlineInfo {
        let mut info = InlineInfo::new();

        info.static_allocas.extend(allocas);
        info
    }

    #[test]
    fn test_merge_reuses_previous_slot() {
        let (mut module, caller, arr) = setup();
        let a1 = add_alloca(&mut module, caller, arr, 0);
        let mut table = InlinedArrayAllocas::new();
        let mut stats = Statistics::new();

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a1]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        assert_eq!(stats.merged_allocas, 0);

        // A second inline introduces another slot of the same type; its uses
        // are redirected into the first and the slot is erased.
        let a2 = add_alloca(&mut module, caller, arr, 0);
        let val = module.function_mut(caller).registers.alloc(arr);

        module.function_mut(caller).body.block_mut(BlockId(0)).store(a2, val);

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a2]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        assert_eq!(stats.merged_allocas, 1);

        let func = module.function(caller);
        let allocas = func
            .body
            .block(BlockId(0))
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Alloca(_)))
            .count();

        assert_eq!(allocas, 1);
        assert!(func.body.block(BlockId(0)).instructions.iter().any(
            |i| matches!(i, Instruction::Store(s) if s.pointer == a1)
        ));
    }

    #[test]
    fn test_merge_raises_alignment() {
        let (mut module, caller, arr) = setup();
        let a1 = add_alloca(&mut module, caller, arr, 8);
        let mut table = InlinedArrayAllocas::new();
        let mut stats = Statistics::new();

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a1]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        let a2 = add_alloca(&mut module, caller, arr, 32);

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a2]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        let (block, index) =
            find_alloca(module.function(caller), a1).unwrap();
        let Instruction::Alloca(ins) =
            &module.function(caller).body.block(block).instructions[index]
        else {
            unreachable!()
        };

        assert_eq!(ins.alignment, 32);
    }

    #[test]
    fn test_merge_skips_inlined_history() {
        let (mut module, caller, arr) = setup();
        let a1 = add_alloca(&mut module, caller, arr, 0);
        let mut table = InlinedArrayAllocas::new();
        let mut stats = Statistics::new();

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a1]),
            &mut table,
            0,
            &mut stats,
        );

        // Nothing was recorded, so a later top-level inline finds no
        // candidates.
        let a2 = add_alloca(&mut module, caller, arr, 0);

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a2]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        assert_eq!(stats.merged_allocas, 0);
    }

    #[test]
    fn test_merge_skips_non_array_types() {
        let (mut module, caller, _arr) = setup();
        let int = module.types.int();
        let a1 = add_alloca(&mut module, caller, int, 0);
        let a2 = add_alloca(&mut module, caller, int, 0);
        let mut table = InlinedArrayAllocas::new();
        let mut stats = Statistics::new();

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a1]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );
        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a2]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        assert_eq!(stats.merged_allocas, 0);
    }

    #[test]
    fn test_slot_used_at_most_once_per_inline() {
        let (mut module, caller, arr) = setup();
        let a1 = add_alloca(&mut module, caller, arr, 0);
        let mut table = InlinedArrayAllocas::new();
        let mut stats = Statistics::new();

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a1]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        // One inline introducing two slots of the same type: only one of
        // them may reuse the available slot.
        let a2 = add_alloca(&mut module, caller, arr, 0);
        let a3 = add_alloca(&mut module, caller, arr, 0);

        merge_inlined_array_allocas(
            &mut module,
            caller,
            &info_for(&[a2, a3]),
            &mut table,
            NO_HISTORY,
            &mut stats,
        );

        assert_eq!(stats.merged_allocas, 1);

        let func = module.function(caller);
        let allocas = func
            .body
            .block(BlockId(0))
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Alloca(_)))
            .count();

        assert_eq!(allocas, 2);
    }
}
