//! Substituting a callee body at a call site.
//!
//! This is the IR mutation half of inlining: it splices a copy of the callee
//! into the caller and reports what it created. Whether a call *should* be
//! inlined is decided elsewhere.
use crate::{
    BlockId, Builtin, CallBuiltin, CallSite, Goto, Graph, Instruction, Module,
    MoveRegister, RegisterId, Registers,
};

/// The results of a single inline operation.
///
/// Reset between invocations; the driver reads both lists after every
/// successful inline.
pub struct InlineInfo {
    /// The static stack allocations the inline introduced into the caller,
    /// in the order they appear in the inlined entry block.
    pub static_allocas: Vec<RegisterId>,

    /// The call sites now visible in the caller because the callee body
    /// contained calls.
    pub inlined_calls: Vec<CallSite>,
}

impl InlineInfo {
    pub fn new() -> InlineInfo {
        InlineInfo { static_allocas: Vec::new(), inlined_calls: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.static_allocas.clear();
        self.inlined_calls.clear();
    }
}

/// A snapshot of the callee taken before the caller is mutated.
///
/// We can't mutably borrow the caller while reading the callee out of the
/// same module, so the body is cloned and remapped up front, then merged.
struct Callee {
    registers: Registers,
    body: Graph,
    arguments: Vec<RegisterId>,
}

/// Replaces the call at `site` with a copy of the callee's body.
///
/// Returns `false` without touching the IR when the substitution can't be
/// performed: the site no longer resolves, the callee is unknown or a
/// declaration, or the callee allocates a dynamically sized frame. On
/// success the call site is consumed and `info` describes the new state.
pub fn inline_function(
    module: &mut Module,
    site: CallSite,
    info: &mut InlineInfo,
    insert_lifetime: bool,
) -> bool {
    info.reset();

    let Some((call_block, call_index)) = module.resolve_call_site(site)
    else {
        return false;
    };

    let (callee_id, result, call_arguments) = {
        let ins = &module.function(site.caller).body.block(call_block)
            .instructions[call_index];

        match ins {
            Instruction::Call(call) => {
                (call.callee, call.register, call.arguments.clone())
            }
            _ => return false,
        }
    };

    let Some(callee_func) = module.get_function(callee_id) else {
        return false;
    };

    if callee_func.is_declaration() {
        return false;
    }

    // A dynamically sized callee frame can't be spliced into the middle of
    // another frame.
    if callee_func.body.blocks.iter().any(|b| {
        b.instructions.iter().any(
            |i| matches!(i, Instruction::Alloca(a) if a.count.is_some()),
        )
    }) {
        return false;
    }

    let mut callee = Callee {
        registers: callee_func.registers.clone(),
        body: callee_func.body.clone(),
        arguments: callee_func.arguments.clone(),
    };

    let caller_func = module.function(site.caller);
    let reg_start = caller_func.registers.len();
    let after = BlockId(caller_func.body.blocks.len());

    // The after-block is added before the callee blocks, so the callee's
    // block IDs shift past it.
    let blk_start = after.0 + 1;
    let callee_start = callee.body.start_id;
    let inline_start = callee_start + blk_start;

    for reg in &mut callee.arguments {
        *reg += reg_start;
    }

    // Remap the snapshot into the caller's register/block namespace. Along
    // the way we collect the static allocas, hand out fresh identities for
    // the calls we're about to expose, and rewrite returns into moves of the
    // call's result followed by a jump to the after-block.
    let mut returning_blocks = Vec::new();

    for (blk_idx, block) in callee.body.blocks.iter_mut().enumerate() {
        block.map_edges(|id| id + blk_start);

        let mut add_goto = false;

        for ins in &mut block.instructions {
            match ins {
                Instruction::Int(i) => {
                    i.register += reg_start;
                }
                Instruction::MoveRegister(i) => {
                    i.source += reg_start;
                    i.target += reg_start;
                }
                Instruction::Alloca(i) => {
                    i.register += reg_start;

                    debug_assert!(i.count.is_none());

                    // Static allocas live in the entry block; those are the
                    // ones hoisted into the caller and reported back.
                    if blk_idx == callee_start.0 {
                        info.static_allocas.push(i.register);
                    }
                }
                Instruction::Load(i) => {
                    i.register += reg_start;
                    i.pointer += reg_start;
                }
                Instruction::Store(i) => {
                    i.pointer += reg_start;
                    i.value += reg_start;
                }
                Instruction::Call(i) => {
                    i.id = module.new_call_id();
                    i.register = i.register.map(|r| r + reg_start);
                    i.arguments.iter_mut().for_each(|r| *r += reg_start);
                    info.inlined_calls
                        .push(CallSite::new(site.caller, i.id));
                }
                Instruction::CallIndirect(i) => {
                    i.id = module.new_call_id();
                    i.register = i.register.map(|r| r + reg_start);
                    i.pointer += reg_start;
                    i.arguments.iter_mut().for_each(|r| *r += reg_start);
                    info.inlined_calls
                        .push(CallSite::new(site.caller, i.id));
                }
                Instruction::CallBuiltin(i) => {
                    i.register = i.register.map(|r| r + reg_start);
                    i.arguments.iter_mut().for_each(|r| *r += reg_start);
                }
                Instruction::FunctionPointer(i) => {
                    i.register += reg_start;
                }
                Instruction::Goto(i) => {
                    i.block += blk_start;
                }
                Instruction::Branch(i) => {
                    i.condition += reg_start;
                    i.if_true += blk_start;
                    i.if_false += blk_start;
                }
                Instruction::Return(ret) => {
                    // Return is a terminal instruction, so this can only
                    // trigger for the last instruction in the block.
                    debug_assert!(!add_goto);

                    match (ret.register, result) {
                        (Some(reg), Some(target)) => {
                            *ins = Instruction::MoveRegister(Box::new(
                                MoveRegister {
                                    source: reg + reg_start,
                                    target,
                                },
                            ));
                        }
                        _ => {
                            *ins = Instruction::Goto(Box::new(Goto {
                                block: after,
                            }));
                        }
                    }

                    add_goto = true;
                }
            }
        }

        if add_goto {
            if !matches!(
                block.instructions.last(),
                Some(Instruction::Goto(_))
            ) {
                block.instructions.reserve_exact(1);
                block.instructions.push(Instruction::Goto(Box::new(Goto {
                    block: after,
                })));
            }

            returning_blocks.push(BlockId(blk_idx) + blk_start);
        }
    }

    if insert_lifetime && !info.static_allocas.is_empty() {
        insert_lifetime_markers(
            &mut callee,
            &info.static_allocas,
            &returning_blocks,
            blk_start,
            after,
        );
    }

    let caller_func = module.function_mut(site.caller);
    let after_id = caller_func.body.add_block();

    debug_assert_eq!(after_id, after);

    // The instructions following the call continue in the after-block; the
    // call itself is then guaranteed to be the last instruction in its
    // block and can simply be popped.
    let mut trailing = caller_func
        .body
        .block_mut(call_block)
        .instructions
        .split_off(call_index + 1);

    caller_func.body.block_mut(after).instructions.append(&mut trailing);
    caller_func.registers.merge(callee.registers);
    caller_func.body.merge(callee.body);
    caller_func.body.block_mut(call_block).instructions.pop();

    for (&from, to) in call_arguments.iter().zip(callee.arguments) {
        caller_func.body.block_mut(call_block).move_register(to, from);
    }

    // The call block's successors now follow the after-block, and the call
    // block itself jumps into the inlined entry.
    let successors = caller_func.body.block_mut(call_block).take_successors();

    for id in successors {
        caller_func.body.remove_predecessor(id, call_block);
        caller_func.body.add_edge(after, id);
    }

    caller_func.body.block_mut(call_block).goto(inline_start);
    caller_func.body.add_edge(call_block, inline_start);

    for block in returning_blocks {
        caller_func.body.add_edge(block, after);
    }

    // Static allocas are hoisted into the caller's entry block, after any
    // allocas already there. Stack slots only stay mergeable and promotable
    // when they all live in the entry block.
    if !info.static_allocas.is_empty() {
        let mut hoisted = Vec::with_capacity(info.static_allocas.len());
        let block = caller_func.body.block_mut(inline_start);
        let mut kept = Vec::with_capacity(block.instructions.len());

        for ins in block.instructions.drain(..) {
            if matches!(ins, Instruction::Alloca(_)) {
                hoisted.push(ins);
            } else {
                kept.push(ins);
            }
        }

        block.instructions = kept;

        let start = caller_func.body.start_id;
        let entry = caller_func.body.block_mut(start);
        let pos = entry
            .instructions
            .iter()
            .position(|i| !matches!(i, Instruction::Alloca(_)))
            .unwrap_or(entry.instructions.len());

        for (offset, ins) in hoisted.into_iter().enumerate() {
            entry.instructions.insert(pos + offset, ins);
        }
    }

    true
}

/// Brackets the inlined allocas with lifetime markers: starts after the
/// allocas in the inlined entry block, ends right before each jump back to
/// the after-block.
fn insert_lifetime_markers(
    callee: &mut Callee,
    allocas: &[RegisterId],
    returning_blocks: &[BlockId],
    blk_start: usize,
    after: BlockId,
) {
    let entry = callee.body.start_id;
    let entry_block = callee.body.block_mut(entry);
    let pos = entry_block
        .instructions
        .iter()
        .position(|i| !matches!(i, Instruction::Alloca(_)))
        .unwrap_or(entry_block.instructions.len());

    for (offset, &reg) in allocas.iter().enumerate() {
        entry_block.instructions.insert(
            pos + offset,
            Instruction::CallBuiltin(Box::new(CallBuiltin {
                register: None,
                builtin: Builtin::LifetimeStart,
                arguments: vec![reg],
            })),
        );
    }

    for &block_id in returning_blocks {
        let block = callee.body.block_mut(BlockId(block_id.0 - blk_start));
        let pos = block.instructions.len().saturating_sub(1);

        // The trailing instruction is the jump to the after-block unless
        // the return itself became that jump.
        debug_assert!(matches!(
            block.instructions.last(),
            Some(Instruction::Goto(g)) if g.block == after
        ));

        for &reg in allocas {
            block.instructions.insert(
                pos,
                Instruction::CallBuiltin(Box::new(CallBuiltin {
                    register: None,
                    builtin: Builtin::LifetimeEnd,
                    arguments: vec![reg],
                })),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Alloca, Linkage, TypeId};

    fn empty_module() -> Module {
        Module::new("test".to_string())
    }

    #[test]
    fn test_inline_function_trivial() {
        let mut module = empty_module();
        let callee = module.add_function("g", Linkage::Local);
        let caller = module.add_function("f", Linkage::External);
        let int = module.types.int();

        // g() { return 42 }
        let g_ret = module.function_mut(callee).registers.alloc(int);
        let g_entry = module.function_mut(callee).body.add_start_block();

        module
            .function_mut(callee)
            .body
            .block_mut(g_entry)
            .int_literal(g_ret, 42);
        module
            .function_mut(callee)
            .body
            .block_mut(g_entry)
            .return_value(Some(g_ret));

        // f() { v = g(); return v }
        let f_entry = module.function_mut(caller).body.add_start_block();
        let f_reg = module.function_mut(caller).registers.alloc(TypeId(0));
        let site = module.push_call(
            caller,
            f_entry,
            Some(f_reg),
            callee,
            Vec::new(),
        );

        module
            .function_mut(caller)
            .body
            .block_mut(f_entry)
            .return_value(Some(f_reg));

        let mut info = InlineInfo::new();

        assert!(inline_function(&mut module, site, &mut info, false));
        assert!(info.inlined_calls.is_empty());
        assert!(info.static_allocas.is_empty());

        // The call site is consumed.
        assert_eq!(module.resolve_call_site(site), None);

        let func = module.function(caller);

        // Entry now jumps into the inlined body, the inlined body moves the
        // literal into the call's result register and jumps to the
        // after-block, which returns it.
        assert_eq!(func.body.blocks.len(), 3);

        let entry = func.body.block(BlockId(0));

        assert!(matches!(
            entry.instructions.last(),
            Some(Instruction::Goto(g)) if g.block == BlockId(2)
        ));

        let inlined = func.body.block(BlockId(2));

        assert!(matches!(
            &inlined.instructions[0],
            Instruction::Int(i) if i.value == 42
        ));
        assert!(matches!(
            &inlined.instructions[1],
            Instruction::MoveRegister(m) if m.target == f_reg
        ));
        assert!(matches!(
            &inlined.instructions[2],
            Instruction::Goto(g) if g.block == BlockId(1)
        ));

        let aft = func.body.block(BlockId(1));

        assert!(matches!(
            &aft.instructions[0],
            Instruction::Return(r) if r.register == Some(f_reg)
        ));
    }

    #[test]
    fn test_inline_function_reports_new_calls_and_allocas() {
        let mut module = empty_module();
        let inner = module.add_function("inner", Linkage::Local);
        let callee = module.add_function("g", Linkage::Local);
        let caller = module.add_function("f", Linkage::External);
        let int = module.types.int();
        let arr = module.types.array(int, 8);

        // g() { a = alloca [8 x int]; inner(); return }
        let g_entry = module.function_mut(callee).body.add_start_block();
        let g_alloca = module.function_mut(callee).registers.alloc(arr);

        module
            .function_mut(callee)
            .body
            .block_mut(g_entry)
            .alloca(g_alloca, arr, 0);
        module.push_call(callee, g_entry, None, inner, Vec::new());
        module
            .function_mut(callee)
            .body
            .block_mut(g_entry)
            .return_value(None);

        let f_entry = module.function_mut(caller).body.add_start_block();
        let site = module.push_call(caller, f_entry, None, callee, Vec::new());

        module
            .function_mut(caller)
            .body
            .block_mut(f_entry)
            .return_value(None);

        let mut info = InlineInfo::new();

        assert!(inline_function(&mut module, site, &mut info, false));
        assert_eq!(info.static_allocas.len(), 1);
        assert_eq!(info.inlined_calls.len(), 1);

        let new_site = info.inlined_calls[0];

        assert_eq!(new_site.caller, caller);
        assert_eq!(module.call_site_callee(new_site), Some(inner));
        assert!(module.resolve_call_site(new_site).is_some());
    }

    #[test]
    fn test_inline_function_refuses_declarations() {
        let mut module = empty_module();
        let callee = module.add_function("ext", Linkage::External);
        let caller = module.add_function("f", Linkage::External);
        let entry = module.function_mut(caller).body.add_start_block();
        let site = module.push_call(caller, entry, None, callee, Vec::new());
        let mut info = InlineInfo::new();

        assert!(!inline_function(&mut module, site, &mut info, false));
        assert!(module.resolve_call_site(site).is_some());
    }

    #[test]
    fn test_inline_function_refuses_dynamic_allocas() {
        let mut module = empty_module();
        let callee = module.add_function("g", Linkage::Local);
        let caller = module.add_function("f", Linkage::External);
        let int = module.types.int();
        let entry = module.function_mut(callee).body.add_start_block();
        let count = module.function_mut(callee).registers.alloc(int);
        let reg = module.function_mut(callee).registers.alloc(int);

        module.function_mut(callee).body.block_mut(entry).int_literal(
            count, 4,
        );
        module
            .function_mut(callee)
            .body
            .block_mut(entry)
            .instructions
            .push(Instruction::Alloca(Box::new(Alloca {
                register: reg,
                allocated_type: int,
                alignment: 0,
                count: Some(count),
            })));
        module.function_mut(callee).body.block_mut(entry).return_value(None);

        let f_entry = module.function_mut(caller).body.add_start_block();
        let site = module.push_call(caller, f_entry, None, callee, Vec::new());
        let mut info = InlineInfo::new();

        assert!(!inline_function(&mut module, site, &mut info, false));
    }

    #[test]
    fn test_inline_function_lifetime_markers() {
        let mut module = empty_module();
        let callee = module.add_function("g", Linkage::Local);
        let caller = module.add_function("f", Linkage::External);
        let int = module.types.int();
        let arr = module.types.array(int, 4);
        let g_entry = module.function_mut(callee).body.add_start_block();
        let g_alloca = module.function_mut(callee).registers.alloc(arr);

        module
            .function_mut(callee)
            .body
            .block_mut(g_entry)
            .alloca(g_alloca, arr, 0);
        module
            .function_mut(callee)
            .body
            .block_mut(g_entry)
            .return_value(None);

        let f_entry = module.function_mut(caller).body.add_start_block();
        let site = module.push_call(caller, f_entry, None, callee, Vec::new());

        module
            .function_mut(caller)
            .body
            .block_mut(f_entry)
            .return_value(None);

        let mut info = InlineInfo::new();

        assert!(inline_function(&mut module, site, &mut info, true));

        let func = module.function(caller);
        let inlined = func.body.block(BlockId(2));
        let starts = inlined
            .instructions
            .iter()
            .filter(|i| {
                matches!(
                    i,
                    Instruction::CallBuiltin(c)
                        if c.builtin == Builtin::LifetimeStart
                )
            })
            .count();
        let ends = inlined
            .instructions
            .iter()
            .filter(|i| {
                matches!(
                    i,
                    Instruction::CallBuiltin(c)
                        if c.builtin == Builtin::LifetimeEnd
                )
            })
            .count();

        assert_eq!(starts, 1);
        assert_eq!(ends, 1);
    }
}
