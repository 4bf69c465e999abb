//! A graph IR for whole-module transformations.
//!
//! The IR is deliberately small: functions own a control-flow graph of basic
//! blocks, blocks own instructions, and instructions operate on virtual
//! registers. What it does carry in full is the module-level structure that
//! interprocedural passes care about: linkage, attributes, COMDAT groups,
//! stable call identities, and back-references from functions to their users.
#![cfg_attr(feature = "cargo-clippy", allow(clippy::new_without_default))]

pub mod inline;
pub mod printer;

use indexmap::{IndexMap, IndexSet};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// The ID of a function within a module.
///
/// IDs are never reused, so a `FunctionId` held across a function removal
/// simply stops resolving instead of silently pointing at a different
/// function.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// The ID/index of a virtual register within a function.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct RegisterId(pub usize);

impl Add<usize> for RegisterId {
    type Output = RegisterId;

    fn add(self, rhs: usize) -> Self::Output {
        RegisterId(self.0 + rhs)
    }
}

impl AddAssign<usize> for RegisterId {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

/// The ID/index of a basic block within a function.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct BlockId(pub usize);

impl Add<usize> for BlockId {
    type Output = BlockId;

    fn add(self, rhs: usize) -> Self::Output {
        BlockId(self.0 + rhs)
    }
}

impl AddAssign<usize> for BlockId {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

impl Sub<usize> for BlockId {
    type Output = BlockId;

    fn sub(self, rhs: usize) -> Self::Output {
        BlockId(self.0 - rhs)
    }
}

impl SubAssign<usize> for BlockId {
    fn sub_assign(&mut self, rhs: usize) {
        self.0 -= rhs;
    }
}

/// The module-unique identity of a call instruction.
///
/// Block splicing moves call instructions around, so positions can't be used
/// to refer to a call across a mutation. The ID is assigned by the module
/// when the call is created and travels with the instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct CallId(pub u32);

/// The ID of a COMDAT group within a module.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct ComdatId(pub usize);

/// The ID of an interned type.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct TypeId(pub usize);

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum TypeKind {
    Int,
    Pointer,
    Array { of: TypeId, length: u32 },
}

/// An interning table of types.
///
/// `Int` and `Pointer` are pre-interned so the common cases don't need a
/// mutable borrow of the module.
pub struct Types {
    values: IndexSet<TypeKind>,
}

impl Types {
    pub fn new() -> Types {
        let mut values = IndexSet::new();

        values.insert(TypeKind::Int);
        values.insert(TypeKind::Pointer);
        Types { values }
    }

    pub fn int(&self) -> TypeId {
        TypeId(0)
    }

    pub fn pointer(&self) -> TypeId {
        TypeId(1)
    }

    pub fn array(&mut self, of: TypeId, length: u32) -> TypeId {
        TypeId(self.values.insert_full(TypeKind::Array { of, length }).0)
    }

    pub fn get(&self, id: TypeId) -> TypeKind {
        self.values[id.0]
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeKind::Array { .. })
    }

    /// Returns the alignment the ABI guarantees for values of this type,
    /// used when an alloca doesn't request an explicit alignment.
    pub fn abi_alignment(&self, id: TypeId) -> u32 {
        match self.get(id) {
            TypeKind::Int | TypeKind::Pointer => 8,
            TypeKind::Array { of, .. } => self.abi_alignment(of),
        }
    }
}

/// The linkage class of a function.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Linkage {
    /// The function is only visible within this module.
    Local,
    /// One definition is picked across modules; the rest are discarded.
    LinkOnceOdr,
    /// The unique definition, visible outside the module.
    External,
}

impl Linkage {
    pub fn is_local(self) -> bool {
        matches!(self, Linkage::Local)
    }

    pub fn is_link_once_odr(self) -> bool {
        matches!(self, Linkage::LinkOnceOdr)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Attribute {
    AlwaysInline,
    NoInline,
    OptimizeNone,
    ReadOnly,
    NoReturn,
}

impl Attribute {
    fn bit(self) -> u8 {
        match self {
            Attribute::AlwaysInline => 1,
            Attribute::NoInline => 1 << 1,
            Attribute::OptimizeNone => 1 << 2,
            Attribute::ReadOnly => 1 << 3,
            Attribute::NoReturn => 1 << 4,
        }
    }
}

/// The set of attributes applied to a function.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct AttributeSet {
    bits: u8,
}

impl AttributeSet {
    pub fn new() -> AttributeSet {
        AttributeSet { bits: 0 }
    }

    pub fn add(&mut self, attribute: Attribute) {
        self.bits |= attribute.bit();
    }

    pub fn remove(&mut self, attribute: Attribute) {
        self.bits &= !attribute.bit();
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.bits & attribute.bit() != 0
    }
}

/// A COMDAT group: members are kept or discarded by the linker as a unit.
pub struct Comdat {
    pub name: String,
}

#[derive(Clone)]
pub struct Register {
    pub value_type: TypeId,
}

#[derive(Clone)]
pub struct Registers {
    values: Vec<Register>,
}

impl Registers {
    pub fn new() -> Registers {
        Registers { values: Vec::new() }
    }

    pub fn alloc(&mut self, value_type: TypeId) -> RegisterId {
        let id = self.values.len();

        self.values.push(Register { value_type });
        RegisterId(id)
    }

    pub fn get(&self, register: RegisterId) -> &Register {
        &self.values[register.0]
    }

    pub fn value_type(&self, register: RegisterId) -> TypeId {
        self.get(register).value_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn merge(&mut self, mut other: Registers) {
        // Reserve the exact amount so we don't allocate more memory than
        // necessary, which adds up quickly when inlining many bodies.
        self.values.reserve_exact(other.values.len());
        self.values.append(&mut other.values);
    }
}

#[derive(Clone)]
pub struct IntLiteral {
    pub register: RegisterId,
    pub value: i64,
}

#[derive(Clone)]
pub struct MoveRegister {
    pub source: RegisterId,
    pub target: RegisterId,
}

/// A stack allocation in the entry block of a function.
#[derive(Clone)]
pub struct Alloca {
    pub register: RegisterId,
    pub allocated_type: TypeId,

    /// The requested alignment. Zero means the ABI alignment of the
    /// allocated type.
    pub alignment: u32,

    /// The element count for dynamic array allocations. Static allocations
    /// have no count register.
    pub count: Option<RegisterId>,
}

#[derive(Clone)]
pub struct Load {
    pub register: RegisterId,
    pub pointer: RegisterId,
}

#[derive(Clone)]
pub struct Store {
    pub pointer: RegisterId,
    pub value: RegisterId,
}

/// A direct call to a function known at compile time.
#[derive(Clone)]
pub struct Call {
    pub id: CallId,
    pub register: Option<RegisterId>,
    pub callee: FunctionId,
    pub arguments: Vec<RegisterId>,
}

/// A call through a function pointer. The callee is unknown until other
/// transformations resolve the pointer to a direct call.
#[derive(Clone)]
pub struct CallIndirect {
    pub id: CallId,
    pub register: Option<RegisterId>,
    pub pointer: RegisterId,
    pub arguments: Vec<RegisterId>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Builtin {
    Assume,
    LifetimeStart,
    LifetimeEnd,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Assume => "assume",
            Builtin::LifetimeStart => "lifetime_start",
            Builtin::LifetimeEnd => "lifetime_end",
        }
    }
}

/// A call to a compiler builtin. Builtins are lowered directly by the code
/// generator and are never inline candidates.
#[derive(Clone)]
pub struct CallBuiltin {
    pub register: Option<RegisterId>,
    pub builtin: Builtin,
    pub arguments: Vec<RegisterId>,
}

/// Takes the address of a function without calling it.
#[derive(Clone)]
pub struct FunctionPointer {
    pub register: RegisterId,
    pub function: FunctionId,
}

#[derive(Clone)]
pub struct Goto {
    pub block: BlockId,
}

#[derive(Clone)]
pub struct Branch {
    pub condition: RegisterId,
    pub if_true: BlockId,
    pub if_false: BlockId,
}

#[derive(Clone)]
pub struct Return {
    pub register: Option<RegisterId>,
}

#[derive(Clone)]
pub enum Instruction {
    Int(Box<IntLiteral>),
    MoveRegister(Box<MoveRegister>),
    Alloca(Box<Alloca>),
    Load(Box<Load>),
    Store(Box<Store>),
    Call(Box<Call>),
    CallIndirect(Box<CallIndirect>),
    CallBuiltin(Box<CallBuiltin>),
    FunctionPointer(Box<FunctionPointer>),
    Goto(Box<Goto>),
    Branch(Box<Branch>),
    Return(Box<Return>),
}

impl Instruction {
    /// Returns the call identity of this instruction, if it's a call that
    /// can act as a call site.
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            Instruction::Call(v) => Some(v.id),
            Instruction::CallIndirect(v) => Some(v.id),
            _ => None,
        }
    }

    /// Returns the statically known callee, if any. Indirect calls have
    /// none.
    pub fn called_function(&self) -> Option<FunctionId> {
        match self {
            Instruction::Call(v) => Some(v.callee),
            _ => None,
        }
    }

    pub fn result_register(&self) -> Option<RegisterId> {
        match self {
            Instruction::Call(v) => v.register,
            Instruction::CallIndirect(v) => v.register,
            _ => None,
        }
    }
}

/// A basic block in a control-flow graph.
#[derive(Clone)]
pub struct Block {
    pub instructions: Vec<Instruction>,
    pub successors: IndexSet<BlockId>,
    pub predecessors: IndexSet<BlockId>,
}

impl Block {
    pub fn new() -> Block {
        Block {
            instructions: Vec::new(),
            successors: IndexSet::new(),
            predecessors: IndexSet::new(),
        }
    }

    pub fn map_edges<F: Fn(BlockId) -> BlockId>(&mut self, func: F) {
        for id in self.take_successors() {
            self.successors.insert(func(id));
        }

        for id in self.take_predecessors() {
            self.predecessors.insert(func(id));
        }
    }

    pub fn take_successors(&mut self) -> IndexSet<BlockId> {
        std::mem::take(&mut self.successors)
    }

    pub fn take_predecessors(&mut self) -> IndexSet<BlockId> {
        std::mem::take(&mut self.predecessors)
    }

    pub fn goto(&mut self, block: BlockId) {
        self.instructions.push(Instruction::Goto(Box::new(Goto { block })));
    }

    pub fn branch(
        &mut self,
        condition: RegisterId,
        if_true: BlockId,
        if_false: BlockId,
    ) {
        self.instructions.push(Instruction::Branch(Box::new(Branch {
            condition,
            if_true,
            if_false,
        })));
    }

    pub fn return_value(&mut self, register: Option<RegisterId>) {
        self.instructions
            .push(Instruction::Return(Box::new(Return { register })));
    }

    pub fn int_literal(&mut self, register: RegisterId, value: i64) {
        self.instructions
            .push(Instruction::Int(Box::new(IntLiteral { register, value })));
    }

    pub fn move_register(&mut self, target: RegisterId, source: RegisterId) {
        self.instructions.push(Instruction::MoveRegister(Box::new(
            MoveRegister { source, target },
        )));
    }

    pub fn alloca(
        &mut self,
        register: RegisterId,
        allocated_type: TypeId,
        alignment: u32,
    ) {
        self.instructions.push(Instruction::Alloca(Box::new(Alloca {
            register,
            allocated_type,
            alignment,
            count: None,
        })));
    }

    pub fn load(&mut self, register: RegisterId, pointer: RegisterId) {
        self.instructions
            .push(Instruction::Load(Box::new(Load { register, pointer })));
    }

    pub fn store(&mut self, pointer: RegisterId, value: RegisterId) {
        self.instructions
            .push(Instruction::Store(Box::new(Store { pointer, value })));
    }

    pub fn call_builtin(
        &mut self,
        register: Option<RegisterId>,
        builtin: Builtin,
        arguments: Vec<RegisterId>,
    ) {
        self.instructions.push(Instruction::CallBuiltin(Box::new(
            CallBuiltin { register, builtin, arguments },
        )));
    }

    pub fn function_pointer(
        &mut self,
        register: RegisterId,
        function: FunctionId,
    ) {
        self.instructions.push(Instruction::FunctionPointer(Box::new(
            FunctionPointer { register, function },
        )));
    }
}

/// A directed control-flow graph.
#[derive(Clone)]
pub struct Graph {
    pub blocks: Vec<Block>,
    pub start_id: BlockId,
}

impl Graph {
    pub fn new() -> Graph {
        Graph { blocks: Vec::new(), start_id: BlockId(0) }
    }

    pub fn add_start_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len());

        self.blocks.push(Block::new());
        id
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len());

        // Blocks aren't added in tight loops, so we explicitly reserve the
        // exact amount of memory necessary.
        self.blocks.reserve_exact(1);
        self.blocks.push(Block::new());
        id
    }

    pub fn block(&self, index: BlockId) -> &Block {
        &self.blocks[index.0]
    }

    pub fn block_mut(&mut self, index: BlockId) -> &mut Block {
        self.blocks.get_mut(index.0).unwrap()
    }

    pub fn add_edge(&mut self, source: BlockId, target: BlockId) {
        let target_block = &mut self.blocks[target.0];

        target_block.predecessors.insert(source);

        let source_block = &mut self.blocks[source.0];

        source_block.successors.insert(target);
    }

    pub fn remove_predecessor(&mut self, block: BlockId, remove: BlockId) {
        self.blocks[block.0].predecessors.retain(|&v| v != remove);
    }

    pub fn merge(&mut self, mut other: Graph) {
        self.blocks.reserve_exact(other.blocks.len());
        self.blocks.append(&mut other.blocks);
    }
}

/// An IR function.
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub linkage: Linkage,
    pub attributes: AttributeSet,
    pub comdat: Option<ComdatId>,

    /// True when the definition was imported from another module. Only used
    /// for cross-module inlining statistics.
    pub imported: bool,

    pub registers: Registers,
    pub arguments: Vec<RegisterId>,
    pub body: Graph,

    /// References from live module-level constant data.
    constant_uses: u32,

    /// References from constant data that itself no longer has any users.
    /// These keep the function apparently used until purged.
    dead_constant_uses: u32,
}

impl Function {
    pub fn new(id: FunctionId, name: String, linkage: Linkage) -> Function {
        Function {
            id,
            name,
            linkage,
            attributes: AttributeSet::new(),
            comdat: None,
            imported: false,
            registers: Registers::new(),
            arguments: Vec::new(),
            body: Graph::new(),
            constant_uses: 0,
            dead_constant_uses: 0,
        }
    }

    /// A function without a body is a declaration: it can be called but
    /// never inlined.
    pub fn is_declaration(&self) -> bool {
        self.body.blocks.is_empty()
    }

    pub fn add_constant_use(&mut self) {
        self.constant_uses += 1;
    }

    pub fn add_dead_constant_use(&mut self) {
        self.dead_constant_uses += 1;
    }

    pub fn constant_uses(&self) -> u32 {
        self.constant_uses + self.dead_constant_uses
    }

    /// Drops references coming from constant data that is itself dead.
    pub fn purge_dead_constant_users(&mut self) {
        self.dead_constant_uses = 0;
    }

    /// Removes the body, leaving a declaration behind. The function can
    /// still be addressed but must not be called into.
    pub fn drop_all_references(&mut self) {
        self.body = Graph::new();
        self.registers = Registers::new();
        self.arguments = Vec::new();
    }

    /// Counts how often each register is read. Definitions don't count, so
    /// a zero count means the value produced is unused.
    pub fn register_use_counts(&self) -> Vec<usize> {
        let mut uses = vec![0_usize; self.registers.len()];

        for block in &self.body.blocks {
            for ins in &block.instructions {
                match ins {
                    Instruction::MoveRegister(i) => {
                        uses[i.source.0] += 1;
                    }
                    Instruction::Alloca(i) => {
                        if let Some(count) = i.count {
                            uses[count.0] += 1;
                        }
                    }
                    Instruction::Load(i) => {
                        uses[i.pointer.0] += 1;
                    }
                    Instruction::Store(i) => {
                        uses[i.pointer.0] += 1;
                        uses[i.value.0] += 1;
                    }
                    Instruction::Call(i) => {
                        i.arguments.iter().for_each(|r| uses[r.0] += 1);
                    }
                    Instruction::CallIndirect(i) => {
                        uses[i.pointer.0] += 1;
                        i.arguments.iter().for_each(|r| uses[r.0] += 1);
                    }
                    Instruction::CallBuiltin(i) => {
                        i.arguments.iter().for_each(|r| uses[r.0] += 1);
                    }
                    Instruction::Branch(i) => {
                        uses[i.condition.0] += 1;
                    }
                    Instruction::Return(i) => {
                        if let Some(reg) = i.register {
                            uses[reg.0] += 1;
                        }
                    }
                    Instruction::Int(_)
                    | Instruction::FunctionPointer(_)
                    | Instruction::Goto(_) => {}
                }
            }
        }

        uses
    }
}

/// A reference to a single call instruction.
///
/// Call sites are resolved against the module on demand, never through a
/// stored position: positions are invalidated by block splicing, identities
/// are not. A call site stops resolving once the inline action consumes it.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct CallSite {
    pub caller: FunctionId,
    pub call: CallId,
}

impl CallSite {
    pub fn new(caller: FunctionId, call: CallId) -> CallSite {
        CallSite { caller, call }
    }
}

/// A single use of a function, as seen from its users.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Use {
    /// A direct call of the function.
    Call(CallSite),
    /// Any other reference from instructions, such as taking the address.
    Ref(FunctionId),
    /// A reference from module-level constant data.
    Constant,
}

/// A module owning a set of functions.
pub struct Module {
    pub name: String,
    pub types: Types,
    pub functions: IndexMap<FunctionId, Function>,
    pub comdats: IndexMap<ComdatId, Comdat>,
    next_function_id: u32,
    next_call_id: u32,
}

impl Module {
    pub fn new(name: String) -> Module {
        Module {
            name,
            types: Types::new(),
            functions: IndexMap::new(),
            comdats: IndexMap::new(),
            next_function_id: 0,
            next_call_id: 0,
        }
    }

    pub fn add_function(
        &mut self,
        name: &str,
        linkage: Linkage,
    ) -> FunctionId {
        let id = FunctionId(self.next_function_id);

        self.next_function_id += 1;
        self.functions
            .insert(id, Function::new(id, name.to_string(), linkage));
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        self.functions.get(&id).unwrap()
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        self.functions.get_mut(&id).unwrap()
    }

    pub fn get_function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(&id)
    }

    /// Removes a function from the module, returning it. IDs are stable, so
    /// the removal doesn't disturb references to other functions.
    pub fn remove_function(&mut self, id: FunctionId) -> Function {
        self.functions.shift_remove(&id).unwrap()
    }

    pub fn add_comdat(&mut self, name: &str) -> ComdatId {
        let id = ComdatId(self.comdats.len());

        self.comdats.insert(id, Comdat { name: name.to_string() });
        id
    }

    /// Hands out a fresh call identity. Every call instruction must get its
    /// ID through this counter so identities stay unique module-wide.
    pub fn new_call_id(&mut self) -> CallId {
        let id = CallId(self.next_call_id);

        self.next_call_id += 1;
        id
    }

    /// Appends a direct call to a block of `caller` and returns its call
    /// site reference.
    pub fn push_call(
        &mut self,
        caller: FunctionId,
        block: BlockId,
        register: Option<RegisterId>,
        callee: FunctionId,
        arguments: Vec<RegisterId>,
    ) -> CallSite {
        let id = self.new_call_id();
        let func = self.function_mut(caller);

        func.body.block_mut(block).instructions.push(Instruction::Call(
            Box::new(Call { id, register, callee, arguments }),
        ));
        CallSite::new(caller, id)
    }

    pub fn push_call_indirect(
        &mut self,
        caller: FunctionId,
        block: BlockId,
        register: Option<RegisterId>,
        pointer: RegisterId,
        arguments: Vec<RegisterId>,
    ) -> CallSite {
        let id = self.new_call_id();
        let func = self.function_mut(caller);

        func.body.block_mut(block).instructions.push(
            Instruction::CallIndirect(Box::new(CallIndirect {
                id,
                register,
                pointer,
                arguments,
            })),
        );
        CallSite::new(caller, id)
    }

    /// Resolves a call site to its current position, or `None` if the call
    /// was consumed or its caller removed.
    pub fn resolve_call_site(
        &self,
        site: CallSite,
    ) -> Option<(BlockId, usize)> {
        let caller = self.functions.get(&site.caller)?;

        for (blk_idx, block) in caller.body.blocks.iter().enumerate() {
            for (ins_idx, ins) in block.instructions.iter().enumerate() {
                if ins.call_id() == Some(site.call) {
                    return Some((BlockId(blk_idx), ins_idx));
                }
            }
        }

        None
    }

    pub fn call_site_instruction(
        &self,
        site: CallSite,
    ) -> Option<&Instruction> {
        let (block, index) = self.resolve_call_site(site)?;

        Some(&self.function(site.caller).body.block(block).instructions[index])
    }

    /// The statically known callee of a call site, if any.
    pub fn call_site_callee(&self, site: CallSite) -> Option<FunctionId> {
        self.call_site_instruction(site).and_then(|i| i.called_function())
    }

    /// Computes the users of a function. The result is freshly computed on
    /// every query so it's never stale.
    pub fn users_of(&self, function: FunctionId) -> Vec<Use> {
        let mut uses = Vec::new();

        for func in self.functions.values() {
            for block in &func.body.blocks {
                for ins in &block.instructions {
                    match ins {
                        Instruction::Call(call) if call.callee == function => {
                            uses.push(Use::Call(CallSite::new(
                                func.id, call.id,
                            )));
                        }
                        Instruction::FunctionPointer(ptr)
                            if ptr.function == function =>
                        {
                            uses.push(Use::Ref(func.id));
                        }
                        _ => {}
                    }
                }
            }
        }

        let target = self.function(function);

        for _ in 0..target.constant_uses() {
            uses.push(Use::Constant);
        }

        uses
    }

    pub fn has_uses(&self, function: FunctionId) -> bool {
        !self.users_of(function).is_empty()
    }
}

/// Merges the attributes of an inlined callee into its caller.
///
/// Attributes describing behaviour the caller can no longer guarantee after
/// absorbing the callee body survive only when both sides carry them.
pub fn merge_attributes_for_inlining(
    module: &mut Module,
    caller: FunctionId,
    callee: FunctionId,
) {
    let callee_attrs = module.function(callee).attributes;
    let caller_func = module.function_mut(caller);

    for attr in [Attribute::ReadOnly, Attribute::NoReturn] {
        if caller_func.attributes.contains(attr)
            && !callee_attrs.contains(attr)
        {
            caller_func.attributes.remove(attr);
        }
    }
}
