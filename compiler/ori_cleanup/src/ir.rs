//! A small basic-block IR for cleanup emission.
//!
//! Enough IR to give the cleanup manager something real to thread through:
//! values, blocks with parameters, the release instructions the bundled
//! cleanup kinds emit, and branch/return terminators.
//!
//! - **[`Function`]**: finished body, blocks plus the variable count
//! - **[`Block`]**: parameters, body instructions, terminator
//! - **[`Instr`]**: one instruction
//! - **[`Terminator`]**: block exit
//!
//! [`FunctionBuilder`] follows the usual "position at a block, emit
//! instructions, terminate" pattern and implements [`IrBuilder`], so it can
//! drive a [`CleanupManager`](crate::CleanupManager) directly.

use std::fmt;

use crate::builder::IrBuilder;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Variable ID within a [`Function`]. Allocated sequentially from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block ID within a [`Function`]. Block 0 is the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Callee of an [`Instr::Apply`]: an index into the module's function table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FuncRef(pub u32);

/// Source byte range attached to instructions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Span for compiler-generated code.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    #[inline]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ── Instructions ────────────────────────────────────────────────────

/// A single instruction in a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instr {
    /// `let dst = value`.
    Const { dst: VarId, value: i64 },

    /// Direct call: `let dst = func(args...)`.
    Apply {
        dst: VarId,
        func: FuncRef,
        args: Vec<VarId>,
    },

    /// Field projection: `let dst = value.field`.
    Project {
        dst: VarId,
        value: VarId,
        field: u32,
    },

    /// Run the destructor of a value in place.
    Destroy { var: VarId },

    /// Release one owned reference.
    RcDec { var: VarId },

    /// Release a held lock.
    Unlock { lock: VarId },
}

/// How control leaves a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// Return a value from the function.
    Return { value: VarId },

    /// Unconditional jump to a target block, passing arguments.
    Jump { target: BlockId, args: Vec<VarId> },

    /// The block is never reached.
    Unreachable,
}

/// A finished basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub params: Vec<VarId>,
    pub body: Vec<Instr>,
    /// One span per body instruction.
    pub spans: Vec<Span>,
    pub terminator: Terminator,
}

/// A finished function body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    pub var_count: u32,
}

impl Function {
    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// In-progress basic block.
struct BlockBuilder {
    id: BlockId,
    params: Vec<VarId>,
    body: Vec<Instr>,
    spans: Vec<Span>,
    terminator: Option<Terminator>,
}

impl BlockBuilder {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            params: Vec::new(),
            body: Vec::new(),
            spans: Vec::new(),
            terminator: None,
        }
    }
}

/// Builder for an in-progress [`Function`].
///
/// Consumed by [`finish`](FunctionBuilder::finish).
pub struct FunctionBuilder {
    blocks: Vec<BlockBuilder>,
    current_block: BlockId,
    next_var: u32,
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionBuilder {
    /// Create a builder positioned at a fresh entry block.
    pub fn new() -> Self {
        Self {
            blocks: vec![BlockBuilder::new(BlockId::new(0))],
            current_block: BlockId::new(0),
            next_var: 0,
        }
    }

    // Block management

    /// Allocate a new empty block and return its ID.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(
            u32::try_from(self.blocks.len())
                .unwrap_or_else(|_| panic!("block count exceeds u32::MAX")),
        );
        self.blocks.push(BlockBuilder::new(id));
        id
    }

    /// Set the current insertion point to the given block.
    pub fn position_at(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "BlockId {} out of bounds (have {} blocks)",
            block.raw(),
            self.blocks.len(),
        );
        self.current_block = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Check whether the current block already has a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current_block.index()].terminator.is_some()
    }

    #[inline]
    pub fn entry_block(&self) -> BlockId {
        BlockId::new(0)
    }

    // Variable allocation

    pub fn fresh_var(&mut self) -> VarId {
        let id = VarId::new(self.next_var);
        self.next_var = self
            .next_var
            .checked_add(1)
            .unwrap_or_else(|| panic!("variable count exceeds u32::MAX"));
        id
    }

    /// Add a block parameter and return the variable bound to it.
    pub fn add_block_param(&mut self, block: BlockId) -> VarId {
        let var = self.fresh_var();
        self.blocks[block.index()].params.push(var);
        var
    }

    // Instruction emission

    /// Append `instr` to the current block.
    pub fn emit(&mut self, instr: Instr, span: Span) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "emitting into terminated block {}",
            block.id.raw()
        );
        block.body.push(instr);
        block.spans.push(span);
    }

    pub fn emit_const(&mut self, value: i64, span: Span) -> VarId {
        let dst = self.fresh_var();
        self.emit(Instr::Const { dst, value }, span);
        dst
    }

    pub fn emit_apply(&mut self, func: FuncRef, args: Vec<VarId>, span: Span) -> VarId {
        let dst = self.fresh_var();
        self.emit(Instr::Apply { dst, func, args }, span);
        dst
    }

    pub fn emit_project(&mut self, value: VarId, field: u32, span: Span) -> VarId {
        let dst = self.fresh_var();
        self.emit(Instr::Project { dst, value, field }, span);
        dst
    }

    // Terminators

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            block.id.raw()
        );
        block.terminator = Some(terminator);
    }

    pub fn terminate_return(&mut self, value: VarId) {
        self.terminate(Terminator::Return { value });
    }

    pub fn terminate_jump(&mut self, target: BlockId, args: Vec<VarId>) {
        self.terminate(Terminator::Jump { target, args });
    }

    pub fn terminate_unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    // Finalization

    /// Consume the builder and produce the finished [`Function`].
    ///
    /// Unterminated blocks get `Unreachable` (with a tracing warning).
    pub fn finish(self) -> Function {
        let blocks = self
            .blocks
            .into_iter()
            .map(|bb| {
                let terminator = bb.terminator.unwrap_or_else(|| {
                    tracing::warn!(block = bb.id.raw(), "unterminated block, adding Unreachable");
                    Terminator::Unreachable
                });
                Block {
                    id: bb.id,
                    params: bb.params,
                    body: bb.body,
                    spans: bb.spans,
                    terminator,
                }
            })
            .collect();

        Function {
            blocks,
            entry: BlockId::new(0),
            var_count: self.next_var,
        }
    }
}

impl IrBuilder for FunctionBuilder {
    type Block = BlockId;
    type Value = VarId;
    type Location = Span;

    fn has_insertion_point(&self) -> bool {
        !self.is_terminated()
    }

    fn emit_branch(&mut self, _loc: Span, dest: BlockId, args: Vec<VarId>) {
        self.terminate_jump(dest, args);
    }

    fn emit_return(&mut self, _loc: Span, value: VarId) {
        self.terminate_return(value);
    }
}
