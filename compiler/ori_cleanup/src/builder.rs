//! The IR builder boundary.
//!
//! The cleanup manager never allocates blocks or instructions itself. It
//! asks the builder for the two terminators it threads cleanups in front
//! of (branch and return), and checks whether there is a block to emit
//! into at all. Concrete cleanups talk to their concrete builder type
//! directly to insert their own instructions.

use std::fmt;

use crate::stack::CleanupsDepth;

/// The operations the cleanup manager needs from an IR builder.
pub trait IrBuilder {
    /// Basic block reference.
    type Block: Copy + fmt::Debug;
    /// SSA value passed to branches and returns.
    type Value: fmt::Debug;
    /// Source location attached to emitted terminators.
    type Location: Copy + fmt::Debug;

    /// Whether the current block can still accept instructions.
    ///
    /// `false` once the current block has been terminated: anything
    /// emitted now would be unreachable.
    fn has_insertion_point(&self) -> bool;

    /// Terminate the current block with an unconditional branch to `dest`.
    fn emit_branch(&mut self, loc: Self::Location, dest: Self::Block, args: Vec<Self::Value>);

    /// Terminate the current block with a return of `value`.
    fn emit_return(&mut self, loc: Self::Location, value: Self::Value);
}

/// A branch target together with the cleanup depth that must be reached
/// before control arrives there.
///
/// Loop lowering creates one for `break` and one for `continue` when it
/// enters the loop, capturing the depth at that point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JumpDest<K> {
    block: K,
    depth: CleanupsDepth,
}

impl<K: Copy> JumpDest<K> {
    pub fn new(block: K, depth: CleanupsDepth) -> Self {
        Self { block, depth }
    }

    #[inline]
    pub fn block(&self) -> K {
        self.block
    }

    #[inline]
    pub fn depth(&self) -> CleanupsDepth {
        self.depth
    }
}
