//! The cleanup manager.
//!
//! [`CleanupManager`] owns the pending cleanups of one function being
//! lowered, plus the two scope boundaries that branch and return threading
//! unwind to. The code generator creates one per function and passes it by
//! `&mut` to whatever needs to register or discharge cleanups.
//!
//! # Discharge
//!
//! Discharging a cleanup pops it off the stack first and only then emits
//! it. Emission receives the manager, so a cleanup may push (and discharge)
//! nested cleanups of its own. Every discharge walk re-reads the live top
//! after each step, so entries pushed during emission are picked up by the
//! same walk.
//!
//! Branch threading pops what it discharges. A cleanup is emitted at most
//! once because it leaves the stack the moment it is discharged; the code
//! generator must not also expect the fallthrough path to run it.

use crate::builder::{IrBuilder, JumpDest};
use crate::error::{invariant_violated, CleanupError};
use crate::stack::{CleanupStack, CleanupsDepth};
use crate::state::CleanupState;

/// A release action that must run on exit from the scope that registered it.
///
/// Implemented once per kind of resource: destroying a temporary, releasing
/// an owned reference, unlocking a mutex, and so on.
pub trait Cleanup<B: IrBuilder> {
    /// Emit the release action at the builder's insertion point.
    ///
    /// Consumes the cleanup: once emitted it no longer exists.
    fn emit(self: Box<Self>, cleanups: &mut CleanupManager<B>, builder: &mut B);

    /// Human-readable name used in diagnostics and traces.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

struct Entry<B: IrBuilder> {
    state: CleanupState,
    cleanup: Box<dyn Cleanup<B>>,
}

/// Pending cleanups and scope boundaries for one function.
pub struct CleanupManager<B: IrBuilder> {
    stack: CleanupStack<Entry<B>>,
    /// Depth a locally-scoped exit unwinds to.
    pub(crate) innermost_scope: CleanupsDepth,
    /// Depth a return unwinds to.
    pub(crate) return_scope: CleanupsDepth,
    /// Number of scopes currently open, of either kind.
    pub(crate) open_scopes: u32,
}

impl<B: IrBuilder> Default for CleanupManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: IrBuilder> CleanupManager<B> {
    pub fn new() -> Self {
        Self {
            stack: CleanupStack::new(),
            innermost_scope: CleanupsDepth::BOTTOM,
            return_scope: CleanupsDepth::BOTTOM,
            open_scopes: 0,
        }
    }

    /// Stable reference to the current top of the cleanup stack.
    #[inline]
    pub fn depth(&self) -> CleanupsDepth {
        self.stack.stable_begin()
    }

    #[inline]
    pub fn innermost_scope(&self) -> CleanupsDepth {
        self.innermost_scope
    }

    #[inline]
    pub fn return_scope(&self) -> CleanupsDepth {
        self.return_scope
    }

    /// Number of cleanups still on the stack, in any state.
    #[inline]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    // Registration

    /// Push an active cleanup. Returns the depth designating it.
    pub fn push_cleanup<T>(&mut self, cleanup: T) -> CleanupsDepth
    where
        T: Cleanup<B> + 'static,
    {
        self.push_cleanup_in_state(CleanupState::Active, cleanup)
    }

    /// Push a cleanup in the given initial state.
    ///
    /// `state` must not be [`Dead`](CleanupState::Dead): a cleanup that can
    /// never run is not worth registering.
    pub fn push_cleanup_in_state<T>(&mut self, state: CleanupState, cleanup: T) -> CleanupsDepth
    where
        T: Cleanup<B> + 'static,
    {
        if state.is_dead() {
            invariant_violated(&CleanupError::PushedDead);
        }

        let old_top = self.depth();
        let kind = cleanup.kind();
        let depth = self.stack.push(Entry {
            state,
            cleanup: Box::new(cleanup),
        });

        debug_assert_eq!(depth.height(), old_top.height() + 1);
        debug_assert!(
            self.stack.is_valid(old_top),
            "push invalidated the previous top {old_top}"
        );
        tracing::debug!(%depth, %state, kind, "pushed cleanup");
        depth
    }

    // State transitions

    /// The state of the cleanup at `depth`.
    pub fn cleanup_state(&self, depth: CleanupsDepth) -> CleanupState {
        match self.stack.get(depth) {
            Ok(entry) => entry.state,
            Err(err) => invariant_violated(&err),
        }
    }

    /// Transition the cleanup at `depth` to `state`.
    ///
    /// The transition must be non-trivial and legal; see
    /// [`CleanupState::transition`].
    pub fn set_cleanup_state(&mut self, depth: CleanupsDepth, state: CleanupState) {
        let entry = match self.stack.get_mut(depth) {
            Ok(entry) => entry,
            Err(err) => invariant_violated(&err),
        };
        let from = entry.state;
        entry.state = match from.transition(state) {
            Ok(to) => to,
            Err(err) => invariant_violated(&err),
        };
        tracing::debug!(
            %depth,
            %from,
            to = %state,
            kind = entry.cleanup.kind(),
            "cleanup state changed"
        );
    }

    /// Kill the active cleanup at `depth` because its responsibility has been
    /// handed off (e.g. ownership forwarded into a call).
    pub fn forward_cleanup(&mut self, depth: CleanupsDepth) {
        self.set_cleanup_state(depth, CleanupState::Dead);
    }

    /// Whether any cleanup strictly above `depth` is active.
    pub fn has_any_active_cleanups(&self, depth: CleanupsDepth) -> bool {
        self.stack
            .iter_above(depth)
            .any(|entry| entry.state.is_active())
    }

    // Discharge

    /// Pop the top cleanup and emit it if it is active.
    ///
    /// Dead cleanups are dropped silently. Active cleanups are dropped
    /// without emission when the builder has no insertion point, since the
    /// code at this point is unreachable. Does nothing on an empty stack.
    pub fn pop_and_emit_top_cleanup(&mut self, builder: &mut B) {
        let depth = self.depth();
        let Some(Entry { state, cleanup }) = self.stack.pop() else {
            return;
        };

        match state {
            CleanupState::Active if builder.has_insertion_point() => {
                tracing::trace!(%depth, kind = cleanup.kind(), "emitting cleanup");
                cleanup.emit(self, builder);
            }
            CleanupState::Active => {
                tracing::trace!(
                    %depth,
                    kind = cleanup.kind(),
                    "dropping cleanup in unreachable code"
                );
            }
            CleanupState::Dead => {
                tracing::trace!(%depth, kind = cleanup.kind(), "popping dead cleanup");
            }
            CleanupState::Dormant => invariant_violated(&CleanupError::DormantAtDischarge {
                kind: cleanup.kind(),
            }),
        }
    }

    /// Pop dead cleanups off the top, stopping at the first live one or at
    /// `end`, whichever comes first. Nothing is emitted.
    pub fn pop_top_dead_cleanups(&mut self, end: CleanupsDepth) {
        while self.depth() > end
            && self
                .stack
                .top()
                .is_some_and(|entry| entry.state.is_dead())
        {
            self.stack.pop();
        }
    }

    /// Discharge every cleanup strictly above `depth`, top first.
    ///
    /// Cleanups at or below `depth` stay on the stack. `depth` is compared by
    /// position, so a boundary whose own cleanup was already unwound by an
    /// earlier exit still stops the walk at the right place.
    pub fn emit_cleanups_to(&mut self, depth: CleanupsDepth, builder: &mut B) {
        while self.depth() > depth {
            self.pop_and_emit_top_cleanup(builder);
        }
    }

    // Branch and return threading

    /// Emit a branch to `dest`, threading out through every cleanup above
    /// the destination's depth.
    ///
    /// The discharged cleanups are popped.
    pub fn emit_branch_and_cleanups(
        &mut self,
        dest: JumpDest<B::Block>,
        loc: B::Location,
        args: Vec<B::Value>,
        builder: &mut B,
    ) {
        if !builder.has_insertion_point() {
            invariant_violated(&CleanupError::NoInsertionPoint {
                operation: "branch",
            });
        }
        if let Err(err) = self.stack.find(dest.depth()) {
            invariant_violated(&err);
        }

        tracing::debug!(
            from = %self.depth(),
            to = %dest.depth(),
            block = ?dest.block(),
            "threading branch through cleanups"
        );
        self.emit_cleanups_to(dest.depth(), builder);
        builder.emit_branch(loc, dest.block(), args);
    }

    /// Emit a return of `value`, threading out through every cleanup above
    /// the return scope.
    pub fn emit_return_and_cleanups(&mut self, loc: B::Location, value: B::Value, builder: &mut B) {
        if !builder.has_insertion_point() {
            invariant_violated(&CleanupError::NoInsertionPoint {
                operation: "return",
            });
        }
        self.emit_cleanups_for_return(loc, builder);
        builder.emit_return(loc, value);
    }

    /// Emit every cleanup a return needs, without the return itself.
    ///
    /// For callers that terminate the block some other way afterwards.
    pub fn emit_cleanups_for_return(&mut self, loc: B::Location, builder: &mut B) {
        tracing::debug!(
            from = %self.depth(),
            to = %self.return_scope,
            ?loc,
            "threading return through cleanups"
        );
        self.emit_cleanups_to(self.return_scope, builder);
    }
}
