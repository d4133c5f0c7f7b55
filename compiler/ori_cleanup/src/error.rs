//! Cleanup contract violations.
//!
//! Every [`CleanupError`] means the code generator driving the
//! [`CleanupManager`](crate::CleanupManager) is malformed, not that the
//! program being compiled is invalid. The manager aborts code generation
//! on the first violation via [`invariant_violated`].

use thiserror::Error;

use crate::stack::CleanupsDepth;
use crate::state::CleanupState;

/// A violated cleanup invariant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CleanupError {
    /// Same-state request, transition out of `Dead`, or `Active → Dormant`.
    #[error("illegal cleanup state transition {from} -> {to}")]
    InvalidTransition { from: CleanupState, to: CleanupState },

    /// A cleanup was registered already dead.
    #[error("cannot push a cleanup in the dead state")]
    PushedDead,

    /// A dormant cleanup reached discharge without being activated or killed.
    #[error("dormant cleanup `{kind}` was discharged; it must be activated or killed before its scope exits")]
    DormantAtDischarge { kind: &'static str },

    /// A depth handle whose cleanup (or something below it) was popped.
    #[error("stale cleanup depth {depth}: the cleanup it designates has been popped")]
    StaleDepth { depth: CleanupsDepth },

    /// The bottom depth was used where a specific cleanup is required.
    #[error("the bottom cleanup depth does not designate a cleanup")]
    BottomDepth,

    /// Scopes were closed out of stack order.
    #[error("scope closed out of order: closing nesting level {found}, innermost open level is {expected}")]
    ScopeOrder { expected: u32, found: u32 },

    /// A terminator was requested with no block to put it in.
    #[error("{operation} emitted with no insertion point")]
    NoInsertionPoint { operation: &'static str },
}

/// Abort code generation on a violated invariant.
#[cold]
#[track_caller]
pub(crate) fn invariant_violated(err: &CleanupError) -> ! {
    tracing::error!(%err, "cleanup invariant violated");
    panic!("cleanup invariant violated: {err}");
}
