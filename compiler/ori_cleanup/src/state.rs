//! Cleanup lifecycle states.
//!
//! A cleanup is born [`Dormant`](CleanupState::Dormant) or
//! [`Active`](CleanupState::Active) and may change state at most along the
//! edges below before it is discharged:
//!
//! ```text
//! Dormant ──► Active ──► Dead
//!    └──────────────────► Dead
//! ```
//!
//! `Dead` is terminal. `Active → Dormant` is rejected: a cleanup that is
//! already guarding an exit cannot be disarmed. Kill it and push a fresh
//! dormant one instead.

use std::fmt;

use crate::error::CleanupError;

/// The state of a registered cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CleanupState {
    /// Registered but inert. May be activated or killed later.
    ///
    /// A dormant cleanup must be resolved before its scope exits;
    /// discharging one is a code generator bug.
    Dormant,

    /// Armed. Emitted when discharged.
    Active,

    /// Permanently skipped. Removed silently when discharged.
    Dead,
}

impl CleanupState {
    #[inline]
    pub fn is_active(self) -> bool {
        self == CleanupState::Active
    }

    #[inline]
    pub fn is_dead(self) -> bool {
        self == CleanupState::Dead
    }

    #[inline]
    pub fn is_dormant(self) -> bool {
        self == CleanupState::Dormant
    }

    /// Validate a transition from `self` to `to`.
    ///
    /// Returns the new state on success. Same-state requests, transitions
    /// out of `Dead`, and `Active → Dormant` are all errors.
    pub fn transition(self, to: CleanupState) -> Result<CleanupState, CleanupError> {
        use CleanupState::{Active, Dead, Dormant};

        match (self, to) {
            (Dormant, Active | Dead) | (Active, Dead) => Ok(to),
            _ => Err(CleanupError::InvalidTransition { from: self, to }),
        }
    }
}

impl fmt::Display for CleanupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CleanupState::Dormant => "dormant",
            CleanupState::Active => "active",
            CleanupState::Dead => "dead",
        })
    }
}
