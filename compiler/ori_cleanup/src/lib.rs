//! Cleanup stack and scope-exit threading for Ori IR lowering.
//!
//! When lowering introduces a resource that must be released on every path
//! out of its scope (a temporary to destroy, an owned reference to release,
//! a lock to unlock), it registers a [`Cleanup`] with the function's
//! [`CleanupManager`]. The manager guarantees that whichever edge leaves the
//! scope (fallthrough, an early branch, or a return) every applicable
//! cleanup runs exactly once, in reverse order of registration.
//!
//! This crate provides:
//!
//! - **Cleanup stack** ([`CleanupStack`], [`CleanupsDepth`]): LIFO storage
//!   with position handles that survive pushes and detect staleness.
//!
//! - **Lifecycle** ([`CleanupState`]): `Dormant`, `Active`, `Dead`, with
//!   the legal transitions enforced.
//!
//! - **Manager** ([`CleanupManager`]): registration, state changes, and
//!   threading branches and returns through pending cleanups.
//!
//! - **Scopes** ([`Scope`], [`ScopeKind`]): nestable regions whose close
//!   discharges everything registered inside them.
//!
//! - **IR** ([`ir`], [`kinds`]): a small basic-block IR implementing
//!   [`IrBuilder`], and cleanup kinds that emit into it.
//!
//! # Contract violations
//!
//! Misuse (illegal state transitions, discharging a dormant cleanup, stale
//! depth handles, out-of-order scope closes) means the code generator is
//! broken. The manager logs the [`CleanupError`] and panics.
//!
//! # Crate Dependencies
//!
//! No dependency on the rest of the compiler: the manager is generic over
//! [`IrBuilder`], so any backend that can emit a branch and a return can
//! drive it.

mod builder;
mod error;
pub mod ir;
pub mod kinds;
mod manager;
mod scope;
mod stack;
mod state;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use builder::{IrBuilder, JumpDest};
pub use error::CleanupError;
pub use manager::{Cleanup, CleanupManager};
pub use scope::{Scope, ScopeKind};
pub use stack::{CleanupStack, CleanupsDepth};
pub use state::CleanupState;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debugging cleanup emission.
///
/// Enable with `RUST_LOG=ori_cleanup=debug`, or `RUST_LOG=ori_cleanup=trace`
/// to see every discharged cleanup.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
