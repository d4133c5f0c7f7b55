//! Cleanup scopes.
//!
//! A [`Scope`] brackets a region of code generation. Opening one moves the
//! governed boundary up to the current top of the cleanup stack; closing it
//! discharges everything pushed since and puts the boundary back.
//!
//! Two boundaries can be governed:
//!
//! - [`ScopeKind::Local`] moves the innermost-scope boundary. Used for
//!   ordinary lexical blocks.
//! - [`ScopeKind::ForcedReturn`] moves the return boundary, so a `return`
//!   inside the region only unwinds to the region's entry. Used when the
//!   region must behave as if it ends at an outer point, e.g. an inlined
//!   body whose returns become branches to the inlining site.
//!
//! Scopes of both kinds share one nesting order and must be closed in
//! reverse order of opening. [`CleanupManager::with_scope`] pairs the two
//! calls around a closure so the close cannot be forgotten.

use crate::builder::IrBuilder;
use crate::error::{invariant_violated, CleanupError};
use crate::manager::CleanupManager;
use crate::stack::CleanupsDepth;

/// Which boundary a [`Scope`] governs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// The innermost-scope boundary.
    Local,
    /// The return boundary.
    ForcedReturn,
}

/// An open cleanup scope.
///
/// Created by [`CleanupManager::open_scope`] and consumed by
/// [`CleanupManager::close_scope`].
#[derive(Debug)]
#[must_use = "scopes must be closed with `CleanupManager::close_scope`"]
pub struct Scope {
    kind: ScopeKind,
    /// Boundary value to restore on close.
    saved: CleanupsDepth,
    /// Top of the stack when the scope was opened.
    entry: CleanupsDepth,
    /// Nesting level, 1 for the outermost open scope.
    level: u32,
    closed: bool,
}

impl Scope {
    #[inline]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    #[inline]
    pub fn entry(&self) -> CleanupsDepth {
        self.entry
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.closed && !std::thread::panicking() {
            tracing::error!(
                kind = ?self.kind,
                entry = %self.entry,
                "cleanup scope dropped without being closed"
            );
            debug_assert!(
                self.closed,
                "{:?} cleanup scope opened at {} was never closed",
                self.kind, self.entry
            );
        }
    }
}

impl<B: IrBuilder> CleanupManager<B> {
    /// Current value of the boundary governed by `kind`.
    pub fn boundary(&self, kind: ScopeKind) -> CleanupsDepth {
        match kind {
            ScopeKind::Local => self.innermost_scope,
            ScopeKind::ForcedReturn => self.return_scope,
        }
    }

    fn boundary_mut(&mut self, kind: ScopeKind) -> &mut CleanupsDepth {
        match kind {
            ScopeKind::Local => &mut self.innermost_scope,
            ScopeKind::ForcedReturn => &mut self.return_scope,
        }
    }

    /// Open a scope at the current top of the stack.
    pub fn open_scope(&mut self, kind: ScopeKind) -> Scope {
        let entry = self.depth();
        let saved = std::mem::replace(self.boundary_mut(kind), entry);
        self.open_scopes = self
            .open_scopes
            .checked_add(1)
            .unwrap_or_else(|| panic!("scope nesting exceeds u32::MAX"));

        tracing::debug!(?kind, %entry, level = self.open_scopes, "opened cleanup scope");
        Scope {
            kind,
            saved,
            entry,
            level: self.open_scopes,
            closed: false,
        }
    }

    /// Close `scope`: discharge everything pushed since it was opened and
    /// restore the boundary it governs.
    ///
    /// `scope` must be the innermost open scope.
    pub fn close_scope(&mut self, mut scope: Scope, builder: &mut B) {
        // Marked up front so an aborted close does not also trip the
        // unclosed-scope check while unwinding.
        scope.closed = true;
        if scope.level != self.open_scopes {
            invariant_violated(&CleanupError::ScopeOrder {
                expected: self.open_scopes,
                found: scope.level,
            });
        }

        tracing::debug!(
            kind = ?scope.kind,
            from = %self.depth(),
            to = %scope.entry,
            level = scope.level,
            "closing cleanup scope"
        );
        self.emit_cleanups_to(scope.entry, builder);
        *self.boundary_mut(scope.kind) = scope.saved;
        self.open_scopes -= 1;
    }

    /// Run `f` inside a scope of the given kind.
    ///
    /// The scope is closed however `f` returns, including early returns and
    /// `?` inside the closure.
    pub fn with_scope<R>(
        &mut self,
        kind: ScopeKind,
        builder: &mut B,
        f: impl FnOnce(&mut Self, &mut B) -> R,
    ) -> R {
        let scope = self.open_scope(kind);
        let result = f(self, builder);
        self.close_scope(scope, builder);
        result
    }
}
