//! Cleanup kinds for the bundled [`ir`](crate::ir).
//!
//! Each kind emits its release action at the builder's insertion point.
//! [`DestroyFields`] is the interesting one: it registers one cleanup per
//! field while it is itself being discharged, inside its own local scope.

use crate::ir::{FuncRef, FunctionBuilder, Instr, Span, VarId};
use crate::manager::{Cleanup, CleanupManager};
use crate::scope::ScopeKind;

type Cleanups = CleanupManager<FunctionBuilder>;

/// Destroy a temporary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestroyValue {
    pub var: VarId,
    pub span: Span,
}

impl Cleanup<FunctionBuilder> for DestroyValue {
    fn emit(self: Box<Self>, _: &mut Cleanups, builder: &mut FunctionBuilder) {
        builder.emit(Instr::Destroy { var: self.var }, self.span);
    }

    fn kind(&self) -> &'static str {
        "destroy"
    }
}

/// Release an owned reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseValue {
    pub var: VarId,
    pub span: Span,
}

impl Cleanup<FunctionBuilder> for ReleaseValue {
    fn emit(self: Box<Self>, _: &mut Cleanups, builder: &mut FunctionBuilder) {
        builder.emit(Instr::RcDec { var: self.var }, self.span);
    }

    fn kind(&self) -> &'static str {
        "release"
    }
}

/// Release a held lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnlockMutex {
    pub lock: VarId,
    pub span: Span,
}

impl Cleanup<FunctionBuilder> for UnlockMutex {
    fn emit(self: Box<Self>, _: &mut Cleanups, builder: &mut FunctionBuilder) {
        builder.emit(Instr::Unlock { lock: self.lock }, self.span);
    }

    fn kind(&self) -> &'static str {
        "unlock"
    }
}

/// Call a function on scope exit (`defer`). The call's result is discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferCall {
    pub func: FuncRef,
    pub args: Vec<VarId>,
    pub span: Span,
}

impl Cleanup<FunctionBuilder> for DeferCall {
    fn emit(self: Box<Self>, _: &mut Cleanups, builder: &mut FunctionBuilder) {
        let DeferCall { func, args, span } = *self;
        builder.emit_apply(func, args, span);
    }

    fn kind(&self) -> &'static str {
        "defer"
    }
}

/// Destroy an aggregate field by field, then the aggregate itself.
///
/// Each listed field is projected into a temporary whose destruction is
/// registered as a nested [`DestroyValue`]; the nested scope closes before
/// the aggregate is destroyed, so fields go in reverse declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyFields {
    pub var: VarId,
    pub fields: Vec<u32>,
    pub span: Span,
}

impl Cleanup<FunctionBuilder> for DestroyFields {
    fn emit(self: Box<Self>, cleanups: &mut Cleanups, builder: &mut FunctionBuilder) {
        let DestroyFields { var, fields, span } = *self;
        cleanups.with_scope(ScopeKind::Local, builder, |cleanups, builder| {
            for field in fields {
                let temp = builder.emit_project(var, field, span);
                cleanups.push_cleanup(DestroyValue { var: temp, span });
            }
        });
        builder.emit(Instr::Destroy { var }, span);
    }

    fn kind(&self) -> &'static str {
        "destroy-fields"
    }
}
