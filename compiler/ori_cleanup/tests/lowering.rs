//! End-to-end lowering scenarios.
//!
//! Each test plays the role of a code generator: it builds IR with
//! [`FunctionBuilder`], registers cleanups as resources appear, and checks
//! the instructions that land in each block.

use ori_cleanup::ir::{BlockId, FuncRef, FunctionBuilder, Instr, Span, Terminator, VarId};
use ori_cleanup::kinds::{DeferCall, DestroyFields, DestroyValue, ReleaseValue, UnlockMutex};
use ori_cleanup::{CleanupManager, CleanupState, JumpDest, ScopeKind};
use pretty_assertions::assert_eq;

const ALLOC: FuncRef = FuncRef(0);
const MAKE_TEMP: FuncRef = FuncRef(1);
const LOG_EXIT: FuncRef = FuncRef(2);

fn setup() -> (CleanupManager<FunctionBuilder>, FunctionBuilder) {
    ori_cleanup::init_tracing();
    (CleanupManager::new(), FunctionBuilder::new())
}

fn span(n: u32) -> Span {
    Span::new(n, n + 1)
}

/// ```text
/// let owned = alloc()
/// lock(m)
/// loop {
///     let tmp = make_temp()
///     break
/// }
/// return 0
/// ```
#[test]
fn break_and_return_thread_through_enclosing_cleanups() {
    let (mut cleanups, mut builder) = setup();

    let owned = builder.emit_apply(ALLOC, vec![], span(0));
    cleanups.push_cleanup(ReleaseValue {
        var: owned,
        span: span(0),
    });
    let lock = builder.emit_const(7, span(1));
    cleanups.push_cleanup(UnlockMutex {
        lock,
        span: span(1),
    });

    let header = builder.new_block();
    let exit = builder.new_block();
    builder.terminate_jump(header, vec![]);
    builder.position_at(header);

    cleanups.with_scope(ScopeKind::Local, &mut builder, |cleanups, builder| {
        let break_dest = JumpDest::new(exit, cleanups.innermost_scope());
        let tmp = builder.emit_apply(MAKE_TEMP, vec![], span(2));
        cleanups.push_cleanup(DestroyValue {
            var: tmp,
            span: span(2),
        });
        cleanups.emit_branch_and_cleanups(break_dest, span(3), vec![], builder);
    });
    assert_eq!(cleanups.len(), 2);

    builder.position_at(exit);
    let zero = builder.emit_const(0, span(4));
    cleanups.emit_return_and_cleanups(span(4), zero, &mut builder);
    assert!(cleanups.is_empty());

    let func = builder.finish();
    let tmp = VarId::new(2);
    assert_eq!(
        func.block(header).body,
        vec![
            Instr::Apply {
                dst: tmp,
                func: MAKE_TEMP,
                args: vec![]
            },
            Instr::Destroy { var: tmp },
        ]
    );
    assert_eq!(
        func.block(header).terminator,
        Terminator::Jump {
            target: exit,
            args: vec![]
        }
    );
    assert_eq!(
        func.block(exit).body,
        vec![
            Instr::Const {
                dst: zero,
                value: 0
            },
            Instr::Unlock { lock },
            Instr::RcDec { var: owned },
        ]
    );
    assert_eq!(
        func.block(exit).terminator,
        Terminator::Return { value: zero }
    );
}

/// An inlined callee's `return` only unwinds the callee's own cleanups, then
/// jumps to the continuation in the caller.
#[test]
fn inlined_return_stops_at_forced_return_scope() {
    let (mut cleanups, mut builder) = setup();

    let owned = builder.emit_apply(ALLOC, vec![], span(0));
    cleanups.push_cleanup(ReleaseValue {
        var: owned,
        span: span(0),
    });

    let cont = builder.new_block();
    let result = builder.add_block_param(cont);

    let inlined = cleanups.open_scope(ScopeKind::ForcedReturn);
    let callee_tmp = builder.emit_apply(MAKE_TEMP, vec![], span(1));
    cleanups.push_cleanup(DestroyValue {
        var: callee_tmp,
        span: span(1),
    });
    cleanups.push_cleanup(DeferCall {
        func: LOG_EXIT,
        args: vec![],
        span: span(2),
    });
    let value = builder.emit_const(5, span(3));
    cleanups.emit_cleanups_for_return(span(3), &mut builder);
    builder.terminate_jump(cont, vec![value]);
    cleanups.close_scope(inlined, &mut builder);
    assert_eq!(cleanups.len(), 1);

    builder.position_at(cont);
    cleanups.emit_return_and_cleanups(span(4), result, &mut builder);

    let func = builder.finish();
    let entry = func.block(BlockId::new(0));
    assert_eq!(
        entry.body[3..].to_vec(),
        vec![
            Instr::Apply {
                dst: VarId::new(4),
                func: LOG_EXIT,
                args: vec![]
            },
            Instr::Destroy { var: callee_tmp },
        ]
    );
    assert_eq!(
        entry.terminator,
        Terminator::Jump {
            target: cont,
            args: vec![value]
        }
    );
    assert_eq!(func.block(cont).body, vec![Instr::RcDec { var: owned }]);
}

/// A cleanup registered before its value is initialized stays dormant until
/// initialization, and one whose value is moved out is killed.
#[test]
fn dormant_cleanups_follow_initialization_and_moves() {
    let (mut cleanups, mut builder) = setup();

    cleanups.with_scope(ScopeKind::Local, &mut builder, |cleanups, builder| {
        let slot = builder.fresh_var();
        let pending = cleanups.push_cleanup_in_state(
            CleanupState::Dormant,
            DestroyValue {
                var: slot,
                span: span(0),
            },
        );
        let moved = builder.fresh_var();
        let moved_cleanup = cleanups.push_cleanup_in_state(
            CleanupState::Dormant,
            DestroyFields {
                var: moved,
                fields: vec![0, 1],
                span: span(1),
            },
        );

        // `slot` is initialized; `moved` never is.
        builder.emit(Instr::Const { dst: slot, value: 1 }, span(2));
        cleanups.set_cleanup_state(pending, CleanupState::Active);
        cleanups.set_cleanup_state(moved_cleanup, CleanupState::Dead);
        let boundary = cleanups.innermost_scope();
        cleanups.pop_top_dead_cleanups(boundary);
        assert_eq!(cleanups.depth(), pending);
    });

    let unit = builder.emit_const(0, span(3));
    cleanups.emit_return_and_cleanups(span(3), unit, &mut builder);

    let func = builder.finish();
    assert_eq!(
        func.block(func.entry).body,
        vec![
            Instr::Const {
                dst: VarId::new(0),
                value: 1
            },
            Instr::Destroy { var: VarId::new(0) },
            Instr::Const {
                dst: unit,
                value: 0
            },
        ]
    );
}

/// Aggregate destruction registers nested cleanups while the walk that
/// discharges it is running.
#[test]
fn aggregate_destruction_inside_branch_threading() {
    let (mut cleanups, mut builder) = setup();

    let agg = builder.emit_apply(ALLOC, vec![], span(0));
    let outer = cleanups.depth();
    cleanups.push_cleanup(DestroyFields {
        var: agg,
        fields: vec![1, 3],
        span: span(0),
    });

    let done = builder.new_block();
    cleanups.emit_branch_and_cleanups(JumpDest::new(done, outer), span(1), vec![], &mut builder);
    assert!(cleanups.is_empty());

    let func = builder.finish();
    let destroyed: Vec<_> = func
        .block(func.entry)
        .body
        .iter()
        .filter_map(|instr| match instr {
            Instr::Destroy { var } => Some(var.raw()),
            _ => None,
        })
        .collect();
    assert_eq!(destroyed, vec![2, 1, 0]);
    assert_eq!(func.block(done).terminator, Terminator::Unreachable);
}
