//! Shared test utilities for the cleanup manager and scopes.
//!
//! [`MockBuilder`] records what the manager asks of it as a flat event log,
//! and [`Record`] is a cleanup that logs its own id when emitted. Only
//! compiled in test builds.

use crate::builder::IrBuilder;
use crate::manager::{Cleanup, CleanupManager};
use crate::scope::ScopeKind;

/// Something the manager (or a cleanup) did to the builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Cleanup(u32),
    Branch { dest: u32, args: Vec<u32> },
    Return(u32),
}

/// Builder that logs events instead of building IR.
#[derive(Debug, Default)]
pub(crate) struct MockBuilder {
    pub(crate) events: Vec<Event>,
    pub(crate) terminated: bool,
}

impl MockBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Ids of the emitted cleanups, in emission order.
    pub(crate) fn cleanups(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Cleanup(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Move to a fresh, unterminated block.
    pub(crate) fn reopen(&mut self) {
        self.terminated = false;
    }
}

impl IrBuilder for MockBuilder {
    type Block = u32;
    type Value = u32;
    type Location = ();

    fn has_insertion_point(&self) -> bool {
        !self.terminated
    }

    fn emit_branch(&mut self, (): (), dest: u32, args: Vec<u32>) {
        self.events.push(Event::Branch { dest, args });
        self.terminated = true;
    }

    fn emit_return(&mut self, (): (), value: u32) {
        self.events.push(Event::Return(value));
        self.terminated = true;
    }
}

/// Cleanup that logs its id.
pub(crate) struct Record(pub(crate) u32);

impl Cleanup<MockBuilder> for Record {
    fn emit(self: Box<Self>, _: &mut CleanupManager<MockBuilder>, builder: &mut MockBuilder) {
        builder.events.push(Event::Cleanup(self.0));
    }

    fn kind(&self) -> &'static str {
        "record"
    }
}

/// Cleanup that registers and discharges child cleanups inside its own
/// local scope before logging itself.
pub(crate) struct Nested {
    pub(crate) id: u32,
    pub(crate) children: Vec<u32>,
}

impl Cleanup<MockBuilder> for Nested {
    fn emit(self: Box<Self>, cleanups: &mut CleanupManager<MockBuilder>, builder: &mut MockBuilder) {
        let Nested { id, children } = *self;
        cleanups.with_scope(ScopeKind::Local, builder, |cleanups, _| {
            for child in children {
                cleanups.push_cleanup(Record(child));
            }
        });
        builder.events.push(Event::Cleanup(id));
    }
}

/// Cleanup that leaves a child cleanup on the stack after emitting.
pub(crate) struct Leaky {
    pub(crate) id: u32,
    pub(crate) child: u32,
}

impl Cleanup<MockBuilder> for Leaky {
    fn emit(self: Box<Self>, cleanups: &mut CleanupManager<MockBuilder>, builder: &mut MockBuilder) {
        builder.events.push(Event::Cleanup(self.id));
        cleanups.push_cleanup(Record(self.child));
    }
}
