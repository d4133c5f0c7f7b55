//! Cleanup stack with stable depth handles.
//!
//! [`CleanupStack`] is a LIFO container whose positions can be named by
//! [`CleanupsDepth`] handles that survive pushes above them.
//!
//! # Handle validation
//!
//! Every pushed slot is stamped with a serial number taken from a counter
//! that only ever increases, so serials strictly increase from bottom to
//! top. A handle records the serial and height of the slot it designates.
//! Pushing above a slot never moves it; popping it removes it, and any later
//! push at the same height carries a larger serial. A handle is therefore
//! live exactly when the slot at its height still carries its serial, which
//! is an O(1) check performed in every build.
//!
//! Because serials are ordered the same way as positions, comparing two
//! handles by serial answers "is at or below" even after the designated
//! slots are gone. The discharge walks in
//! [`CleanupManager`](crate::CleanupManager) rely on this.

use std::fmt;

use smallvec::SmallVec;

use crate::error::CleanupError;

/// Slots kept inline before spilling to the heap.
///
/// Most functions never hold more than a handful of pending cleanups.
const INLINE_SLOTS: usize = 16;

/// A stable reference to a position in a [`CleanupStack`].
///
/// Ordered by position: `a <= b` means `a` is at or below `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct CleanupsDepth {
    // Field order matters: the derived `Ord` compares `serial` first.
    serial: u32,
    height: u32,
}

impl CleanupsDepth {
    /// The logical bottom of every stack. Always valid, even when empty.
    pub const BOTTOM: CleanupsDepth = CleanupsDepth {
        serial: 0,
        height: 0,
    };

    #[inline]
    pub fn is_bottom(self) -> bool {
        self.serial == 0
    }

    /// Number of entries at or below this position when it was captured.
    #[inline]
    pub fn height(self) -> usize {
        self.height as usize
    }

    #[inline]
    pub fn is_at_or_below(self, other: CleanupsDepth) -> bool {
        self <= other
    }
}

impl fmt::Display for CleanupsDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            f.write_str("depth(bottom)")
        } else {
            write!(f, "depth(#{}@{})", self.serial, self.height)
        }
    }
}

struct Slot<T> {
    serial: u32,
    value: T,
}

/// LIFO stack of cleanup records with stable [`CleanupsDepth`] handles.
pub struct CleanupStack<T> {
    slots: SmallVec<[Slot<T>; INLINE_SLOTS]>,
    next_serial: u32,
}

impl<T> Default for CleanupStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CleanupStack<T> {
    pub fn new() -> Self {
        Self {
            slots: SmallVec::new(),
            next_serial: 1,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Push a record and return the handle designating it.
    pub fn push(&mut self, value: T) -> CleanupsDepth {
        let serial = self.next_serial;
        self.next_serial = serial
            .checked_add(1)
            .unwrap_or_else(|| panic!("cleanup serial exceeds u32::MAX"));
        self.slots.push(Slot { serial, value });
        self.stable_begin()
    }

    /// Remove and return the topmost record.
    pub fn pop(&mut self) -> Option<T> {
        self.slots.pop().map(|slot| slot.value)
    }

    #[inline]
    pub fn top(&self) -> Option<&T> {
        self.slots.last().map(|slot| &slot.value)
    }

    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.slots.last_mut().map(|slot| &mut slot.value)
    }

    /// Handle to the current top, or [`CleanupsDepth::BOTTOM`] when empty.
    pub fn stable_begin(&self) -> CleanupsDepth {
        match self.slots.last() {
            Some(slot) => CleanupsDepth {
                serial: slot.serial,
                height: height_of(self.slots.len()),
            },
            None => CleanupsDepth::BOTTOM,
        }
    }

    /// Handle to the logical bottom.
    pub fn stable_end(&self) -> CleanupsDepth {
        CleanupsDepth::BOTTOM
    }

    /// Resolve a handle to the number of entries at or below it.
    ///
    /// Fails with [`CleanupError::StaleDepth`] if the designated entry has
    /// been popped.
    pub fn find(&self, depth: CleanupsDepth) -> Result<usize, CleanupError> {
        if depth.is_bottom() {
            return Ok(0);
        }
        let live = depth
            .height()
            .checked_sub(1)
            .and_then(|index| self.slots.get(index))
            .is_some_and(|slot| slot.serial == depth.serial);
        if live {
            Ok(depth.height())
        } else {
            Err(CleanupError::StaleDepth { depth })
        }
    }

    #[inline]
    pub fn is_valid(&self, depth: CleanupsDepth) -> bool {
        self.find(depth).is_ok()
    }

    /// The record designated by `depth`.
    pub fn get(&self, depth: CleanupsDepth) -> Result<&T, CleanupError> {
        match self.find(depth)? {
            0 => Err(CleanupError::BottomDepth),
            height => Ok(&self.slots[height - 1].value),
        }
    }

    /// The record designated by `depth`, mutably.
    pub fn get_mut(&mut self, depth: CleanupsDepth) -> Result<&mut T, CleanupError> {
        match self.find(depth)? {
            0 => Err(CleanupError::BottomDepth),
            height => Ok(&mut self.slots[height - 1].value),
        }
    }

    /// Iterate from top to bottom, yielding each record with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (CleanupsDepth, &T)> + '_ {
        self.slots.iter().enumerate().rev().map(|(index, slot)| {
            let depth = CleanupsDepth {
                serial: slot.serial,
                height: height_of(index + 1),
            };
            (depth, &slot.value)
        })
    }

    /// Iterate from the top down over the records strictly above `depth`.
    pub fn iter_above(&self, depth: CleanupsDepth) -> impl Iterator<Item = &T> + '_ {
        self.iter()
            .take_while(move |(at, _)| *at > depth)
            .map(|(_, value)| value)
    }
}

fn height_of(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("cleanup stack height exceeds u32::MAX"))
}
