//! Specialized collection types

pub use slotmap::{new_key_type, Key, SlotMap};

/// A pair of values used alternately as source and destination.
///
/// The `target` slot is the one written by the next stage; after the stage
/// runs, [`PingPong::flip`] makes the freshly written slot the new source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong<T> {
    items: [T; 2],
    target: usize,
}

impl<T> PingPong<T> {
    /// Create a new pair, targeting the first slot
    pub const fn new(first: T, second: T) -> Self {
        Self {
            items: [first, second],
            target: 0,
        }
    }

    /// Slot written by the next stage
    pub fn target(&self) -> &T {
        &self.items[self.target]
    }

    /// Slot holding the most recent output
    pub fn source(&self) -> &T {
        &self.items[1 - self.target]
    }

    /// Index of the target slot
    pub const fn target_index(&self) -> usize {
        self.target
    }

    /// Force the target slot
    pub fn set_target_index(&mut self, index: usize) {
        self.target = index & 1;
    }

    /// Swap source and target
    pub fn flip(&mut self) {
        self.target = 1 - self.target;
    }

    /// Both slots, in storage order
    pub const fn items(&self) -> &[T; 2] {
        &self.items
    }
}
