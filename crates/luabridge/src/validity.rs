//! Liveness flag shared between a [`State`](crate::State) and the objects that
//! may outlive it.
//!
//! The flag starts out `true`, is flipped to `false` exactly once when the
//! state is torn down, and is never reset. Holders only ever read it.

use std::cell::Cell;
use std::rc::Rc;

/// Shared, write-once boolean cell; `true` while the owning Lua state is open.
#[derive(Debug, Clone)]
pub struct ValidityFlag(Rc<Cell<bool>>);

impl ValidityFlag {
    pub(crate) fn new() -> Self {
        ValidityFlag(Rc::new(Cell::new(true)))
    }

    /// Whether the owning state is still open
    pub fn is_valid(&self) -> bool {
        self.0.get()
    }

    pub(crate) fn invalidate(&self) {
        self.0.set(false);
    }

    /// Whether both handles were handed out by the same state
    pub fn same_state(&self, other: &ValidityFlag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
