//! Chain cursor: the last block height the poll loop has processed.
//!
//! In-memory only: a process restart seeds from the chain head again, so
//! heights produced while the process was down are not scanned.

use serde::{Deserialize, Serialize};

/// The poll loop's position in the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Last processed height; `None` until seeded from the chain head.
    pub last_processed_height: Option<u64>,
}

impl Cursor {
    /// An unset cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor already positioned at `height`.
    pub fn at(height: u64) -> Self {
        Self {
            last_processed_height: Some(height),
        }
    }

    pub fn is_set(&self) -> bool {
        self.last_processed_height.is_some()
    }

    /// Seed the cursor from the chain head. Has no effect once set.
    /// Returns `true` if the cursor was seeded by this call.
    pub fn seed(&mut self, head: u64) -> bool {
        if self.is_set() {
            return false;
        }
        self.last_processed_height = Some(head);
        true
    }

    /// Returns `true` if `head` is ahead of the cursor.
    pub fn is_behind(&self, head: u64) -> bool {
        matches!(self.last_processed_height, Some(h) if h < head)
    }

    /// Move forward by exactly one height and return the new height.
    /// Returns `None` (and does nothing) while the cursor is unset.
    pub fn advance(&mut self) -> Option<u64> {
        let next = self.last_processed_height?.checked_add(1)?;
        self.last_processed_height = Some(next);
        Some(next)
    }
}
