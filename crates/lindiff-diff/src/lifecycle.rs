//! Ownership of the two input snapshots.

use lindiff_store::SnapshotRef;
use tracing::warn;

use crate::error::{CloseFailure, Side};

/// The old and new snapshots of one diff, closed on release if owned.
///
/// Release happens at most once, explicitly through [`release`] or
/// implicitly on drop. Unowned snapshots are never closed.
///
/// [`release`]: SnapshotPair::release
pub struct SnapshotPair {
    old: SnapshotRef,
    new: SnapshotRef,
    owned: bool,
    released: bool,
}

impl SnapshotPair {
    pub fn new(old: SnapshotRef, new: SnapshotRef, owned: bool) -> Self {
        Self {
            old,
            new,
            owned,
            released: false,
        }
    }

    pub fn old_snapshot(&self) -> &SnapshotRef {
        &self.old
    }

    pub fn new_snapshot(&self) -> &SnapshotRef {
        &self.new
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Close both snapshots if owned. Both are attempted even if the first
    /// fails; every failure is returned. Later calls return nothing.
    pub fn release(&mut self) -> Vec<CloseFailure> {
        if self.released {
            return Vec::new();
        }
        self.released = true;
        if !self.owned {
            return Vec::new();
        }
        let mut failures = Vec::new();
        for (side, snapshot) in [(Side::Old, &self.old), (Side::New, &self.new)] {
            if let Err(error) = snapshot.close() {
                failures.push(CloseFailure { side, error });
            }
        }
        failures
    }
}

impl Drop for SnapshotPair {
    fn drop(&mut self) {
        for failure in self.release() {
            warn!(side = %failure.side, error = %failure.error, "snapshot close failed on drop");
        }
    }
}
