//! Reconciliation of relinearized snapshots into a minimal logical diff.
//!
//! Given an old and a new snapshot of an ordered versioned store whose
//! unconfirmed history may have been rewritten in between, [`DiffStream`]
//! yields exactly the keys whose current values differ, in ascending
//! encoded-key order.
//!
//! # How it works
//!
//! 1. Both snapshots are checked for readiness and a confirmed length.
//! 2. The checkpoint is the smaller of the two confirmed lengths.
//! 3. The old snapshot's diff stream from the checkpoint is walked as an
//!    undo stream, the new snapshot's as an apply stream.
//! 4. [`MergeJoin`] merges the two in one linear pass, dropping keys where
//!    both branches converged and candidates whose values did not change.
//!
//! Reversing the inputs reverses every entry, sequence numbers included.
//!
//! # Key Types
//!
//! - [`DiffStream`] -- public entry point, a `futures::Stream` of entries
//! - [`MergeJoin`] -- the merge-join over two directional streams
//! - [`SnapshotPair`] -- closes owned snapshots on every exit path
//! - [`DiffOptions`] / [`DiffConfig`] -- codecs, range bounds, ownership
//! - [`DiffWatcher`] -- successive diffs of a live store

pub mod error;
pub mod lifecycle;
pub mod options;
pub mod reconciler;
pub mod stream;
pub mod watch;

pub use error::{CloseFailure, DiffError, DiffResult, Side};
pub use lifecycle::SnapshotPair;
pub use options::{DiffConfig, DiffOptions};
pub use reconciler::{MergeJoin, MergeStats};
pub use stream::DiffStream;
pub use watch::{ChangeBatch, DiffWatcher};

#[cfg(test)]
mod properties;
