//! Ordered versioned store contract for lindiff.
//!
//! lindiff never owns a store. It consumes pinned snapshots of one through
//! the [`VersionedSnapshot`] trait: a version, a confirmed length, default
//! codecs, and per-snapshot directional diff streams sorted by encoded key.
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- append log held in memory, with history rewriting
//!   (`truncate`, `fork`) and fault injection for tests
//!
//! # Adapters
//!
//! - [`ConfirmedLengthFallback`] -- lets stores without a confirmed length be
//!   diffed by treating each snapshot's own version as its checkpoint
//!
//! # Contract
//!
//! 1. `confirmed_length() <= version()` whenever a confirmed length exists.
//! 2. Diff streams yield records in strictly ascending encoded-key order,
//!    at most one per key, restricted to the supplied range.
//! 3. `close()` is idempotent.
//! 4. All I/O errors are propagated through the stream, never swallowed.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod traits;

pub use adapter::ConfirmedLengthFallback;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, MemorySnapshot, StoreProbe};
pub use traits::{ChangeStream, SnapshotRef, SnapshotSource, VersionedSnapshot};
