//! Foundation types for lindiff.
//!
//! Every other lindiff crate depends on `lindiff-types`. The types here
//! describe the two sides of the encoding boundary:
//!
//! - Encoded side: [`RawEntry`] and [`ChangeRecord`], exactly as produced by
//!   a store's directional diff stream. Keys and values are raw bytes.
//! - Decoded side: [`Value`], [`Entry`] and [`DiffEntry`], the logical view
//!   handed to consumers once a codec has been applied.
//!
//! # Key Types
//!
//! - [`Version`] -- point in a store's append history
//! - [`RawEntry`] -- `{seq, key, value}` with encoded bytes
//! - [`ChangeRecord`] -- before/after pair for one key in one directional stream
//! - [`DiffEntry`] -- the public `{new_state, old_state}` output unit

pub mod diff;
pub mod entry;
pub mod error;
pub mod value;

pub use diff::{ChangeKind, DiffEntry, Entry};
pub use entry::{ChangeRecord, RawEntry};
pub use error::TypeError;
pub use value::Value;

/// A point in a store's append history. Monotonic.
pub type Version = u64;

/// Sequence number of the append that last wrote an entry.
pub type Seq = u64;
