use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use lindiff_codec::{CodecRef, EncodedRange};
use lindiff_types::{ChangeRecord, Version};

use crate::error::StoreResult;

/// Directional change stream: ascending by encoded key, one record per key.
pub type ChangeStream = BoxStream<'static, StoreResult<ChangeRecord>>;

/// Shared handle to a snapshot.
pub type SnapshotRef = Arc<dyn VersionedSnapshot>;

/// A pinned, read-only view of an ordered versioned store.
///
/// All implementations must satisfy these invariants:
/// - The view never changes after creation, even if the store's unconfirmed
///   history is later rewritten.
/// - `confirmed_length()`, when present, is at most `version()` and is fixed
///   for the lifetime of the snapshot.
/// - `close()` is idempotent. Closing one handle does not close handles
///   obtained through `snapshot()` or `checkout()`.
pub trait VersionedSnapshot: Send + Sync {
    /// The history length this snapshot is pinned at.
    fn version(&self) -> Version;

    /// Length of the history prefix that is immutable and shared by every
    /// observer. `None` if the backing store has no such notion.
    fn confirmed_length(&self) -> Option<Version>;

    /// Whether asynchronous materialization has finished.
    fn is_ready(&self) -> bool;

    /// Default key codec for this snapshot.
    fn key_codec(&self) -> CodecRef;

    /// Default value codec for this snapshot.
    fn value_codec(&self) -> CodecRef;

    /// A new, independently closable handle at the same version.
    fn snapshot(&self) -> SnapshotRef;

    /// A new handle pinned at an earlier (or equal) version.
    fn checkout(&self, version: Version) -> StoreResult<SnapshotRef>;

    /// Every key whose entry differs between the view at `from_length` and
    /// this snapshot's version, restricted to `range`, ascending by key.
    ///
    /// `before` is the entry at `from_length`, `after` the entry at
    /// `version()`. The stream may suspend on I/O between records.
    fn create_diff_stream(
        &self,
        from_length: Version,
        range: &EncodedRange,
    ) -> StoreResult<ChangeStream>;

    /// Release the snapshot. Idempotent.
    fn close(&self) -> StoreResult<()>;
}

/// Something that can hand out its current snapshot, such as a live store.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Wait for any pending materialization and pin the current state.
    async fn current_snapshot(&self) -> StoreResult<SnapshotRef>;
}
