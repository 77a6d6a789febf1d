//! Adapters over [`VersionedSnapshot`] implementations.

use std::sync::Arc;

use lindiff_codec::{CodecRef, EncodedRange};
use lindiff_types::Version;

use crate::error::StoreResult;
use crate::traits::{ChangeStream, SnapshotRef, VersionedSnapshot};

/// Supplies a confirmed length for snapshots whose store has none.
///
/// The snapshot's own version is reported as its checkpoint. This is only
/// sound when the store's history is never rewritten, i.e. a plain
/// single-writer log: two such snapshots then diff by a pure forward walk
/// from the older version. A confirmed length the inner snapshot does report
/// is passed through untouched.
pub struct ConfirmedLengthFallback {
    inner: SnapshotRef,
}

impl ConfirmedLengthFallback {
    pub fn new(inner: SnapshotRef) -> Self {
        Self { inner }
    }

    /// Wrap `inner` and return it as a shared handle.
    pub fn wrap(inner: SnapshotRef) -> SnapshotRef {
        Arc::new(Self::new(inner))
    }

    pub fn into_inner(self) -> SnapshotRef {
        self.inner
    }
}

impl VersionedSnapshot for ConfirmedLengthFallback {
    fn version(&self) -> Version {
        self.inner.version()
    }

    fn confirmed_length(&self) -> Option<Version> {
        self.inner
            .confirmed_length()
            .or_else(|| Some(self.inner.version()))
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn key_codec(&self) -> CodecRef {
        self.inner.key_codec()
    }

    fn value_codec(&self) -> CodecRef {
        self.inner.value_codec()
    }

    fn snapshot(&self) -> SnapshotRef {
        Self::wrap(self.inner.snapshot())
    }

    fn checkout(&self, version: Version) -> StoreResult<SnapshotRef> {
        Ok(Self::wrap(self.inner.checkout(version)?))
    }

    fn create_diff_stream(
        &self,
        from_length: Version,
        range: &EncodedRange,
    ) -> StoreResult<ChangeStream> {
        self.inner.create_diff_stream(from_length, range)
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}
