//! The public diff entry point.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::{Stream, StreamExt};
use lindiff_store::SnapshotRef;
use lindiff_types::{DiffEntry, Version};
use tracing::{debug, warn};

use crate::error::{CloseFailure, DiffError, DiffResult, Side};
use crate::lifecycle::SnapshotPair;
use crate::options::DiffOptions;
use crate::reconciler::{MergeJoin, MergeStats};

/// Lazy, single-pass diff between an old and a new snapshot.
///
/// Yields [`DiffEntry`] values in ascending encoded-key order. The confirmed
/// length is read once, at construction; later rewrites of the stores are
/// not observed.
///
/// When `close_snapshots` is set, both snapshots are closed once the stream
/// ends, fails, is cancelled, or is dropped. Close failures never replace
/// the stream's own outcome; they are logged and kept in
/// [`close_failures`](Self::close_failures).
pub struct DiffStream {
    // Declared before `snapshots` so the open streams are dropped first.
    merge: Option<MergeJoin>,
    snapshots: SnapshotPair,
    old_version: Version,
    new_version: Version,
    confirmed_length: Version,
    stats: MergeStats,
    close_failures: Vec<CloseFailure>,
}

impl DiffStream {
    /// Validate both snapshots and open the two directional streams.
    ///
    /// The snapshots are owned from this call on: if `close_snapshots` is set
    /// they are closed even when opening fails. Close failures at that point
    /// come back with the original error as [`DiffError::Teardown`].
    pub fn open(old: SnapshotRef, new: SnapshotRef, options: DiffOptions) -> DiffResult<Self> {
        let mut snapshots = SnapshotPair::new(old, new, options.close_snapshots);
        let (merge, confirmed_length) = match Self::open_inputs(&snapshots, options) {
            Ok(opened) => opened,
            Err(error) => {
                let failures = snapshots.release();
                if failures.is_empty() {
                    return Err(error);
                }
                for failure in &failures {
                    warn!(side = %failure.side, error = %failure.error, "snapshot close failed");
                }
                return Err(DiffError::Teardown {
                    error: Box::new(error),
                    failures,
                });
            }
        };

        let old_version = snapshots.old_snapshot().version();
        let new_version = snapshots.new_snapshot().version();
        Ok(Self {
            merge: Some(merge),
            snapshots,
            old_version,
            new_version,
            confirmed_length,
            stats: MergeStats::default(),
            close_failures: Vec::new(),
        })
    }

    fn open_inputs(
        snapshots: &SnapshotPair,
        options: DiffOptions,
    ) -> DiffResult<(MergeJoin, Version)> {
        let old = snapshots.old_snapshot();
        let new = snapshots.new_snapshot();

        if !old.is_ready() {
            return Err(DiffError::SnapshotNotReady { side: Side::Old });
        }
        if !new.is_ready() {
            return Err(DiffError::SnapshotNotReady { side: Side::New });
        }
        let old_confirmed = old
            .confirmed_length()
            .ok_or(DiffError::UnsupportedStore { side: Side::Old })?;
        let new_confirmed = new
            .confirmed_length()
            .ok_or(DiffError::UnsupportedStore { side: Side::New })?;
        let confirmed_length = old_confirmed.min(new_confirmed);

        let key_codec = options.key_codec.unwrap_or_else(|| old.key_codec());
        let value_codec = options.value_codec.unwrap_or_else(|| old.value_codec());
        let range = options.range.encode(&*key_codec)?;

        let undo = old.create_diff_stream(confirmed_length, &range)?;
        let apply = new.create_diff_stream(confirmed_length, &range)?;

        debug!(
            old_version = old.version(),
            new_version = new.version(),
            confirmed_length,
            key_codec = key_codec.name(),
            value_codec = value_codec.name(),
            bounded = !range.is_unbounded(),
            "diff stream opened"
        );
        let merge = MergeJoin::new(undo, apply, key_codec, value_codec);
        Ok((merge, confirmed_length))
    }

    /// The checkpoint both directional streams start from.
    pub fn confirmed_length(&self) -> Version {
        self.confirmed_length
    }

    pub fn old_version(&self) -> Version {
        self.old_version
    }

    pub fn new_version(&self) -> Version {
        self.new_version
    }

    /// Whether the stream has ended (normally, by error, or by cancel).
    pub fn is_finished(&self) -> bool {
        self.merge.is_none()
    }

    /// Merge counters, final once the stream has finished.
    pub fn stats(&self) -> MergeStats {
        match &self.merge {
            Some(merge) => merge.stats(),
            None => self.stats,
        }
    }

    /// Snapshots that failed to close during teardown.
    pub fn close_failures(&self) -> &[CloseFailure] {
        &self.close_failures
    }

    /// Pull the next entry.
    pub async fn next_entry(&mut self) -> Option<DiffResult<DiffEntry>> {
        self.next().await
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub async fn collect_all(mut self) -> DiffResult<Vec<DiffEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Stop early: drop both directional streams and release the snapshots.
    ///
    /// Returns [`DiffError::Close`] if any owned snapshot failed to close,
    /// including failures from an earlier teardown.
    pub fn cancel(mut self) -> DiffResult<()> {
        self.finish();
        if self.close_failures.is_empty() {
            Ok(())
        } else {
            Err(DiffError::Close {
                failures: std::mem::take(&mut self.close_failures),
            })
        }
    }

    fn finish(&mut self) {
        let Some(merge) = self.merge.take() else {
            return;
        };
        self.stats = merge.stats();
        drop(merge);

        let failures = self.snapshots.release();
        for failure in &failures {
            warn!(side = %failure.side, error = %failure.error, "snapshot close failed");
        }
        self.close_failures.extend(failures);
        debug!(
            emitted = self.stats.emitted,
            converged = self.stats.converged,
            identical = self.stats.identical,
            "diff stream finished"
        );
    }
}

impl Stream for DiffStream {
    type Item = DiffResult<DiffEntry>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(merge) = this.merge.as_mut() else {
            return Poll::Ready(None);
        };
        match ready!(merge.poll_next_unpin(cx)) {
            Some(Ok(entry)) => Poll::Ready(Some(Ok(entry))),
            Some(Err(err)) => {
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for DiffStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffStream")
            .field("old_version", &self.old_version)
            .field("new_version", &self.new_version)
            .field("confirmed_length", &self.confirmed_length)
            .field("finished", &self.is_finished())
            .finish()
    }
}
