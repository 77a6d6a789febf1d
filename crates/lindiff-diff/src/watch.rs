//! Change feed over a live store.
//!
//! A [`DiffWatcher`] remembers the last snapshot it handed out changes for.
//! Each [`poll_changes`](DiffWatcher::poll_changes) pins the source's current
//! state, diffs the two, and moves forward. Because every step goes through
//! [`DiffStream`], rewritten unconfirmed history between polls is undone
//! rather than reported twice.

use std::sync::Arc;

use lindiff_store::{SnapshotRef, SnapshotSource};
use lindiff_types::{DiffEntry, Version};
use tracing::{debug, warn};

use crate::error::DiffResult;
use crate::options::DiffOptions;
use crate::stream::DiffStream;

/// One batch of changes between two observed versions.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeBatch {
    pub previous_version: Version,
    pub current_version: Version,
    pub entries: Vec<DiffEntry>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Successive diffs of a [`SnapshotSource`].
///
/// The watcher owns the snapshots it pins and closes them as it moves on.
/// It never closes the source itself.
pub struct DiffWatcher<S: SnapshotSource> {
    source: Arc<S>,
    previous: SnapshotRef,
    options: DiffOptions,
}

impl<S: SnapshotSource> DiffWatcher<S> {
    /// Pin the source's current state as the starting point.
    pub async fn start(source: Arc<S>, options: DiffOptions) -> DiffResult<Self> {
        let previous = source.current_snapshot().await?;
        debug!(version = previous.version(), "watcher started");
        Ok(Self {
            source,
            previous,
            // Snapshot lifetimes are managed here, not by each diff.
            options: options.close_snapshots(false),
        })
    }

    /// Version of the last observed snapshot.
    pub fn version(&self) -> Version {
        self.previous.version()
    }

    /// Diff the last observed state against the source's current state.
    ///
    /// On success the current state becomes the new baseline. On failure the
    /// baseline is kept, so the next poll covers the same changes again.
    pub async fn poll_changes(&mut self) -> DiffResult<ChangeBatch> {
        let current = self.source.current_snapshot().await?;
        let previous = self.previous.clone();

        let opened = DiffStream::open(previous.clone(), current.clone(), self.options.clone());
        let collected = match opened {
            Ok(stream) => stream.collect_all().await,
            Err(err) => Err(err),
        };
        let entries = match collected {
            Ok(entries) => entries,
            Err(err) => {
                close_quietly(&current);
                return Err(err);
            }
        };

        close_quietly(&previous);
        self.previous = current.clone();
        debug!(
            from = previous.version(),
            to = current.version(),
            changes = entries.len(),
            "watcher advanced"
        );
        Ok(ChangeBatch {
            previous_version: previous.version(),
            current_version: current.version(),
            entries,
        })
    }

    /// Stop watching and release the baseline snapshot.
    pub fn close(self) -> DiffResult<()> {
        Ok(self.previous.close()?)
    }
}

impl<S: SnapshotSource> Drop for DiffWatcher<S> {
    fn drop(&mut self) {
        close_quietly(&self.previous);
    }
}

fn close_quietly(snapshot: &SnapshotRef) {
    if let Err(err) = snapshot.close() {
        warn!(version = snapshot.version(), error = %err, "watcher failed to close snapshot");
    }
}
