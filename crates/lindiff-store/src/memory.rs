use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use lindiff_codec::{BinaryCodec, CodecRef, EncodedRange};
use lindiff_types::{ChangeRecord, RawEntry, Value, Version};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ChangeStream, SnapshotRef, SnapshotSource, VersionedSnapshot};

/// One append in the store's history. The op at index `i` has seq `i + 1`.
#[derive(Clone, Debug)]
enum Op {
    Put { key: Bytes, value: Option<Bytes> },
    Del { key: Bytes },
}

impl Op {
    fn key(&self) -> &Bytes {
        match self {
            Self::Put { key, .. } | Self::Del { key } => key,
        }
    }
}

/// Replay `ops` into the key/value state they produce.
fn materialize(ops: &[Op]) -> BTreeMap<Bytes, RawEntry> {
    let mut state = BTreeMap::new();
    for (i, op) in ops.iter().enumerate() {
        let seq = i as u64 + 1;
        match op {
            Op::Put { key, value } => {
                state.insert(
                    key.clone(),
                    RawEntry {
                        seq,
                        key: key.clone(),
                        value: value.clone(),
                    },
                );
            }
            Op::Del { key } => {
                state.remove(key);
            }
        }
    }
    state
}

/// Counters and fault switches shared by a store and all of its snapshots.
#[derive(Debug, Default)]
pub struct StoreProbe {
    closes: AtomicUsize,
    streams_opened: AtomicUsize,
    streams_dropped: AtomicUsize,
    fail_stream_after: Mutex<Option<usize>>,
    suspend: AtomicBool,
    fail_close: AtomicBool,
}

impl StoreProbe {
    /// Number of snapshots closed (first close only).
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    /// Number of diff streams dropped, whether exhausted or not.
    pub fn streams_dropped(&self) -> usize {
        self.streams_dropped.load(Ordering::SeqCst)
    }

    /// Make every stream opened from now on fail after yielding `n` records.
    pub fn fail_streams_after(&self, n: Option<usize>) {
        *self.fail_stream_after.lock().expect("lock poisoned") = n;
    }

    /// Make every stream opened from now on return `Pending` once before
    /// each record.
    pub fn suspend_streams(&self, suspend: bool) {
        self.suspend.store(suspend, Ordering::SeqCst);
    }

    /// Make `close()` report a failure (the snapshot is still closed).
    pub fn fail_closes(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }
}

struct StoreState {
    log: Arc<Vec<Op>>,
    confirmed_length: Option<Version>,
}

/// In-memory append-log store.
///
/// Intended for tests and embedding. The log is shared copy-on-write with
/// every snapshot, so snapshots stay pinned while the store appends to or
/// rewrites its unconfirmed suffix.
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    key_codec: CodecRef,
    value_codec: CodecRef,
    probe: Arc<StoreProbe>,
}

impl InMemoryStore {
    /// Create an empty store with a confirmed length of zero.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                log: Arc::new(Vec::new()),
                confirmed_length: Some(0),
            }),
            key_codec: Arc::new(BinaryCodec),
            value_codec: Arc::new(BinaryCodec),
            probe: Arc::new(StoreProbe::default()),
        }
    }

    /// Create a store that exposes no confirmed length at all.
    pub fn without_confirmed_length() -> Self {
        let store = Self::new();
        store.state.write().expect("lock poisoned").confirmed_length = None;
        store
    }

    /// Set the default codecs handed out with snapshots.
    pub fn with_encodings(mut self, key_codec: CodecRef, value_codec: CodecRef) -> Self {
        self.key_codec = key_codec;
        self.value_codec = value_codec;
        self
    }

    fn append(&self, op: Op) -> Version {
        let mut state = self.state.write().expect("lock poisoned");
        let log = Arc::make_mut(&mut state.log);
        log.push(op);
        log.len() as Version
    }

    /// Append a put. Returns the new version.
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Version {
        self.append(Op::Put {
            key: key.into(),
            value: Some(value.into()),
        })
    }

    /// Append a put whose value is explicitly absent.
    pub fn put_absent(&self, key: impl Into<Bytes>) -> Version {
        self.append(Op::Put {
            key: key.into(),
            value: None,
        })
    }

    /// Append a delete. Deleting a missing key still appends.
    pub fn del(&self, key: impl Into<Bytes>) -> Version {
        self.append(Op::Del { key: key.into() })
    }

    /// Append a put, encoding key and value with the store's codecs.
    pub fn put_value(&self, key: &Value, value: &Value) -> StoreResult<Version> {
        let key = self.key_codec.encode(key)?;
        let value = self.value_codec.encode(value)?;
        Ok(self.put(key, value))
    }

    /// Append a delete, encoding the key with the store's key codec.
    pub fn del_value(&self, key: &Value) -> StoreResult<Version> {
        let key = self.key_codec.encode(key)?;
        Ok(self.del(key))
    }

    /// Current history length.
    pub fn version(&self) -> Version {
        self.state.read().expect("lock poisoned").log.len() as Version
    }

    pub fn confirmed_length(&self) -> Option<Version> {
        self.state.read().expect("lock poisoned").confirmed_length
    }

    /// Advance the confirmed length. It never moves backwards.
    pub fn set_confirmed_length(&self, length: Version) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let available = state.log.len() as Version;
        if length > available {
            return Err(StoreError::ConfirmBeyondLength {
                requested: length,
                length: available,
            });
        }
        let current = state.confirmed_length.unwrap_or(0);
        state.confirmed_length = Some(current.max(length));
        Ok(())
    }

    /// Confirm the entire current history.
    pub fn confirm_all(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.confirmed_length = Some(state.log.len() as Version);
    }

    /// Drop the history suffix beyond `length`, as a relinearization does
    /// before re-applying the agreed order. The confirmed prefix is immutable.
    pub fn truncate(&self, length: Version) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let available = state.log.len() as Version;
        if length > available {
            return Err(StoreError::VersionOutOfRange {
                requested: length,
                available,
            });
        }
        if let Some(confirmed) = state.confirmed_length {
            if length < confirmed {
                return Err(StoreError::RewriteConfirmed {
                    requested: length,
                    confirmed,
                });
            }
        }
        Arc::make_mut(&mut state.log).truncate(length as usize);
        debug!(length, dropped = available - length, "history truncated");
        Ok(())
    }

    /// An independent writer sharing this store's history so far.
    pub fn fork(&self) -> Self {
        let state = self.state.read().expect("lock poisoned");
        Self {
            state: RwLock::new(StoreState {
                log: Arc::clone(&state.log),
                confirmed_length: state.confirmed_length,
            }),
            key_codec: Arc::clone(&self.key_codec),
            value_codec: Arc::clone(&self.value_codec),
            probe: Arc::new(StoreProbe::default()),
        }
    }

    /// Pin the current state.
    pub fn snapshot(&self) -> Arc<MemorySnapshot> {
        Arc::new(self.pin(true))
    }

    /// Pin the current state, but report it as still materializing until
    /// [`MemorySnapshot::mark_ready`] is called.
    pub fn pending_snapshot(&self) -> Arc<MemorySnapshot> {
        Arc::new(self.pin(false))
    }

    fn pin(&self, ready: bool) -> MemorySnapshot {
        let state = self.state.read().expect("lock poisoned");
        let version = state.log.len() as Version;
        MemorySnapshot {
            log: Arc::clone(&state.log),
            version,
            confirmed_length: state.confirmed_length.map(|c| c.min(version)),
            ready: AtomicBool::new(ready),
            closed: AtomicBool::new(false),
            key_codec: Arc::clone(&self.key_codec),
            value_codec: Arc::clone(&self.value_codec),
            probe: Arc::clone(&self.probe),
        }
    }

    /// Shared counters and fault switches.
    pub fn probe(&self) -> Arc<StoreProbe> {
        Arc::clone(&self.probe)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryStore")
            .field("version", &state.log.len())
            .field("confirmed_length", &state.confirmed_length)
            .finish()
    }
}

#[async_trait]
impl SnapshotSource for InMemoryStore {
    async fn current_snapshot(&self) -> StoreResult<SnapshotRef> {
        Ok(self.snapshot())
    }
}

/// A pinned view of an [`InMemoryStore`].
pub struct MemorySnapshot {
    log: Arc<Vec<Op>>,
    version: Version,
    confirmed_length: Option<Version>,
    ready: AtomicBool,
    closed: AtomicBool,
    key_codec: CodecRef,
    value_codec: CodecRef,
    probe: Arc<StoreProbe>,
}

impl MemorySnapshot {
    /// Finish materialization.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Look up one encoded key at this snapshot's version.
    pub fn get(&self, key: &[u8]) -> Option<RawEntry> {
        materialize(&self.log[..self.version as usize]).remove(key)
    }

    /// All entries at this snapshot's version, ascending by key.
    pub fn entries(&self) -> Vec<RawEntry> {
        materialize(&self.log[..self.version as usize])
            .into_values()
            .collect()
    }

    fn sibling(&self, version: Version) -> MemorySnapshot {
        MemorySnapshot {
            log: Arc::clone(&self.log),
            version,
            confirmed_length: self.confirmed_length.map(|c| c.min(version)),
            ready: AtomicBool::new(self.is_ready()),
            closed: AtomicBool::new(false),
            key_codec: Arc::clone(&self.key_codec),
            value_codec: Arc::clone(&self.value_codec),
            probe: Arc::clone(&self.probe),
        }
    }

    fn diff_records(
        &self,
        from_length: Version,
        range: &EncodedRange,
    ) -> StoreResult<Vec<ChangeRecord>> {
        let from = from_length as usize;
        let to = self.version as usize;
        let before = materialize(&self.log[..from]);
        let after = materialize(&self.log[..to]);

        let mut last_touch = BTreeMap::new();
        for (i, op) in self.log[from..to].iter().enumerate() {
            last_touch.insert(op.key().clone(), (from + i) as u64 + 1);
        }

        let keys: BTreeSet<&Bytes> = before
            .keys()
            .chain(after.keys())
            .filter(|k| range.contains(k))
            .collect();

        let mut records = Vec::new();
        for key in keys {
            let b = before.get(key);
            let a = after.get(key);
            if b == a {
                continue;
            }
            let seq = last_touch.get(key).copied().unwrap_or(self.version);
            records.push(ChangeRecord::new(seq, b.cloned(), a.cloned())?);
        }
        Ok(records)
    }
}

impl std::fmt::Debug for MemorySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySnapshot")
            .field("version", &self.version)
            .field("confirmed_length", &self.confirmed_length)
            .field("ready", &self.is_ready())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl VersionedSnapshot for MemorySnapshot {
    fn version(&self) -> Version {
        self.version
    }

    fn confirmed_length(&self) -> Option<Version> {
        self.confirmed_length
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn key_codec(&self) -> CodecRef {
        Arc::clone(&self.key_codec)
    }

    fn value_codec(&self) -> CodecRef {
        Arc::clone(&self.value_codec)
    }

    fn snapshot(&self) -> SnapshotRef {
        Arc::new(self.sibling(self.version))
    }

    fn checkout(&self, version: Version) -> StoreResult<SnapshotRef> {
        if version > self.version {
            return Err(StoreError::VersionOutOfRange {
                requested: version,
                available: self.version,
            });
        }
        Ok(Arc::new(self.sibling(version)))
    }

    fn create_diff_stream(
        &self,
        from_length: Version,
        range: &EncodedRange,
    ) -> StoreResult<ChangeStream> {
        if self.is_closed() {
            return Err(StoreError::SnapshotClosed(self.version));
        }
        if from_length > self.version {
            return Err(StoreError::VersionOutOfRange {
                requested: from_length,
                available: self.version,
            });
        }
        let records = self.diff_records(from_length, range)?;
        self.probe.streams_opened.fetch_add(1, Ordering::SeqCst);
        debug!(
            from_length,
            version = self.version,
            records = records.len(),
            "opened diff stream"
        );
        let stream = MemoryChangeStream {
            records: records.into(),
            yielded: 0,
            fail_after: *self.probe.fail_stream_after.lock().expect("lock poisoned"),
            suspend: self.probe.suspend.load(Ordering::SeqCst),
            parked: false,
            probe: Arc::clone(&self.probe),
        };
        Ok(stream.boxed())
    }

    fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail_close.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!(
                "failed to close snapshot at version {}",
                self.version
            )));
        }
        Ok(())
    }
}

/// Precomputed change records served one poll at a time.
struct MemoryChangeStream {
    records: VecDeque<ChangeRecord>,
    yielded: usize,
    fail_after: Option<usize>,
    suspend: bool,
    parked: bool,
    probe: Arc<StoreProbe>,
}

impl Stream for MemoryChangeStream {
    type Item = StoreResult<ChangeRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.suspend && !this.parked {
            this.parked = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        this.parked = false;

        if this.fail_after == Some(this.yielded) {
            this.fail_after = None;
            this.records.clear();
            return Poll::Ready(Some(Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "remote peer reset while reading",
            )))));
        }

        match this.records.pop_front() {
            Some(record) => {
                this.yielded += 1;
                Poll::Ready(Some(Ok(record)))
            }
            None => Poll::Ready(None),
        }
    }
}

impl Drop for MemoryChangeStream {
    fn drop(&mut self) {
        self.probe.streams_dropped.fetch_add(1, Ordering::SeqCst);
    }
}
