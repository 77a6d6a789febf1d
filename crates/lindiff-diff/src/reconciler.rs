//! Merge-join reconciliation of two directional change streams.
//!
//! The undo stream comes from the old snapshot and the apply stream from the
//! new one, both diffed against the same confirmed checkpoint. The checkpoint
//! acts as the common ancestor of a three-way merge:
//!
//! - a key only in the apply stream changed only on the new branch;
//! - a key only in the undo stream changed only on the old branch and has to
//!   be rolled back to its checkpoint value;
//! - a key in both changed on both branches, and the new branch's current
//!   value wins unless both branches ended up with the same bytes.
//!
//! Candidates whose encoded new and old values are equal are dropped. All
//! comparisons are on encoded bytes; decoding only happens on emission.

use std::cmp::Ordering;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use lindiff_codec::{decode_entry, CodecRef};
use lindiff_store::{ChangeStream, StoreResult};
use lindiff_types::{ChangeRecord, DiffEntry, RawEntry};
use tracing::trace;

use crate::error::{DiffError, DiffResult, Side};

/// Counters describing what the merge has done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries handed to the consumer.
    pub emitted: u64,
    /// Keys changed on both branches that converged on the same value.
    pub converged: u64,
    /// Candidates dropped because new and old values were identical.
    pub identical: u64,
}

/// One input stream plus its single buffered record.
///
/// `pending` and `done` are the complete resumable state of a side: a
/// `Pending` poll never loses a record.
struct Cursor {
    side: Side,
    stream: ChangeStream,
    pending: Option<ChangeRecord>,
    last_key: Option<Bytes>,
    done: bool,
}

impl Cursor {
    fn new(side: Side, stream: ChangeStream) -> Self {
        Self {
            side,
            stream,
            pending: None,
            last_key: None,
            done: false,
        }
    }

    /// Make sure a record is buffered unless the stream is exhausted.
    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<DiffResult<()>> {
        if self.pending.is_some() || self.done {
            return Poll::Ready(Ok(()));
        }
        let next: Option<StoreResult<ChangeRecord>> = ready!(self.stream.poll_next_unpin(cx));
        match next {
            Some(Ok(record)) => {
                if let Some(ref last) = self.last_key {
                    if record.key() <= last {
                        self.done = true;
                        return Poll::Ready(Err(DiffError::OutOfOrder { side: self.side }));
                    }
                }
                self.last_key = Some(record.key().clone());
                self.pending = Some(record);
            }
            Some(Err(err)) => {
                self.done = true;
                return Poll::Ready(Err(err.into()));
            }
            None => self.done = true,
        }
        Poll::Ready(Ok(()))
    }

    fn take(&mut self) -> Option<ChangeRecord> {
        self.pending.take()
    }
}

/// Linear merge-join over an undo stream and an apply stream.
///
/// Yields decoded [`DiffEntry`] values in strictly ascending encoded-key
/// order. After the first error the merge is finished and yields `None`.
pub struct MergeJoin {
    undo: Cursor,
    apply: Cursor,
    key_codec: CodecRef,
    value_codec: CodecRef,
    stats: MergeStats,
    finished: bool,
}

impl MergeJoin {
    pub fn new(
        undo: ChangeStream,
        apply: ChangeStream,
        key_codec: CodecRef,
        value_codec: CodecRef,
    ) -> Self {
        Self {
            undo: Cursor::new(Side::Old, undo),
            apply: Cursor::new(Side::New, apply),
            key_codec,
            value_codec,
            stats: MergeStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Pick the next candidate `(new, old)` pair, or `None` when both sides
    /// are exhausted. Both cursors must already be filled.
    fn next_candidate(&mut self) -> Option<Candidate> {
        let order = match (&self.undo.pending, &self.apply.pending) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(u), Some(a)) => u.key().cmp(a.key()),
        };
        match order {
            Ordering::Less => {
                let rec = self.undo.take()?;
                Some(Candidate::Pair {
                    new: rec.before,
                    old: rec.after,
                })
            }
            Ordering::Greater => {
                let rec = self.apply.take()?;
                Some(Candidate::Pair {
                    new: rec.after,
                    old: rec.before,
                })
            }
            Ordering::Equal => {
                let undo = self.undo.take()?;
                let apply = self.apply.take()?;
                if RawEntry::same_content(undo.after.as_ref(), apply.after.as_ref()) {
                    return Some(Candidate::Converged(apply));
                }
                Some(Candidate::Pair {
                    new: apply.after,
                    old: undo.after,
                })
            }
        }
    }

    fn decode(&self, new: Option<RawEntry>, old: Option<RawEntry>) -> DiffResult<DiffEntry> {
        let decode = |raw: Option<RawEntry>| {
            raw.map(|raw| decode_entry(&*self.key_codec, &*self.value_codec, &raw))
                .transpose()
        };
        Ok(DiffEntry {
            new_state: decode(new)?,
            old_state: decode(old)?,
        })
    }
}

enum Candidate {
    Pair {
        new: Option<RawEntry>,
        old: Option<RawEntry>,
    },
    Converged(ChangeRecord),
}

impl Stream for MergeJoin {
    type Item = DiffResult<DiffEntry>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.finished {
                return Poll::Ready(None);
            }
            let filled = match ready!(this.undo.poll_fill(cx)) {
                Ok(()) => ready!(this.apply.poll_fill(cx)),
                Err(err) => Err(err),
            };
            if let Err(err) = filled {
                this.finished = true;
                return Poll::Ready(Some(Err(err)));
            }

            let (new, old) = match this.next_candidate() {
                None => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Candidate::Converged(record)) => {
                    this.stats.converged += 1;
                    trace!(key = ?record.key(), "branches converged, skipping");
                    continue;
                }
                Some(Candidate::Pair { new, old }) => (new, old),
            };

            if RawEntry::same_content(new.as_ref(), old.as_ref()) {
                this.stats.identical += 1;
                let key = new.as_ref().or(old.as_ref()).map(|e| &e.key);
                trace!(key = ?key, "identical value, skipping");
                continue;
            }

            return match this.decode(new, old) {
                Ok(entry) => {
                    this.stats.emitted += 1;
                    Poll::Ready(Some(Ok(entry)))
                }
                Err(err) => {
                    this.finished = true;
                    Poll::Ready(Some(Err(err)))
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::stream;
    use lindiff_codec::{BinaryCodec, JsonCodec, Utf8Codec};
    use lindiff_store::StoreError;
    use lindiff_types::{Entry, Value};
    use std::sync::Arc;

    fn put(seq: u64, key: &str, value: &str) -> Option<RawEntry> {
        Some(RawEntry::new(seq, key.to_string(), value.to_string()))
    }

    fn rec(seq: u64, before: Option<RawEntry>, after: Option<RawEntry>) -> ChangeRecord {
        ChangeRecord::new(seq, before, after).unwrap()
    }

    fn from_records(records: Vec<ChangeRecord>) -> ChangeStream {
        stream::iter(records.into_iter().map(Ok)).boxed()
    }

    fn merge(undo: Vec<ChangeRecord>, apply: Vec<ChangeRecord>) -> MergeJoin {
        MergeJoin::new(
            from_records(undo),
            from_records(apply),
            Arc::new(Utf8Codec),
            Arc::new(Utf8Codec),
        )
    }

    fn run(mut join: MergeJoin) -> (Vec<DiffEntry>, MergeStats) {
        let out = block_on(async {
            let mut out = Vec::new();
            while let Some(item) = join.next().await {
                out.push(item.unwrap());
            }
            out
        });
        (out, join.stats())
    }

    fn text(seq: u64, key: &str, value: &str) -> Option<Entry> {
        Some(Entry {
            seq,
            key: Value::from(key),
            value: Some(Value::from(value)),
        })
    }

    #[test]
    fn both_empty_yields_nothing() {
        let (out, stats) = run(merge(vec![], vec![]));
        assert!(out.is_empty());
        assert_eq!(stats, MergeStats::default());
    }

    #[test]
    fn apply_only_is_forward_diff() {
        let apply = vec![
            rec(1, None, put(1, "a", "1")),
            rec(2, put(0, "b", "x"), None),
        ];
        let (out, _) = run(merge(vec![], apply));
        assert_eq!(
            out,
            vec![
                DiffEntry {
                    new_state: text(1, "a", "1"),
                    old_state: None,
                },
                DiffEntry {
                    new_state: None,
                    old_state: text(0, "b", "x"),
                },
            ]
        );
    }

    #[test]
    fn undo_only_rolls_back_to_checkpoint() {
        let undo = vec![rec(3, put(1, "k", "v1"), put(3, "k", "v2"))];
        let (out, _) = run(merge(undo, vec![]));
        assert_eq!(
            out,
            vec![DiffEntry {
                new_state: text(1, "k", "v1"),
                old_state: text(3, "k", "v2"),
            }]
        );
    }

    #[test]
    fn undo_of_creation_is_removal() {
        let undo = vec![rec(2, None, put(2, "k", "v"))];
        let (out, _) = run(merge(undo, vec![]));
        assert_eq!(out[0].new_state, None);
        assert_eq!(out[0].old_state, text(2, "k", "v"));
    }

    #[test]
    fn both_changed_new_branch_wins_against_old_value() {
        let undo = vec![rec(2, put(1, "k", "v1"), put(2, "k", "v2"))];
        let apply = vec![rec(3, put(1, "k", "v1"), put(3, "k", "v3"))];
        let (out, _) = run(merge(undo, apply));
        assert_eq!(
            out,
            vec![DiffEntry {
                new_state: text(3, "k", "v3"),
                old_state: text(2, "k", "v2"),
            }]
        );
    }

    #[test]
    fn both_changed_to_same_value_converges() {
        let undo = vec![rec(2, put(1, "x", "a"), put(2, "x", "final"))];
        let apply = vec![rec(5, put(1, "x", "a"), put(5, "x", "final"))];
        let (out, stats) = run(merge(undo, apply));
        assert!(out.is_empty());
        assert_eq!(stats.converged, 1);
    }

    #[test]
    fn both_deleted_converges() {
        let undo = vec![rec(2, put(1, "x", "a"), None)];
        let apply = vec![rec(4, put(1, "x", "a"), None)];
        let (out, stats) = run(merge(undo, apply));
        assert!(out.is_empty());
        assert_eq!(stats.converged, 1);
    }

    #[test]
    fn deleted_on_new_branch_only() {
        let undo = vec![rec(2, put(1, "x", "a"), put(2, "x", "b"))];
        let apply = vec![rec(4, put(1, "x", "a"), None)];
        let (out, _) = run(merge(undo, apply));
        assert_eq!(out[0].new_state, None);
        assert_eq!(out[0].old_state, text(2, "x", "b"));
    }

    #[test]
    fn identical_values_with_different_seq_are_dropped() {
        let apply = vec![rec(2, put(1, "k", "same"), put(2, "k", "same"))];
        let (out, stats) = run(merge(vec![], apply));
        assert!(out.is_empty());
        assert_eq!(stats.identical, 1);
    }

    #[test]
    fn interleaved_keys_stay_ordered() {
        let undo = vec![
            rec(5, put(1, "b", "1"), put(5, "b", "2")),
            rec(6, None, put(6, "d", "1")),
        ];
        let apply = vec![
            rec(7, None, put(7, "a", "1")),
            rec(8, put(1, "b", "1"), put(8, "b", "3")),
            rec(9, None, put(9, "c", "1")),
        ];
        let (out, stats) = run(merge(undo, apply));
        let keys: Vec<_> = out
            .iter()
            .map(|d| d.key().and_then(Value::as_text).unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
        assert_eq!(stats.emitted, 4);
    }

    #[test]
    fn absent_value_decodes_to_none_but_is_a_change() {
        let apply = vec![rec(2, put(1, "k", ""), Some(RawEntry::absent(2, "k")))];
        let (out, _) = run(merge(vec![], apply));
        assert_eq!(out.len(), 1);
        let new = out[0].new_state.as_ref().unwrap();
        assert_eq!(new.key, Value::from("k"));
        assert!(new.value.is_none());
    }

    #[test]
    fn store_error_is_propagated_and_terminates() {
        let apply: ChangeStream = stream::iter(vec![
            Ok(rec(1, None, put(1, "a", "1"))),
            Err(StoreError::Backend("disk gone".into())),
            Ok(rec(2, None, put(2, "b", "1"))),
        ])
        .boxed();
        let mut join = MergeJoin::new(
            from_records(vec![]),
            apply,
            Arc::new(Utf8Codec),
            Arc::new(Utf8Codec),
        );
        block_on(async {
            assert!(join.next().await.unwrap().is_ok());
            let err = join.next().await.unwrap().unwrap_err();
            assert!(matches!(err, DiffError::Store(StoreError::Backend(_))));
            assert!(join.next().await.is_none());
        });
    }

    #[test]
    fn unordered_input_is_rejected() {
        let apply = vec![
            rec(1, None, put(1, "b", "1")),
            rec(2, None, put(2, "a", "1")),
        ];
        let mut join = merge(vec![], apply);
        block_on(async {
            assert!(join.next().await.unwrap().is_ok());
            let err = join.next().await.unwrap().unwrap_err();
            assert!(matches!(err, DiffError::OutOfOrder { side: Side::New }));
        });
    }

    #[test]
    fn decode_failure_surfaces_as_codec_error() {
        let apply = vec![rec(1, None, put(1, "a", "not json"))];
        let mut join = MergeJoin::new(
            from_records(vec![]),
            from_records(apply),
            Arc::new(Utf8Codec),
            Arc::new(JsonCodec),
        );
        block_on(async {
            let err = join.next().await.unwrap().unwrap_err();
            assert!(matches!(err, DiffError::Codec(_)));
        });
    }

    #[test]
    fn comparison_is_unsigned_bytes() {
        let apply = vec![
            rec(1, None, Some(RawEntry::new(1, vec![0x7f], "x"))),
            rec(2, None, Some(RawEntry::new(2, vec![0x80], "x"))),
        ];
        let undo = vec![rec(3, None, Some(RawEntry::new(3, vec![0x00], "x")))];
        let join = MergeJoin::new(
            from_records(undo),
            from_records(apply),
            Arc::new(BinaryCodec),
            Arc::new(BinaryCodec),
        );
        let (out, _) = run(join);
        let keys: Vec<_> = out
            .iter()
            .map(|d| d.key().and_then(Value::as_bytes).unwrap().to_vec())
            .collect();
        assert_eq!(keys, vec![vec![0x00], vec![0x7f], vec![0x80]]);
    }
}
