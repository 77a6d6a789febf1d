//! Property tests: the merge-join against a brute-force state comparison.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use futures::executor::block_on;
use lindiff_codec::{BinaryCodec, RangeOptions};
use lindiff_store::{InMemoryStore, MemorySnapshot, SnapshotRef};
use lindiff_types::{DiffEntry, Entry, RawEntry, Value};
use proptest::prelude::*;

use crate::{DiffOptions, DiffStream};

#[derive(Clone, Debug)]
enum Op {
    Put(u8, u8),
    Absent(u8),
    Del(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..6u8, 0..3u8).prop_map(|(k, v)| Op::Put(k, v)),
        1 => (0..6u8).prop_map(Op::Absent),
        2 => (0..6u8).prop_map(Op::Del),
    ]
}

fn key(k: u8) -> Bytes {
    Bytes::from(vec![b'k', k])
}

fn apply(store: &InMemoryStore, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Put(k, v) => store.put(key(k), vec![v]),
            Op::Absent(k) => store.put_absent(key(k)),
            Op::Del(k) => store.del(key(k)),
        };
    }
}

/// Two writers forked from a shared, partly confirmed history.
#[derive(Clone, Debug)]
struct Forks {
    base: Vec<Op>,
    confirmed: usize,
    left: Vec<Op>,
    right: Vec<Op>,
    right_replays_left: bool,
}

fn forks() -> impl Strategy<Value = Forks> {
    (
        prop::collection::vec(op(), 0..8),
        0..8usize,
        prop::collection::vec(op(), 0..8),
        prop::collection::vec(op(), 0..8),
        any::<bool>(),
    )
        .prop_map(|(base, confirmed, left, right, right_replays_left)| Forks {
            confirmed: confirmed.min(base.len()),
            base,
            left,
            right,
            right_replays_left,
        })
}

impl Forks {
    fn build(&self) -> (Arc<MemorySnapshot>, Arc<MemorySnapshot>) {
        let base = InMemoryStore::new();
        apply(&base, &self.base);
        base.set_confirmed_length(self.confirmed as u64).unwrap();

        let left = base.fork();
        apply(&left, &self.left);
        let right = base.fork();
        if self.right_replays_left {
            apply(&right, &self.left);
        }
        apply(&right, &self.right);
        (left.snapshot(), right.snapshot())
    }
}

fn run(old: SnapshotRef, new: SnapshotRef, options: DiffOptions) -> Vec<DiffEntry> {
    let options = options.close_snapshots(false);
    block_on(DiffStream::open(old, new, options).unwrap().collect_all()).unwrap()
}

fn decode(raw: Option<RawEntry>) -> Option<Entry> {
    raw.map(|raw| Entry {
        seq: raw.seq,
        key: Value::Binary(raw.key),
        value: raw.value.map(Value::Binary),
    })
}

/// Every key whose content differs, compared directly on the two states.
fn brute_force(old: &MemorySnapshot, new: &MemorySnapshot) -> Vec<DiffEntry> {
    let keys: BTreeSet<Bytes> = old
        .entries()
        .into_iter()
        .chain(new.entries())
        .map(|e| e.key)
        .collect();
    keys.into_iter()
        .filter_map(|k| {
            let before = old.get(&k);
            let after = new.get(&k);
            if RawEntry::same_content(before.as_ref(), after.as_ref()) {
                return None;
            }
            Some(DiffEntry {
                new_state: decode(after),
                old_state: decode(before),
            })
        })
        .collect()
}

proptest! {
    #[test]
    fn matches_brute_force(forks in forks()) {
        let (old, new) = forks.build();
        let out = run(old.clone(), new.clone(), DiffOptions::new());
        prop_assert_eq!(out, brute_force(&old, &new));
    }

    #[test]
    fn swapping_inputs_swaps_entries(forks in forks()) {
        let (old, new) = forks.build();
        let forward = run(old.clone(), new.clone(), DiffOptions::new());
        let backward: Vec<DiffEntry> = run(new, old, DiffOptions::new())
            .into_iter()
            .map(DiffEntry::swapped)
            .collect();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn snapshot_against_itself_is_empty(forks in forks()) {
        let (old, _) = forks.build();
        prop_assert!(run(old.clone(), old, DiffOptions::new()).is_empty());
    }

    #[test]
    fn range_only_narrows(forks in forks(), lo in 0..6u8, width in 0..6u8) {
        let (old, new) = forks.build();
        let hi = lo.saturating_add(width);
        let range = RangeOptions::new().gte(key(lo)).lt(key(hi));
        let encoded = range.encode(&BinaryCodec).unwrap();

        let out = run(old.clone(), new.clone(), DiffOptions::new().range(range));
        let expected: Vec<DiffEntry> = brute_force(&old, &new)
            .into_iter()
            .filter(|d| {
                let k = d.key().and_then(Value::as_bytes).unwrap_or_default();
                encoded.contains(k)
            })
            .collect();
        prop_assert_eq!(out, expected);
    }
}
