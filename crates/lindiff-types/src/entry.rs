//! Encoded entries and change records.
//!
//! These are the store-facing types. Keys and values are opaque bytes and
//! all comparisons on this side of the boundary are byte comparisons.

use std::fmt;

use bytes::Bytes;

use crate::error::TypeError;
use crate::Seq;

/// A key/value pair as stored, before any codec is applied.
///
/// `value == None` means the key exists with an explicitly absent value.
/// That is distinct from the key being absent altogether, which is modelled
/// by the surrounding `Option<RawEntry>` being `None`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawEntry {
    /// Sequence number of the append that wrote this entry.
    pub seq: Seq,
    pub key: Bytes,
    pub value: Option<Bytes>,
}

impl RawEntry {
    pub fn new(seq: Seq, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            seq,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// An entry whose key is present but whose value is explicitly absent.
    pub fn absent(seq: Seq, key: impl Into<Bytes>) -> Self {
        Self {
            seq,
            key: key.into(),
            value: None,
        }
    }

    /// Returns `true` if both sides describe the same encoded content.
    ///
    /// Two missing entries are equal; a missing entry never equals a present
    /// one, even one with an explicitly absent value. Sequence numbers are
    /// ignored.
    pub fn same_content(a: Option<&RawEntry>, b: Option<&RawEntry>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => a.value == b.value,
            _ => false,
        }
    }
}

impl fmt::Debug for RawEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEntry")
            .field("seq", &self.seq)
            .field("key", &hex::encode(&self.key))
            .field("value", &self.value.as_ref().map(hex::encode))
            .finish()
    }
}

/// One key's change within a directional diff stream.
///
/// `before` is the entry at the stream's starting length, `after` is the
/// entry at the snapshot's own version. A stream carries at most one record
/// per key and yields records in ascending key order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub seq: Seq,
    key: Bytes,
    pub before: Option<RawEntry>,
    pub after: Option<RawEntry>,
}

impl ChangeRecord {
    /// Build a record, checking that it describes exactly one key.
    pub fn new(
        seq: Seq,
        before: Option<RawEntry>,
        after: Option<RawEntry>,
    ) -> Result<Self, TypeError> {
        let key = match (&before, &after) {
            (None, None) => return Err(TypeError::EmptyChange),
            (Some(b), Some(a)) if b.key != a.key => {
                return Err(TypeError::KeyMismatch {
                    before: hex::encode(&b.key),
                    after: hex::encode(&a.key),
                })
            }
            (_, Some(entry)) | (Some(entry), None) => entry.key.clone(),
        };
        Ok(Self {
            seq,
            key,
            before,
            after,
        })
    }

    /// The encoded key this record is about.
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// Returns `true` if before and after carry the same encoded value.
    pub fn is_noop(&self) -> bool {
        RawEntry::same_content(self.before.as_ref(), self.after.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_ignores_seq() {
        let a = RawEntry::new(1, "k", "v");
        let b = RawEntry::new(7, "k", "v");
        assert!(RawEntry::same_content(Some(&a), Some(&b)));
    }

    #[test]
    fn absent_value_is_not_deletion() {
        let absent = RawEntry::absent(3, "k");
        assert!(!RawEntry::same_content(Some(&absent), None));
        assert!(RawEntry::same_content(None, None));
    }

    #[test]
    fn absent_value_differs_from_empty_bytes() {
        let absent = RawEntry::absent(3, "k");
        let empty = RawEntry::new(3, "k", "");
        assert!(!RawEntry::same_content(Some(&absent), Some(&empty)));
    }

    #[test]
    fn record_key_prefers_after() {
        let rec = ChangeRecord::new(2, None, Some(RawEntry::new(2, "b", "x"))).unwrap();
        assert_eq!(rec.key().as_ref(), b"b");

        let rec = ChangeRecord::new(2, Some(RawEntry::new(1, "a", "x")), None).unwrap();
        assert_eq!(rec.key().as_ref(), b"a");
    }

    #[test]
    fn empty_record_rejected() {
        assert_eq!(ChangeRecord::new(1, None, None), Err(TypeError::EmptyChange));
    }

    #[test]
    fn mismatched_keys_rejected() {
        let err = ChangeRecord::new(
            1,
            Some(RawEntry::new(1, "a", "x")),
            Some(RawEntry::new(2, "b", "x")),
        )
        .unwrap_err();
        assert!(matches!(err, TypeError::KeyMismatch { .. }));
    }

    #[test]
    fn noop_detection() {
        let rec = ChangeRecord::new(
            4,
            Some(RawEntry::new(1, "a", "x")),
            Some(RawEntry::new(4, "a", "x")),
        )
        .unwrap();
        assert!(rec.is_noop());
    }
}
