//! Logical range bounds and their encoded form.

use bytes::Bytes;
use lindiff_types::Value;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::CodecResult;

/// Range bounds expressed as logical keys.
///
/// Any combination may be set; a key is in range only if it satisfies every
/// bound that is present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeOptions {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, key: impl Into<Value>) -> Self {
        self.gt = Some(key.into());
        self
    }

    pub fn gte(mut self, key: impl Into<Value>) -> Self {
        self.gte = Some(key.into());
        self
    }

    pub fn lt(mut self, key: impl Into<Value>) -> Self {
        self.lt = Some(key.into());
        self
    }

    pub fn lte(mut self, key: impl Into<Value>) -> Self {
        self.lte = Some(key.into());
        self
    }

    /// Encode every present bound with `codec`.
    pub fn encode(&self, codec: &dyn Codec) -> CodecResult<EncodedRange> {
        let enc = |bound: &Option<Value>| bound.as_ref().map(|v| codec.encode(v)).transpose();
        Ok(EncodedRange {
            gt: enc(&self.gt)?,
            gte: enc(&self.gte)?,
            lt: enc(&self.lt)?,
            lte: enc(&self.lte)?,
        })
    }
}

/// Range bounds over encoded keys, compared as unsigned bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedRange {
    pub gt: Option<Bytes>,
    pub gte: Option<Bytes>,
    pub lt: Option<Bytes>,
    pub lte: Option<Bytes>,
}

impl EncodedRange {
    /// A range with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Returns `true` if `key` satisfies every present bound.
    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(ref gt) = self.gt {
            if key <= gt.as_ref() {
                return false;
            }
        }
        if let Some(ref gte) = self.gte {
            if key < gte.as_ref() {
                return false;
            }
        }
        if let Some(ref lt) = self.lt {
            if key >= lt.as_ref() {
                return false;
            }
        }
        if let Some(ref lte) = self.lte {
            if key > lte.as_ref() {
                return false;
            }
        }
        true
    }
}
