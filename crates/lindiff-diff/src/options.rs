use lindiff_codec::{CodecRef, Encoding, RangeOptions};
use lindiff_types::Value;
use serde::{Deserialize, Serialize};

/// Serializable diff configuration.
///
/// Loadable from any serde format. Unset encodings fall back to the old
/// snapshot's codecs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Close both input snapshots when the diff ends.
    pub close_snapshots: bool,
    pub key_encoding: Option<Encoding>,
    pub value_encoding: Option<Encoding>,
    pub range: RangeOptions,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            close_snapshots: true,
            key_encoding: None,
            value_encoding: None,
            range: RangeOptions::default(),
        }
    }
}

/// Runtime options for [`DiffStream`](crate::DiffStream).
#[derive(Clone, Debug)]
pub struct DiffOptions {
    pub key_codec: Option<CodecRef>,
    pub value_codec: Option<CodecRef>,
    pub range: RangeOptions,
    pub close_snapshots: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            key_codec: None,
            value_codec: None,
            range: RangeOptions::default(),
            close_snapshots: true,
        }
    }
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DiffConfig) -> Self {
        Self {
            key_codec: config.key_encoding.map(Encoding::codec),
            value_codec: config.value_encoding.map(Encoding::codec),
            range: config.range.clone(),
            close_snapshots: config.close_snapshots,
        }
    }

    pub fn key_codec(mut self, codec: CodecRef) -> Self {
        self.key_codec = Some(codec);
        self
    }

    pub fn value_codec(mut self, codec: CodecRef) -> Self {
        self.value_codec = Some(codec);
        self
    }

    pub fn key_encoding(self, encoding: Encoding) -> Self {
        self.key_codec(encoding.codec())
    }

    pub fn value_encoding(self, encoding: Encoding) -> Self {
        self.value_codec(encoding.codec())
    }

    pub fn range(mut self, range: RangeOptions) -> Self {
        self.range = range;
        self
    }

    pub fn gt(mut self, key: impl Into<Value>) -> Self {
        self.range = self.range.gt(key);
        self
    }

    pub fn gte(mut self, key: impl Into<Value>) -> Self {
        self.range = self.range.gte(key);
        self
    }

    pub fn lt(mut self, key: impl Into<Value>) -> Self {
        self.range = self.range.lt(key);
        self
    }

    pub fn lte(mut self, key: impl Into<Value>) -> Self {
        self.range = self.range.lte(key);
        self
    }

    pub fn close_snapshots(mut self, close: bool) -> Self {
        self.close_snapshots = close;
        self
    }
}
