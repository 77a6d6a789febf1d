use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use lindiff_types::{Entry, RawEntry, Value};
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Encode/decode between logical [`Value`]s and stored bytes.
///
/// Implementations must be deterministic: the same value always encodes to
/// the same bytes. Range bounds rely on this to line up with stored keys.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    fn encode(&self, value: &Value) -> CodecResult<Bytes>;

    fn decode(&self, bytes: &Bytes) -> CodecResult<Value>;
}

/// Shared handle to a codec.
pub type CodecRef = Arc<dyn Codec>;

/// Identity codec. Keys and values stay raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn name(&self) -> &str {
        "binary"
    }

    fn encode(&self, value: &Value) -> CodecResult<Bytes> {
        match value {
            Value::Binary(b) => Ok(b.clone()),
            Value::Text(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Value::Json(_) => Err(CodecError::UnsupportedValue {
                codec: "binary",
                variant: "json",
            }),
        }
    }

    fn decode(&self, bytes: &Bytes) -> CodecResult<Value> {
        Ok(Value::Binary(bytes.clone()))
    }
}

/// UTF-8 text codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    fn name(&self) -> &str {
        "utf-8"
    }

    fn encode(&self, value: &Value) -> CodecResult<Bytes> {
        match value {
            Value::Text(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Value::Json(serde_json::Value::String(s)) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Value::Binary(b) => {
                std::str::from_utf8(b)?;
                Ok(b.clone())
            }
            Value::Json(_) => Err(CodecError::UnsupportedValue {
                codec: "utf-8",
                variant: "json",
            }),
        }
    }

    fn decode(&self, bytes: &Bytes) -> CodecResult<Value> {
        Ok(Value::Text(std::str::from_utf8(bytes)?.to_string()))
    }
}

/// Structured codec storing values as JSON documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn encode(&self, value: &Value) -> CodecResult<Bytes> {
        let encoded = match value {
            Value::Json(v) => serde_json::to_vec(v)?,
            Value::Text(s) => serde_json::to_vec(s)?,
            Value::Binary(_) => {
                return Err(CodecError::UnsupportedValue {
                    codec: "json",
                    variant: "binary",
                })
            }
        };
        Ok(Bytes::from(encoded))
    }

    fn decode(&self, bytes: &Bytes) -> CodecResult<Value> {
        Ok(Value::Json(serde_json::from_slice(bytes)?))
    }
}

/// Named built-in encodings, as they appear in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "json")]
    Json,
}

impl Encoding {
    pub fn codec(self) -> CodecRef {
        match self {
            Self::Binary => Arc::new(BinaryCodec),
            Self::Utf8 => Arc::new(Utf8Codec),
            Self::Json => Arc::new(JsonCodec),
        }
    }
}

/// Decode a stored entry with the given key and value codecs.
///
/// An explicitly absent value decodes to `None`; key and seq are kept.
pub fn decode_entry(
    key_codec: &dyn Codec,
    value_codec: &dyn Codec,
    raw: &RawEntry,
) -> CodecResult<Entry> {
    let value = match &raw.value {
        Some(bytes) => Some(value_codec.decode(bytes)?),
        None => None,
    };
    Ok(Entry {
        seq: raw.seq,
        key: key_codec.decode(&raw.key)?,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binary_is_identity() {
        let codec = BinaryCodec;
        let bytes = Bytes::from_static(&[0, 1, 255]);
        assert_eq!(codec.decode(&bytes).unwrap(), Value::Binary(bytes.clone()));
        assert_eq!(codec.encode(&Value::Binary(bytes.clone())).unwrap(), bytes);
    }

    #[test]
    fn utf8_rejects_invalid_bytes() {
        let codec = Utf8Codec;
        let err = codec.decode(&Bytes::from_static(&[0xff, 0xfe])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
        let err = codec.encode(&Value::from(vec![0xff])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
    }

    #[test]
    fn utf8_cannot_encode_structured() {
        let err = Utf8Codec.encode(&Value::from(json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedValue { codec: "utf-8", .. }));
    }

    #[test]
    fn json_encodes_text_as_string_document() {
        let encoded = JsonCodec.encode(&Value::from("x")).unwrap();
        assert_eq!(encoded.as_ref(), br#""x""#);
        assert_eq!(JsonCodec.decode(&encoded).unwrap(), Value::from(json!("x")));
    }

    #[test]
    fn encoding_names() {
        let e: Encoding = serde_json::from_str(r#""utf-8""#).unwrap();
        assert_eq!(e, Encoding::Utf8);
        let e: Encoding = serde_json::from_str(r#""utf8""#).unwrap();
        assert_eq!(e, Encoding::Utf8);
        assert_eq!(Encoding::Json.codec().name(), "json");
        assert_eq!(Encoding::default().codec().name(), "binary");
    }

    #[test]
    fn decode_entry_keeps_absent_value() {
        let raw = RawEntry::absent(9, "k");
        let entry = decode_entry(&Utf8Codec, &JsonCodec, &raw).unwrap();
        assert_eq!(entry.seq, 9);
        assert_eq!(entry.key, Value::from("k"));
        assert!(entry.value.is_none());
    }

    #[test]
    fn decode_entry_propagates_value_errors() {
        let raw = RawEntry::new(1, "k", "not json");
        assert!(decode_entry(&Utf8Codec, &JsonCodec, &raw).is_err());
    }
}
