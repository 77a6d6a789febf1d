//! Key/value codecs and range encoding for lindiff.
//!
//! Stores order keys by their encoded bytes, and the merge-join compares
//! encoded bytes too, so codecs only matter at two points: when logical
//! range bounds are encoded before being handed to a store, and when emitted
//! results are decoded for the consumer.
//!
//! Built-in codecs are [`BinaryCodec`], [`Utf8Codec`] and [`JsonCodec`].
//! Anything implementing [`Codec`] can be plugged in as a custom codec.

pub mod codec;
pub mod error;
pub mod range;

pub use codec::{decode_entry, BinaryCodec, Codec, CodecRef, Encoding, JsonCodec, Utf8Codec};
pub use error::{CodecError, CodecResult};
pub use range::{EncodedRange, RangeOptions};
