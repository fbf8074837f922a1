//! # fuelkv Codec
//!
//! Binary record encoding for fuelkv stores.
//!
//! Every value written to a mapped or relational store, and the mapped
//! store's own index, goes through this codec. The format is a strict
//! subset of CBOR:
//!
//! - Maps are sorted by key (length-first, then bytewise on encoded keys)
//! - Integers use shortest encoding
//! - Floats are 8-byte doubles
//! - Strings must be UTF-8
//! - No indefinite-length items, no tags
//!
//! ## Usage
//!
//! ```
//! use fuelkv_codec::{decode_record, encode_record, Value};
//!
//! let value = Value::from(vec![1.0f64, 2.0]);
//! let bytes = encode_record(&value).unwrap();
//! assert_eq!(decode_record(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode_record, RecordDecoder};
pub use encoder::{encode_record, RecordEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Types that can be written as a record.
pub trait Encode {
    /// Encode this value to record bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Types that can be read back from a record.
pub trait Decode: Sized {
    /// Decode this value from record bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_record(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_record(bytes)
    }
}
