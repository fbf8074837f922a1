//! Record encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{cmp_encoded, Value};

/// Maximum nesting depth of arrays and maps.
pub(crate) const MAX_DEPTH: usize = 256;

/// Encode a value to record bytes.
///
/// Output is deterministic:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - Floats are always written as 8-byte doubles
/// - No indefinite-length items
///
/// # Errors
///
/// Returns an error if the value nests deeper than the supported limit.
pub fn encode_record(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = RecordEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A record encoder writing into an owned buffer.
pub struct RecordEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl RecordEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::Bytes(b) => {
                self.encode_unsigned(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.encode_unsigned(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(arr) => return self.nested(|enc| enc.encode_array(arr)),
            Value::Map(pairs) => return self.nested(|enc| enc.encode_map(pairs)),
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> CodecResult<()>) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::encoding_failed(format!(
                "nesting deeper than {MAX_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // -1 encodes as 0, -2 as 1, and so on.
            self.encode_unsigned(1, (-(n + 1)) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_array(&mut self, arr: &[Value]) -> CodecResult<()> {
        self.encode_unsigned(4, arr.len() as u64);
        for item in arr {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut encoded_pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(pairs.len());

        for (key, value) in pairs {
            let mut key_encoder = RecordEncoder::new();
            key_encoder.depth = self.depth;
            key_encoder.encode(key)?;
            encoded_pairs.push((key_encoder.into_bytes(), value));
        }

        encoded_pairs.sort_by(|a, b| cmp_encoded(&a.0, &b.0));
        if encoded_pairs.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CodecError::encoding_failed("duplicate map key"));
        }

        self.encode_unsigned(5, pairs.len() as u64);
        for (encoded_key, value) in encoded_pairs {
            self.buffer.extend_from_slice(&encoded_key);
            self.encode(value)?;
        }

        Ok(())
    }
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}
