//! Fixed-size header at the start of every mapped store file.
//!
//! ```text
//! offset  0   8 bytes   magic "mmapdict"
//! offset  8  48 bytes   data end / index offset, ASCII decimal, right-aligned
//! offset 56  48 bytes   index length in bytes, ASCII decimal, right-aligned
//! offset 104            value records and index blobs
//! ```

use crate::error::{StoreError, StoreResult};

/// File magic.
pub const MAGIC: &[u8; 8] = b"mmapdict";

/// Width of each numeric header field.
pub const FIELD_WIDTH: usize = 48;

/// Total header length; the first record starts here.
pub const HEADER_LEN: u64 = 104;

/// Location of the authoritative index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedHeader {
    /// Offset of the index blob, which is also the end of the records it
    /// covers.
    pub data_end: u64,
    /// Length of the index blob.
    pub index_len: u64,
}

impl Default for MappedHeader {
    fn default() -> Self {
        Self {
            data_end: HEADER_LEN,
            index_len: 0,
        }
    }
}

impl MappedHeader {
    /// Full header bytes, magic included.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN as usize);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&self.encode_fields());
        bytes
    }

    /// The two numeric fields only, for rewriting in place after the magic.
    #[must_use]
    pub fn encode_fields(&self) -> Vec<u8> {
        format!(
            "{:>width$}{:>width$}",
            self.data_end,
            self.index_len,
            width = FIELD_WIDTH
        )
        .into_bytes()
    }

    /// Parses a header from the first bytes of a file.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidFormat`] if the magic is wrong, the header is
    /// truncated, or a field is not a decimal number.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(StoreError::invalid_format("not a mapped store file"));
        }
        if bytes.len() < HEADER_LEN as usize {
            return Err(StoreError::invalid_format(format!(
                "truncated header: {} of {HEADER_LEN} bytes",
                bytes.len()
            )));
        }

        let fields = &bytes[MAGIC.len()..HEADER_LEN as usize];
        let header = Self {
            data_end: parse_field(&fields[..FIELD_WIDTH], "data end")?,
            index_len: parse_field(&fields[FIELD_WIDTH..], "index length")?,
        };

        if header.data_end < HEADER_LEN {
            return Err(StoreError::invalid_format(format!(
                "data end {} points inside the header",
                header.data_end
            )));
        }
        Ok(header)
    }
}

fn parse_field(raw: &[u8], name: &str) -> StoreResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or_else(|| StoreError::invalid_format(format!("malformed {name} field")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_file_header_layout() {
        let bytes = MappedHeader::default().encode();
        assert_eq!(bytes.len(), 104);
        assert_eq!(&bytes[..8], b"mmapdict");
        assert_eq!(&bytes[8..56], format!("{:>48}", 104).as_bytes());
        assert_eq!(&bytes[56..104], format!("{:>48}", 0).as_bytes());
    }

    #[test]
    fn rejects_foreign_magic() {
        let mut bytes = MappedHeader::default().encode();
        bytes[..8].copy_from_slice(b"SQLite f");
        assert!(matches!(
            MappedHeader::decode(&bytes),
            Err(StoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = MappedHeader::default().encode();
        let err = MappedHeader::decode(&bytes[..60]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn rejects_garbage_field() {
        let mut bytes = MappedHeader::default().encode();
        bytes[100] = b'x';
        assert!(MappedHeader::decode(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn fields_parse_back(data_end in HEADER_LEN..u64::MAX, index_len in any::<u64>()) {
            let header = MappedHeader { data_end, index_len };
            prop_assert_eq!(MappedHeader::decode(&header.encode()).unwrap(), header);
        }
    }
}
