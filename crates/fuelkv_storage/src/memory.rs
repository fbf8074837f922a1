//! `Vec<u8>` backend for tests and benchmarks.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// Lets the mapped-store format be exercised without touching the file
/// system, including loading from hand-crafted (or deliberately corrupt)
/// bytes via [`InMemoryBackend::with_data`].
///
/// # Example
///
/// ```rust
/// use fuelkv_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"mmapdict").unwrap();
/// assert_eq!(offset, 0);
/// backend.write_at(4, b"DICT").unwrap();
/// assert_eq!(backend.read_at(0, 8).unwrap(), b"mmapDICT");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding pre-existing bytes.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Snapshot of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    #[allow(clippy::cast_possible_truncation)]
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_report_start_offsets() {
        let mut backend = InMemoryBackend::new();

        assert_eq!(backend.append(b"header").unwrap(), 0);
        assert_eq!(backend.append(b"record").unwrap(), 6);
        assert_eq!(backend.size().unwrap(), 12);
    }

    #[test]
    fn reads_return_requested_range() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
        assert!(backend.read_at(11, 0).unwrap().is_empty());
    }

    #[test]
    fn reads_past_end_fail() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            backend.read_at(10, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn write_at_overwrites_in_place() {
        let mut backend = InMemoryBackend::with_data(b"0000rest".to_vec());
        backend.write_at(0, b"1234").unwrap();
        assert_eq!(backend.data(), b"1234rest");
        assert_eq!(backend.size().unwrap(), 8);
    }

    #[test]
    fn write_at_extends() {
        let mut backend = InMemoryBackend::with_data(b"ab".to_vec());
        backend.write_at(1, b"xyz").unwrap();
        assert_eq!(backend.data(), b"axyz");
    }
}
