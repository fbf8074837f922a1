//! Memory-mapped file backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use memmap2::Mmap;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file backend whose reads are served from a shared memory map.
///
/// Writes go through the file handle. The map is rebuilt on [`flush`] and,
/// lazily, whenever a read reaches past the currently mapped length, so
/// reads always observe the bytes written through this backend.
///
/// # Cross-process use
///
/// Several processes may map the same file. Nothing here coordinates
/// writers; another process truncating the file while it is mapped is
/// undefined behaviour at the OS level, which is why files managed by this
/// backend are append-only.
///
/// [`flush`]: StorageBackend::flush
#[derive(Debug)]
pub struct MmapBackend {
    path: PathBuf,
    file: RwLock<File>,
    map: RwLock<Option<Mmap>>,
    size: RwLock<u64>,
    read_only: bool,
}

impl MmapBackend {
    /// Opens or creates a file for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, created or mapped.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Opens an existing file for reading only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be mapped.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file, true)
    }

    fn from_file(path: &Path, file: File, read_only: bool) -> StorageResult<Self> {
        let size = file.metadata()?.len();
        let map = map_file(&file, size)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            map: RwLock::new(map),
            size: RwLock::new(size),
            read_only,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether writes are rejected.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the number of bytes currently covered by the map.
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.map.read().as_ref().map_or(0, |m| m.len())
    }

    fn remap(&self) -> StorageResult<()> {
        let file = self.file.read();
        let size = *self.size.read();
        *self.map.write() = map_file(&file, size)?;
        Ok(())
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

/// Maps `file` read-only. Empty files are not mapped.
#[allow(unsafe_code)]
fn map_file(file: &File, size: u64) -> StorageResult<Option<Mmap>> {
    if size == 0 {
        return Ok(None);
    }
    // SAFETY: the mapping is read-only and the file is only ever appended
    // to or overwritten in place, never truncated, while mapped.
    let map = unsafe { Mmap::map(file)? };
    Ok(Some(map))
}

impl StorageBackend for MmapBackend {
    #[allow(clippy::cast_possible_truncation)]
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        if end as usize > self.mapped_len() {
            self.remap()?;
        }

        let map = self.map.read();
        match map.as_ref() {
            Some(m) if end as usize <= m.len() => Ok(m[offset as usize..end as usize].to_vec()),
            _ => Err(StorageError::ReadPastEnd { offset, len, size }),
        }
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.check_writable()?;

        let mut file = self.file.write();
        let mut size = self.size.write();
        let offset = *size;

        if data.is_empty() {
            return Ok(offset);
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.check_writable()?;

        let mut file = self.file.write();
        let mut size = self.size.write();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size = (*size).max(offset + data.len() as u64);

        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        if !self.read_only {
            self.file.write().flush()?;
        }
        self.remap()
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if !self.read_only {
            self.file.write().sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mmap_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.mmap");

        let backend = MmapBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert_eq!(backend.mapped_len(), 0);
        assert!(path.exists());
    }

    #[test]
    fn mmap_append_then_read_after_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.mmap");

        let mut backend = MmapBackend::open(&path).unwrap();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        backend.flush().unwrap();

        assert_eq!(backend.mapped_len(), 11);
        assert_eq!(backend.read_at(0, 11).unwrap(), b"hello world");
    }

    #[test]
    fn mmap_read_remaps_unflushed_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.mmap");

        let mut backend = MmapBackend::open(&path).unwrap();
        backend.append(b"abc").unwrap();
        backend.flush().unwrap();
        backend.append(b"def").unwrap();

        assert_eq!(backend.read_at(3, 3).unwrap(), b"def");
    }

    #[test]
    fn mmap_write_at_is_visible_through_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.mmap");

        let mut backend = MmapBackend::open(&path).unwrap();
        backend.append(b"0000data").unwrap();
        backend.flush().unwrap();
        backend.write_at(0, b"1111").unwrap();

        assert_eq!(backend.read_at(0, 8).unwrap(), b"1111data");
        assert_eq!(backend.size().unwrap(), 8);
    }

    #[test]
    fn mmap_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.mmap");

        let mut backend = MmapBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(3, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn mmap_persistence_and_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.mmap");

        {
            let mut backend = MmapBackend::open(&path).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        let mut backend = MmapBackend::open_read_only(&path).unwrap();
        assert!(backend.is_read_only());
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(backend.read_at(0, 10).unwrap(), b"persistent");
        assert!(matches!(backend.append(b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(
            backend.write_at(0, b"x"),
            Err(StorageError::ReadOnly)
        ));
    }

    #[test]
    fn mmap_read_only_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = MmapBackend::open_read_only(&dir.path().join("missing.mmap"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
