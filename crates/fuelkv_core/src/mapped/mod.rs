//! Append-only memory-mapped store.
//!
//! File layout: a [`MappedHeader`], then value records and index blobs in
//! append order. Records are never rewritten; overwriting a key appends a
//! new record and repoints the index. The header names the most recently
//! saved index, so a reader always finds a complete, decodable index even
//! if a writer died after appending records that index does not cover.
//!
//! Records appended since the last saved index are only reachable through
//! the writer's in-memory index until [`KvStore::flush`] with
//! `save_all = true` (or [`KvStore::close`]) saves a new one.

mod header;
mod index;

pub use header::{MappedHeader, HEADER_LEN, MAGIC};
pub use index::{Index, RecordLocation};

use crate::cache::WriteCache;
use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::registry::Registration;
use crate::store::KvStore;
use crate::types::BackendKind;
use fuelkv_codec::{decode_record, encode_record, Value};
use fuelkv_storage::{MmapBackend, StorageBackend};
use index::{decode_index, encode_index, IndexLoader};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Index bytes estimated per record: two 8-byte integers plus the key.
const INDEX_ENTRY_OVERHEAD: u64 = 16;

/// A key-value cache stored in a single append-only file.
///
/// # Example
///
/// ```rust,no_run
/// use fuelkv_core::{KvStore, MappedStore, StoreOptions};
///
/// let mut store = MappedStore::open("feats.mmap", StoreOptions::new())?;
/// store.set("utt-001", vec![0.25f64, 0.5])?;
/// store.close()?;
///
/// let mut store = MappedStore::open("feats.mmap", StoreOptions::read_only_mode())?;
/// assert_eq!(store.get("utt-001")?.as_array().map(<[_]>::len), Some(2));
/// # Ok::<(), fuelkv_core::StoreError>(())
/// ```
pub struct MappedStore {
    path: PathBuf,
    options: StoreOptions,
    backend: Option<Box<dyn StorageBackend>>,
    header: MappedHeader,
    index: IndexLoader,
    cache: WriteCache,
    /// Estimated index bytes added since the index was last saved.
    index_growth: u64,
    /// Whether the in-memory index differs from the saved one.
    index_dirty: bool,
    registration: Option<Registration>,
}

impl MappedStore {
    /// Opens or creates a mapped store file.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] for a read-only open of a missing or empty
    ///   file
    /// - [`StoreError::InvalidFormat`] if the file is not a mapped store
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = std::path::absolute(path.as_ref())?;

        if options.override_existing && !options.read_only && path.is_file() {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed existing mapped store");
        }

        let backend: Box<dyn StorageBackend> = if options.read_only {
            let populated = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
            if !populated {
                return Err(StoreError::not_found(path));
            }
            Box::new(MmapBackend::open_read_only(&path)?)
        } else {
            Box::new(MmapBackend::open(&path)?)
        };

        Self::with_backend(path, backend, options)
    }

    /// Opens a store over an arbitrary byte backend. `path` is only used
    /// for identification.
    ///
    /// An empty backend is initialized with a fresh header unless the store
    /// is read-only.
    ///
    /// # Errors
    ///
    /// As for [`open`](Self::open).
    pub fn with_backend(
        path: impl Into<PathBuf>,
        mut backend: Box<dyn StorageBackend>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let path = path.into();
        let size = backend.size()?;

        let (header, index) = if size == 0 {
            if options.read_only {
                return Err(StoreError::not_found(path));
            }
            let header = MappedHeader::default();
            backend.append(&header.encode())?;
            backend.flush()?;
            info!(path = %path.display(), "created mapped store");
            (header, IndexLoader::ready(Index::new()))
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let head = backend.read_at(0, size.min(HEADER_LEN) as usize)?;
            let header = MappedHeader::decode(&head)?;

            let index_end = header.data_end.saturating_add(header.index_len);
            if index_end > size {
                return Err(StoreError::invalid_format(format!(
                    "index at {}..{index_end} lies beyond end of file ({size} bytes)",
                    header.data_end
                )));
            }

            #[allow(clippy::cast_possible_truncation)]
            let blob = backend.read_at(header.data_end, header.index_len as usize)?;
            let index = if options.background_index_load {
                IndexLoader::spawn(blob)?
            } else {
                IndexLoader::ready(decode_index(&blob)?)
            };
            debug!(
                path = %path.display(),
                index_bytes = header.index_len,
                background = options.background_index_load,
                "opened mapped store"
            );
            (header, index)
        };

        Ok(Self {
            path,
            cache: WriteCache::new(options.cache_capacity),
            options,
            backend: Some(backend),
            header,
            index,
            index_growth: 0,
            index_dirty: false,
            registration: None,
        })
    }

    pub(crate) fn attach(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }

    /// Whether the index is available without blocking. Always `true` once
    /// any operation has needed it.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.backend.is_some() && self.index.is_loaded()
    }

    /// Blocks until the index is loaded.
    ///
    /// # Errors
    ///
    /// [`StoreError::IndexLoad`] if the index could not be decoded.
    pub fn wait_loaded(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.index.index_mut().map(|_| ())
    }

    /// The header as last read or written.
    #[must_use]
    pub fn header(&self) -> MappedHeader {
        self.header
    }

    /// Current file size in bytes, unflushed appends included.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] on a closed handle.
    pub fn file_size(&self) -> StoreResult<u64> {
        Ok(self.backend.as_ref().ok_or(StoreError::Closed)?.size()?)
    }

    /// Location of the persisted record for `key`, ignoring pending writes.
    ///
    /// # Errors
    ///
    /// [`StoreError::IndexLoad`] if the index could not be decoded.
    pub fn location(&mut self, key: &str) -> StoreResult<Option<RecordLocation>> {
        self.ensure_open()?;
        Ok(self.index.index_mut()?.get(key).copied())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.backend.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self, operation: &'static str) -> StoreResult<()> {
        self.ensure_open()?;
        if self.options.read_only {
            return Err(StoreError::read_only(operation));
        }
        Ok(())
    }

    /// Appends pending records, then saves the index when asked to or when
    /// it has grown past the threshold.
    fn write_pending(&mut self, save_index: bool) -> StoreResult<()> {
        let backend = self.backend.as_mut().ok_or(StoreError::Closed)?;
        let index = self.index.index_mut()?;
        let pending = self.cache.len();

        for (key, value) in self.cache.iter() {
            let record = encode_record(value)?;
            let offset = backend.append(&record)?;
            index.insert(
                key.clone(),
                RecordLocation {
                    offset,
                    len: record.len() as u64,
                },
            );
            self.index_growth += INDEX_ENTRY_OVERHEAD + key.len() as u64;
        }
        if pending > 0 {
            self.index_dirty = true;
        }

        let over_threshold = self.index_growth > self.options.index_flush_threshold;
        if self.index_dirty && (save_index || over_threshold) {
            let blob = encode_index(index)?;
            let data_end = backend.append(&blob)?;
            let header = MappedHeader {
                data_end,
                index_len: blob.len() as u64,
            };
            backend.write_at(MAGIC.len() as u64, &header.encode_fields())?;
            self.header = header;
            self.index_growth = 0;
            self.index_dirty = false;
            debug!(
                path = %self.path.display(),
                entries = index.len(),
                index_bytes = header.index_len,
                "saved mapped index"
            );
        }

        backend.flush()?;
        self.cache.clear();
        if pending > 0 {
            debug!(path = %self.path.display(), records = pending, "flushed write cache");
        }
        Ok(())
    }
}

impl KvStore for MappedStore {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Mapped
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    fn pending_len(&self) -> usize {
        self.cache.len()
    }

    fn get(&mut self, key: &str) -> StoreResult<Value> {
        self.ensure_open()?;
        if let Some(value) = self.cache.get(key) {
            return Ok(value.clone());
        }

        let location = self
            .index
            .index_mut()?
            .get(key)
            .copied()
            .ok_or_else(|| StoreError::key_not_found(key))?;
        let backend = self.backend.as_ref().ok_or(StoreError::Closed)?;
        #[allow(clippy::cast_possible_truncation)]
        let bytes = backend.read_at(location.offset, location.len as usize)?;
        Ok(decode_record(&bytes)?)
    }

    fn set<K, V>(&mut self, key: K, value: V) -> StoreResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ensure_writable("set")?;
        if self.cache.insert(key.into(), value.into()) {
            self.write_pending(false)?;
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.ensure_writable("delete")?;
        let was_pending = self.cache.remove(key).is_some();
        let was_indexed = self.index.index_mut()?.remove(key).is_some();

        if was_indexed {
            self.index_dirty = true;
        }
        if !was_pending && !was_indexed {
            return Err(StoreError::key_not_found(key));
        }
        Ok(())
    }

    fn contains(&mut self, key: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        if self.cache.contains_key(key) {
            return Ok(true);
        }
        Ok(self.index.index_mut()?.contains_key(key))
    }

    fn len(&mut self) -> StoreResult<usize> {
        self.ensure_open()?;
        let index = self.index.index_mut()?;
        let pending_only = self.cache.keys().filter(|k| !index.contains_key(*k)).count();
        Ok(index.len() + pending_only)
    }

    fn keys(&mut self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let index = self.index.index_mut()?;

        let mut persisted: Vec<(&String, &RecordLocation)> = index.iter().collect();
        persisted.sort_by_key(|(_, location)| location.offset);

        let mut keys: Vec<String> = persisted.into_iter().map(|(k, _)| k.clone()).collect();
        keys.extend(self.cache.keys().filter(|k| !index.contains_key(*k)).cloned());
        Ok(keys)
    }

    fn items(&mut self) -> StoreResult<Vec<(String, Value)>> {
        let backend = self.backend.as_ref().ok_or(StoreError::Closed)?;
        let index = self.index.index_mut()?;

        let mut persisted: Vec<(&String, &RecordLocation)> = index.iter().collect();
        persisted.sort_by_key(|(_, location)| location.offset);

        let mut items = Vec::with_capacity(persisted.len() + self.cache.len());
        for (key, location) in persisted {
            let value = match self.cache.get(key) {
                Some(value) => value.clone(),
                None => {
                    #[allow(clippy::cast_possible_truncation)]
                    let bytes = backend.read_at(location.offset, location.len as usize)?;
                    decode_record(&bytes)?
                }
            };
            items.push((key.clone(), value));
        }
        for (key, value) in self.cache.iter() {
            if !index.contains_key(key) {
                items.push((key.clone(), value.clone()));
            }
        }
        Ok(items)
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.ensure_writable("clear")?;
        self.cache.clear();
        self.index.index_mut()?.clear();
        self.index_dirty = true;
        Ok(())
    }

    fn flush(&mut self, save_all: bool) -> StoreResult<()> {
        self.ensure_open()?;
        if self.options.read_only {
            return Ok(());
        }
        self.write_pending(save_all)
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.backend.is_none() {
            return Ok(());
        }
        if !self.options.read_only {
            self.write_pending(true)?;
        }

        let sync_result = match self.backend.take() {
            Some(mut backend) if !self.options.read_only => backend.sync(),
            _ => Ok(()),
        };
        self.index = IndexLoader::ready(Index::new());
        self.cache.clear();
        if let Some(registration) = self.registration.take() {
            registration.release();
        }
        info!(path = %self.path.display(), "closed mapped store");
        Ok(sync_result?)
    }
}

impl Drop for MappedStore {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path.display(), error = %err, "failed to close mapped store");
        }
    }
}

impl fmt::Debug for MappedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedStore")
            .field("path", &self.path)
            .field("read_only", &self.options.read_only)
            .field("header", &self.header)
            .field("pending", &self.cache.len())
            .field("closed", &self.backend.is_none())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MappedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<MappedStore path:{:?}, length:", self.path)?;
        match self.index.loaded_len() {
            Some(len) => write!(f, "{len}")?,
            None => f.write_str("?")?,
        }
        write!(
            f,
            ", pending:{}/{}, loaded:{}, closed:{}, read_only:{}>",
            self.cache.len(),
            self.cache.capacity(),
            self.is_loaded(),
            self.backend.is_none(),
            self.options.read_only
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelkv_storage::InMemoryBackend;
    use tempfile::tempdir;

    fn memory_store(options: StoreOptions) -> MappedStore {
        MappedStore::with_backend("memory", Box::new(InMemoryBackend::new()), options).unwrap()
    }

    #[test]
    fn new_store_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.mmap");
        let store = MappedStore::open(&path, StoreOptions::new()).unwrap();

        assert_eq!(store.header(), MappedHeader::default());
        assert_eq!(store.file_size().unwrap(), HEADER_LEN);
        drop(store);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], MAGIC);
    }

    #[test]
    fn set_get_before_and_after_flush() {
        let mut store = memory_store(StoreOptions::new());
        store.set("a", 1).unwrap();
        assert_eq!(store.get("a").unwrap(), Value::Integer(1));
        assert_eq!(store.pending_len(), 1);

        store.flush(false).unwrap();
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.get("a").unwrap(), Value::Integer(1));
        let location = store.location("a").unwrap().unwrap();
        assert_eq!(location.offset, HEADER_LEN);
    }

    #[test]
    fn cache_flushes_when_full() {
        let mut store = memory_store(StoreOptions::new().cache_capacity(3));
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        assert_eq!(store.pending_len(), 2);
        store.set("c", 3).unwrap();
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn auto_flush_leaves_header_on_saved_index() {
        let mut store = memory_store(StoreOptions::new().cache_capacity(1));
        store.set("a", 1).unwrap();
        assert_eq!(store.header(), MappedHeader::default());

        store.flush(true).unwrap();
        assert!(store.header().data_end > HEADER_LEN);
        assert!(store.header().index_len > 0);
    }

    #[test]
    fn index_threshold_forces_save() {
        let mut store = memory_store(
            StoreOptions::new()
                .cache_capacity(1)
                .index_flush_threshold(20),
        );
        store.set("a", 1).unwrap();
        assert_eq!(store.header(), MappedHeader::default());
        store.set("b", 2).unwrap();
        assert_ne!(store.header(), MappedHeader::default());
    }

    #[test]
    fn delete_pending_key_keeps_other_pending_writes() {
        let mut store = memory_store(StoreOptions::new());
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        store.delete("a").unwrap();

        assert!(!store.contains("a").unwrap());
        assert_eq!(store.get("b").unwrap(), Value::Integer(2));
        assert!(store.delete("a").unwrap_err().is_key_not_found());
    }

    #[test]
    fn delete_persisted_key() {
        let mut store = memory_store(StoreOptions::new());
        store.set("a", 1).unwrap();
        store.flush(true).unwrap();
        store.delete("a").unwrap();
        assert!(store.get("a").unwrap_err().is_key_not_found());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn overwrite_counts_once() {
        let mut store = memory_store(StoreOptions::new());
        store.set("a", 1).unwrap();
        store.flush(false).unwrap();
        store.set("a", 2).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.keys().unwrap(), vec!["a"]);
        assert_eq!(store.items().unwrap(), vec![("a".to_string(), Value::Integer(2))]);
    }

    #[test]
    fn keys_follow_append_order_then_pending() {
        let mut store = memory_store(StoreOptions::new());
        store.set("z", 1).unwrap();
        store.flush(false).unwrap();
        store.set("a", 2).unwrap();
        store.flush(false).unwrap();
        store.set("m", 3).unwrap();

        assert_eq!(store.keys().unwrap(), vec!["z", "a", "m"]);
        assert_eq!(
            store.values().unwrap(),
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn clear_empties_store() {
        let mut store = memory_store(StoreOptions::new());
        store.update([("a", 1), ("b", 2)]).unwrap();
        store.flush(true).unwrap();
        store.set("c", 3).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn closed_store_rejects_operations() {
        let mut store = memory_store(StoreOptions::new());
        store.close().unwrap();
        store.close().unwrap();

        assert!(matches!(store.get("a"), Err(StoreError::Closed)));
        assert!(matches!(store.set("a", 1), Err(StoreError::Closed)));
        assert!(matches!(
            store.descriptor(),
            Err(StoreError::HandleTransfer { .. })
        ));
    }

    #[test]
    fn read_only_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let result = MappedStore::open(dir.path().join("missing.mmap"), StoreOptions::read_only_mode());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn foreign_file_is_rejected() {
        let backend = InMemoryBackend::with_data(b"SQLite format 3\0 and more bytes".to_vec());
        let result = MappedStore::with_backend("foreign", Box::new(backend), StoreOptions::new());
        assert!(matches!(result, Err(StoreError::InvalidFormat { .. })));
    }

    #[test]
    fn index_beyond_end_is_rejected() {
        let header = MappedHeader {
            data_end: HEADER_LEN,
            index_len: 50,
        };
        let backend = InMemoryBackend::with_data(header.encode());
        let result = MappedStore::with_backend("short", Box::new(backend), StoreOptions::new());
        assert!(matches!(result, Err(StoreError::InvalidFormat { .. })));
    }

    #[test]
    fn corrupted_magic_on_disk_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feats.mmap");

        let mut store = MappedStore::open(&path, StoreOptions::new()).unwrap();
        store.set("a", 1).unwrap();
        store.close().unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[..8].copy_from_slice(b"mmapdixt");
        fs::write(&path, &bytes).unwrap();

        for options in [StoreOptions::new(), StoreOptions::read_only_mode()] {
            let result = MappedStore::open(&path, options);
            assert!(matches!(result, Err(StoreError::InvalidFormat { .. })));
        }
    }

    #[test]
    fn corrupt_index_blob_surfaces_as_index_load() {
        let header = MappedHeader {
            data_end: HEADER_LEN,
            index_len: 3,
        };
        let mut bytes = header.encode();
        bytes.extend_from_slice(&[0xff, 0x00, 0x13]);
        let backend = InMemoryBackend::with_data(bytes);

        let mut store =
            MappedStore::with_backend("corrupt", Box::new(backend), StoreOptions::read_only_mode())
                .unwrap();
        assert!(matches!(store.get("a"), Err(StoreError::IndexLoad { .. })));
        assert!(matches!(store.len(), Err(StoreError::IndexLoad { .. })));
        assert!(matches!(store.wait_loaded(), Err(StoreError::IndexLoad { .. })));
    }

    #[test]
    fn maps_with_mixed_key_types_round_trip() {
        let mut store = memory_store(StoreOptions::new());
        let value = Value::map(vec![
            (Value::Integer(1000), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
        ]);
        store.set("meta", value.clone()).unwrap();
        store.flush(true).unwrap();
        assert_eq!(store.get("meta").unwrap(), value);
    }

    #[test]
    fn duplicate_map_keys_are_never_written() {
        let mut store = memory_store(StoreOptions::new());
        let size = store.file_size().unwrap();
        let value = Value::Map(vec![
            (Value::from("a"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
        ]);
        store.set("meta", value).unwrap();

        assert!(matches!(store.flush(true), Err(StoreError::Codec(_))));
        assert_eq!(store.file_size().unwrap(), size);
        assert!(store.location("meta").unwrap().is_none());
    }

    #[test]
    fn reopen_sees_closed_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feats.mmap");

        let mut store = MappedStore::open(&path, StoreOptions::new()).unwrap();
        store.set("a", vec![1.0f64, 2.0]).unwrap();
        store.close().unwrap();

        let mut store = MappedStore::open(&path, StoreOptions::read_only_mode()).unwrap();
        assert_eq!(store.get("a").unwrap(), Value::from(vec![1.0f64, 2.0]));
        assert!(store.set("b", 1).unwrap_err().is_read_only());
        assert!(store.is_loaded());
    }

    #[test]
    fn unsaved_index_records_are_invisible_to_readers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feats.mmap");

        let mut writer = MappedStore::open(&path, StoreOptions::new().cache_capacity(1)).unwrap();
        writer.set("a", 1).unwrap();

        let mut reader = MappedStore::open(&path, StoreOptions::read_only_mode()).unwrap();
        assert!(reader.get("a").unwrap_err().is_key_not_found());

        writer.flush(true).unwrap();
        let mut reader = MappedStore::open(&path, StoreOptions::read_only_mode()).unwrap();
        assert_eq!(reader.get("a").unwrap(), Value::Integer(1));
    }

    #[test]
    fn override_existing_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feats.mmap");

        let mut store = MappedStore::open(&path, StoreOptions::new()).unwrap();
        store.set("a", 1).unwrap();
        store.close().unwrap();

        let mut store =
            MappedStore::open(&path, StoreOptions::new().override_existing(true)).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn display_reports_state() {
        let mut store = memory_store(StoreOptions::new().background_index_load(false));
        store.set("a", 1).unwrap();
        store.flush(true).unwrap();
        let text = store.to_string();
        assert!(text.starts_with("<MappedStore path:\"memory\", length:1"));
        assert!(text.contains("closed:false"));
    }
}
