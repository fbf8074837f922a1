//! The key-value interface shared by both backends.

use crate::error::{StoreError, StoreResult};
use crate::types::{BackendKind, StoreDescriptor};
use fuelkv_codec::Value;
use std::path::Path;

/// A persistent string-keyed cache of [`Value`]s with a bounded write cache.
///
/// Writes land in the write cache first and reach the backing file when
/// the cache fills up, on [`flush`](Self::flush), or on
/// [`close`](Self::close). Reads always see pending writes.
///
/// Reads take `&mut self` because a mapped store may still be decoding its
/// index in the background and joins that work on first use.
pub trait KvStore {
    /// Backend of this handle.
    fn backend_kind(&self) -> BackendKind;

    /// Absolute path of the backing file.
    fn path(&self) -> &Path;

    /// Whether mutations are rejected.
    fn is_read_only(&self) -> bool;

    /// Write cache capacity.
    fn cache_capacity(&self) -> usize;

    /// Whether [`close`](Self::close) has completed.
    fn is_closed(&self) -> bool;

    /// Number of writes waiting in the write cache.
    fn pending_len(&self) -> usize;

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyNotFound`] if the key is absent.
    fn get(&mut self, key: &str) -> StoreResult<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// [`StoreError::ReadOnly`] on a read-only handle, or any error from an
    /// automatic flush.
    fn set<K, V>(&mut self, key: K, value: V) -> StoreResult<()>
    where
        K: Into<String>,
        V: Into<Value>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyNotFound`] if the key is absent,
    /// [`StoreError::ReadOnly`] on a read-only handle.
    fn delete(&mut self, key: &str) -> StoreResult<()>;

    /// Whether `key` is present, pending writes included.
    fn contains(&mut self, key: &str) -> StoreResult<bool>;

    /// Number of distinct keys, pending writes included.
    fn len(&mut self) -> StoreResult<usize>;

    /// All keys, persisted ones first.
    fn keys(&mut self) -> StoreResult<Vec<String>>;

    /// All entries, in the same order as [`keys`](Self::keys).
    fn items(&mut self) -> StoreResult<Vec<(String, Value)>>;

    /// Removes every entry.
    fn clear(&mut self) -> StoreResult<()>;

    /// Writes pending entries to the backing file.
    ///
    /// `save_all` asks for the complete state to be persisted: the mapped
    /// index is rewritten and every relational table's cache is flushed.
    /// A no-op on read-only handles.
    fn flush(&mut self, save_all: bool) -> StoreResult<()>;

    /// Flushes everything and releases the file. Idempotent.
    fn close(&mut self) -> StoreResult<()>;

    /// Whether the store holds no entries.
    fn is_empty(&mut self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All values, in the same order as [`keys`](Self::keys).
    fn values(&mut self) -> StoreResult<Vec<Value>> {
        Ok(self.items()?.into_iter().map(|(_, value)| value).collect())
    }

    /// Calls [`set`](Self::set) for every pair.
    fn update<I, K, V>(&mut self, entries: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if self.is_read_only() {
            return Err(StoreError::read_only("update"));
        }
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Describes this handle so it can be reopened elsewhere.
    ///
    /// # Errors
    ///
    /// [`StoreError::HandleTransfer`] if the handle is closed.
    fn descriptor(&self) -> StoreResult<StoreDescriptor> {
        if self.is_closed() {
            return Err(StoreError::handle_transfer(format!(
                "{} store at {} is closed",
                self.backend_kind(),
                self.path().display()
            )));
        }
        Ok(StoreDescriptor {
            path: self.path().to_path_buf(),
            read_only: self.is_read_only(),
            cache_capacity: self.cache_capacity(),
            backend: self.backend_kind(),
        })
    }
}
