//! Process-wide deduplication of open stores.
//!
//! Opening the same file twice in one process would give two write caches
//! and two views of the index that drift apart. A [`StoreRegistry`] hands
//! out one shared handle per `(backend, absolute path)` pair instead. A
//! store deregisters itself when it is closed, so the next acquire opens
//! the file afresh.

use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::mapped::MappedStore;
use crate::relational::RelationalStore;
use crate::store::KvStore;
use crate::types::{BackendKind, StoreDescriptor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Shared handle to a mapped store.
pub type SharedMapped = Arc<Mutex<MappedStore>>;

/// Shared handle to a relational store.
pub type SharedRelational = Arc<Mutex<RelationalStore>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistryKey {
    kind: BackendKind,
    path: PathBuf,
}

/// A registered store of either backend.
#[derive(Debug, Clone)]
pub enum StoreHandle {
    /// Memory-mapped store.
    Mapped(SharedMapped),
    /// SQLite store.
    Relational(SharedRelational),
}

impl StoreHandle {
    /// Backend of the underlying store.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Mapped(_) => BackendKind::Mapped,
            Self::Relational(_) => BackendKind::Relational,
        }
    }

    /// The mapped store, if this is one.
    #[must_use]
    pub fn as_mapped(&self) -> Option<&SharedMapped> {
        match self {
            Self::Mapped(store) => Some(store),
            Self::Relational(_) => None,
        }
    }

    /// The relational store, if this is one.
    #[must_use]
    pub fn as_relational(&self) -> Option<&SharedRelational> {
        match self {
            Self::Relational(store) => Some(store),
            Self::Mapped(_) => None,
        }
    }

    /// Whether both handles share the same underlying store.
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Mapped(a), Self::Mapped(b)) => Arc::ptr_eq(a, b),
            (Self::Relational(a), Self::Relational(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Closes the underlying store, which also deregisters it.
    ///
    /// # Errors
    ///
    /// Propagates the final flush failure.
    pub fn close(&self) -> StoreResult<()> {
        match self {
            Self::Mapped(store) => store.lock().close(),
            Self::Relational(store) => store.lock().close(),
        }
    }

    /// Descriptor of the underlying store.
    ///
    /// # Errors
    ///
    /// [`StoreError::HandleTransfer`] if the store is closed.
    pub fn descriptor(&self) -> StoreResult<StoreDescriptor> {
        match self {
            Self::Mapped(store) => store.lock().descriptor(),
            Self::Relational(store) => store.lock().descriptor(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    id: u64,
    handle: StoreHandle,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    entries: Mutex<HashMap<RegistryKey, Entry>>,
    next_id: AtomicU64,
}

/// Back-reference a store keeps so that closing it removes its entry.
#[derive(Debug)]
pub(crate) struct Registration {
    registry: Weak<RegistryInner>,
    key: RegistryKey,
    id: u64,
}

impl Registration {
    /// Removes the entry if it still belongs to this store. A no-op if the
    /// registry is gone or the path has since been registered again.
    pub(crate) fn release(self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let removed = {
            let mut entries = inner.entries.lock();
            match entries.get(&self.key) {
                Some(entry) if entry.id == self.id => entries.remove(&self.key),
                _ => None,
            }
        };
        // Dropped outside the lock.
        drop(removed);
    }
}

/// Path-keyed cache of open stores.
///
/// Cloning a registry is cheap and clones share entries. Build one at
/// startup and pass it to whatever needs shared handles.
///
/// # Example
///
/// ```rust,no_run
/// use fuelkv_core::{KvStore, StoreOptions, StoreRegistry};
///
/// let registry = StoreRegistry::new();
/// let first = registry.mapped("feats.mmap", StoreOptions::new())?;
/// let second = registry.mapped("feats.mmap", StoreOptions::read_only_mode())?;
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
///
/// first.lock().set("a", 1)?;
/// first.lock().close()?;
/// assert!(registry.is_empty());
/// # Ok::<(), fuelkv_core::StoreError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    inner: Arc<RegistryInner>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the open store for `(kind, path)`, opening it with `options`
    /// if there is none.
    ///
    /// Options are ignored when a store is already registered; the caller
    /// gets that store as it was opened.
    ///
    /// # Errors
    ///
    /// Any error from opening the store.
    pub fn acquire(
        &self,
        kind: BackendKind,
        path: impl AsRef<Path>,
        options: StoreOptions,
    ) -> StoreResult<StoreHandle> {
        let key = RegistryKey {
            kind,
            path: std::path::absolute(path.as_ref())?,
        };

        let mut entries = self.inner.entries.lock();
        if let Some(existing) = entries.get(&key) {
            debug!(backend = %kind, path = %key.path.display(), "reusing registered store");
            return Ok(existing.handle.clone());
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            registry: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
        };
        let handle = match kind {
            BackendKind::Mapped => {
                let mut store = MappedStore::open(&key.path, options)?;
                store.attach(registration);
                StoreHandle::Mapped(Arc::new(Mutex::new(store)))
            }
            BackendKind::Relational => {
                let mut store = RelationalStore::open(&key.path, options)?;
                store.attach(registration);
                StoreHandle::Relational(Arc::new(Mutex::new(store)))
            }
        };

        info!(backend = %kind, path = %key.path.display(), "registered store");
        entries.insert(
            key,
            Entry {
                id,
                handle: handle.clone(),
            },
        );
        Ok(handle)
    }

    /// [`acquire`](Self::acquire) for a mapped store.
    ///
    /// # Errors
    ///
    /// Any error from opening the store.
    pub fn mapped(&self, path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<SharedMapped> {
        match self.acquire(BackendKind::Mapped, path, options)? {
            StoreHandle::Mapped(store) => Ok(store),
            StoreHandle::Relational(_) => Err(mismatched(BackendKind::Mapped)),
        }
    }

    /// [`acquire`](Self::acquire) for a relational store.
    ///
    /// # Errors
    ///
    /// Any error from opening the store.
    pub fn relational(
        &self,
        path: impl AsRef<Path>,
        options: StoreOptions,
    ) -> StoreResult<SharedRelational> {
        match self.acquire(BackendKind::Relational, path, options)? {
            StoreHandle::Relational(store) => Ok(store),
            StoreHandle::Mapped(_) => Err(mismatched(BackendKind::Relational)),
        }
    }

    /// Opens a handle equivalent to the one `descriptor` was taken from.
    /// Within one process this returns the registered store if it is
    /// still open.
    ///
    /// # Errors
    ///
    /// [`StoreError::HandleTransfer`] if the file no longer exists.
    pub fn reopen(&self, descriptor: &StoreDescriptor) -> StoreResult<StoreHandle> {
        if !descriptor.path.exists() {
            return Err(StoreError::handle_transfer(format!(
                "{} no longer exists",
                descriptor.path.display()
            )));
        }
        self.acquire(descriptor.backend, &descriptor.path, descriptor.options())
    }

    /// The registered store for `(kind, path)`, if any.
    #[must_use]
    pub fn get(&self, kind: BackendKind, path: impl AsRef<Path>) -> Option<StoreHandle> {
        let key = RegistryKey {
            kind,
            path: std::path::absolute(path.as_ref()).ok()?,
        };
        self.inner
            .entries
            .lock()
            .get(&key)
            .map(|entry| entry.handle.clone())
    }

    /// Whether a store is registered for `(kind, path)`.
    #[must_use]
    pub fn contains(&self, kind: BackendKind, path: impl AsRef<Path>) -> bool {
        self.get(kind, path).is_some()
    }

    /// Drops the registry's reference without closing the store.
    ///
    /// Returns whether an entry was removed. The store stays open for
    /// holders of its handle and is closed when the last one drops it.
    pub fn release(&self, kind: BackendKind, path: impl AsRef<Path>) -> bool {
        let Ok(path) = std::path::absolute(path.as_ref()) else {
            return false;
        };
        let removed = self.inner.entries.lock().remove(&RegistryKey { kind, path });
        removed.is_some()
    }

    /// Closes and deregisters the store for `(kind, path)`. A no-op if none
    /// is registered.
    ///
    /// # Errors
    ///
    /// Propagates the final flush failure.
    pub fn close(&self, kind: BackendKind, path: impl AsRef<Path>) -> StoreResult<()> {
        match self.get(kind, path) {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }

    /// Closes every registered store, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first close failure.
    pub fn close_all(&self) -> StoreResult<()> {
        let handles: Vec<StoreHandle> = self
            .inner
            .entries
            .lock()
            .values()
            .map(|entry| entry.handle.clone())
            .collect();
        for handle in handles {
            handle.close()?;
        }
        Ok(())
    }

    /// Number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether no store is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mismatched(expected: BackendKind) -> StoreError {
    StoreError::invalid_operation(format!("registry entry is not a {expected} store"))
}
