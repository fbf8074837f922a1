//! Temporary store fixtures.
//!
//! Each fixture owns a temporary directory holding the store file, so the
//! file can be closed and reopened (read-only, or by path through a
//! registry) for as long as the fixture lives.

use fuelkv_core::{KvStore, MappedStore, RelationalStore, StoreOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A mapped store in a temporary directory.
pub struct TempMapped {
    /// The store instance.
    pub store: MappedStore,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TempMapped {
    /// Creates a store with default options.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::new())
    }

    /// Creates a store with the given options.
    pub fn with_options(options: StoreOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.mmap");
        let store = MappedStore::open(&path, options).expect("Failed to open mapped store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store and reopens it with `options`.
    pub fn reopen(&mut self, options: StoreOptions) {
        self.store.close().expect("Failed to close mapped store");
        self.store = MappedStore::open(&self.path, options).expect("Failed to reopen mapped store");
    }
}

impl Default for TempMapped {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempMapped {
    type Target = MappedStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TempMapped {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// A relational store in a temporary directory.
pub struct TempRelational {
    /// The store instance.
    pub store: RelationalStore,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TempRelational {
    /// Creates a store with default options.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::new())
    }

    /// Creates a store with the given options.
    pub fn with_options(options: StoreOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.db");
        let store =
            RelationalStore::open(&path, options).expect("Failed to open relational store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store and reopens it with `options`.
    pub fn reopen(&mut self, options: StoreOptions) {
        self.store.close().expect("Failed to close relational store");
        self.store =
            RelationalStore::open(&self.path, options).expect("Failed to reopen relational store");
    }
}

impl Default for TempRelational {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempRelational {
    type Target = RelationalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TempRelational {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test against a temporary mapped store.
///
/// # Example
///
/// ```rust
/// use fuelkv_core::KvStore;
/// use fuelkv_testkit::with_temp_mapped;
///
/// with_temp_mapped(|store| {
///     store.set("k", "v").unwrap();
///     assert!(store.contains("k").unwrap());
/// });
/// ```
pub fn with_temp_mapped<F, R>(f: F) -> R
where
    F: FnOnce(&mut MappedStore) -> R,
{
    let mut fixture = TempMapped::new();
    f(&mut fixture.store)
}

/// Runs a test against a temporary relational store.
pub fn with_temp_relational<F, R>(f: F) -> R
where
    F: FnOnce(&mut RelationalStore) -> R,
{
    let mut fixture = TempRelational::new();
    f(&mut fixture.store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelkv_core::Value;

    #[test]
    fn mapped_fixture_reopens_read_only() {
        let mut fixture = TempMapped::new();
        fixture.set("a", 1).unwrap();
        fixture.reopen(StoreOptions::read_only_mode());

        assert!(fixture.is_read_only());
        assert_eq!(fixture.get("a").unwrap(), Value::Integer(1));
        assert!(fixture.path().exists());
    }

    #[test]
    fn relational_fixture_reopens() {
        let mut fixture = TempRelational::new();
        fixture.as_table("t").set("a", 1).unwrap();
        fixture.reopen(StoreOptions::new());
        assert_eq!(fixture.as_table("t").get("a").unwrap(), Value::Integer(1));
    }

    #[test]
    fn closures_return_values() {
        let len = with_temp_relational(|store| {
            store.set("x", 1).unwrap();
            store.len().unwrap()
        });
        assert_eq!(len, 1);
    }
}
