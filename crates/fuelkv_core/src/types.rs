//! Shared store types.

use crate::config::StoreOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which backend a store handle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Append-only memory-mapped file.
    Mapped,
    /// SQLite database with one table per namespace.
    Relational,
}

impl BackendKind {
    /// Lowercase name, as used in logs and descriptors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mapped => "mapped",
            Self::Relational => "relational",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to reopen a store in another thread or process.
///
/// A descriptor carries no live state. Pending writes are not part of it,
/// so flush before handing one over if the receiver must see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    /// Absolute path of the store file.
    pub path: PathBuf,
    /// Whether the handle was read-only.
    pub read_only: bool,
    /// Write cache capacity of the handle.
    pub cache_capacity: usize,
    /// Backend of the handle.
    pub backend: BackendKind,
}

impl StoreDescriptor {
    /// Options equivalent to the described handle.
    #[must_use]
    pub fn options(&self) -> StoreOptions {
        StoreOptions::new()
            .with_read_only(self.read_only)
            .cache_capacity(self.cache_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_serializes_backend_in_snake_case() {
        let descriptor = StoreDescriptor {
            path: PathBuf::from("/data/train.db"),
            read_only: true,
            cache_capacity: 10,
            backend: BackendKind::Relational,
        };

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"backend\":\"relational\""));

        let back: StoreDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn descriptor_options_keep_mode_and_capacity() {
        let descriptor = StoreDescriptor {
            path: PathBuf::from("/data/feats.mmap"),
            read_only: true,
            cache_capacity: 7,
            backend: BackendKind::Mapped,
        };

        let options = descriptor.options();
        assert!(options.read_only);
        assert_eq!(options.cache_capacity, 7);
        assert!(!options.override_existing);
    }
}
