//! # fuelkv Core
//!
//! Persistent key-value caches for precomputed data such as feature
//! vectors, built for many-reader, single-writer workloads.
//!
//! This crate provides:
//! - [`MappedStore`]: an append-only file read through a memory map, with
//!   an index that can be decoded in the background
//! - [`RelationalStore`]: a SQLite database with one table per namespace
//!   and [`TableView`]s for scoped access
//! - [`StoreRegistry`]: one shared handle per file within a process
//! - [`StoreDescriptor`]: a serializable description for reopening a store
//!   in another thread or process
//!
//! Both stores implement [`KvStore`] and buffer writes in a bounded cache
//! that is flushed when full, on demand, and on close.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fuelkv_core::{KvStore, MappedStore, StoreOptions};
//!
//! let mut store = MappedStore::open("cache.mmap", StoreOptions::new())?;
//! store.set("a", 1)?;
//! store.set("b", "two")?;
//! store.close()?;
//! # Ok::<(), fuelkv_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
pub mod mapped;
mod registry;
pub mod relational;
mod store;
mod types;

pub use config::{StoreOptions, DEFAULT_CACHE_CAPACITY, DEFAULT_INDEX_FLUSH_THRESHOLD};
pub use error::{StoreError, StoreResult};
pub use mapped::MappedStore;
pub use registry::{SharedMapped, SharedRelational, StoreHandle, StoreRegistry};
pub use relational::{RelationalStore, TableView, DEFAULT_TABLE};
pub use store::KvStore;
pub use types::{BackendKind, StoreDescriptor};

pub use fuelkv_codec::Value;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
