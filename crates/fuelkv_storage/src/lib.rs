//! # fuelkv Storage
//!
//! Byte storage backends for fuelkv.
//!
//! Backends are **opaque byte stores** - they do not interpret the data
//! they store. The mapped key-value store in `fuelkv_core` owns the file
//! format (header, value records, index) and talks to a backend only
//! through [`StorageBackend`].
//!
//! ## Available Backends
//!
//! - [`MmapBackend`] - A file read through a shared memory map
//! - [`InMemoryBackend`] - For testing the file format without a file
//!
//! ## Example
//!
//! ```rust
//! use fuelkv_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod mmap;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use mmap::MmapBackend;
