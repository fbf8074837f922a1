//! # fuelkv Testkit
//!
//! Test utilities for fuelkv.
//!
//! This crate provides:
//! - Temporary mapped and relational stores that clean up after themselves
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use fuelkv_core::KvStore;
//! use fuelkv_testkit::prelude::*;
//!
//! with_temp_mapped(|store| {
//!     store.set("a", 1).unwrap();
//!     assert_eq!(store.len().unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
