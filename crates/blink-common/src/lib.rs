//! Shared types for the blink B-link tree.
//!
//! This crate provides the vocabulary used by the cache and tree crates:
//! file addresses, the error enum and configuration structures.

pub mod address;
pub mod config;
pub mod error;

pub use address::{Address, AddressWidth};
pub use config::{CacheConfig, FileConfig, StoreConfig};
pub use error::{BlinkError, Result};
