//! Node cache and backing files for the blink B-link tree.
//!
//! This crate provides:
//! - `BlockFile` byte-addressed storage (in memory or on disk)
//! - `CacheEntry`, the load/flush contract for cached objects
//! - `NodeCache`, a fixed-size frame pool with clock eviction
//! - `NodeStore`, the interface the tree engine is written against

mod cache;
mod entry;
mod file;
mod frame;
mod replacer;
mod store;

pub use cache::{CacheStats, EntryReadGuard, EntryWriteGuard, NodeCache};
pub use entry::CacheEntry;
pub use file::{open_file, BlockFile, DiskFile, MemFile, FILE_SIGNATURE};
pub use frame::FrameId;
pub use replacer::{ClockReplacer, Replacer};
pub use store::NodeStore;
