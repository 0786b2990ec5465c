//! The storage interface consumed by the tree engine.

use crate::cache::{EntryReadGuard, EntryWriteGuard, NodeCache};
use crate::entry::CacheEntry;
use crate::file::BlockFile;
use blink_common::{Address, Result};
use std::ops::{Deref, DerefMut};

/// Address-keyed pinning store.
///
/// Exclusive holds come from `protect`, shared ones from `find`; dropping
/// the returned guard unprotects the entry.
pub trait NodeStore {
    type Entry: CacheEntry;

    type Read<'a>: Deref<Target = Self::Entry>
    where
        Self: 'a;

    type Write<'a>: DerefMut<Target = Self::Entry>
    where
        Self: 'a;

    /// Context shared by every entry of this store.
    fn context(&self) -> &<Self::Entry as CacheEntry>::Context;

    /// Allocates storage for `entry` and holds it exclusively.
    fn create(&self, entry: Self::Entry) -> Result<(Address, Self::Write<'_>)>;

    fn protect(&self, addr: Address) -> Result<Self::Write<'_>>;

    fn find(&self, addr: Address) -> Result<Self::Read<'_>>;

    /// Writes back one entry or all of them, optionally dropping them.
    fn flush(&self, addr: Option<Address>, destroy: bool) -> Result<()>;

    /// Gives the cached entry at `old` the identity `new`.
    fn rename(&self, old: Address, new: Address) -> Result<()>;

    /// Raw file space for one entry image.
    fn allocate(&self, size: usize) -> Result<Address>;

    /// Copies raw bytes inside the file.
    fn copy_raw(&self, from: Address, to: Address, size: usize) -> Result<()>;
}

impl<T: CacheEntry, F: BlockFile> NodeStore for NodeCache<T, F> {
    type Entry = T;
    type Read<'a> = EntryReadGuard<'a, T, F> where Self: 'a;
    type Write<'a> = EntryWriteGuard<'a, T, F> where Self: 'a;

    fn context(&self) -> &T::Context {
        NodeCache::context(self)
    }

    fn create(&self, entry: T) -> Result<(Address, Self::Write<'_>)> {
        let guard = NodeCache::create(self, entry)?;
        Ok((guard.addr(), guard))
    }

    fn protect(&self, addr: Address) -> Result<Self::Write<'_>> {
        NodeCache::protect(self, addr)
    }

    fn find(&self, addr: Address) -> Result<Self::Read<'_>> {
        NodeCache::find(self, addr)
    }

    fn flush(&self, addr: Option<Address>, destroy: bool) -> Result<()> {
        NodeCache::flush(self, addr, destroy)
    }

    fn rename(&self, old: Address, new: Address) -> Result<()> {
        NodeCache::rename(self, old, new)
    }

    fn allocate(&self, size: usize) -> Result<Address> {
        NodeCache::allocate(self, size)
    }

    fn copy_raw(&self, from: Address, to: Address, size: usize) -> Result<()> {
        NodeCache::copy_raw(self, from, to, size)
    }
}
