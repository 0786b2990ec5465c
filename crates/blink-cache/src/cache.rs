//! Address-keyed node cache.
//!
//! Holds a fixed number of frames, each caching one entry loaded from the
//! backing file. Access goes through RAII guards: `protect` hands out an
//! exclusive guard, `find` a shared one, and dropping either releases the
//! pin. Unpinned frames are eviction candidates; a dirty victim is written
//! back before its frame is reused.

use crate::entry::CacheEntry;
use crate::file::{open_file, BlockFile};
use crate::frame::{Frame, FrameId};
use crate::replacer::{ClockReplacer, Replacer};
use blink_common::{Address, BlinkError, CacheConfig, Result, StoreConfig};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups satisfied from memory.
    pub hits: u64,
    /// Lookups that had to read the file.
    pub misses: u64,
    /// Entries decoded from the file.
    pub loads: u64,
    /// Entries inserted by `create`.
    pub inits: u64,
    /// Dirty entries written back.
    pub flushes: u64,
    /// Frames reclaimed by the replacer.
    pub evictions: u64,
}

struct CacheState<T> {
    frames: Vec<Frame<T>>,
    table: HashMap<Address, FrameId>,
    free_list: Vec<FrameId>,
    stats: CacheStats,
}

/// Node cache over a `BlockFile`.
pub struct NodeCache<T: CacheEntry, F: BlockFile> {
    ctx: T::Context,
    file: F,
    num_frames: usize,
    state: Mutex<CacheState<T>>,
    replacer: ClockReplacer,
}

impl<T: CacheEntry> NodeCache<T, Box<dyn BlockFile>> {
    /// Opens the backing file described by `config` and builds a cache over it.
    pub fn open(ctx: T::Context, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let file = open_file(&config.file)?;
        Self::new(ctx, file, &config.cache)
    }
}

impl<T: CacheEntry, F: BlockFile> NodeCache<T, F> {
    /// Creates a cache with `config.num_frames` frames over `file`.
    pub fn new(ctx: T::Context, file: F, config: &CacheConfig) -> Result<Self> {
        let num_frames = config.num_frames;
        if num_frames < CacheConfig::MIN_FRAMES {
            return Err(BlinkError::InvalidParameter {
                name: "cache.num_frames".to_string(),
                value: num_frames.to_string(),
            });
        }

        let frames = (0..num_frames).map(|_| Frame::empty()).collect();
        // Popped from the back, so frame 0 is handed out first.
        let free_list = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        Ok(Self {
            ctx,
            file,
            num_frames,
            state: Mutex::new(CacheState {
                frames,
                table: HashMap::with_capacity(num_frames),
                free_list,
                stats: CacheStats::default(),
            }),
            replacer: ClockReplacer::new(num_frames),
        })
    }

    /// Creates a cache sized from available system memory.
    pub fn auto_sized(ctx: T::Context, file: F) -> Result<Self> {
        let config = CacheConfig::auto_sized(T::size(&ctx));
        Self::new(ctx, file, &config)
    }

    /// Returns the entry context.
    pub fn context(&self) -> &T::Context {
        &self.ctx
    }

    /// Returns the backing file.
    pub fn file(&self) -> &F {
        &self.file
    }

    /// Size of one entry image.
    pub fn entry_size(&self) -> usize {
        T::size(&self.ctx)
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of cached entries.
    pub fn resident_count(&self) -> usize {
        self.state.lock().table.len()
    }

    /// Number of entries currently held by a guard.
    pub fn pinned_count(&self) -> usize {
        self.state
            .lock()
            .frames
            .iter()
            .filter(|f| f.is_pinned())
            .count()
    }

    /// True if an entry for `addr` is in memory.
    pub fn contains(&self, addr: Address) -> bool {
        self.state.lock().table.contains_key(&addr)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Exclusive access to the entry at `addr`, loading it on a miss.
    ///
    /// Fails with `NodeProtected` if any guard for `addr` is alive.
    pub fn protect(&self, addr: Address) -> Result<EntryWriteGuard<'_, T, F>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let (frame_id, entry) = self.resident(state, addr)?;
        let entry = entry
            .try_write_arc()
            .ok_or(BlinkError::NodeProtected { addr: addr.offset() })?;
        self.pin(state, frame_id);

        Ok(EntryWriteGuard {
            cache: self,
            frame_id,
            addr,
            entry,
        })
    }

    /// Shared access to the entry at `addr`, loading it on a miss.
    ///
    /// Fails with `NodeProtected` if an exclusive guard for `addr` is alive.
    pub fn find(&self, addr: Address) -> Result<EntryReadGuard<'_, T, F>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let (frame_id, entry) = self.resident(state, addr)?;
        let entry = entry
            .try_read_arc()
            .ok_or(BlinkError::NodeProtected { addr: addr.offset() })?;
        self.pin(state, frame_id);

        Ok(EntryReadGuard {
            cache: self,
            frame_id,
            addr,
            entry,
        })
    }

    /// Allocates file space for `entry` and caches it, exclusively held.
    ///
    /// The entry is not written until it is flushed or evicted, so it
    /// should report itself dirty.
    pub fn create(&self, entry: T) -> Result<EntryWriteGuard<'_, T, F>> {
        let addr = self.file.allocate(self.entry_size())?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let frame_id = self.take_frame(state)?;
        let entry = state.frames[frame_id.index()].install(addr, entry);
        state.table.insert(addr, frame_id);
        state.stats.inits += 1;
        self.pin(state, frame_id);

        trace!(target: "blink_cache::load", %addr, %frame_id, "created entry");
        Ok(EntryWriteGuard {
            cache: self,
            frame_id,
            addr,
            entry: entry.write_arc(),
        })
    }

    /// Writes back dirty entries.
    ///
    /// `Some(addr)` flushes one entry, `None` all of them. With `destroy`
    /// the flushed entries are also dropped from memory; destroying an
    /// entry that is still held fails with `NodePinned` before anything is
    /// written. Without `destroy`, held entries are skipped.
    pub fn flush(&self, addr: Option<Address>, destroy: bool) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut targets: Vec<(Address, FrameId)> = match addr {
            Some(addr) => state
                .table
                .get(&addr)
                .map(|&fid| (addr, fid))
                .into_iter()
                .collect(),
            None => state.table.iter().map(|(&a, &f)| (a, f)).collect(),
        };
        targets.sort_by_key(|(addr, _)| *addr);

        if destroy {
            if let Some((addr, _)) = targets
                .iter()
                .find(|(_, fid)| state.frames[fid.index()].is_pinned())
            {
                return Err(BlinkError::NodePinned { addr: addr.offset() });
            }
        }

        for (addr, frame_id) in targets {
            if state.frames[frame_id.index()].is_pinned() {
                trace!(target: "blink_cache::flush", %addr, "skipping held entry");
                continue;
            }
            self.write_back(state, frame_id, addr)?;
            if destroy {
                self.discard(state, frame_id, addr);
            }
        }

        self.file.sync()?;
        debug!(target: "blink_cache::flush", ?addr, destroy, "flushed");
        Ok(())
    }

    /// Moves the cached entry at `old` to the identity `new`.
    ///
    /// Anything cached at `new` is written back and dropped first. Nothing
    /// is read or written for the moved entry itself. Both addresses must
    /// be unheld.
    pub fn rename(&self, old: Address, new: Address) -> Result<()> {
        if old == new {
            return Ok(());
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        for addr in [old, new] {
            if let Some(&fid) = state.table.get(&addr) {
                if state.frames[fid.index()].is_pinned() {
                    return Err(BlinkError::NodePinned { addr: addr.offset() });
                }
            }
        }

        if let Some(&dst) = state.table.get(&new) {
            self.write_back(state, dst, new)?;
            self.discard(state, dst, new);
        }

        if let Some(fid) = state.table.remove(&old) {
            state.frames[fid.index()].set_addr(new);
            state.table.insert(new, fid);
        }

        debug!(target: "blink_cache::rename", %old, %new, "renamed entry");
        Ok(())
    }

    /// Allocates `size` bytes of file space.
    pub fn allocate(&self, size: usize) -> Result<Address> {
        self.file.allocate(size)
    }

    /// Copies `size` raw bytes from `from` to `to` in the file, bypassing
    /// the cache.
    pub fn copy_raw(&self, from: Address, to: Address, size: usize) -> Result<()> {
        let mut buf = vec![0u8; size];
        self.file.read_at(from, &mut buf)?;
        self.file.write_at(to, &buf)
    }

    /// Looks up `addr`, loading it into a frame on a miss.
    fn resident(
        &self,
        state: &mut CacheState<T>,
        addr: Address,
    ) -> Result<(FrameId, Arc<RwLock<T>>)> {
        if let Some(&frame_id) = state.table.get(&addr) {
            if let Some(entry) = state.frames[frame_id.index()].entry() {
                state.stats.hits += 1;
                return Ok((frame_id, Arc::clone(entry)));
            }
        }
        state.stats.misses += 1;

        if !addr.is_defined() {
            return Err(BlinkError::Storage(
                "load through undefined address".to_string(),
            ));
        }

        let frame_id = self.take_frame(state)?;
        let loaded = self.read_entry(addr);
        let entry = match loaded {
            Ok(entry) => entry,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };

        let entry = state.frames[frame_id.index()].install(addr, entry);
        state.table.insert(addr, frame_id);
        state.stats.loads += 1;

        trace!(target: "blink_cache::load", %addr, %frame_id, "loaded entry");
        Ok((frame_id, entry))
    }

    fn read_entry(&self, addr: Address) -> Result<T> {
        let mut image = vec![0u8; self.entry_size()];
        self.file.read_at(addr, &mut image)?;
        T::load(&self.ctx, addr, &image)
    }

    /// Returns an empty frame, evicting if none is free.
    fn take_frame(&self, state: &mut CacheState<T>) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let victim = self.replacer.evict().ok_or(BlinkError::CacheFull)?;
        let Some(addr) = state.frames[victim.index()].addr() else {
            return Ok(victim);
        };

        if let Err(e) = self.write_back(state, victim, addr) {
            warn!(target: "blink_cache::evict", %addr, error = %e, "write-back of victim failed");
            self.replacer.set_evictable(victim, true);
            return Err(e);
        }

        state.table.remove(&addr);
        state.frames[victim.index()].reset();
        state.stats.evictions += 1;

        trace!(target: "blink_cache::evict", %addr, frame_id = %victim, "evicted entry");
        Ok(victim)
    }

    /// Writes the frame's entry to `addr` if it is dirty. The frame must be
    /// unpinned.
    fn write_back(&self, state: &mut CacheState<T>, frame_id: FrameId, addr: Address) -> Result<()> {
        let Some(entry) = state.frames[frame_id.index()].entry() else {
            return Ok(());
        };
        let mut entry = entry.write();
        if !entry.is_dirty() {
            return Ok(());
        }

        let image = entry.flush(&self.ctx)?;
        self.file.write_at(addr, image)?;
        state.stats.flushes += 1;
        Ok(())
    }

    /// Drops an unpinned entry from memory without writing it.
    fn discard(&self, state: &mut CacheState<T>, frame_id: FrameId, addr: Address) {
        state.table.remove(&addr);
        state.frames[frame_id.index()].reset();
        self.replacer.remove(frame_id);
        state.free_list.push(frame_id);
    }

    fn pin(&self, state: &mut CacheState<T>, frame_id: FrameId) {
        if state.frames[frame_id.index()].pin() == 0 {
            self.replacer.set_evictable(frame_id, false);
        }
        self.replacer.record_access(frame_id);
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let frame = &mut state.frames[frame_id.index()];
        if frame.unpin() == 0 && !frame.is_empty() {
            self.replacer.set_evictable(frame_id, true);
        }
    }
}

/// Exclusive hold on a cached entry. Dropping it unprotects the entry.
pub struct EntryWriteGuard<'a, T: CacheEntry, F: BlockFile> {
    cache: &'a NodeCache<T, F>,
    frame_id: FrameId,
    addr: Address,
    entry: ArcRwLockWriteGuard<RawRwLock, T>,
}

impl<T: CacheEntry, F: BlockFile> EntryWriteGuard<'_, T, F> {
    /// File address of the held entry.
    pub fn addr(&self) -> Address {
        self.addr
    }
}

impl<T: CacheEntry, F: BlockFile> Deref for EntryWriteGuard<'_, T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entry
    }
}

impl<T: CacheEntry, F: BlockFile> DerefMut for EntryWriteGuard<'_, T, F> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entry
    }
}

impl<T: CacheEntry, F: BlockFile> Drop for EntryWriteGuard<'_, T, F> {
    fn drop(&mut self) {
        self.cache.unpin(self.frame_id);
    }
}

/// Shared hold on a cached entry.
pub struct EntryReadGuard<'a, T: CacheEntry, F: BlockFile> {
    cache: &'a NodeCache<T, F>,
    frame_id: FrameId,
    addr: Address,
    entry: ArcRwLockReadGuard<RawRwLock, T>,
}

impl<T: CacheEntry, F: BlockFile> EntryReadGuard<'_, T, F> {
    /// File address of the held entry.
    pub fn addr(&self) -> Address {
        self.addr
    }
}

impl<T: CacheEntry, F: BlockFile> Deref for EntryReadGuard<'_, T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entry
    }
}

impl<T: CacheEntry, F: BlockFile> Drop for EntryReadGuard<'_, T, F> {
    fn drop(&mut self) {
        self.cache.unpin(self.frame_id);
    }
}
