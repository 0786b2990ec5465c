//! Cache frames.

use blink_common::Address;
use parking_lot::RwLock;
use std::sync::Arc;

/// Index of a frame in the node cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// One slot of the cache.
///
/// A resident frame owns its entry behind an `Arc<RwLock<_>>` so that
/// guards can hold the lock without borrowing the cache state. The pin
/// count is the number of live guards.
pub struct Frame<T> {
    addr: Option<Address>,
    entry: Option<Arc<RwLock<T>>>,
    pin_count: u32,
}

impl<T> Frame<T> {
    pub fn empty() -> Self {
        Self {
            addr: None,
            entry: None,
            pin_count: 0,
        }
    }

    /// Installs `entry` for `addr`. The frame must be empty.
    pub fn install(&mut self, addr: Address, entry: T) -> Arc<RwLock<T>> {
        let entry = Arc::new(RwLock::new(entry));
        self.addr = Some(addr);
        self.entry = Some(Arc::clone(&entry));
        self.pin_count = 0;
        entry
    }

    /// Empties the frame, handing back its entry.
    pub fn reset(&mut self) -> Option<Arc<RwLock<T>>> {
        self.addr = None;
        self.pin_count = 0;
        self.entry.take()
    }

    #[inline]
    pub fn addr(&self) -> Option<Address> {
        self.addr
    }

    pub fn set_addr(&mut self, addr: Address) {
        self.addr = Some(addr);
    }

    #[inline]
    pub fn entry(&self) -> Option<&Arc<RwLock<T>>> {
        self.entry.as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Increments the pin count, returning the previous value.
    pub fn pin(&mut self) -> u32 {
        let prev = self.pin_count;
        self.pin_count += 1;
        prev
    }

    /// Decrements the pin count, returning the new value. Saturates at zero.
    pub fn unpin(&mut self) -> u32 {
        self.pin_count = self.pin_count.saturating_sub(1);
        self.pin_count
    }
}

impl<T> std::fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("addr", &self.addr)
            .field("resident", &!self.is_empty())
            .field("pin_count", &self.pin_count)
            .finish()
    }
}
