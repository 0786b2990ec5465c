//! Victim selection for the node cache.

use crate::frame::FrameId;
use parking_lot::Mutex;

/// Chooses which unpinned frame gives up its node when the cache is full.
pub trait Replacer: Send + Sync {
    /// Notes that the frame's node was just used.
    fn record_access(&self, frame_id: FrameId);

    /// Marks a frame as a candidate for eviction, or withdraws it.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Picks and withdraws a victim. `None` when nothing is evictable.
    fn evict(&self) -> Option<FrameId>;

    /// Forgets a frame entirely.
    fn remove(&self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

/// Second-chance clock.
///
/// A hand sweeps over the frames. An evictable frame whose reference bit is
/// set loses the bit and survives this pass; one with a clear bit is the
/// victim. Two sweeps always suffice since the first clears every bit.
pub struct ClockReplacer {
    inner: Mutex<ClockState>,
}

struct ClockState {
    referenced: Vec<bool>,
    evictable: Vec<bool>,
    evictable_count: usize,
    hand: usize,
}

impl ClockState {
    fn in_range(&self, frame_id: FrameId) -> Option<usize> {
        let idx = frame_id.index();
        (idx < self.evictable.len()).then_some(idx)
    }
}

impl ClockReplacer {
    /// Creates a clock over `num_frames` frames, none evictable.
    pub fn new(num_frames: usize) -> Self {
        Self {
            inner: Mutex::new(ClockState {
                referenced: vec![false; num_frames],
                evictable: vec![false; num_frames],
                evictable_count: 0,
                hand: 0,
            }),
        }
    }

    /// Number of frames tracked.
    pub fn capacity(&self) -> usize {
        self.inner.lock().evictable.len()
    }
}

impl Replacer for ClockReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut state = self.inner.lock();
        if let Some(idx) = state.in_range(frame_id) {
            state.referenced[idx] = true;
        }
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut state = self.inner.lock();
        let Some(idx) = state.in_range(frame_id) else {
            return;
        };
        if state.evictable[idx] != evictable {
            state.evictable[idx] = evictable;
            if evictable {
                state.evictable_count += 1;
            } else {
                state.evictable_count -= 1;
            }
        }
    }

    fn evict(&self) -> Option<FrameId> {
        let mut state = self.inner.lock();
        if state.evictable_count == 0 {
            return None;
        }

        let n = state.evictable.len();
        for _ in 0..2 * n {
            let hand = state.hand;
            state.hand = (hand + 1) % n;

            if !state.evictable[hand] {
                continue;
            }
            if state.referenced[hand] {
                state.referenced[hand] = false;
                continue;
            }

            state.evictable[hand] = false;
            state.evictable_count -= 1;
            return Some(FrameId(hand as u32));
        }
        None
    }

    fn remove(&self, frame_id: FrameId) {
        let mut state = self.inner.lock();
        if let Some(idx) = state.in_range(frame_id) {
            if state.evictable[idx] {
                state.evictable[idx] = false;
                state.evictable_count -= 1;
            }
            state.referenced[idx] = false;
        }
    }

    fn size(&self) -> usize {
        self.inner.lock().evictable_count
    }
}
