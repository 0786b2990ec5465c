//! Load/flush contract between the cache and the objects it holds.

use blink_common::{Address, Result};

/// An object the node cache can load from and write back to a `BlockFile`.
///
/// Every entry of one type has the same on-disk size for a given context,
/// so the cache can read an image without knowing what is in it.
pub trait CacheEntry: Sized + Send + Sync {
    /// Shared state needed to interpret images (key codec, layout, ...).
    type Context: Send + Sync;

    /// Size in bytes of one on-disk image.
    fn size(ctx: &Self::Context) -> usize;

    /// Builds an entry from the image stored at `addr`.
    fn load(ctx: &Self::Context, addr: Address, image: &[u8]) -> Result<Self>;

    /// True when the in-memory state differs from the last written image.
    fn is_dirty(&self) -> bool;

    /// Serializes the entry, marks it clean and returns the image to write.
    fn flush(&mut self, ctx: &Self::Context) -> Result<&[u8]>;
}
