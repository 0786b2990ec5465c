//! B-link tree nodes and their on-disk image.
//!
//! Image layout (all sizes fixed per class and address width):
//!
//! ```text
//! "TREE" | class id (u8) | level (u8) | nchildren (u16 BE) | left | right
//! 2k x (raw key, child address) | trailing raw key
//! ```
//!
//! Addresses are little-endian with an all-ones "undefined" sentinel.

use crate::class::KeyCodec;
use blink_cache::CacheEntry;
use blink_common::{Address, AddressWidth, BlinkError, Result};
use bytes::{Buf, BufMut};
use std::sync::{Arc, OnceLock};

/// Signature at the start of every node image.
pub const NODE_MAGIC: [u8; 4] = *b"TREE";

/// Byte layout of a node for one class and address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    class_id: u8,
    k: usize,
    sizeof_rkey: usize,
    width: AddressWidth,
}

impl NodeLayout {
    /// Signature, class id, level and child count.
    const FIXED_HEADER: usize = 8;

    /// Computes the layout for `codec`, rejecting unusable classes.
    pub fn new<C: KeyCodec + ?Sized>(codec: &C, width: AddressWidth) -> Result<Self> {
        let k = codec.min_degree();
        if k < 2 || 2 * k > u16::MAX as usize {
            return Err(BlinkError::InvalidParameter {
                name: "min_degree".to_string(),
                value: k.to_string(),
            });
        }
        let sizeof_rkey = codec.sizeof_rkey();
        if sizeof_rkey == 0 {
            return Err(BlinkError::InvalidParameter {
                name: "sizeof_rkey".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(Self {
            class_id: codec.id(),
            k,
            sizeof_rkey,
            width,
        })
    }

    #[inline]
    pub fn class_id(&self) -> u8 {
        self.class_id
    }

    #[inline]
    pub fn min_degree(&self) -> usize {
        self.k
    }

    /// Maximum number of children, `2k`.
    #[inline]
    pub fn capacity(&self) -> usize {
        2 * self.k
    }

    #[inline]
    pub fn sizeof_rkey(&self) -> usize {
        self.sizeof_rkey
    }

    #[inline]
    pub fn address_width(&self) -> AddressWidth {
        self.width
    }

    pub fn header_size(&self) -> usize {
        Self::FIXED_HEADER + 2 * self.width.bytes()
    }

    /// Size of a complete node image.
    pub fn node_size(&self) -> usize {
        self.header_size()
            + self.capacity() * self.width.bytes()
            + (self.capacity() + 1) * self.sizeof_rkey
    }

    /// Memory taken by the native keys of one node.
    pub fn total_native_key_size(&self, sizeof_nkey: usize) -> usize {
        (self.capacity() + 1) * sizeof_nkey
    }

    fn key_offset(&self, i: usize) -> usize {
        self.header_size() + i * (self.sizeof_rkey + self.width.bytes())
    }

    fn child_offset(&self, i: usize) -> usize {
        self.key_offset(i) + self.sizeof_rkey
    }
}

/// Everything needed to load and flush nodes of one tree class.
pub struct NodeContext<C> {
    codec: Arc<C>,
    layout: NodeLayout,
}

impl<C: KeyCodec> NodeContext<C> {
    pub fn new(codec: Arc<C>, width: AddressWidth) -> Result<Self> {
        let layout = NodeLayout::new(codec.as_ref(), width)?;
        Ok(Self { codec, layout })
    }

    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }
}

/// Which side of the searched child a new child goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One key position: raw bytes plus a lazily decoded native value.
#[derive(Clone)]
struct KeySlot<K> {
    raw: Vec<u8>,
    native: OnceLock<K>,
    /// Native value is newer than `raw`.
    dirty: bool,
}

impl<K> KeySlot<K> {
    fn empty(sizeof_rkey: usize) -> Self {
        Self {
            raw: vec![0; sizeof_rkey],
            native: OnceLock::new(),
            dirty: false,
        }
    }

    fn from_raw(raw: &[u8]) -> Self {
        Self {
            raw: raw.to_vec(),
            native: OnceLock::new(),
            dirty: false,
        }
    }

    fn with_native(sizeof_rkey: usize, key: K) -> Self {
        Self {
            raw: vec![0; sizeof_rkey],
            native: OnceLock::from(key),
            dirty: true,
        }
    }

    fn native<C: KeyCodec<Key = K> + ?Sized>(&self, codec: &C) -> Result<&K> {
        if let Some(key) = self.native.get() {
            return Ok(key);
        }
        let key = codec.decode_key(&self.raw)?;
        Ok(self.native.get_or_init(|| key))
    }

    fn set(&mut self, key: K) {
        self.native = OnceLock::from(key);
        self.dirty = true;
    }

    fn sync_raw<C: KeyCodec<Key = K> + ?Sized>(&mut self, codec: &C) -> Result<()> {
        if self.dirty {
            if let Some(key) = self.native.get() {
                codec.encode_key(key, &mut self.raw)?;
            }
            self.dirty = false;
        }
        Ok(())
    }
}

/// In-memory B-link tree node.
///
/// Holds `2k` child slots and `2k + 1` key slots; only the first
/// `nchildren` children and `nchildren + 1` keys are meaningful.
pub struct Node<C: KeyCodec> {
    layout: NodeLayout,
    level: u32,
    nchildren: usize,
    left: Option<Address>,
    right: Option<Address>,
    children: Vec<Address>,
    keys: Vec<KeySlot<C::Key>>,
    dirty: bool,
    /// Leading children that differ from `image`.
    dirty_children: usize,
    /// Last image read or written.
    image: Vec<u8>,
}

impl<C: KeyCodec> Node<C> {
    /// Creates an empty node at `level`.
    pub fn new(layout: &NodeLayout, level: u32) -> Self {
        let cap = layout.capacity();
        Self {
            layout: *layout,
            level,
            nchildren: 0,
            left: None,
            right: None,
            children: vec![Address::UNDEFINED; cap],
            keys: (0..=cap)
                .map(|_| KeySlot::empty(layout.sizeof_rkey()))
                .collect(),
            dirty: true,
            dirty_children: cap,
            image: vec![0; layout.node_size()],
        }
    }

    /// Builds a node from native keys and children.
    ///
    /// `keys` must hold exactly one more entry than `children`.
    pub fn with_entries(
        layout: &NodeLayout,
        level: u32,
        keys: Vec<C::Key>,
        children: &[Address],
    ) -> Result<Self> {
        if children.len() > layout.capacity() || keys.len() != children.len() + 1 {
            return Err(BlinkError::InvalidParameter {
                name: "node entries".to_string(),
                value: format!("{} keys, {} children", keys.len(), children.len()),
            });
        }

        let mut node = Self::new(layout, level);
        for (i, key) in keys.into_iter().enumerate() {
            node.keys[i] = KeySlot::with_native(layout.sizeof_rkey(), key);
        }
        node.children[..children.len()].copy_from_slice(children);
        node.nchildren = children.len();
        Ok(node)
    }

    #[inline]
    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn nchildren(&self) -> usize {
        self.nchildren
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.nchildren == self.layout.capacity()
    }

    #[inline]
    pub fn left(&self) -> Option<Address> {
        self.left
    }

    #[inline]
    pub fn right(&self) -> Option<Address> {
        self.right
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of leading children that will be rewritten on flush.
    #[inline]
    pub fn dirty_children(&self) -> usize {
        self.dirty_children
    }

    /// The meaningful children.
    pub fn children(&self) -> &[Address] {
        &self.children[..self.nchildren]
    }

    /// Child `i`. Undefined past `nchildren`.
    #[inline]
    pub fn child(&self, i: usize) -> Address {
        self.children
            .get(i)
            .copied()
            .unwrap_or(Address::UNDEFINED)
    }

    /// Native key `i`, decoded on first use.
    pub fn key<'a>(&'a self, i: usize, codec: &C) -> Result<&'a C::Key> {
        let slot = self.keys.get(i).ok_or_else(|| {
            BlinkError::invariant(format!(
                "key index {i} beyond node capacity {}",
                self.layout.capacity()
            ))
        })?;
        slot.native(codec)
    }

    /// Raw bytes of key `i` as of the last load or flush.
    pub fn raw_key(&self, i: usize) -> Option<&[u8]> {
        self.keys.get(i).map(|slot| slot.raw.as_slice())
    }

    pub fn set_key(&mut self, i: usize, key: C::Key) {
        self.keys[i].set(key);
        self.dirty = true;
    }

    pub fn set_child(&mut self, i: usize, child: Address) {
        self.children[i] = child;
        self.dirty_children = self.dirty_children.max(i + 1);
        self.dirty = true;
    }

    pub fn set_left(&mut self, left: Option<Address>) {
        self.left = left;
        self.dirty = true;
    }

    pub fn set_right(&mut self, right: Option<Address>) {
        self.right = right;
        self.dirty = true;
    }

    /// Gives an empty node its first child.
    pub(crate) fn set_first_child(&mut self, child: Address, left_key: C::Key, right_key: C::Key) {
        self.set_key(0, left_key);
        self.set_key(1, right_key);
        self.set_child(0, child);
        self.nchildren = 1;
    }

    /// Splices `child` in next to child `idx`.
    ///
    /// `mid_key` always lands at key position `idx + 1`: for `Side::Left`
    /// it is the new child's right key, for `Side::Right` its left key.
    /// The node must not be full.
    pub(crate) fn insert_child(&mut self, idx: usize, side: Side, child: Address, mid_key: C::Key) {
        debug_assert!(!self.is_full());
        debug_assert!(idx < self.nchildren.max(1));

        let sizeof_rkey = self.layout.sizeof_rkey();
        self.keys
            .insert(idx + 1, KeySlot::with_native(sizeof_rkey, mid_key));
        self.keys.pop();

        let pos = match side {
            Side::Left => idx,
            Side::Right => idx + 1,
        };
        self.children.insert(pos, child);
        self.children.pop();

        self.nchildren += 1;
        self.dirty_children = self.dirty_children.max(self.nchildren);
        self.dirty = true;
    }

    /// Moves the upper `k` children and `k + 1` keys into the empty node
    /// `twin`. The middle key ends up in both nodes.
    pub(crate) fn split_into(&mut self, twin: &mut Node<C>) {
        let k = self.layout.min_degree();
        let cap = self.layout.capacity();
        let sizeof_rkey = self.layout.sizeof_rkey();
        debug_assert!(self.is_full());
        debug_assert_eq!(twin.nchildren, 0);

        twin.keys[0] = self.keys[k].clone();
        for i in 1..=k {
            twin.keys[i] = std::mem::replace(&mut self.keys[k + i], KeySlot::empty(sizeof_rkey));
        }
        for i in 0..k {
            twin.children[i] = std::mem::replace(&mut self.children[k + i], Address::UNDEFINED);
        }

        twin.level = self.level;
        twin.nchildren = k;
        twin.dirty_children = cap;
        twin.dirty = true;

        self.nchildren = k;
        self.dirty_children = cap;
        self.dirty = true;
    }

    /// Turns this node into a root over two children.
    pub(crate) fn reset_as_root(
        &mut self,
        level: u32,
        children: [Address; 2],
        keys: [C::Key; 3],
    ) {
        let sizeof_rkey = self.layout.sizeof_rkey();
        for slot in self.keys.iter_mut() {
            *slot = KeySlot::empty(sizeof_rkey);
        }
        for (i, key) in keys.into_iter().enumerate() {
            self.keys[i].set(key);
        }
        self.children.fill(Address::UNDEFINED);
        self.children[..2].copy_from_slice(&children);

        self.level = level;
        self.nchildren = 2;
        self.left = None;
        self.right = None;
        self.dirty_children = self.layout.capacity();
        self.dirty = true;
    }

    /// Parses a node image.
    pub fn decode(ctx: &NodeContext<C>, addr: Address, image: &[u8]) -> Result<Self> {
        let layout = ctx.layout;
        let corrupt = |reason: String| BlinkError::CorruptNode {
            addr: addr.offset(),
            reason,
        };

        let size = layout.node_size();
        if image.len() < size {
            return Err(corrupt(format!("image is {} bytes, need {size}", image.len())));
        }

        let mut hdr = &image[..NodeLayout::FIXED_HEADER];
        let mut magic = [0u8; 4];
        hdr.copy_to_slice(&mut magic);
        if magic != NODE_MAGIC {
            return Err(corrupt("bad node signature".to_string()));
        }
        let class_id = hdr.get_u8();
        if class_id != layout.class_id {
            return Err(corrupt(format!(
                "node class {class_id}, expected {}",
                layout.class_id
            )));
        }
        let level = hdr.get_u8() as u32;
        let nchildren = hdr.get_u16() as usize;
        if nchildren > layout.capacity() {
            return Err(corrupt(format!(
                "{nchildren} children exceed capacity {}",
                layout.capacity()
            )));
        }

        let width = layout.width;
        let w = width.bytes();
        let sibling = NodeLayout::FIXED_HEADER;
        let left = width.decode(&image[sibling..sibling + w]);
        let right = width.decode(&image[sibling + w..sibling + 2 * w]);

        let children = (0..layout.capacity())
            .map(|i| {
                let off = layout.child_offset(i);
                width
                    .decode(&image[off..off + w])
                    .unwrap_or(Address::UNDEFINED)
            })
            .collect();
        let keys = (0..=layout.capacity())
            .map(|i| {
                let off = layout.key_offset(i);
                KeySlot::from_raw(&image[off..off + layout.sizeof_rkey])
            })
            .collect();

        Ok(Self {
            layout,
            level,
            nchildren,
            left,
            right,
            children,
            keys,
            dirty: false,
            dirty_children: 0,
            image: image[..size].to_vec(),
        })
    }

    /// Serializes the node into its image.
    ///
    /// Children past the dirty prefix keep their bytes from the last
    /// image.
    pub fn encode(&mut self, codec: &C) -> Result<&[u8]> {
        let layout = self.layout;
        let level = u8::try_from(self.level).map_err(|_| {
            BlinkError::Storage(format!("level {} does not fit a node header", self.level))
        })?;

        for slot in self.keys.iter_mut() {
            slot.sync_raw(codec)?;
        }

        {
            let mut hdr = &mut self.image[..NodeLayout::FIXED_HEADER];
            hdr.put_slice(&NODE_MAGIC);
            hdr.put_u8(layout.class_id);
            hdr.put_u8(level);
            hdr.put_u16(self.nchildren as u16);
        }

        let width = layout.width;
        let w = width.bytes();
        let sibling = NodeLayout::FIXED_HEADER;
        width.encode(self.left, &mut self.image[sibling..sibling + w])?;
        width.encode(self.right, &mut self.image[sibling + w..sibling + 2 * w])?;

        for (i, slot) in self.keys.iter().enumerate() {
            let off = layout.key_offset(i);
            self.image[off..off + layout.sizeof_rkey].copy_from_slice(&slot.raw);
        }
        for i in 0..self.dirty_children.min(layout.capacity()) {
            let off = layout.child_offset(i);
            width.encode(self.children[i].defined(), &mut self.image[off..off + w])?;
        }

        Ok(&self.image)
    }
}

impl<C: KeyCodec> CacheEntry for Node<C> {
    type Context = NodeContext<C>;

    fn size(ctx: &NodeContext<C>) -> usize {
        ctx.layout.node_size()
    }

    fn load(ctx: &NodeContext<C>, addr: Address, image: &[u8]) -> Result<Self> {
        Node::decode(ctx, addr, image)
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn flush(&mut self, ctx: &NodeContext<C>) -> Result<&[u8]> {
        self.encode(ctx.codec.as_ref())?;
        self.dirty = false;
        self.dirty_children = 0;
        Ok(&self.image)
    }
}

impl<C: KeyCodec> std::fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("level", &self.level)
            .field("nchildren", &self.nchildren)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("children", &self.children())
            .field("dirty", &self.dirty)
            .finish()
    }
}
