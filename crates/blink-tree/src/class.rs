//! Tree classes.
//!
//! A class tells the engine how to read and write its keys
//! (`KeyCodec`) and what to do at the leaf level (`BTreeClass`). The
//! engine itself never looks inside a key or a leaf record.

use blink_common::{Address, Result};
use std::cmp::Ordering;
use std::fmt::Debug;

/// Converts keys between their fixed-size raw form and native values.
pub trait KeyCodec: Send + Sync {
    /// Native key, decoded lazily from raw bytes.
    type Key: Clone + Debug + Send + Sync;

    /// Class id byte stored in every node header of this class.
    fn id(&self) -> u8;

    /// Minimum degree `k`: non-root nodes hold between `k` and `2k` children.
    fn min_degree(&self) -> usize;

    /// Size in bytes of one raw key.
    fn sizeof_rkey(&self) -> usize;

    /// In-memory size of one native key.
    fn sizeof_nkey(&self) -> usize {
        std::mem::size_of::<Self::Key>()
    }

    /// Decodes a raw key (exactly `sizeof_rkey` bytes).
    fn decode_key(&self, raw: &[u8]) -> Result<Self::Key>;

    /// Encodes `key` into `raw` (exactly `sizeof_rkey` bytes).
    fn encode_key(&self, key: &Self::Key, raw: &mut [u8]) -> Result<()>;
}

/// Which extremity a freshly created leaf record occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewMode {
    /// The first record of an empty tree.
    First,
    /// Left of every existing record.
    Left,
    /// Right of every existing record.
    Right,
}

/// A leaf record made by `BTreeClass::new_leaf`, with its bracketing keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLeaf<K> {
    pub addr: Address,
    pub left_key: K,
    pub right_key: K,
}

/// What happened below the node that made a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<K> {
    /// Nothing for the caller to do.
    NoOp,
    /// The child moved to a new address.
    Change(Address),
    /// A new sibling now sits immediately left of the child. `mid_key`
    /// separates it from the child.
    InsertedLeft { child: Address, mid_key: K },
    /// A new sibling now sits immediately right of the child. `mid_key`
    /// separates the child from it.
    InsertedRight { child: Address, mid_key: K },
}

/// Result of an insert at some level, plus boundary key updates.
///
/// `left_key` / `right_key` carry the new outer boundary keys of the
/// subtree when they changed; the caller stores them and decides whether
/// they propagate further up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion<K> {
    pub outcome: InsertOutcome<K>,
    pub left_key: Option<K>,
    pub right_key: Option<K>,
}

impl<K> Insertion<K> {
    /// An outcome that leaves both boundary keys alone.
    pub fn new(outcome: InsertOutcome<K>) -> Self {
        Self {
            outcome,
            left_key: None,
            right_key: None,
        }
    }

    pub fn noop() -> Self {
        Self::new(InsertOutcome::NoOp)
    }

    pub fn with_left_key(mut self, key: K) -> Self {
        self.left_key = Some(key);
        self
    }

    pub fn with_right_key(mut self, key: K) -> Self {
        self.right_key = Some(key);
        self
    }
}

/// A complete tree class: comparisons plus leaf-level behavior.
///
/// `Udata` is the caller's search or record key, passed through the tree
/// untouched. Leaf operations may write results into it.
pub trait BTreeClass: KeyCodec {
    type Udata;

    /// Orders two keys of the tree.
    fn cmp2(&self, left: &Self::Key, udata: &Self::Udata, right: &Self::Key) -> Ordering;

    /// Places `udata` relative to the bracket `[left, right]`: `Less` when
    /// it sorts left of it, `Greater` when right of it, `Equal` inside.
    fn cmp3(&self, left: &Self::Key, udata: &Self::Udata, right: &Self::Key) -> Ordering;

    /// Route inserts left of the minimum into the leftmost record instead
    /// of creating a new one.
    fn follow_min(&self) -> bool {
        false
    }

    /// Route inserts right of the maximum into the rightmost record.
    fn follow_max(&self) -> bool {
        false
    }

    /// Creates a leaf record for `udata`. `neighbor` is the outer key of
    /// the current extremal record for `Left`/`Right`, `None` for `First`.
    fn new_leaf(
        &self,
        mode: NewMode,
        udata: &mut Self::Udata,
        neighbor: Option<&Self::Key>,
    ) -> Result<NewLeaf<Self::Key>>;

    /// Inserts `udata` into the record at `addr`, bracketed by
    /// `[left, right]`. Duplicate handling is up to the class.
    fn insert(
        &self,
        addr: Address,
        left: &Self::Key,
        udata: &mut Self::Udata,
        right: &Self::Key,
    ) -> Result<Insertion<Self::Key>>;

    /// Looks `udata` up in the record at `addr`. Returns `NotFound` when
    /// the record does not hold it.
    fn found(
        &self,
        addr: Address,
        left: &Self::Key,
        udata: &mut Self::Udata,
        right: &Self::Key,
    ) -> Result<()>;

    /// Visits the record at `addr` during an in-order scan.
    fn list(&self, addr: Address, udata: &mut Self::Udata) -> Result<()>;
}
