//! B-link tree operations.
//!
//! The tree is identified by the address of its root node, which never
//! changes: when the root splits, the old root's contents move to a fresh
//! address and the root is rewritten one level higher.

use crate::class::{BTreeClass, InsertOutcome, Insertion, NewMode};
use crate::node::{Node, NodeContext, NodeLayout, Side};
use blink_cache::{BlockFile, NodeCache, NodeStore};
use blink_common::{Address, BlinkError, CacheConfig, Result, StoreConfig};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a search key falls relative to a node's brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketPosition {
    /// The node has no children.
    Empty,
    /// Left of the first bracket.
    BelowMin,
    /// Right of the last bracket.
    AboveMax,
    /// Inside bracket `i`.
    WithinRange(usize),
}

impl BracketPosition {
    /// Classifies the result of a bracket search over `nchildren` brackets
    /// that stopped at `idx` with comparison `cmp`.
    ///
    /// Returns `None` when the key falls between two brackets, which a
    /// well-formed node never allows.
    pub fn classify(nchildren: usize, idx: usize, cmp: Ordering) -> Option<Self> {
        if nchildren == 0 {
            return Some(BracketPosition::Empty);
        }
        match cmp {
            Ordering::Equal => Some(BracketPosition::WithinRange(idx)),
            Ordering::Less if idx == 0 => Some(BracketPosition::BelowMin),
            Ordering::Greater if idx + 1 >= nchildren => Some(BracketPosition::AboveMax),
            _ => None,
        }
    }
}

/// A B-link tree of class `C` stored in `S`.
pub struct BTree<C: BTreeClass, S> {
    pub(crate) class: Arc<C>,
    pub(crate) store: S,
    pub(crate) layout: NodeLayout,
}

/// A tree over the default node cache.
pub type CachedTree<C, F = Box<dyn BlockFile>> = BTree<C, NodeCache<Node<C>, F>>;

impl<C: BTreeClass> BTree<C, NodeCache<Node<C>, Box<dyn BlockFile>>> {
    /// Opens a node cache described by `config` and wraps it in a tree.
    pub fn open(class: C, config: &StoreConfig) -> Result<Self> {
        let ctx = NodeContext::new(Arc::new(class), config.file.address_width)?;
        Self::new(NodeCache::open(ctx, config)?)
    }
}

impl<C: BTreeClass, F: BlockFile> BTree<C, NodeCache<Node<C>, F>> {
    /// Builds a node cache over an already opened file.
    pub fn with_file(class: C, file: F, cache: &CacheConfig) -> Result<Self> {
        let ctx = NodeContext::new(Arc::new(class), file.address_width())?;
        Self::new(NodeCache::new(ctx, file, cache)?)
    }
}

impl<C: BTreeClass, S: NodeStore<Entry = Node<C>>> BTree<C, S> {
    /// Wraps a node store.
    pub fn new(store: S) -> Result<Self> {
        let ctx = store.context();
        let class = Arc::clone(ctx.codec());
        let layout = NodeLayout::new(class.as_ref(), ctx.layout().address_width())?;
        Ok(Self {
            class,
            store,
            layout,
        })
    }

    pub fn class(&self) -> &C {
        &self.class
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    /// Creates an empty tree and returns its root address.
    pub fn create(&self) -> Result<Address> {
        let (addr, _root) = self.store.create(Node::new(&self.layout, 0))?;
        debug!(target: "blink_tree::create", %addr, "created tree");
        Ok(addr)
    }

    /// Looks `udata` up and lets the class record the result in it.
    ///
    /// Returns `NotFound` when no leaf bracket holds the key or the class
    /// rejects the record.
    pub fn find(&self, root: Address, udata: &mut C::Udata) -> Result<()> {
        let class = self.class.as_ref();
        let mut addr = root;
        loop {
            let node = self.store.find(addr)?;
            let (idx, cmp) = self.search(&*node, udata)?;
            if node.nchildren() == 0 || cmp != Ordering::Equal {
                return Err(BlinkError::NotFound);
            }
            if node.level() > 0 {
                addr = node.child(idx);
                continue;
            }
            return class.found(
                node.child(idx),
                node.key(idx, class)?,
                udata,
                node.key(idx + 1, class)?,
            );
        }
    }

    /// Inserts `udata`, splitting nodes and growing the tree as needed.
    ///
    /// The root address is unchanged afterwards.
    pub fn insert(&self, root: Address, udata: &mut C::Udata) -> Result<()> {
        let ins = self.insert_helper(root, udata)?;
        match ins.outcome {
            InsertOutcome::NoOp => Ok(()),
            InsertOutcome::InsertedRight { child, mid_key } => {
                self.grow_root(root, child, mid_key, ins.left_key, ins.right_key)
            }
            other => Err(BlinkError::invariant(format!(
                "root at {root} reported {other:?}"
            ))),
        }
    }

    /// Splits the full node at `addr`, returning the address of the new
    /// right sibling.
    ///
    /// Only sibling links are updated. Adding the new node to a parent is
    /// up to the caller.
    pub fn split(&self, addr: Address) -> Result<Address> {
        let mut node = self.store.protect(addr)?;
        if !node.is_full() {
            return Err(BlinkError::InvalidParameter {
                name: "split".to_string(),
                value: format!("{} children at {addr}", node.nchildren()),
            });
        }
        let (twin_addr, _twin) = self.split_node(addr, &mut *node)?;
        Ok(twin_addr)
    }

    /// Visits every leaf record in key order.
    pub fn list(&self, root: Address, udata: &mut C::Udata) -> Result<()> {
        let class = self.class.as_ref();

        let mut addr = root;
        loop {
            let node = self.store.find(addr)?;
            if node.level() == 0 || node.nchildren() == 0 {
                break;
            }
            addr = node.child(0);
        }

        let mut next = Some(addr);
        while let Some(addr) = next {
            let node = self.store.find(addr)?;
            for &child in node.children() {
                class.list(child, udata)?;
            }
            next = node.right();
        }
        Ok(())
    }

    /// Writes every dirty node back to the file.
    pub fn flush(&self) -> Result<()> {
        self.store.flush(None, false)
    }

    /// Writes a human-readable description of the node at `addr`.
    ///
    /// Labels are left-aligned to `fwidth` columns after `indent` spaces;
    /// per-child lines are indented three more.
    pub fn debug<W: fmt::Write>(
        &self,
        addr: Address,
        out: &mut W,
        indent: usize,
        fwidth: usize,
    ) -> Result<()> {
        let node = self.store.find(addr)?;
        let layout = &self.layout;
        let sibling = |a: Option<Address>| a.unwrap_or(Address::UNDEFINED);

        let fields: [(&str, String); 8] = [
            ("Tree type ID:", layout.class_id().to_string()),
            ("Size of raw (disk) key:", layout.sizeof_rkey().to_string()),
            ("Dirty flag:", node.is_dirty().to_string()),
            (
                "Number of initial dirty children:",
                node.dirty_children().to_string(),
            ),
            ("Level:", node.level().to_string()),
            ("Address of left sibling:", sibling(node.left()).to_string()),
            ("Address of right sibling:", sibling(node.right()).to_string()),
            (
                "Number of children (max):",
                format!("{} ({})", node.nchildren(), layout.capacity()),
            ),
        ];
        for (label, value) in fields {
            writeln!(out, "{:indent$}{:<fwidth$} {}", "", label, value).map_err(write_failed)?;
        }

        let child_indent = indent + 3;
        let child_fwidth = fwidth.saturating_sub(3);
        for (i, child) in node.children().iter().enumerate() {
            writeln!(out, "{:indent$}Child {i}...", "").map_err(write_failed)?;
            writeln!(
                out,
                "{:child_indent$}{:<child_fwidth$} {}",
                "", "Address:", child
            )
            .map_err(write_failed)?;
        }
        Ok(())
    }

    /// Binary search for the bracket holding `udata`.
    ///
    /// Returns the last probed index and its comparison. On an empty node
    /// the comparison is `Greater`.
    fn search(&self, node: &Node<C>, udata: &C::Udata) -> Result<(usize, Ordering)> {
        let class = self.class.as_ref();
        let (mut lt, mut rt) = (0, node.nchildren());
        let mut idx = 0;
        let mut cmp = Ordering::Greater;
        while lt < rt && cmp != Ordering::Equal {
            idx = (lt + rt) / 2;
            cmp = class.cmp3(node.key(idx, class)?, udata, node.key(idx + 1, class)?);
            if cmp == Ordering::Less {
                rt = idx;
            } else {
                lt = idx + 1;
            }
        }
        Ok((idx, cmp))
    }

    /// Recursive insert below the node at `addr`, which stays protected
    /// until the child's outcome has been applied to it.
    fn insert_helper(&self, addr: Address, udata: &mut C::Udata) -> Result<Insertion<C::Key>> {
        let class = self.class.as_ref();
        let mut node = self.store.protect(addr)?;
        let n = node.nchildren();
        let level = node.level();

        let (idx, cmp) = self.search(&*node, udata)?;
        let position = BracketPosition::classify(n, idx, cmp).ok_or_else(|| {
            BlinkError::invariant(format!("search key falls between brackets of {addr}"))
        })?;
        trace!(target: "blink_tree::insert", %addr, level, ?position, "descending");

        let (idx, below) = match position {
            BracketPosition::Empty => {
                if level > 0 {
                    return Err(BlinkError::invariant(format!(
                        "internal node {addr} has no children"
                    )));
                }
                let leaf = class.new_leaf(NewMode::First, udata, None)?;
                node.set_first_child(leaf.addr, leaf.left_key, leaf.right_key);
                let below = if class.follow_min() {
                    class.insert(node.child(0), node.key(0, class)?, udata, node.key(1, class)?)?
                } else {
                    Insertion::noop()
                };
                (0, below)
            }
            BracketPosition::BelowMin if level > 0 => (0, self.insert_helper(node.child(0), udata)?),
            BracketPosition::BelowMin if class.follow_min() => (
                0,
                class.insert(node.child(0), node.key(0, class)?, udata, node.key(1, class)?)?,
            ),
            BracketPosition::BelowMin => {
                let leaf = class.new_leaf(NewMode::Left, udata, Some(node.key(0, class)?))?;
                let outcome = InsertOutcome::InsertedLeft {
                    child: leaf.addr,
                    mid_key: leaf.right_key,
                };
                (0, Insertion::new(outcome).with_left_key(leaf.left_key))
            }
            BracketPosition::AboveMax if level > 0 => {
                (n - 1, self.insert_helper(node.child(n - 1), udata)?)
            }
            BracketPosition::AboveMax if class.follow_max() => (
                n - 1,
                class.insert(
                    node.child(n - 1),
                    node.key(n - 1, class)?,
                    udata,
                    node.key(n, class)?,
                )?,
            ),
            BracketPosition::AboveMax => {
                let leaf = class.new_leaf(NewMode::Right, udata, Some(node.key(n, class)?))?;
                let outcome = InsertOutcome::InsertedRight {
                    child: leaf.addr,
                    mid_key: leaf.left_key,
                };
                (n - 1, Insertion::new(outcome).with_right_key(leaf.right_key))
            }
            BracketPosition::WithinRange(i) if level > 0 => {
                (i, self.insert_helper(node.child(i), udata)?)
            }
            BracketPosition::WithinRange(i) => (
                i,
                class.insert(node.child(i), node.key(i, class)?, udata, node.key(i + 1, class)?)?,
            ),
        };

        self.absorb(addr, &mut *node, idx, below)
    }

    /// Applies the outcome of inserting below child `idx` to `node`, and
    /// works out what the node's own parent has to do.
    fn absorb(
        &self,
        addr: Address,
        node: &mut Node<C>,
        idx: usize,
        below: Insertion<C::Key>,
    ) -> Result<Insertion<C::Key>> {
        let Insertion {
            outcome,
            left_key,
            right_key,
        } = below;
        let n = node.nchildren();
        let mut up = Insertion::noop();

        // Boundary keys only travel up from the outermost children.
        if let Some(key) = left_key {
            if idx == 0 {
                node.set_key(idx, key.clone());
                up.left_key = Some(key);
            } else {
                node.set_key(idx, key);
            }
        }
        if let Some(key) = right_key {
            if idx + 1 == n {
                node.set_key(idx + 1, key.clone());
                up.right_key = Some(key);
            } else {
                node.set_key(idx + 1, key);
            }
        }

        match outcome {
            InsertOutcome::NoOp => {}
            InsertOutcome::Change(child) => node.set_child(idx, child),
            InsertOutcome::InsertedLeft { child, mid_key } => {
                up.outcome = self.add_child(addr, node, idx, Side::Left, child, mid_key)?;
            }
            InsertOutcome::InsertedRight { child, mid_key } => {
                up.outcome = self.add_child(addr, node, idx, Side::Right, child, mid_key)?;
            }
        }
        Ok(up)
    }

    /// Adds a child next to child `idx`, splitting the node first when it
    /// is full.
    fn add_child(
        &self,
        addr: Address,
        node: &mut Node<C>,
        idx: usize,
        side: Side,
        child: Address,
        mid_key: C::Key,
    ) -> Result<InsertOutcome<C::Key>> {
        if !node.is_full() {
            node.insert_child(idx, side, child, mid_key);
            return Ok(InsertOutcome::NoOp);
        }

        let k = self.layout.min_degree();
        let (twin_addr, mut twin) = self.split_node(addr, node)?;
        // Key k of the full node becomes the twin's first key and no
        // splice below moves it.
        let separator = twin.key(0, self.class.as_ref())?.clone();
        if idx < k {
            node.insert_child(idx, side, child, mid_key);
        } else {
            twin.insert_child(idx - k, side, child, mid_key);
        }

        Ok(InsertOutcome::InsertedRight {
            child: twin_addr,
            mid_key: separator,
        })
    }

    /// Moves the upper half of the full `node` into a new right sibling
    /// and links it in. The sibling is returned still protected.
    ///
    /// Everything that can fail is acquired before `node` is touched, so an
    /// error leaves the tree as it was.
    fn split_node(&self, addr: Address, node: &mut Node<C>) -> Result<(Address, S::Write<'_>)> {
        let class = self.class.as_ref();
        // The separator moves to the twin already decoded.
        node.key(self.layout.min_degree(), class)?;
        let mut sibling = match node.right() {
            Some(right) => Some(self.store.protect(right)?),
            None => None,
        };
        let (twin_addr, mut twin) = self.store.create(Node::new(&self.layout, node.level()))?;

        node.split_into(&mut *twin);
        twin.set_left(Some(addr));
        twin.set_right(node.right());
        if let Some(sibling) = sibling.as_mut() {
            sibling.set_left(Some(twin_addr));
        }
        drop(sibling);
        node.set_right(Some(twin_addr));

        trace!(
            target: "blink_tree::split",
            %addr,
            twin = %twin_addr,
            level = node.level(),
            "split node"
        );
        Ok((twin_addr, twin))
    }

    /// Pushes the root's contents down one level after a root split.
    ///
    /// The old root is copied to a new address, the split-off sibling is
    /// pointed at the copy, and the root is rewritten over the two. A crash
    /// between these steps leaves the tree inconsistent.
    fn grow_root(
        &self,
        root: Address,
        twin: Address,
        mid_key: C::Key,
        left_key: Option<C::Key>,
        right_key: Option<C::Key>,
    ) -> Result<()> {
        let class = self.class.as_ref();
        let (level, left_key) = {
            let node = self.store.find(root)?;
            let left_key = match left_key {
                Some(key) => key,
                None => node.key(0, class)?.clone(),
            };
            (node.level(), left_key)
        };

        let size = self.layout.node_size();
        let relocated = self.store.allocate(size)?;
        self.store.flush(Some(root), false)?;
        self.store.copy_raw(root, relocated, size)?;
        self.store.rename(root, relocated)?;

        let right_key = {
            let mut node = self.store.protect(twin)?;
            node.set_left(Some(relocated));
            match right_key {
                Some(key) => key,
                None => node.key(node.nchildren(), class)?.clone(),
            }
        };

        let mut node = self.store.protect(root)?;
        node.reset_as_root(level + 1, [relocated, twin], [left_key, mid_key, right_key]);

        debug!(
            target: "blink_tree::insert",
            %root,
            %relocated,
            level = level + 1,
            "grew root"
        );
        Ok(())
    }
}

fn write_failed(_: fmt::Error) -> BlinkError {
    BlinkError::Storage("formatting debug output failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{IntegerClass, IntegerUdata};
    use blink_cache::MemFile;
    use blink_common::AddressWidth;

    fn tree(k: usize) -> CachedTree<IntegerClass, MemFile> {
        BTree::with_file(
            IntegerClass::new(k),
            MemFile::new(AddressWidth::Eight),
            &CacheConfig { num_frames: 32 },
        )
        .unwrap()
    }

    fn insert(tree: &CachedTree<IntegerClass, MemFile>, root: Address, key: u64) {
        tree.insert(root, &mut IntegerUdata::record(key, Address(key)))
            .unwrap();
    }

    fn listed(tree: &CachedTree<IntegerClass, MemFile>, root: Address) -> Vec<u64> {
        let mut udata = IntegerUdata::default();
        tree.list(root, &mut udata).unwrap();
        udata.listed.iter().map(Address::offset).collect()
    }

    #[test]
    fn test_classify_positions() {
        assert_eq!(
            BracketPosition::classify(0, 0, Ordering::Greater),
            Some(BracketPosition::Empty)
        );
        assert_eq!(
            BracketPosition::classify(4, 2, Ordering::Equal),
            Some(BracketPosition::WithinRange(2))
        );
        assert_eq!(
            BracketPosition::classify(4, 0, Ordering::Less),
            Some(BracketPosition::BelowMin)
        );
        assert_eq!(
            BracketPosition::classify(4, 3, Ordering::Greater),
            Some(BracketPosition::AboveMax)
        );
    }

    #[test]
    fn test_classify_gap_between_brackets() {
        assert_eq!(BracketPosition::classify(4, 1, Ordering::Less), None);
        assert_eq!(BracketPosition::classify(4, 1, Ordering::Greater), None);
    }

    #[test]
    fn test_create_empty_tree() {
        let tree = tree(2);
        let root = tree.create().unwrap();

        let node = tree.store().find(root).unwrap();
        assert_eq!(node.level(), 0);
        assert_eq!(node.nchildren(), 0);
        drop(node);

        let err = tree.find(root, &mut IntegerUdata::search(1)).unwrap_err();
        assert!(err.is_not_found());
        assert!(listed(&tree, root).is_empty());
    }

    #[test]
    fn test_first_insert() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        insert(&tree, root, 10);

        let mut udata = IntegerUdata::search(10);
        tree.find(root, &mut udata).unwrap();
        assert_eq!(udata.addr, Some(Address(10)));

        let node = tree.store().find(root).unwrap();
        assert_eq!(node.children(), &[Address(10)]);
        assert_eq!(*node.key(0, tree.class()).unwrap(), 10);
        assert_eq!(*node.key(1, tree.class()).unwrap(), 11);
    }

    #[test]
    fn test_below_min_extends_left_key() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        insert(&tree, root, 20);
        insert(&tree, root, 5);

        let node = tree.store().find(root).unwrap();
        assert_eq!(node.children(), &[Address(5), Address(20)]);
        let keys: Vec<u64> = (0..=2)
            .map(|i| *node.key(i, tree.class()).unwrap())
            .collect();
        assert_eq!(keys, vec![5, 20, 21]);
    }

    #[test]
    fn test_root_split_keeps_root_address() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in [10, 20, 30, 40, 50] {
            insert(&tree, root, key);
        }

        let node = tree.store().find(root).unwrap();
        assert_eq!(node.level(), 1);
        assert_eq!(node.nchildren(), 2);
        let keys: Vec<u64> = (0..=2)
            .map(|i| *node.key(i, tree.class()).unwrap())
            .collect();
        assert_eq!(keys, vec![10, 30, 51]);

        let (left, right) = (node.child(0), node.child(1));
        drop(node);
        assert_ne!(left, root);

        let left_node = tree.store().find(left).unwrap();
        assert_eq!(left_node.children(), &[Address(10), Address(20)]);
        assert_eq!(left_node.right(), Some(right));
        assert_eq!(left_node.left(), None);
        drop(left_node);

        let right_node = tree.store().find(right).unwrap();
        assert_eq!(right_node.children(), &[Address(30), Address(40), Address(50)]);
        assert_eq!(right_node.left(), Some(left));
        assert_eq!(right_node.right(), None);
    }

    #[test]
    fn test_find_gap_is_not_found() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in [10, 20, 30, 40, 50] {
            insert(&tree, root, key);
        }

        let mut udata = IntegerUdata::search(30);
        tree.find(root, &mut udata).unwrap();
        assert_eq!(udata.addr, Some(Address(30)));

        for missing in [5, 35, 51, 1000] {
            let err = tree
                .find(root, &mut IntegerUdata::search(missing))
                .unwrap_err();
            assert!(err.is_not_found(), "key {missing}");
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        insert(&tree, root, 10);
        insert(&tree, root, 20);

        let err = tree
            .insert(root, &mut IntegerUdata::record(10, Address(999)))
            .unwrap_err();
        assert!(matches!(err, BlinkError::DuplicateKey));
        assert_eq!(listed(&tree, root), vec![10, 20]);
    }

    #[test]
    fn test_list_in_order() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in [50, 10, 40, 20, 30, 60, 5, 45] {
            insert(&tree, root, key);
        }
        assert_eq!(listed(&tree, root), vec![5, 10, 20, 30, 40, 45, 50, 60]);
    }

    #[test]
    fn test_split_requires_full_node() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        insert(&tree, root, 1);
        let err = tree.split(root).unwrap_err();
        assert!(matches!(err, BlinkError::InvalidParameter { .. }));
    }

    #[test]
    fn test_split_links_siblings() {
        let tree = tree(2);
        let layout = *tree.layout();
        let neighbor = tree.store().create(Node::new(&layout, 0)).unwrap().addr();

        let children = [Address(1), Address(2), Address(3), Address(4)];
        let mut full = Node::with_entries(&layout, 0, vec![0, 10, 20, 30, 40], &children).unwrap();
        full.set_right(Some(neighbor));
        let addr = tree.store().create(full).unwrap().addr();
        tree.store().protect(neighbor).unwrap().set_left(Some(addr));

        let twin = tree.split(addr).unwrap();
        let node = tree.store().find(addr).unwrap();
        assert_eq!(node.children(), &[Address(1), Address(2)]);
        assert_eq!(node.right(), Some(twin));
        drop(node);

        let twin_node = tree.store().find(twin).unwrap();
        assert_eq!(twin_node.children(), &[Address(3), Address(4)]);
        assert_eq!(twin_node.left(), Some(addr));
        assert_eq!(twin_node.right(), Some(neighbor));
        assert_eq!(*twin_node.key(0, tree.class()).unwrap(), 20);
        drop(twin_node);

        assert_eq!(tree.store().find(neighbor).unwrap().left(), Some(twin));
    }

    #[test]
    fn test_failed_split_leaves_node_intact() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in [10, 20, 30, 40, 50, 11, 12] {
            insert(&tree, root, key);
        }
        let (left, right) = {
            let node = tree.store().find(root).unwrap();
            (node.child(0), node.child(1))
        };
        assert_eq!(tree.store().find(left).unwrap().nchildren(), 4);

        // The full left leaf cannot relink its right neighbor while it is held.
        let held = tree.store().protect(right).unwrap();
        let err = tree
            .insert(root, &mut IntegerUdata::record(13, Address(13)))
            .unwrap_err();
        assert!(matches!(err, BlinkError::NodeProtected { .. }));
        drop(held);

        let node = tree.store().find(left).unwrap();
        assert_eq!(node.children(), &[Address(10), Address(11), Address(12), Address(20)]);
        assert_eq!(node.right(), Some(right));
        drop(node);
        assert_eq!(listed(&tree, root), vec![10, 11, 12, 20, 30, 40, 50]);
        tree.check(root, &IntegerUdata::default()).unwrap();

        insert(&tree, root, 13);
        assert_eq!(listed(&tree, root), vec![10, 11, 12, 13, 20, 30, 40, 50]);
        tree.check(root, &IntegerUdata::default()).unwrap();
    }

    #[test]
    fn test_debug_output() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        insert(&tree, root, 10);
        insert(&tree, root, 20);

        let mut out = String::new();
        tree.debug(root, &mut out, 2, 36).unwrap();

        assert!(out.contains("Tree type ID:"));
        assert!(out.contains("Size of raw (disk) key:"));
        assert!(out.contains("Level:"));
        assert!(out.contains("Number of children (max):"));
        assert!(out.contains("2 (4)"));
        assert!(out.contains("Address of left sibling:"));
        assert!(out.contains("@UNDEF"));
        assert!(out.contains("  Child 0..."));
        assert!(out.contains("     Address:"));
        assert!(out.contains("@20"));
        assert!(out.lines().all(|line| line.starts_with("  ")));
    }
}
