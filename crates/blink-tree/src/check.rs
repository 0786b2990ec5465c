//! Whole-tree consistency walk.

use crate::class::BTreeClass;
use crate::node::Node;
use crate::tree::BTree;
use blink_cache::NodeStore;
use blink_common::{Address, BlinkError, Result};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Shape of a tree as seen by `BTree::check`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Level of the root; 0 when the root is a leaf-level node.
    pub height: u32,
    /// Number of tree nodes, root included.
    pub nodes: usize,
    /// Number of leaf records referenced from leaf-level nodes.
    pub leaf_records: usize,
}

impl<C: BTreeClass, S: NodeStore<Entry = Node<C>>> BTree<C, S> {
    /// Walks the tree level by level and verifies its structure.
    ///
    /// Checked: keys strictly increase inside each node, every child lies
    /// within its parent bracket, non-root nodes hold `k..=2k` children,
    /// sibling links match the left-to-right order of each level, levels
    /// drop by one per step, and no node is reachable twice. `udata` is
    /// passed to the class's key comparison.
    pub fn check(&self, root: Address, udata: &C::Udata) -> Result<TreeStats> {
        let class = self.class.as_ref();
        let k = self.layout.min_degree();
        let cap = self.layout.capacity();
        let violation = |msg: String| BlinkError::InvariantViolation(msg);

        let mut stats = TreeStats::default();
        let mut visited = HashSet::new();
        let mut level = self.store.find(root)?.level();
        stats.height = level;

        // Each entry carries the bracket its parent gives it.
        let mut current: Vec<(Address, Option<(C::Key, C::Key)>)> = vec![(root, None)];
        loop {
            let mut next = Vec::new();
            let mut prev: Option<(Address, Option<Address>)> = None;

            for (addr, bounds) in current {
                if !visited.insert(addr) {
                    return Err(violation(format!("node {addr} is reachable twice")));
                }
                let node = self.store.find(addr)?;
                if node.level() != level {
                    return Err(violation(format!(
                        "node {addr} at level {}, expected {level}",
                        node.level()
                    )));
                }

                let n = node.nchildren();
                if addr != root && (n < k || n > cap) {
                    return Err(violation(format!(
                        "node {addr} holds {n} children, allowed {k}..={cap}"
                    )));
                }

                for i in 0..n {
                    let (lo, hi) = (node.key(i, class)?, node.key(i + 1, class)?);
                    if class.cmp2(lo, udata, hi) != Ordering::Less {
                        return Err(violation(format!(
                            "node {addr}: key {i} {lo:?} not below key {} {hi:?}",
                            i + 1
                        )));
                    }
                }

                if let Some((lo, hi)) = &bounds {
                    if n > 0 {
                        let first = node.key(0, class)?;
                        let last = node.key(n, class)?;
                        if class.cmp2(lo, udata, first) == Ordering::Greater
                            || class.cmp2(last, udata, hi) == Ordering::Greater
                        {
                            return Err(violation(format!(
                                "node {addr} spans {first:?}..{last:?} outside parent bracket {lo:?}..{hi:?}"
                            )));
                        }
                    }
                }

                match prev {
                    None if node.left().is_some() => {
                        return Err(violation(format!(
                            "leftmost node {addr} has a left sibling"
                        )));
                    }
                    Some((prev_addr, prev_right)) => {
                        if prev_right != Some(addr) || node.left() != Some(prev_addr) {
                            return Err(violation(format!(
                                "sibling links between {prev_addr} and {addr} disagree"
                            )));
                        }
                    }
                    None => {}
                }
                prev = Some((addr, node.right()));

                stats.nodes += 1;
                if level == 0 {
                    stats.leaf_records += n;
                } else {
                    for i in 0..n {
                        let bracket = (node.key(i, class)?.clone(), node.key(i + 1, class)?.clone());
                        next.push((node.child(i), Some(bracket)));
                    }
                }
            }

            if let Some((addr, Some(right))) = prev {
                return Err(violation(format!(
                    "rightmost node {addr} has right sibling {right}"
                )));
            }
            if level == 0 {
                break;
            }
            level -= 1;
            current = next;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use crate::classes::{IntegerClass, IntegerUdata};
    use crate::node::Node;
    use crate::tree::{BTree, CachedTree};
    use blink_cache::MemFile;
    use blink_common::{Address, AddressWidth, BlinkError, CacheConfig};

    fn tree(k: usize) -> CachedTree<IntegerClass, MemFile> {
        BTree::with_file(
            IntegerClass::new(k),
            MemFile::new(AddressWidth::Eight),
            &CacheConfig { num_frames: 32 },
        )
        .unwrap()
    }

    #[test]
    fn test_check_empty_tree() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        let stats = tree.check(root, &IntegerUdata::default()).unwrap();
        assert_eq!(stats.height, 0);
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.leaf_records, 0);
    }

    #[test]
    fn test_check_after_inserts() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in 1..=40u64 {
            tree.insert(root, &mut IntegerUdata::record(key, Address(key)))
                .unwrap();
        }
        let stats = tree.check(root, &IntegerUdata::default()).unwrap();
        assert!(stats.height >= 2);
        assert_eq!(stats.leaf_records, 40);
    }

    #[test]
    fn test_check_detects_unordered_keys() {
        let tree = tree(2);
        let layout = *tree.layout();
        let node: Node<IntegerClass> =
            Node::with_entries(&layout, 0, vec![10, 5, 20], &[Address(1), Address(2)]).unwrap();
        let root = tree.store().create(node).unwrap().addr();

        let err = tree.check(root, &IntegerUdata::default()).unwrap_err();
        assert!(matches!(err, BlinkError::InvariantViolation(_)));
    }

    #[test]
    fn test_check_detects_broken_sibling_link() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in [10, 20, 30, 40, 50] {
            tree.insert(root, &mut IntegerUdata::record(key, Address(key)))
                .unwrap();
        }
        let right = tree.store().find(root).unwrap().child(1);
        tree.store().protect(right).unwrap().set_left(None);

        let err = tree.check(root, &IntegerUdata::default()).unwrap_err();
        assert!(err.to_string().contains("sibling links"));
    }

    #[test]
    fn test_check_detects_underfull_node() {
        let tree = tree(2);
        let root = tree.create().unwrap();
        for key in [10, 20, 30, 40, 50] {
            tree.insert(root, &mut IntegerUdata::record(key, Address(key)))
                .unwrap();
        }
        let left = tree.store().find(root).unwrap().child(0);
        {
            let mut node = tree.store().protect(left).unwrap();
            let layout = *node.layout();
            let keys = vec![*node.key(0, tree.class()).unwrap(), 30];
            let right = node.right();
            *node = Node::with_entries(&layout, 0, keys, &[Address(10)]).unwrap();
            node.set_right(right);
        }

        let err = tree.check(root, &IntegerUdata::default()).unwrap_err();
        assert!(err.to_string().contains("children"));
    }
}
