//! A leaf class that follows the extremes and relocates its records.

mod common;

use blink_cache::MemFile;
use blink_common::Address;
use blink_tree::CachedTree;
use common::{mem_tree, BucketClass, BucketUdata};

fn get(tree: &CachedTree<BucketClass, MemFile>, root: Address, key: u64) -> Option<u64> {
    let mut udata = BucketUdata::get(key);
    match tree.find(root, &mut udata) {
        Ok(()) => udata.found,
        Err(e) if e.is_not_found() => None,
        Err(e) => panic!("find({key}) failed: {e}"),
    }
}

#[test]
fn test_first_insert_goes_through_class() {
    let tree = mem_tree(BucketClass::new(2, 3), 16);
    let root = tree.create().unwrap();
    tree.insert(root, &mut BucketUdata::put(10, 100)).unwrap();

    // One empty bucket from new_leaf, one copy holding the record.
    assert_eq!(tree.class().slots(), 2);
    assert_eq!(get(&tree, root, 10), Some(100));

    let node = tree.store().find(root).unwrap();
    assert_eq!(node.nchildren(), 1);
    assert_eq!(node.child(0), Address(1));
}

#[test]
fn test_follow_min_and_max_widen_brackets() {
    let tree = mem_tree(BucketClass::new(2, 8), 16);
    let root = tree.create().unwrap();
    for key in [50, 10, 90, 5, 95] {
        tree.insert(root, &mut BucketUdata::put(key, key * 10)).unwrap();
    }

    let node = tree.store().find(root).unwrap();
    assert_eq!(node.nchildren(), 1);
    assert_eq!(*node.key(0, tree.class()).unwrap(), 5);
    assert_eq!(*node.key(1, tree.class()).unwrap(), 96);
    drop(node);

    for key in [5, 10, 50, 90, 95] {
        assert_eq!(get(&tree, root, key), Some(key * 10));
    }
    assert_eq!(get(&tree, root, 51), None);
    assert_eq!(get(&tree, root, 96), None);
}

#[test]
fn test_overwrite_moves_bucket() {
    let tree = mem_tree(BucketClass::new(2, 4), 16);
    let root = tree.create().unwrap();
    tree.insert(root, &mut BucketUdata::put(7, 1)).unwrap();
    let before = tree.store().find(root).unwrap().child(0);

    tree.insert(root, &mut BucketUdata::put(7, 2)).unwrap();
    let after = tree.store().find(root).unwrap().child(0);

    assert_ne!(before, after);
    assert_eq!(get(&tree, root, 7), Some(2));
}

#[test]
fn test_bucket_splits_build_a_tree() {
    let tree = mem_tree(BucketClass::new(2, 3), 32);
    let root = tree.create().unwrap();
    let keys: Vec<u64> = (0..400).map(|i| (i * 37) % 400).collect();
    for &key in &keys {
        tree.insert(root, &mut BucketUdata::put(key, key + 1)).unwrap();
    }

    let stats = tree.check(root, &BucketUdata::default()).unwrap();
    assert!(stats.height >= 2);

    let mut listing = BucketUdata::default();
    tree.list(root, &mut listing).unwrap();
    let expected: Vec<(u64, u64)> = (0..400).map(|k| (k, k + 1)).collect();
    assert_eq!(listing.listed, expected);

    for key in (0..400).step_by(13) {
        assert_eq!(get(&tree, root, key), Some(key + 1));
    }
}

#[test]
fn test_descending_keys_follow_min() {
    let tree = mem_tree(BucketClass::new(2, 2), 32);
    let root = tree.create().unwrap();
    for key in (0..100u64).rev() {
        tree.insert(root, &mut BucketUdata::put(key, key)).unwrap();
    }

    tree.check(root, &BucketUdata::default()).unwrap();
    let mut listing = BucketUdata::default();
    tree.list(root, &mut listing).unwrap();
    assert_eq!(listing.listed.len(), 100);
    assert!(listing.listed.windows(2).all(|w| w[0].0 < w[1].0));
}
