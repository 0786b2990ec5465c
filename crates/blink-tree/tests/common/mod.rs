//! Shared helpers for blink-tree integration tests.

#![allow(dead_code)]

use blink_cache::MemFile;
use blink_common::{Address, AddressWidth, BlinkError, CacheConfig, Result};
use blink_tree::{
    BTree, BTreeClass, CachedTree, InsertOutcome, Insertion, IntegerClass, IntegerUdata,
    KeyCodec, NewLeaf, NewMode,
};
use parking_lot::Mutex;
use std::cmp::Ordering;

pub type IntTree = CachedTree<IntegerClass, MemFile>;

/// Tree over an in-memory file.
pub fn mem_tree<C: BTreeClass>(class: C, num_frames: usize) -> CachedTree<C, MemFile> {
    BTree::with_file(
        class,
        MemFile::new(AddressWidth::Eight),
        &CacheConfig { num_frames },
    )
    .unwrap()
}

pub fn int_tree(k: usize, num_frames: usize) -> IntTree {
    mem_tree(IntegerClass::new(k), num_frames)
}

/// Inserts `key` with itself as the record address.
pub fn insert_key(tree: &IntTree, root: Address, key: u64) -> Result<()> {
    tree.insert(root, &mut IntegerUdata::record(key, Address(key)))
}

/// Record address for `key`, if present.
pub fn find_key(tree: &IntTree, root: Address, key: u64) -> Result<Address> {
    let mut udata = IntegerUdata::search(key);
    tree.find(root, &mut udata)?;
    udata
        .addr
        .ok_or_else(|| BlinkError::Storage("find left no address".to_string()))
}

/// Record addresses in key order, as raw offsets.
pub fn listed_keys(tree: &IntTree, root: Address) -> Vec<u64> {
    let mut udata = IntegerUdata::default();
    tree.list(root, &mut udata).unwrap();
    udata.listed.iter().map(Address::offset).collect()
}

/// Search or record key for `BucketClass`.
#[derive(Debug, Clone, Default)]
pub struct BucketUdata {
    pub key: u64,
    pub value: u64,
    pub found: Option<u64>,
    pub listed: Vec<(u64, u64)>,
}

impl BucketUdata {
    pub fn put(key: u64, value: u64) -> Self {
        Self {
            key,
            value,
            ..Self::default()
        }
    }

    pub fn get(key: u64) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}

/// Leaf records are small sorted buckets of `(key, value)` pairs.
///
/// Keys left of the minimum or right of the maximum go into the extremal
/// bucket and widen its bracket. A bucket that is written is copied to a
/// new slot (reported as `Change`); a bucket that overflows keeps its lower
/// half and gives the upper half to a new bucket on its right. Existing
/// keys are overwritten.
pub struct BucketClass {
    k: usize,
    bucket_capacity: usize,
    buckets: Mutex<Vec<Vec<(u64, u64)>>>,
}

impl BucketClass {
    pub fn new(k: usize, bucket_capacity: usize) -> Self {
        Self {
            k,
            bucket_capacity,
            buckets: Mutex::new(Vec::new()),
        }
    }

    /// Number of bucket slots ever allocated, live or orphaned.
    pub fn slots(&self) -> usize {
        self.buckets.lock().len()
    }

    fn push(&self, entries: Vec<(u64, u64)>) -> Address {
        let mut buckets = self.buckets.lock();
        buckets.push(entries);
        Address(buckets.len() as u64 - 1)
    }

    fn bucket(&self, addr: Address) -> Result<Vec<(u64, u64)>> {
        self.buckets
            .lock()
            .get(addr.offset() as usize)
            .cloned()
            .ok_or_else(|| BlinkError::Storage(format!("no bucket at {addr}")))
    }
}

impl KeyCodec for BucketClass {
    type Key = u64;

    fn id(&self) -> u8 {
        7
    }

    fn min_degree(&self) -> usize {
        self.k
    }

    fn sizeof_rkey(&self) -> usize {
        8
    }

    fn decode_key(&self, raw: &[u8]) -> Result<u64> {
        let bytes: [u8; 8] = raw
            .try_into()
            .map_err(|_| BlinkError::Storage("bad key size".to_string()))?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn encode_key(&self, key: &u64, raw: &mut [u8]) -> Result<()> {
        raw.copy_from_slice(&key.to_be_bytes());
        Ok(())
    }
}

impl BTreeClass for BucketClass {
    type Udata = BucketUdata;

    fn cmp2(&self, left: &u64, _udata: &BucketUdata, right: &u64) -> Ordering {
        left.cmp(right)
    }

    fn cmp3(&self, left: &u64, udata: &BucketUdata, right: &u64) -> Ordering {
        if udata.key < *left {
            Ordering::Less
        } else if udata.key >= *right {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    fn follow_min(&self) -> bool {
        true
    }

    fn follow_max(&self) -> bool {
        true
    }

    fn new_leaf(
        &self,
        mode: NewMode,
        udata: &mut BucketUdata,
        _neighbor: Option<&u64>,
    ) -> Result<NewLeaf<u64>> {
        assert_eq!(mode, NewMode::First, "extremal inserts follow existing buckets");
        Ok(NewLeaf {
            addr: self.push(Vec::new()),
            left_key: udata.key,
            right_key: udata.key + 1,
        })
    }

    fn insert(
        &self,
        addr: Address,
        left: &u64,
        udata: &mut BucketUdata,
        right: &u64,
    ) -> Result<Insertion<u64>> {
        let mut entries = self.bucket(addr)?;
        match entries.binary_search_by_key(&udata.key, |&(k, _)| k) {
            Ok(i) => entries[i].1 = udata.value,
            Err(i) => entries.insert(i, (udata.key, udata.value)),
        }

        let outcome = if entries.len() <= self.bucket_capacity {
            InsertOutcome::Change(self.push(entries))
        } else {
            let upper = entries.split_off(entries.len() / 2);
            let mid_key = upper[0].0;
            self.buckets.lock()[addr.offset() as usize] = entries;
            InsertOutcome::InsertedRight {
                child: self.push(upper),
                mid_key,
            }
        };

        let mut ins = Insertion::new(outcome);
        if udata.key < *left {
            ins = ins.with_left_key(udata.key);
        }
        if udata.key >= *right {
            ins = ins.with_right_key(udata.key + 1);
        }
        Ok(ins)
    }

    fn found(
        &self,
        addr: Address,
        _left: &u64,
        udata: &mut BucketUdata,
        _right: &u64,
    ) -> Result<()> {
        let entries = self.bucket(addr)?;
        let i = entries
            .binary_search_by_key(&udata.key, |&(k, _)| k)
            .map_err(|_| BlinkError::NotFound)?;
        udata.found = Some(entries[i].1);
        Ok(())
    }

    fn list(&self, addr: Address, udata: &mut BucketUdata) -> Result<()> {
        udata.listed.extend(self.bucket(addr)?);
        Ok(())
    }
}
