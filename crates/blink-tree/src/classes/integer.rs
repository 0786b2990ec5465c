//! Integer-keyed tree class.
//!
//! Maps `u64` keys to record addresses, one record per key, in the manner
//! of a chunk index: the tree stores the address, the record itself lives
//! wherever the caller put it. Raw keys are 8 bytes big-endian. Child `i`
//! of a leaf-level node holds key `key[i]` and owns the half-open bracket
//! `[key[i], key[i+1])`; `u64::MAX` is reserved as the open upper bound.

use crate::class::{BTreeClass, InsertOutcome, Insertion, KeyCodec, NewLeaf, NewMode};
use blink_common::{Address, BlinkError, Result};
use std::cmp::Ordering;

/// Search and record key for `IntegerClass`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegerUdata {
    /// Key to look up or insert.
    pub key: u64,
    /// Record address: input to `insert`, output of `find`.
    pub addr: Option<Address>,
    /// Record addresses gathered by `list`, in key order.
    pub listed: Vec<Address>,
}

impl IntegerUdata {
    /// Udata for inserting `key` with record `addr`.
    pub fn record(key: u64, addr: Address) -> Self {
        Self {
            key,
            addr: Some(addr),
            listed: Vec::new(),
        }
    }

    /// Udata for looking up `key`.
    pub fn search(key: u64) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}

/// `u64` keys mapped to record addresses. Duplicate keys are rejected.
#[derive(Debug, Clone)]
pub struct IntegerClass {
    k: usize,
}

impl IntegerClass {
    /// Class id written into node headers.
    pub const ID: u8 = 1;

    pub fn new(min_degree: usize) -> Self {
        Self { k: min_degree }
    }

    fn record_key(udata: &IntegerUdata) -> Result<u64> {
        if udata.key == u64::MAX {
            return Err(BlinkError::InvalidParameter {
                name: "key".to_string(),
                value: "u64::MAX is reserved".to_string(),
            });
        }
        Ok(udata.key)
    }

    fn record_addr(udata: &IntegerUdata) -> Result<Address> {
        udata.addr.ok_or_else(|| BlinkError::InvalidParameter {
            name: "record address".to_string(),
            value: "none".to_string(),
        })
    }
}

impl Default for IntegerClass {
    fn default() -> Self {
        Self::new(16)
    }
}

impl KeyCodec for IntegerClass {
    type Key = u64;

    fn id(&self) -> u8 {
        Self::ID
    }

    fn min_degree(&self) -> usize {
        self.k
    }

    fn sizeof_rkey(&self) -> usize {
        8
    }

    fn decode_key(&self, raw: &[u8]) -> Result<u64> {
        let bytes: [u8; 8] = raw.try_into().map_err(|_| {
            BlinkError::Storage(format!("integer key needs 8 bytes, got {}", raw.len()))
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn encode_key(&self, key: &u64, raw: &mut [u8]) -> Result<()> {
        if raw.len() != 8 {
            return Err(BlinkError::Storage(format!(
                "integer key needs 8 bytes, got {}",
                raw.len()
            )));
        }
        raw.copy_from_slice(&key.to_be_bytes());
        Ok(())
    }
}

impl BTreeClass for IntegerClass {
    type Udata = IntegerUdata;

    fn cmp2(&self, left: &u64, _udata: &IntegerUdata, right: &u64) -> Ordering {
        left.cmp(right)
    }

    fn cmp3(&self, left: &u64, udata: &IntegerUdata, right: &u64) -> Ordering {
        if udata.key < *left {
            Ordering::Less
        } else if udata.key >= *right {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    fn new_leaf(
        &self,
        mode: NewMode,
        udata: &mut IntegerUdata,
        neighbor: Option<&u64>,
    ) -> Result<NewLeaf<u64>> {
        let key = Self::record_key(udata)?;
        let addr = Self::record_addr(udata)?;
        let right_key = match (mode, neighbor) {
            (NewMode::Left, Some(&min)) => min,
            (NewMode::Left, None) => {
                return Err(BlinkError::invariant("left leaf without a neighbor key"));
            }
            (NewMode::First | NewMode::Right, _) => key + 1,
        };
        Ok(NewLeaf {
            addr,
            left_key: key,
            right_key,
        })
    }

    fn insert(
        &self,
        _addr: Address,
        left: &u64,
        udata: &mut IntegerUdata,
        right: &u64,
    ) -> Result<Insertion<u64>> {
        let key = Self::record_key(udata)?;
        if key == *left {
            return Err(BlinkError::DuplicateKey);
        }
        if key < *left || key >= *right {
            return Err(BlinkError::invariant(format!(
                "key {key} outside bracket [{left}, {right})"
            )));
        }
        // The gap between this record and the next gets a record of its own.
        Ok(Insertion::new(InsertOutcome::InsertedRight {
            child: Self::record_addr(udata)?,
            mid_key: key,
        }))
    }

    fn found(
        &self,
        addr: Address,
        left: &u64,
        udata: &mut IntegerUdata,
        _right: &u64,
    ) -> Result<()> {
        if udata.key != *left {
            return Err(BlinkError::NotFound);
        }
        udata.addr = Some(addr);
        Ok(())
    }

    fn list(&self, addr: Address, udata: &mut IntegerUdata) -> Result<()> {
        udata.listed.push(addr);
        Ok(())
    }
}
