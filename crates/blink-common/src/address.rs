//! File addresses for tree nodes and leaf records.

use crate::error::{BlinkError, Result};
use serde::{Deserialize, Serialize};

/// Byte offset of an object inside a backing file.
///
/// On disk an address occupies `AddressWidth::bytes()` little-endian bytes.
/// The all-ones bit pattern of that width is reserved as the "undefined"
/// sentinel and never names a real object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    /// The undefined address (all ones).
    pub const UNDEFINED: Address = Address(u64::MAX);

    /// Creates a new address.
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Returns the raw byte offset.
    #[inline]
    pub const fn offset(&self) -> u64 {
        self.0
    }

    /// Returns true unless this is the undefined sentinel.
    #[inline]
    pub const fn is_defined(&self) -> bool {
        self.0 != u64::MAX
    }

    /// Converts the sentinel to `None`.
    #[inline]
    pub fn defined(self) -> Option<Address> {
        if self.is_defined() {
            Some(self)
        } else {
            None
        }
    }

    /// Returns the address `delta` bytes past this one.
    #[inline]
    pub fn advance(&self, delta: u64) -> Address {
        Address(self.0 + delta)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_defined() {
            write!(f, "@{}", self.0)
        } else {
            write!(f, "@UNDEF")
        }
    }
}

/// Width of an encoded address, fixed per backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressWidth {
    /// 4-byte addresses (files up to 4 GiB).
    Four,
    /// 8-byte addresses.
    #[default]
    Eight,
}

impl AddressWidth {
    /// Number of bytes an encoded address occupies.
    #[inline]
    pub const fn bytes(&self) -> usize {
        match self {
            AddressWidth::Four => 4,
            AddressWidth::Eight => 8,
        }
    }

    /// Largest defined address representable at this width.
    #[inline]
    pub const fn max_defined(&self) -> u64 {
        match self {
            AddressWidth::Four => u32::MAX as u64 - 1,
            AddressWidth::Eight => u64::MAX - 1,
        }
    }

    /// Builds a width from a byte count.
    pub fn from_bytes(n: usize) -> Result<Self> {
        match n {
            4 => Ok(AddressWidth::Four),
            8 => Ok(AddressWidth::Eight),
            _ => Err(BlinkError::InvalidParameter {
                name: "address_width".to_string(),
                value: n.to_string(),
            }),
        }
    }

    /// Encodes an optional address into `buf` (exactly `bytes()` long).
    ///
    /// `None` and `Address::UNDEFINED` both encode as all ones.
    pub fn encode(&self, addr: Option<Address>, buf: &mut [u8]) -> Result<()> {
        let raw = match addr.and_then(Address::defined) {
            Some(a) if a.0 > self.max_defined() => {
                return Err(BlinkError::AddressOverflow {
                    addr: a.0,
                    width: self.bytes(),
                });
            }
            Some(a) => a.0,
            None => u64::MAX,
        };
        let n = self.bytes();
        buf[..n].copy_from_slice(&raw.to_le_bytes()[..n]);
        Ok(())
    }

    /// Decodes an address from `buf`, mapping the all-ones sentinel to `None`.
    pub fn decode(&self, buf: &[u8]) -> Option<Address> {
        let n = self.bytes();
        let mut wide = [0u8; 8];
        wide[..n].copy_from_slice(&buf[..n]);
        let raw = u64::from_le_bytes(wide);
        let sentinel = match self {
            AddressWidth::Four => u32::MAX as u64,
            AddressWidth::Eight => u64::MAX,
        };
        if raw == sentinel {
            None
        } else {
            Some(Address(raw))
        }
    }
}
