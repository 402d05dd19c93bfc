use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::keccak256;

pub const ADDRESS_LEN: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("invalid address length {0}, expected 40 hex chars")]
    InvalidLength(usize),
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),
    #[error("address checksum mismatch: {got}, expected {expected}")]
    ChecksumMismatch { got: String, expected: String },
}

/// A 20 bytes account identifier.
///
/// Textual forms are always EIP-55 checksummed. Parsing from text rejects
/// anything that is not checksum-valid; use [`Address::parse_any_case`] for
/// data coming from a chain node, which reports lowercase addresses.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(inner: [u8; ADDRESS_LEN]) -> Self {
        Address(inner)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        if slice.len() != ADDRESS_LEN {
            return Err(AddressError::InvalidLength(slice.len() * 2));
        }
        let mut inner = [0u8; ADDRESS_LEN];
        inner.copy_from_slice(slice);
        Ok(Address(inner))
    }

    /// Builds an address whose last 8 bytes are `n` in big endian.
    pub fn from_low_u64_be(n: u64) -> Self {
        let mut inner = [0u8; ADDRESS_LEN];
        inner[ADDRESS_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Address(inner)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parse a checksummed address.
    pub fn from_checksummed(s: &str) -> Result<Self, AddressError> {
        let address = Self::parse_any_case(s)?;
        let expected = address.to_checksum();
        if expected != s {
            return Err(AddressError::ChecksumMismatch {
                got: s.to_string(),
                expected,
            });
        }
        Ok(address)
    }

    /// Parse a `0x` prefixed hex address without looking at letter case.
    pub fn parse_any_case(s: &str) -> Result<Self, AddressError> {
        let hex = s
            .strip_prefix("0x")
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        if hex.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::InvalidLength(hex.len()));
        }
        let mut inner = [0u8; ADDRESS_LEN];
        faster_hex::hex_decode(hex.as_bytes(), &mut inner)
            .map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        Ok(Address(inner))
    }

    pub fn to_checksum(&self) -> String {
        let lower = faster_hex::hex_string(&self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

pub fn is_address(s: &str) -> bool {
    Address::parse_any_case(s).is_ok()
}

pub fn is_checksum_address(s: &str) -> bool {
    Address::from_checksummed(s).is_ok()
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_checksummed(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(inner: [u8; ADDRESS_LEN]) -> Self {
        Address(inner)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_checksummed(&s).map_err(de::Error::custom)
    }
}
