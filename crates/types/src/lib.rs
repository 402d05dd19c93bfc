mod address;
mod balance_proof;
mod event;
mod message;

pub use address::{is_address, is_checksum_address, Address, AddressError, ADDRESS_LEN};
pub use balance_proof::{order_participants, BalanceProof, ChannelId, ChannelState, StoredEntry};
pub use ckb_fixed_hash::H256;
pub use event::{ChainEvent, EventKind, OnchainBalanceProof, TxRef};
pub use message::{FeeInfo, Message};

use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Serde helper for `0x` prefixed hex byte strings.
pub mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", faster_hex::hex_string(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hex = s.strip_prefix("0x").unwrap_or(&s);
        if hex.len() % 2 != 0 {
            return Err(de::Error::custom("odd hex length"));
        }
        let mut buf = vec![0u8; hex.len() / 2];
        faster_hex::hex_decode(hex.as_bytes(), &mut buf).map_err(de::Error::custom)?;
        Ok(buf)
    }
}
