use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{keccak256, Address, H256};

/// Identifies a two-party channel by the address of its netting contract.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub Address);

impl ChannelId {
    pub fn from_low_u64_be(n: u64) -> Self {
        ChannelId(Address::from_low_u64_be(n))
    }

    pub fn address(&self) -> &Address {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<Address> for ChannelId {
    fn from(address: Address) -> Self {
        ChannelId(address)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

pub fn order_participants(p1: Address, p2: Address) -> (Address, Address) {
    if p1 < p2 {
        (p1, p2)
    } else {
        (p2, p1)
    }
}

/// Signed off-chain snapshot of a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProof {
    pub channel_id: ChannelId,
    pub participant1: Address,
    pub participant2: Address,
    pub nonce: u64,
    pub transferred_amount: u128,
    pub locksroot: H256,
    pub extra_hash: H256,
    #[serde(with = "crate::hex_bytes")]
    pub signature: Vec<u8>,
}

impl BalanceProof {
    /// Participants in canonical (ascending) order.
    pub fn participants(&self) -> (Address, Address) {
        order_participants(self.participant1, self.participant2)
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        &self.participant1 == address || &self.participant2 == address
    }

    /// keccak256(channel_id || nonce || transferred_amount || locksroot || extra_hash)
    pub fn message_hash(&self) -> [u8; 32] {
        let mut packed = Vec::with_capacity(20 + 8 + 32 + 32 + 32);
        packed.extend_from_slice(self.channel_id.as_bytes());
        packed.extend_from_slice(&self.nonce.to_be_bytes());
        packed.extend_from_slice(&[0u8; 16]);
        packed.extend_from_slice(&self.transferred_amount.to_be_bytes());
        packed.extend_from_slice(self.locksroot.as_bytes());
        packed.extend_from_slice(self.extra_hash.as_bytes());
        keccak256(&packed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelState {
    Watched,
    Challenged { block_number: u64 },
}

impl Default for ChannelState {
    fn default() -> Self {
        ChannelState::Watched
    }
}

/// Best known proof of a channel, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub balance_proof: BalanceProof,
    pub participant1: Address,
    pub participant2: Address,
    #[serde(default)]
    pub state: ChannelState,
}

impl StoredEntry {
    pub fn new(balance_proof: BalanceProof) -> Self {
        let (participant1, participant2) = balance_proof.participants();
        StoredEntry {
            balance_proof,
            participant1,
            participant2,
            state: ChannelState::Watched,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.balance_proof.channel_id
    }

    pub fn nonce(&self) -> u64 {
        self.balance_proof.nonce
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        &self.participant1 == address || &self.participant2 == address
    }

    pub fn is_challenged(&self) -> bool {
        matches!(self.state, ChannelState::Challenged { .. })
    }
}
