use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, ChannelId, H256};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ChannelClosed,
    ChannelSettled,
    TransferUpdated,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::ChannelClosed => "ChannelClosed",
            EventKind::ChannelSettled => "ChannelSettled",
            EventKind::TransferUpdated => "TransferUpdated",
        };
        f.write_str(name)
    }
}

/// Balance proof submitted on chain by the closing participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnchainBalanceProof {
    pub nonce: u64,
    pub transferred_amount: u128,
    pub locksroot: H256,
    pub extra_hash: H256,
}

/// Where an event came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub log_index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    ChannelClosed {
        channel_id: ChannelId,
        closing_participant: Address,
        block_number: u64,
        closing_proof: Option<OnchainBalanceProof>,
    },
    ChannelSettled {
        channel_id: ChannelId,
        block_number: u64,
    },
    TransferUpdated {
        channel_id: ChannelId,
        node_address: Address,
        block_number: u64,
    },
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChainEvent::ChannelClosed { .. } => EventKind::ChannelClosed,
            ChainEvent::ChannelSettled { .. } => EventKind::ChannelSettled,
            ChainEvent::TransferUpdated { .. } => EventKind::TransferUpdated,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        match self {
            ChainEvent::ChannelClosed { channel_id, .. }
            | ChainEvent::ChannelSettled { channel_id, .. }
            | ChainEvent::TransferUpdated { channel_id, .. } => channel_id,
        }
    }
}

impl fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEvent::ChannelClosed {
                channel_id,
                closing_participant,
                block_number,
                ..
            } => write!(
                f,
                "ChannelClosed {{ channel: {}, closing: {}, block: {} }}",
                channel_id, closing_participant, block_number
            ),
            ChainEvent::ChannelSettled {
                channel_id,
                block_number,
            } => write!(
                f,
                "ChannelSettled {{ channel: {}, block: {} }}",
                channel_id, block_number
            ),
            ChainEvent::TransferUpdated {
                channel_id,
                node_address,
                block_number,
            } => write!(
                f,
                "TransferUpdated {{ channel: {}, node: {}, block: {} }}",
                channel_id, node_address, block_number
            ),
        }
    }
}
