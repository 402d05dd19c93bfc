use ms_types::{Address, ChannelId, ChannelState, StoredEntry, H256};
use serde::{Deserialize, Serialize};

/// One row of `GET /balance_proofs`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProofRecord {
    pub channel_id: ChannelId,
    pub participant1: Address,
    pub participant2: Address,
    pub nonce: u64,
    /// Decimal string, amounts don't fit a JSON number.
    pub transferred_amount: String,
    pub locksroot: H256,
    pub extra_hash: H256,
    pub state: ChannelState,
}

impl From<&StoredEntry> for BalanceProofRecord {
    fn from(entry: &StoredEntry) -> Self {
        let bp = &entry.balance_proof;
        BalanceProofRecord {
            channel_id: bp.channel_id,
            participant1: entry.participant1,
            participant2: entry.participant2,
            nonce: bp.nonce,
            transferred_amount: bp.transferred_amount.to_string(),
            locksroot: bp.locksroot.clone(),
            extra_hash: bp.extra_hash.clone(),
            state: entry.state,
        }
    }
}
