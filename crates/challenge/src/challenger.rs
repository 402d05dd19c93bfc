use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ms_config::ChallengeMode;
use ms_rpc_client::{contract::encode_update_transfer, traits::ChainClient, types::TransactionRequest};
use ms_types::{Address, StoredEntry, H256};
use tracing::instrument;

use crate::validator::ChannelClose;

/// Contests a rejected close with the stored balance proof.
#[async_trait]
pub trait Challenger: Send + Sync {
    /// Returns the hash of the submitted transaction, if any.
    async fn challenge(&self, entry: &StoredEntry, close: &ChannelClose<'_>)
        -> Result<Option<H256>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogChallenger;

#[async_trait]
impl Challenger for LogChallenger {
    async fn challenge(
        &self,
        entry: &StoredEntry,
        close: &ChannelClose<'_>,
    ) -> Result<Option<H256>> {
        let bp = &entry.balance_proof;
        log::warn!(
            "[challenge] channel {} closed by {} at block {}, contest with nonce {} transferred {} hash 0x{}",
            close.channel_id,
            close.closing_participant,
            close.block_number,
            bp.nonce,
            bp.transferred_amount,
            faster_hex::hex_string(&bp.message_hash()),
        );
        Ok(None)
    }
}

/// Sends `updateTransfer` to the channel contract.
pub struct OnchainChallenger {
    client: Arc<dyn ChainClient>,
    sender: Address,
}

impl OnchainChallenger {
    pub fn new(client: Arc<dyn ChainClient>, sender: Address) -> Self {
        OnchainChallenger { client, sender }
    }
}

#[async_trait]
impl Challenger for OnchainChallenger {
    #[instrument(skip_all, fields(channel = %close.channel_id))]
    async fn challenge(
        &self,
        entry: &StoredEntry,
        close: &ChannelClose<'_>,
    ) -> Result<Option<H256>> {
        let tx = TransactionRequest {
            from: self.sender,
            to: *close.channel_id.address(),
            data: encode_update_transfer(&entry.balance_proof)?,
        };
        let tx_hash = self.client.send_transaction(&tx).await?;
        log::warn!(
            "[challenge] channel {} contested with nonce {}, tx {:#x}",
            close.channel_id,
            entry.nonce(),
            tx_hash
        );
        Ok(Some(tx_hash))
    }
}

pub fn from_mode(
    mode: ChallengeMode,
    client: Arc<dyn ChainClient>,
    sender: Address,
) -> Arc<dyn Challenger> {
    match mode {
        ChallengeMode::Log => Arc::new(LogChallenger),
        ChallengeMode::Onchain => Arc::new(OnchainChallenger::new(client, sender)),
    }
}
