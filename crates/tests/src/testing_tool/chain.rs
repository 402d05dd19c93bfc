use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ms_rpc_client::{
    contract::{encode_close, encode_event},
    traits::ChainClient,
    types::{Log, LogFilter, TransactionRequest},
};
use ms_types::{keccak256, Address, ChainEvent, ChannelId, OnchainBalanceProof, H256};
use parking_lot::Mutex;

/// In-memory chain, every pushed event is mined in a block of its own.
#[derive(Default)]
pub struct MockChain {
    tip: AtomicU64,
    tx_count: AtomicU64,
    logs: Mutex<Vec<Log>>,
    inputs: Mutex<HashMap<H256, Vec<u8>>>,
    sent: Mutex<Vec<TransactionRequest>>,
}

impl MockChain {
    pub fn tip(&self) -> u64 {
        self.tip.load(Ordering::SeqCst)
    }

    fn next_tx_hash(&self) -> H256 {
        let n = self.tx_count.fetch_add(1, Ordering::SeqCst);
        H256(keccak256(&n.to_be_bytes()))
    }

    /// Mines `build(block_number)` and returns the transaction hash.
    pub fn push_event<F: FnOnce(u64) -> ChainEvent>(&self, build: F) -> H256 {
        self.push_event_with_input(build, None)
    }

    fn push_event_with_input<F: FnOnce(u64) -> ChainEvent>(
        &self,
        build: F,
        input: Option<Vec<u8>>,
    ) -> H256 {
        let block_number = self.tip() + 1;
        let event = build(block_number);
        let (topics, data) = encode_event(&event);
        let transaction_hash = self.next_tx_hash();
        if let Some(input) = input {
            self.inputs.lock().insert(transaction_hash.clone(), input);
        }
        self.logs.lock().push(Log {
            address: *event.channel_id().address(),
            topics,
            data,
            block_number,
            transaction_hash: transaction_hash.clone(),
            log_index: 0,
            removed: false,
        });
        // mined once the log is visible
        self.tip.store(block_number, Ordering::SeqCst);
        transaction_hash
    }

    /// A `close` call by `closing_participant`, with the submitted proof when
    /// given.
    pub fn close(
        &self,
        channel_id: ChannelId,
        closing_participant: Address,
        closing_proof: Option<&OnchainBalanceProof>,
    ) -> H256 {
        let input = closing_proof.map(|proof| encode_close(proof, &[0u8; 65]).unwrap());
        self.push_event_with_input(
            |block_number| ChainEvent::ChannelClosed {
                channel_id,
                closing_participant,
                block_number,
                closing_proof: None,
            },
            input,
        )
    }

    pub fn settle(&self, channel_id: ChannelId) -> H256 {
        self.push_event(|block_number| ChainEvent::ChannelSettled {
            channel_id,
            block_number,
        })
    }

    pub fn update_transfer(&self, channel_id: ChannelId, node_address: Address) -> H256 {
        self.push_event(|block_number| ChainEvent::TransferUpdated {
            channel_id,
            node_address,
            block_number,
        })
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.tip())
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let logs = self.logs.lock();
        Ok(logs.iter().filter(|l| filter.matches(l)).cloned().collect())
    }

    async fn get_transaction_input(&self, tx_hash: &H256) -> Result<Option<Vec<u8>>> {
        Ok(self.inputs.lock().get(tx_hash).cloned())
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256> {
        if tx.data.is_empty() {
            return Err(anyhow!("empty call data"));
        }
        self.sent.lock().push(tx.clone());
        Ok(self.next_tx_hash())
    }
}
