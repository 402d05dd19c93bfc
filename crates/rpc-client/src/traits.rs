use anyhow::Result;
use async_trait::async_trait;
use ms_types::H256;

use crate::types::{Log, LogFilter, TransactionRequest};

/// The chain operations the monitoring service depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;

    /// Input data of a mined transaction, `None` if the node doesn't know it.
    async fn get_transaction_input(&self, tx_hash: &H256) -> Result<Option<Vec<u8>>>;

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256>;
}
