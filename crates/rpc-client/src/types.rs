use anyhow::{anyhow, Result};
use ms_types::{Address, H256};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::utils::{parse_hex_data, parse_quantity, to_hex_data, to_quantity};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub transaction_hash: H256,
    pub log_index: u64,
    pub removed: bool,
}

/// Log as reported by `eth_getLogs`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: String,
    topics: Vec<H256>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<H256>,
    log_index: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl Log {
    pub fn from_json(value: Value) -> Result<Self> {
        let raw: RawLog = serde_json::from_value(value)?;
        let block_number = raw
            .block_number
            .ok_or_else(|| anyhow!("log of pending block"))?;
        Ok(Log {
            address: Address::parse_any_case(&raw.address)?,
            topics: raw.topics,
            data: parse_hex_data(&raw.data)?,
            block_number: parse_quantity(&block_number)?,
            transaction_hash: raw
                .transaction_hash
                .ok_or_else(|| anyhow!("log without transaction hash"))?,
            log_index: parse_quantity(raw.log_index.as_deref().unwrap_or("0x0"))?,
            removed: raw.removed,
        })
    }
}

/// Inclusive block range, matching any of `topics` in the first position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    pub topics: Vec<H256>,
}

impl LogFilter {
    pub fn to_json(&self) -> Value {
        let topics: Vec<String> = self.topics.iter().map(|t| format!("{:#x}", t)).collect();
        json!({
            "fromBlock": to_quantity(self.from_block),
            "toBlock": to_quantity(self.to_block),
            "topics": [topics],
        })
    }

    pub fn matches(&self, log: &Log) -> bool {
        log.block_number >= self.from_block
            && log.block_number <= self.to_block
            && log
                .topics
                .first()
                .map(|topic| self.topics.contains(topic))
                .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
}

impl TransactionRequest {
    pub fn to_json(&self) -> Value {
        json!({
            "from": self.from.to_checksum(),
            "to": self.to.to_checksum(),
            "data": to_hex_data(&self.data),
        })
    }
}
