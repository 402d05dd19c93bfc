use std::{path::PathBuf, time::Duration};

use ms_types::Address;
use serde::{Deserialize, Serialize};

use crate::constants::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network_id: u64,
    pub contract_address: Address,
    pub validation: ValidationPolicy,
    pub challenge: ChallengeMode,
    // tables below, toml requires values to come first
    pub wallet: WalletConfig,
    pub store: StoreConfig,
    pub blockchain: BlockchainConfig,
    pub monitor: MonitorConfig,
    pub transport: TransportConfig,
    pub rpc_server: RPCServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network_id: DEFAULT_NETWORK_ID,
            contract_address: default_contract_address(),
            validation: Default::default(),
            challenge: Default::default(),
            wallet: Default::default(),
            store: Default::default(),
            blockchain: Default::default(),
            monitor: Default::default(),
            transport: Default::default(),
            rpc_server: Default::default(),
        }
    }
}

pub fn default_contract_address() -> Address {
    Address::from_checksummed(DEFAULT_CONTRACT_ADDRESS).expect("default contract address")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub privkey_path: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Empty path opens a temporary store.
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainConfig {
    pub rpc_url: String,
    pub poll_interval_ms: u64,
    pub start_block: u64,
    pub confirmations: u64,
}

impl BlockchainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        BlockchainConfig {
            rpc_url: DEFAULT_CHAIN_RPC_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            start_block: 0,
            confirmations: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub reap_timeout_ms: u64,
    pub idle_sleep_ms: u64,
}

impl MonitorConfig {
    pub fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            reap_timeout_ms: DEFAULT_REAP_TIMEOUT_MS,
            idle_sleep_ms: DEFAULT_IDLE_SLEEP_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    Nonce,
    AlwaysChallenge,
    NeverChallenge,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy::Nonce
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeMode {
    Log,
    Onchain,
}

impl Default for ChallengeMode {
    fn default() -> Self {
        ChallengeMode::Log
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Inbound TCP listen address, the loopback transport is used when unset.
    pub listen: Option<String>,
    pub peers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RPCServerConfig {
    pub listen: String,
}

impl Default for RPCServerConfig {
    fn default() -> Self {
        RPCServerConfig {
            listen: DEFAULT_RPC_SERVER_LISTEN.to_string(),
        }
    }
}
