pub const DEFAULT_NETWORK_ID: u64 = 6;
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xD5BE9a680AbbF01aB2d422035A64DB27ab01C624";
pub const DEFAULT_RPC_SERVER_LISTEN: &str = "127.0.0.1:5001";
pub const DEFAULT_CHAIN_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_REAP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_IDLE_SLEEP_MS: u64 = 5_000;
