pub mod contract;
pub mod error;
pub mod eth_client;
pub mod traits;
pub mod types;
mod utils;
