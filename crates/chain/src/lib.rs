pub mod monitor;


pub use monitor::{BlockchainMonitor, EventHandler};
