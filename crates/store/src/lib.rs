mod error;
mod store_impl;

pub use error::StoreError;
pub use store_impl::{BalanceProofStore, StoreIdentity, UpsertOutcome};
