mod records;
mod server;

pub use records::BalanceProofRecord;
pub use server::{bind_rest_server, BALANCE_PROOFS_PATH, LEGACY_BALANCE_PROOFS_PATH};
