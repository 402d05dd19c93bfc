use thiserror::Error;

use crate::StoreIdentity;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store already bound to {0:?}")]
    AlreadyInitialized(StoreIdentity),
    #[error("db error {0}")]
    Db(#[from] sled::Error),
    #[error("corrupted record {0}")]
    Codec(#[from] serde_json::Error),
}
