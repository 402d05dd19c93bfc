use ms_store::StoreError;
use ms_types::ChannelId;
use thiserror::Error;

use crate::tasks::TaskId;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("identity mismatch: {0}")]
    IdentityMismatch(String),
    #[error("data mismatch on channel {channel_id}: {reason}")]
    DataMismatch { channel_id: ChannelId, reason: String },
    #[error("ingestion task {task_id} of channel {channel_id} failed: {reason}")]
    IngestionFailed {
        task_id: TaskId,
        channel_id: ChannelId,
        reason: String,
    },
    #[error("store error {0}")]
    Store(#[from] StoreError),
}
