use serde::{Deserialize, Serialize};

use crate::{BalanceProof, ChannelId};

/// Fee announcement of a channel participant. Carried by the transport but
/// not acted upon by the monitoring service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInfo {
    pub channel_id: ChannelId,
    pub nonce: u64,
    pub percentage_fee: String,
}

/// Messages delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    BalanceProof(BalanceProof),
    FeeInfo(FeeInfo),
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::BalanceProof(_) => "BalanceProof",
            Message::FeeInfo(_) => "FeeInfo",
        }
    }
}

impl From<BalanceProof> for Message {
    fn from(bp: BalanceProof) -> Self {
        Message::BalanceProof(bp)
    }
}
