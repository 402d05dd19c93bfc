use std::{fmt, sync::Arc};

use ms_config::ValidationPolicy;
use ms_types::{Address, ChannelId, OnchainBalanceProof, StoredEntry};

/// A close observed on chain.
#[derive(Clone, Copy, Debug)]
pub struct ChannelClose<'a> {
    pub channel_id: &'a ChannelId,
    pub closing_participant: &'a Address,
    pub closing_proof: Option<&'a OnchainBalanceProof>,
    pub block_number: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject { reason: String },
}

impl Verdict {
    pub fn is_reject(&self) -> bool {
        matches!(self, Verdict::Reject { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => f.write_str("accept"),
            Verdict::Reject { reason } => write!(f, "reject: {}", reason),
        }
    }
}

/// Decides whether a close is acceptable given the best known proof.
pub trait CloseValidator: Send + Sync {
    fn validate(&self, entry: &StoredEntry, close: &ChannelClose<'_>) -> Verdict;
}

/// Rejects closes that settle on an older state than the stored proof.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonceValidator;

impl CloseValidator for NonceValidator {
    fn validate(&self, entry: &StoredEntry, close: &ChannelClose<'_>) -> Verdict {
        let stored_nonce = entry.nonce();
        match close.closing_proof {
            Some(onchain) if stored_nonce > onchain.nonce => Verdict::Reject {
                reason: format!(
                    "stored nonce {} is newer than closing nonce {}",
                    stored_nonce, onchain.nonce
                ),
            },
            Some(_) => Verdict::Accept,
            // without the submitted proof any signed state may be newer
            None if stored_nonce > 0 => Verdict::Reject {
                reason: format!("closing proof unknown, stored nonce {}", stored_nonce),
            },
            None => Verdict::Accept,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticValidator(Verdict);

impl StaticValidator {
    pub fn accept() -> Self {
        StaticValidator(Verdict::Accept)
    }

    pub fn reject(reason: &str) -> Self {
        StaticValidator(Verdict::Reject {
            reason: reason.to_string(),
        })
    }
}

impl CloseValidator for StaticValidator {
    fn validate(&self, _entry: &StoredEntry, _close: &ChannelClose<'_>) -> Verdict {
        self.0.clone()
    }
}

pub fn from_policy(policy: ValidationPolicy) -> Arc<dyn CloseValidator> {
    match policy {
        ValidationPolicy::Nonce => Arc::new(NonceValidator),
        ValidationPolicy::AlwaysChallenge => Arc::new(StaticValidator::reject("always challenge")),
        ValidationPolicy::NeverChallenge => Arc::new(StaticValidator::accept()),
    }
}
