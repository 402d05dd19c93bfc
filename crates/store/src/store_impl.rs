use std::path::Path;

use anyhow::{Context, Result};
use ms_config::StoreConfig;
use ms_types::{Address, BalanceProof, ChannelId, ChannelState, StoredEntry};
use serde::{Deserialize, Serialize};

use crate::StoreError;

const TREE_META: &[u8] = b"meta";
const TREE_BALANCE_PROOFS: &[u8] = b"balance_proofs";
const KEY_IDENTITY: &[u8] = b"identity";

/// The identity a store is bound to on first run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreIdentity {
    pub network_id: u64,
    pub contract_address: Address,
    pub receiver: Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated { previous_nonce: u64 },
    /// Rejected, the stored proof is at least as new.
    Stale { existing_nonce: u64 },
    /// Rejected, the proof names other participants than the stored one.
    ParticipantMismatch { existing: (Address, Address) },
}

impl UpsertOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            UpsertOutcome::Inserted | UpsertOutcome::Updated { .. }
        )
    }
}

/// Durable map from channel to the best known balance proof.
///
/// Every mutation of an entry is a compare-and-swap on its key, so concurrent
/// writers of one channel are serialized by the store itself and the nonce of
/// an entry never decreases.
#[derive(Clone)]
pub struct BalanceProofStore {
    db: sled::Db,
    meta: sled::Tree,
    balance_proofs: sled::Tree,
}

impl BalanceProofStore {
    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let meta = db.open_tree(TREE_META)?;
        let balance_proofs = db.open_tree(TREE_BALANCE_PROOFS)?;
        Ok(BalanceProofStore {
            db,
            meta,
            balance_proofs,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .with_context(|| format!("open store {}", path.as_ref().to_string_lossy()))?;
        Ok(Self::from_db(db)?)
    }

    pub fn open_tmp() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::from_db(db)?)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            log::warn!("config.store.path is blank, using temporary store");
            Self::open_tmp()
        } else {
            Self::open(&config.path)
        }
    }

    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        Ok(self.meta.contains_key(KEY_IDENTITY)?)
    }

    pub fn identity(&self) -> Result<Option<StoreIdentity>, StoreError> {
        match self.meta.get(KEY_IDENTITY)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Binds the store to an identity, once.
    pub fn setup(
        &self,
        network_id: u64,
        contract_address: Address,
        receiver: Address,
    ) -> Result<(), StoreError> {
        let identity = StoreIdentity {
            network_id,
            contract_address,
            receiver,
        };
        let encoded = serde_json::to_vec(&identity)?;
        match self
            .meta
            .compare_and_swap(KEY_IDENTITY, None::<&[u8]>, Some(encoded))?
        {
            Ok(()) => {
                self.meta.flush()?;
                log::info!(
                    "store bound to network {} contract {} receiver {}",
                    network_id,
                    contract_address,
                    receiver
                );
                Ok(())
            }
            Err(err) => {
                let existing = match err.current {
                    Some(raw) => serde_json::from_slice(&raw)?,
                    None => identity,
                };
                Err(StoreError::AlreadyInitialized(existing))
            }
        }
    }

    pub fn get(&self, channel_id: &ChannelId) -> Result<Option<StoredEntry>, StoreError> {
        match self.balance_proofs.get(channel_id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stores `balance_proof` unless the stored one has an equal or higher nonce.
    ///
    /// The participants of a channel are fixed by its first proof.
    pub fn upsert(&self, balance_proof: &BalanceProof) -> Result<UpsertOutcome, StoreError> {
        let key = balance_proof.channel_id.as_bytes();
        loop {
            let current = self.balance_proofs.get(key)?;
            let (outcome, entry) = match current {
                None => (UpsertOutcome::Inserted, StoredEntry::new(balance_proof.clone())),
                Some(ref raw) => {
                    let existing: StoredEntry = serde_json::from_slice(raw)?;
                    let existing_participants = (existing.participant1, existing.participant2);
                    if balance_proof.participants() != existing_participants {
                        return Ok(UpsertOutcome::ParticipantMismatch {
                            existing: existing_participants,
                        });
                    }
                    if balance_proof.nonce <= existing.nonce() {
                        return Ok(UpsertOutcome::Stale {
                            existing_nonce: existing.nonce(),
                        });
                    }
                    let mut entry = StoredEntry::new(balance_proof.clone());
                    entry.state = existing.state;
                    let outcome = UpsertOutcome::Updated {
                        previous_nonce: existing.nonce(),
                    };
                    (outcome, entry)
                }
            };
            let encoded = serde_json::to_vec(&entry)?;
            if self
                .balance_proofs
                .compare_and_swap(key, current, Some(encoded))?
                .is_ok()
            {
                return Ok(outcome);
            }
            // lost against a concurrent writer, retry on the fresh value
        }
    }

    /// Returns false when the channel has no entry.
    pub fn mark_challenged(
        &self,
        channel_id: &ChannelId,
        block_number: u64,
    ) -> Result<bool, StoreError> {
        let key = channel_id.as_bytes();
        loop {
            let current = match self.balance_proofs.get(key)? {
                Some(raw) => raw,
                None => return Ok(false),
            };
            let mut entry: StoredEntry = serde_json::from_slice(&current)?;
            entry.state = ChannelState::Challenged { block_number };
            let encoded = serde_json::to_vec(&entry)?;
            if self
                .balance_proofs
                .compare_and_swap(key, Some(current), Some(encoded))?
                .is_ok()
            {
                return Ok(true);
            }
        }
    }

    /// Idempotent, returns whether an entry was removed.
    pub fn delete(&self, channel_id: &ChannelId) -> Result<bool, StoreError> {
        Ok(self.balance_proofs.remove(channel_id.as_bytes())?.is_some())
    }

    pub fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        self.balance_proofs
            .iter()
            .values()
            .map(|raw| -> Result<StoredEntry, StoreError> {
                let raw = raw?;
                Ok(serde_json::from_slice(&raw)?)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.balance_proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balance_proofs.is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
