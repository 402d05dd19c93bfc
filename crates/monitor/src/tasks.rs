use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use ms_store::{BalanceProofStore, StoreError, UpsertOutcome};
use ms_types::{BalanceProof, ChannelId};
use parking_lot::Mutex;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    Mutex as AsyncMutex, Notify,
};

use crate::error::MonitorError;

pub type TaskId = u64;

/// Where ingested proofs end up.
pub trait ProofSink: Send + Sync + 'static {
    fn ingest(&self, balance_proof: &BalanceProof) -> Result<UpsertOutcome, StoreError>;
}

impl ProofSink for BalanceProofStore {
    fn ingest(&self, balance_proof: &BalanceProof) -> Result<UpsertOutcome, StoreError> {
        self.upsert(balance_proof)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub channel_id: ChannelId,
}

struct Completion {
    handle: TaskHandle,
    result: Result<UpsertOutcome, String>,
}

/// Tracks fire-and-forget ingestion tasks until they are reaped.
///
/// A finished task reports through the completion channel, failures included,
/// so a failed ingestion is never dropped silently: it is returned as an error
/// by the `reap_completed` call that picks it up.
pub struct IngestionTaskTracker {
    sink: Arc<dyn ProofSink>,
    next_id: AtomicU64,
    registry: Mutex<HashMap<TaskId, ChannelId>>,
    // in-flight tasks per channel, an entry is removed when it drops to zero
    pending: Arc<Mutex<HashMap<ChannelId, usize>>>,
    idle: Arc<Notify>,
    completed_tx: UnboundedSender<Completion>,
    completed_rx: AsyncMutex<UnboundedReceiver<Completion>>,
}

impl IngestionTaskTracker {
    pub fn new(sink: Arc<dyn ProofSink>) -> Self {
        let (completed_tx, completed_rx) = unbounded_channel();
        IngestionTaskTracker {
            sink,
            next_id: AtomicU64::new(0),
            registry: Mutex::new(HashMap::new()),
            pending: Default::default(),
            idle: Default::default(),
            completed_tx,
            completed_rx: AsyncMutex::new(completed_rx),
        }
    }

    /// Starts ingesting `balance_proof` and returns right away.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(&self, balance_proof: BalanceProof) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let channel_id = balance_proof.channel_id;
        let handle = TaskHandle { id, channel_id };
        self.registry.lock().insert(id, channel_id);
        *self.pending.lock().entry(channel_id).or_insert(0) += 1;

        let sink = Arc::clone(&self.sink);
        let pending = Arc::clone(&self.pending);
        let idle = Arc::clone(&self.idle);
        let completed_tx = self.completed_tx.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            let nonce = balance_proof.nonce;
            let ingested = tokio::task::spawn_blocking(move || sink.ingest(&balance_proof)).await;
            let result = match ingested {
                Ok(Ok(outcome)) => {
                    match outcome {
                        UpsertOutcome::Stale { existing_nonce } => log::info!(
                            "[ingestion] drop stale proof of channel {}, nonce {} <= {}",
                            channel_id,
                            nonce,
                            existing_nonce
                        ),
                        UpsertOutcome::ParticipantMismatch { existing } => log::warn!(
                            "[ingestion] data mismatch, drop proof of channel {} nonce {}: participants differ from stored {} {}",
                            channel_id,
                            nonce,
                            existing.0,
                            existing.1
                        ),
                        outcome => log::debug!(
                            "[ingestion] channel {} nonce {}: {:?}",
                            channel_id,
                            nonce,
                            outcome
                        ),
                    }
                    Ok(outcome)
                }
                Ok(Err(err)) => Err(err.to_string()),
                Err(err) if err.is_panic() => Err(format!("panicked: {}", err)),
                Err(err) => Err(err.to_string()),
            };

            {
                let mut pending = pending.lock();
                if let Some(count) = pending.get_mut(&channel_id) {
                    *count -= 1;
                    if *count == 0 {
                        pending.remove(&channel_id);
                    }
                }
            }
            idle.notify_waiters();

            let completion = Completion {
                handle: task_handle,
                result,
            };
            if completed_tx.send(completion).is_err() {
                log::error!("[ingestion] tracker dropped before task {} completed", id);
            }
        });
        handle
    }

    /// Number of tracked tasks, reaped ones excluded.
    pub fn tracked(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    pub fn has_pending(&self, channel_id: &ChannelId) -> bool {
        self.pending.lock().contains_key(channel_id)
    }

    /// Waits up to `timeout` for at least one task to finish.
    ///
    /// Returns every finished task and removes them from the tracked set, or
    /// an empty list when the timeout elapses first. A failed task is
    /// reported as an error after the whole batch is reaped.
    pub async fn reap_completed(&self, timeout: Duration) -> Result<Vec<TaskHandle>, MonitorError> {
        let completions = {
            let mut completed_rx = self.completed_rx.lock().await;
            let first = match tokio::time::timeout(timeout, completed_rx.recv()).await {
                Ok(Some(completion)) => completion,
                Ok(None) | Err(_) => return Ok(Vec::new()),
            };
            let mut completions = vec![first];
            while let Ok(completion) = completed_rx.try_recv() {
                completions.push(completion);
            }
            completions
        };

        let mut failure = None;
        let mut reaped = Vec::with_capacity(completions.len());
        {
            let mut registry = self.registry.lock();
            for completion in completions {
                registry.remove(&completion.handle.id);
                if let Err(reason) = completion.result {
                    log::error!(
                        "[ingestion] task {} of channel {} failed: {}",
                        completion.handle.id,
                        completion.handle.channel_id,
                        reason
                    );
                    if failure.is_none() {
                        failure = Some(MonitorError::IngestionFailed {
                            task_id: completion.handle.id,
                            channel_id: completion.handle.channel_id,
                            reason,
                        });
                    }
                }
                reaped.push(completion.handle);
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(reaped),
        }
    }

    /// Blocks until every tracked task is reaped.
    pub async fn drain_all(&self) -> Result<(), MonitorError> {
        while !self.is_empty() {
            self.reap_completed(Duration::from_millis(100)).await?;
        }
        Ok(())
    }

    /// Waits until no ingestion of `channel_id` is in flight.
    pub async fn wait_channel_idle(&self, channel_id: &ChannelId) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // register before checking, a completion in between still wakes us
            notified.as_mut().enable();
            if !self.has_pending(channel_id) {
                return;
            }
            notified.await;
        }
    }
}
