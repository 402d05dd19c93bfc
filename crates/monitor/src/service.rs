use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ms_chain::{BlockchainMonitor, EventHandler};
use ms_challenge::{ChannelClose, Challenger, CloseValidator, Verdict};
use ms_config::MonitorConfig;
use ms_store::BalanceProofStore;
use ms_transport::Transport;
use ms_types::{
    Address, ChainEvent, ChannelId, ChannelState, EventKind, Message, OnchainBalanceProof, TxRef,
    H256,
};
use ms_utils::wallet::privkey_to_addr;
use tokio::{sync::watch, task::JoinHandle};
use tracing::instrument;

use crate::{
    error::MonitorError,
    tasks::{IngestionTaskTracker, TaskHandle},
};

/// What a `ChannelClosed` event led to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// No stored proof for the channel.
    Unmonitored,
    /// The closing participant is not part of the stored proof.
    DataMismatch,
    AlreadyChallenged,
    /// Close is valid, the entry was dropped.
    Accepted,
    Challenged { tx_hash: Option<H256> },
}

pub struct MonitoringServiceCreateArgs {
    /// Hex encoded signing key of the protected participant.
    pub privkey: String,
    pub network_id: u64,
    pub contract_address: Address,
    pub store: BalanceProofStore,
    pub transport: Arc<dyn Transport>,
    pub monitor: Arc<BlockchainMonitor>,
    pub validator: Arc<dyn CloseValidator>,
    pub challenger: Arc<dyn Challenger>,
    pub config: MonitorConfig,
}

/// Per-channel dispute logic, driven by chain events.
pub struct DisputeHandler {
    store: BalanceProofStore,
    tracker: Arc<IngestionTaskTracker>,
    validator: Arc<dyn CloseValidator>,
    challenger: Arc<dyn Challenger>,
}

impl DisputeHandler {
    #[instrument(skip_all, fields(channel = %channel_id, closing = %closing_participant))]
    pub async fn on_channel_closed(
        &self,
        channel_id: &ChannelId,
        closing_participant: &Address,
        closing_proof: Option<&OnchainBalanceProof>,
        block_number: u64,
    ) -> Result<CloseOutcome> {
        // evaluate against every proof received before the close
        self.tracker.wait_channel_idle(channel_id).await;

        let entry = match self.store.get(channel_id)? {
            Some(entry) => entry,
            None => {
                log::debug!("[monitor] channel {} closed, not monitored", channel_id);
                return Ok(CloseOutcome::Unmonitored);
            }
        };
        if !entry.is_participant(closing_participant) {
            let mismatch = MonitorError::DataMismatch {
                channel_id: *channel_id,
                reason: format!(
                    "closing participant {} is neither {} nor {}",
                    closing_participant, entry.participant1, entry.participant2
                ),
            };
            log::warn!("[monitor] {}, stored nonce {}", mismatch, entry.nonce());
            return Ok(CloseOutcome::DataMismatch);
        }
        if let ChannelState::Challenged {
            block_number: challenged_at,
        } = entry.state
        {
            log::info!(
                "[monitor] channel {} already challenged at block {}",
                channel_id,
                challenged_at
            );
            return Ok(CloseOutcome::AlreadyChallenged);
        }

        let close = ChannelClose {
            channel_id,
            closing_participant,
            closing_proof,
            block_number,
        };
        match self.validator.validate(&entry, &close) {
            Verdict::Accept => {
                log::info!(
                    "[monitor] close of channel {} accepted, stop watching",
                    channel_id
                );
                self.store.delete(channel_id)?;
                Ok(CloseOutcome::Accepted)
            }
            Verdict::Reject { reason } => {
                log::warn!(
                    "[monitor] invalid close of channel {} by {}: {}, challenging",
                    channel_id,
                    closing_participant,
                    reason
                );
                let tx_hash = self.challenger.challenge(&entry, &close).await?;
                self.store.mark_challenged(channel_id, block_number)?;
                Ok(CloseOutcome::Challenged { tx_hash })
            }
        }
    }

    /// Returns whether an entry was removed.
    pub async fn on_channel_settled(&self, channel_id: &ChannelId) -> Result<bool> {
        self.tracker.wait_channel_idle(channel_id).await;
        let removed = self.store.delete(channel_id)?;
        log::info!(
            "[monitor] channel {} settled, entry removed: {}",
            channel_id,
            removed
        );
        Ok(removed)
    }

    pub fn on_transfer_updated(
        &self,
        channel_id: &ChannelId,
        node_address: &Address,
        block_number: u64,
    ) {
        log::info!(
            "[monitor] transfer of channel {} updated by {} at block {}",
            channel_id,
            node_address,
            block_number
        );
    }
}

#[async_trait]
impl EventHandler for DisputeHandler {
    async fn handle(&self, event: &ChainEvent, tx: &TxRef) -> Result<()> {
        match event {
            ChainEvent::ChannelClosed {
                channel_id,
                closing_participant,
                block_number,
                closing_proof,
            } => {
                let outcome = self
                    .on_channel_closed(
                        channel_id,
                        closing_participant,
                        closing_proof.as_ref(),
                        *block_number,
                    )
                    .await?;
                log::debug!(
                    "[monitor] close tx {:#x} handled: {:?}",
                    tx.transaction_hash,
                    outcome
                );
            }
            ChainEvent::ChannelSettled { channel_id, .. } => {
                self.on_channel_settled(channel_id).await?;
            }
            ChainEvent::TransferUpdated {
                channel_id,
                node_address,
                block_number,
            } => self.on_transfer_updated(channel_id, node_address, *block_number),
        }
        Ok(())
    }
}

enum Step {
    Stop,
    MonitorExited(Result<Result<()>, tokio::task::JoinError>),
    Reaped(Result<Vec<TaskHandle>, MonitorError>),
}

/// The watchtower: ingests balance proofs from the transport and disputes
/// invalid closes seen by the chain monitor.
pub struct MonitoringService {
    address: Address,
    store: BalanceProofStore,
    transport: Arc<dyn Transport>,
    monitor: Arc<BlockchainMonitor>,
    tracker: Arc<IngestionTaskTracker>,
    handler: Arc<DisputeHandler>,
    reap_timeout: Duration,
    idle_sleep: Duration,
    stop_tx: watch::Sender<bool>,
}

impl MonitoringService {
    /// Validates the identity, binds the store and wires the collaborators.
    ///
    /// Nothing runs until [`MonitoringService::run`].
    pub fn create(args: MonitoringServiceCreateArgs) -> Result<Arc<Self>, MonitorError> {
        let MonitoringServiceCreateArgs {
            privkey,
            network_id,
            contract_address,
            store,
            transport,
            monitor,
            validator,
            challenger,
            config,
        } = args;

        let address = privkey_to_addr(&privkey).map_err(|err| {
            MonitorError::IdentityMismatch(format!("invalid private key: {}", err))
        })?;
        if transport.identity().address != address {
            return Err(MonitorError::IdentityMismatch(format!(
                "transport speaks for {}, key is {}",
                transport.identity().address,
                address
            )));
        }
        match store.identity()? {
            Some(identity) if identity.receiver != address => {
                return Err(MonitorError::IdentityMismatch(format!(
                    "store is bound to receiver {}, key is {}",
                    identity.receiver, address
                )));
            }
            Some(identity) => log::info!(
                "[monitor] store bound to network {} contract {}",
                identity.network_id,
                identity.contract_address
            ),
            None => store.setup(network_id, contract_address, address)?,
        }

        let tracker = Arc::new(IngestionTaskTracker::new(Arc::new(store.clone())));
        {
            let tracker = Arc::clone(&tracker);
            transport.add_message_callback(Arc::new(move |message: Message| match message {
                Message::BalanceProof(balance_proof) => {
                    let handle = tracker.spawn(balance_proof);
                    log::debug!(
                        "[monitor] ingest proof of channel {} as task {}",
                        handle.channel_id,
                        handle.id
                    );
                }
                Message::FeeInfo(_) => {}
            }));
        }

        let handler = Arc::new(DisputeHandler {
            store: store.clone(),
            tracker: Arc::clone(&tracker),
            validator,
            challenger,
        });
        for kind in [
            EventKind::ChannelClosed,
            EventKind::ChannelSettled,
            EventKind::TransferUpdated,
        ] {
            monitor.register_handler(kind, handler.clone());
        }

        let (stop_tx, _) = watch::channel(false);
        log::info!("[monitor] monitoring on behalf of {}", address);
        Ok(Arc::new(MonitoringService {
            address,
            store,
            transport,
            monitor,
            tracker,
            handler,
            reap_timeout: config.reap_timeout(),
            idle_sleep: config.idle_sleep(),
            stop_tx,
        }))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn store(&self) -> &BalanceProofStore {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<IngestionTaskTracker> {
        &self.tracker
    }

    pub fn handler(&self) -> &Arc<DisputeHandler> {
        &self.handler
    }

    pub fn on_balance_proof(&self, balance_proof: ms_types::BalanceProof) -> TaskHandle {
        self.tracker.spawn(balance_proof)
    }

    /// Starts the transport and the chain monitor, then reaps ingestion tasks
    /// until stopped.
    ///
    /// Returns an error when an ingestion task or the chain monitor fails, the
    /// collaborators are stopped in either case.
    pub async fn run(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        self.transport.start().await?;
        let mut monitor_task: Option<JoinHandle<Result<()>>> = Some(self.monitor.start());

        let result = loop {
            if *stop_rx.borrow() {
                break Ok(());
            }
            let step = match monitor_task.as_mut() {
                Some(task) => tokio::select! {
                    _ = stop_rx.changed() => Step::Stop,
                    joined = task => Step::MonitorExited(joined),
                    reaped = self.tracker.reap_completed(self.reap_timeout) => Step::Reaped(reaped),
                },
                None => break Ok(()),
            };
            match step {
                Step::Stop => {}
                Step::MonitorExited(joined) => {
                    monitor_task = None;
                    break match joined {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(err.context("chain event monitor")),
                        Err(err) => Err(anyhow!("chain event monitor task: {}", err)),
                    };
                }
                Step::Reaped(Ok(handles)) if handles.is_empty() => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.idle_sleep) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
                Step::Reaped(Ok(handles)) => {
                    log::debug!("[monitor] reaped {} ingestion tasks", handles.len());
                }
                Step::Reaped(Err(err)) => break Err(err.into()),
            }
        };

        if let Err(err) = &result {
            log::error!("[monitor] unhandled fault: {:#}", err);
        }
        log::info!("[monitor] stopping chain event monitor");
        self.monitor.stop();
        if let Some(task) = monitor_task {
            match task.await {
                Ok(Err(err)) => log::error!("[monitor] chain event monitor exit error: {:#}", err),
                Err(err) => log::error!("[monitor] chain event monitor task error: {}", err),
                Ok(Ok(())) => {}
            }
        }
        log::info!("[monitor] stopping transport");
        self.transport.stop().await;
        result
    }

    /// Ends `run` after its current wait. In-flight ingestion continues.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub async fn drain_all(&self) -> Result<(), MonitorError> {
        self.tracker.drain_all().await
    }
}
