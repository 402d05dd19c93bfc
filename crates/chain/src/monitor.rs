use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use ms_config::BlockchainConfig;
use ms_rpc_client::{
    contract::{decode_close_input, decode_log, event_topics},
    error::is_rpc_request_error,
    traits::ChainClient,
    types::{Log, LogFilter},
};
use ms_types::{ChainEvent, EventKind, OnchainBalanceProof, TxRef};
use parking_lot::RwLock;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{field, instrument, Span};

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ChainEvent, tx: &TxRef) -> Result<()>;
}

/// Polls the chain for channel events and hands each one to the handler
/// registered for its kind.
///
/// Handlers run inline in the poll cycle, one event at a time in chain log
/// order. A handler error aborts the cycle before the resume point moves, so
/// the events of an unfinished range are delivered again by a later poll.
pub struct BlockchainMonitor {
    client: Arc<dyn ChainClient>,
    handlers: RwLock<HashMap<EventKind, Arc<dyn EventHandler>>>,
    // last processed block, also serializes poll cycles
    last_block: Mutex<Option<u64>>,
    poll_interval: Duration,
    start_block: u64,
    confirmations: u64,
    stop_tx: watch::Sender<bool>,
}

impl BlockchainMonitor {
    pub fn new(client: Arc<dyn ChainClient>, poll_interval: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        BlockchainMonitor {
            client,
            handlers: RwLock::new(HashMap::new()),
            last_block: Mutex::new(None),
            poll_interval,
            start_block: 0,
            confirmations: 0,
            stop_tx,
        }
    }

    pub fn from_config(client: Arc<dyn ChainClient>, config: &BlockchainConfig) -> Self {
        Self::new(client, config.poll_interval())
            .with_start_block(config.start_block)
            .with_confirmations(config.confirmations)
    }

    pub fn with_start_block(self, start_block: u64) -> Self {
        Self {
            start_block,
            ..self
        }
    }

    pub fn with_confirmations(self, confirmations: u64) -> Self {
        Self {
            confirmations,
            ..self
        }
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn register_handler(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        if self.handlers.write().insert(kind, handler).is_some() {
            log::warn!("[chain monitor] replaced handler of {}", kind);
        }
    }

    pub async fn last_processed_block(&self) -> Option<u64> {
        *self.last_block.lock().await
    }

    /// Runs one poll cycle, returns the number of events dispatched.
    #[instrument(skip_all, fields(from_block = field::Empty, to_block = field::Empty))]
    pub async fn poll(&self) -> Result<usize> {
        let mut last_block = self.last_block.lock().await;

        let tip = self.client.block_number().await?;
        let to_block = match tip.checked_sub(self.confirmations) {
            Some(to_block) => to_block,
            None => return Ok(0),
        };
        let from_block = match *last_block {
            Some(last) => last + 1,
            None => self.start_block,
        };
        if from_block > to_block {
            return Ok(0);
        }
        Span::current()
            .record("from_block", &from_block)
            .record("to_block", &to_block);

        let filter = LogFilter {
            from_block,
            to_block,
            topics: event_topics(),
        };
        let mut logs = self.client.get_logs(&filter).await?;
        logs.retain(|entry| !entry.removed);
        logs.sort_by_key(|entry| (entry.block_number, entry.log_index));

        let mut dispatched = 0;
        for entry in logs {
            let mut event = match decode_log(&entry) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!(
                        "[chain monitor] skip undecodable log of {} in tx {:#x}: {}",
                        entry.address,
                        entry.transaction_hash,
                        err
                    );
                    continue;
                }
            };
            if let ChainEvent::ChannelClosed { closing_proof, .. } = &mut event {
                *closing_proof = self.closing_proof(&entry).await?;
            }

            let handler = self.handlers.read().get(&event.kind()).cloned();
            let handler = match handler {
                Some(handler) => handler,
                None => {
                    log::debug!("[chain monitor] no handler for {}", event.kind());
                    continue;
                }
            };
            let tx = TxRef {
                transaction_hash: entry.transaction_hash,
                block_number: entry.block_number,
                log_index: entry.log_index,
            };
            log::info!(
                "[chain monitor] dispatch {} from tx {:#x}",
                event,
                tx.transaction_hash
            );
            handler.handle(&event, &tx).await?;
            dispatched += 1;
        }

        *last_block = Some(to_block);
        Ok(dispatched)
    }

    async fn closing_proof(&self, entry: &Log) -> Result<Option<OnchainBalanceProof>> {
        let input = match self
            .client
            .get_transaction_input(&entry.transaction_hash)
            .await?
        {
            Some(input) => input,
            None => return Ok(None),
        };
        match decode_close_input(&input) {
            Ok(proof) => Ok(proof),
            Err(err) => {
                log::warn!(
                    "[chain monitor] close tx {:#x} has malformed input: {}",
                    entry.transaction_hash,
                    err
                );
                Ok(None)
            }
        }
    }

    /// Spawns the poll loop.
    ///
    /// Request errors are logged and the range is retried after the next
    /// interval. Any other error ends the loop and is returned from the task.
    pub fn start(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let monitor = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            log::info!(
                "[chain monitor] start polling every {}ms",
                monitor.poll_interval.as_millis()
            );
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                match monitor.poll().await {
                    Ok(_) => {}
                    Err(err) if is_rpc_request_error(&err) => {
                        log::error!(
                            "[chain monitor] poll request error, will retry in {}ms: {}",
                            monitor.poll_interval.as_millis(),
                            err
                        );
                    }
                    Err(err) => {
                        log::error!("[chain monitor] exit unexpected, error: {:#}", err);
                        return Err(err);
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(monitor.poll_interval) => {}
                    _ = stop_rx.changed() => {}
                }
            }
            log::info!("[chain monitor] stopped");
            Ok(())
        })
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}
