use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ms_types::Message;
use parking_lot::RwLock;

use crate::{MessageCallback, Transport, TransportError, TransportIdentity};

/// In-process loopback, a sent message is delivered to the callbacks before
/// `send_message` returns.
pub struct LocalTransport {
    identity: TransportIdentity,
    callbacks: RwLock<Vec<MessageCallback>>,
    started: AtomicBool,
}

impl LocalTransport {
    pub fn new(identity: TransportIdentity) -> Self {
        LocalTransport {
            identity,
            callbacks: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn identity(&self) -> &TransportIdentity {
        &self.identity
    }

    fn add_message_callback(&self, callback: MessageCallback) {
        self.callbacks.write().push(callback);
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyStarted);
        }
        log::info!("[local transport] started for {}", self.identity.address);
        Ok(())
    }

    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        if !self.is_started() {
            return Err(TransportError::NotStarted);
        }
        let callbacks = self.callbacks.read().clone();
        for callback in callbacks {
            callback(message.clone());
        }
        Ok(())
    }

    async fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            log::info!("[local transport] stopped");
        }
    }
}
