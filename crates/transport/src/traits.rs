use std::sync::Arc;

use async_trait::async_trait;
use ms_types::{Address, Message};

use crate::TransportError;

/// Invoked once per inbound decoded message.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Who the transport speaks for, handed over at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportIdentity {
    pub address: Address,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn identity(&self) -> &TransportIdentity;

    fn add_message_callback(&self, callback: MessageCallback);

    async fn start(&self) -> Result<(), TransportError>;

    async fn send_message(&self, message: &Message) -> Result<(), TransportError>;

    async fn stop(&self);
}
