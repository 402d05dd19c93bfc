use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use ms_config::TransportConfig;
use ms_types::Message;
use ms_utils::{abort_on_drop::AbortOnDropHandle, backoff::Backoff};
use parking_lot::{Mutex, RwLock};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};

use crate::{verify_message, MessageCallback, Transport, TransportError, TransportIdentity};

const SEND_ATTEMPTS: usize = 3;

/// Newline delimited JSON messages over TCP.
///
/// Every inbound connection may carry any number of frames. Frames that do not
/// decode or whose balance proof is not signed by a participant are dropped.
/// Outbound messages are written to every configured peer on a fresh
/// connection.
pub struct TcpTransport {
    identity: TransportIdentity,
    listen: String,
    peers: Vec<String>,
    callbacks: Arc<RwLock<Vec<MessageCallback>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    server: Mutex<Option<AbortOnDropHandle<()>>>,
}

impl TcpTransport {
    pub fn new(identity: TransportIdentity, listen: String, peers: Vec<String>) -> Self {
        TcpTransport {
            identity,
            listen,
            peers,
            callbacks: Default::default(),
            local_addr: Mutex::new(None),
            server: Mutex::new(None),
        }
    }

    /// `None` when no listen address is configured.
    pub fn from_config(identity: TransportIdentity, config: &TransportConfig) -> Option<Self> {
        let listen = config.listen.clone()?;
        Some(Self::new(identity, listen, config.peers.clone()))
    }

    /// Bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn identity(&self) -> &TransportIdentity {
        &self.identity
    }

    fn add_message_callback(&self, callback: MessageCallback) {
        self.callbacks.write().push(callback);
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.server.lock().is_some() {
            return Err(TransportError::AlreadyStarted);
        }
        let listener = TcpListener::bind(&self.listen).await?;
        let addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(addr);
        let server = AbortOnDropHandle::spawn(accept_loop(listener, Arc::clone(&self.callbacks)));
        *self.server.lock() = Some(server);
        log::info!(
            "[tcp transport] {} listening on {}",
            self.identity.address,
            addr
        );
        Ok(())
    }

    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        if self.server.lock().is_none() {
            return Err(TransportError::NotStarted);
        }
        let mut frame = serde_json::to_vec(message)?;
        frame.push(b'\n');

        let mut delivered = 0;
        let mut last_err = None;
        for peer in &self.peers {
            match write_frame(peer, &frame).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    log::warn!("[tcp transport] send to {} failed: {}", peer, err);
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if delivered == 0 => Err(TransportError::Unreachable(err)),
            _ => Ok(()),
        }
    }

    async fn stop(&self) {
        let server = self.server.lock().take();
        if let Some(server) = server {
            server.abort();
            self.local_addr.lock().take();
            log::info!("[tcp transport] stopped");
        }
    }
}

async fn accept_loop(listener: TcpListener, callbacks: Arc<RwLock<Vec<MessageCallback>>>) {
    // dropped with the loop, which aborts every open connection
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    log::debug!("[tcp transport] accepted {}", peer);
                    connections.spawn(read_frames(stream, peer, Arc::clone(&callbacks)));
                }
                Err(err) => log::warn!("[tcp transport] accept error: {}", err),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn read_frames(
    stream: TcpStream,
    peer: SocketAddr,
    callbacks: Arc<RwLock<Vec<MessageCallback>>>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log::warn!("[tcp transport] read from {} failed: {}", peer, err);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let message: Message = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("[tcp transport] drop malformed frame from {}: {}", peer, err);
                continue;
            }
        };
        if let Err(reason) = verify_message(&message) {
            log::warn!(
                "[tcp transport] drop {} from {}: {}",
                message.type_name(),
                peer,
                reason
            );
            continue;
        }
        let callbacks = callbacks.read().clone();
        for callback in callbacks {
            callback(message.clone());
        }
    }
}

async fn write_frame(peer: &str, frame: &[u8]) -> std::io::Result<()> {
    let mut backoff = Backoff::new(Duration::from_millis(50)).with_max_delay(Duration::from_secs(1));
    let mut attempt = 1;
    loop {
        match try_write_frame(peer, frame).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt >= SEND_ATTEMPTS => return Err(err),
            Err(_) => {
                attempt += 1;
                tokio::time::sleep(backoff.next_delay()).await;
            }
        }
    }
}

async fn try_write_frame(peer: &str, frame: &[u8]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(peer).await?;
    stream.write_all(frame).await?;
    stream.shutdown().await
}
