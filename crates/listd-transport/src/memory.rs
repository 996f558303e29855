//! In-memory transport
//!
//! Behaves like a TCP connection (bounded FIFO, flush-on-close) without a
//! socket. Used to run the hub against scripted peers.

use async_trait::async_trait;
use listd_core::Message;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};

/// Sending half of an in-memory channel
pub struct MemorySender {
    tx: mpsc::Sender<TransportEvent>,
    connected: Arc<Mutex<bool>>,
}

/// Receiving half of an in-memory channel
pub struct MemoryReceiver {
    rx: mpsc::Receiver<TransportEvent>,
    connected: Arc<Mutex<bool>>,
}

/// A one-directional channel holding at most `depth` messages
pub fn channel(depth: usize) -> (MemorySender, MemoryReceiver) {
    let connected = Arc::new(Mutex::new(true));
    let (tx, rx) = mpsc::channel(depth);
    (
        MemorySender {
            tx,
            connected: connected.clone(),
        },
        MemoryReceiver { rx, connected },
    )
}

/// Two connected endpoints, each able to send to the other
pub fn pair(depth: usize) -> ((MemorySender, MemoryReceiver), (MemorySender, MemoryReceiver)) {
    let (a_tx, b_rx) = channel(depth);
    let (b_tx, a_rx) = channel(depth);
    ((a_tx, a_rx), (b_tx, b_rx))
}

type Accepted = (MemorySender, MemoryReceiver, SocketAddr);

/// An in-memory listener; connections arrive through a [`MemoryConnector`]
pub struct MemoryServer {
    incoming: mpsc::Receiver<Accepted>,
    local_addr: SocketAddr,
}

/// Opens connections to a [`MemoryServer`]
#[derive(Clone)]
pub struct MemoryConnector {
    outgoing: mpsc::Sender<Accepted>,
    depth: usize,
}

/// Create a listener and the connector that dials it
pub fn server(local_addr: SocketAddr, depth: usize) -> (MemoryServer, MemoryConnector) {
    let (outgoing, incoming) = mpsc::channel(16);
    (
        MemoryServer {
            incoming,
            local_addr,
        },
        MemoryConnector { outgoing, depth },
    )
}

impl MemoryConnector {
    /// Connect as a peer with the given address
    pub async fn connect(&self, peer: SocketAddr) -> Result<(MemorySender, MemoryReceiver)> {
        let (client, (server_tx, server_rx)) = pair(self.depth);
        self.outgoing
            .send((server_tx, server_rx, peer))
            .await
            .map_err(|_| TransportError::ConnectionFailed("listener closed".into()))?;
        Ok(client)
    }
}

#[async_trait]
impl TransportServer for MemoryServer {
    type Sender = MemorySender;
    type Receiver = MemoryReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| TransportError::AcceptFailed("no more connectors".into()))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl MemoryReceiver {
    /// Receive the next message, skipping non-message events
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv_message(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await? {
                TransportEvent::Message(m) => return Some(m),
                TransportEvent::Disconnected { .. } => return None,
                _ => continue,
            }
        }
    }

    /// Take a message if one is queued right now
    pub fn try_recv_message(&mut self) -> Option<Message> {
        match self.rx.try_recv().ok()? {
            TransportEvent::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Whether the sending side is still open
    pub fn is_connected(&self) -> bool {
        *self.connected.lock()
    }
}

#[async_trait]
impl TransportSender for MemorySender {
    async fn send(&self, message: Message) -> Result<()> {
        if !*self.connected.lock() {
            return Err(TransportError::NotConnected);
        }
        self.tx
            .send(TransportEvent::Message(message))
            .await
            .map_err(|_| TransportError::SendFailed("Channel closed".into()))
    }

    fn try_send(&self, message: Message) -> Result<()> {
        if !*self.connected.lock() {
            return Err(TransportError::NotConnected);
        }
        self.tx
            .try_send(TransportEvent::Message(message))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::BufferFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
            })
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let was_connected = std::mem::replace(&mut *self.connected.lock(), false);
        // A full queue drops the marker; the receiver still sees the channel
        // close once this sender is dropped.
        if was_connected {
            let _ = self.tx.try_send(TransportEvent::Disconnected {
                reason: Some("closed locally".to_string()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TransportReceiver for MemoryReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}
