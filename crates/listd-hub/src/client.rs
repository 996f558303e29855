//! Client connections as seen by the hub

use listd_core::Message;
use listd_transport::{TransportError, TransportSender};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client identifier
pub type ClientId = Uuid;

/// A connected client
///
/// The hub owns one handle per registered client. The sender behind it is a
/// bounded FIFO drained by the connection's own writer, so queueing never
/// waits on the network, only on a queue that is full.
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    addr: SocketAddr,
    sender: Arc<dyn TransportSender>,
}

impl ClientHandle {
    pub fn new(addr: SocketAddr, sender: Arc<dyn TransportSender>) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr,
            sender,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a message, giving a full queue up to `grace` to drain
    ///
    /// A queue still full after `grace` reports `BufferFull`.
    pub async fn send_within(&self, message: Message, grace: Duration) -> Result<(), TransportError> {
        match tokio::time::timeout(grace, self.sender.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::BufferFull),
        }
    }

    /// Flush and close the client's outbound side
    pub async fn close(&self) {
        let _ = self.sender.close().await;
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish()
    }
}

/// A request tagged with the client that sent it
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub client: ClientId,
    pub message: Message,
}
