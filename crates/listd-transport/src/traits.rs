//! Transport trait definitions

use async_trait::async_trait;
use listd_core::Message;
use std::net::SocketAddr;

use crate::error::Result;

/// Events that can occur on a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// Connection closed (clean or error)
    Disconnected { reason: Option<String> },
    /// A complete message was received
    Message(Message),
    /// Error occurred; the connection is unusable afterwards
    Error(String),
}

/// Trait for sending messages
///
/// Implementations queue messages for a single writer, so messages sent
/// through one sender arrive in the order they were queued.
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Queue a message, waiting for space if the queue is full
    async fn send(&self, message: Message) -> Result<()>;

    /// Queue a message without waiting
    fn try_send(&self, message: Message) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Flush what is already queued, then close the connection
    async fn close(&self) -> Result<()>;
}

/// Trait for receiving messages
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// Trait for transport servers (listeners)
#[async_trait]
pub trait TransportServer: Send + Sync {
    /// The sender type for accepted connections
    type Sender: TransportSender;
    /// The receiver type for accepted connections
    type Receiver: TransportReceiver;

    /// Accept a new connection
    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Close the server
    async fn close(&self) -> Result<()>;
}
