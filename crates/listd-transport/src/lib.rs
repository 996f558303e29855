//! listd Transport Layer
//!
//! Transports move [`listd_core::Message`]s between the hub and its peers:
//! - TCP (line framed, used for both clients and the playout service)
//! - Memory (in-process, used to drive the hub without sockets)

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "tcp")]
pub mod tcp;

pub use error::{Result, TransportError};
pub use traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};

#[cfg(feature = "tcp")]
pub use tcp::{TcpConfig, TcpReceiver, TcpSender, TcpServer, TcpTransport};
