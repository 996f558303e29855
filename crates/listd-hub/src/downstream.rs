//! Link to the playout service

use listd_transport::{TcpConfig, TcpTransport, TransportReceiver, TransportSender};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;

/// The hub's connection to its single playout service
pub struct Downstream {
    pub(crate) sender: Arc<dyn TransportSender>,
    pub(crate) receiver: Box<dyn TransportReceiver>,
}

impl Downstream {
    pub fn new(sender: Arc<dyn TransportSender>, receiver: Box<dyn TransportReceiver>) -> Self {
        Self { sender, receiver }
    }

    /// Connect to a playout service over TCP
    pub async fn connect_tcp(addr: &str, config: TcpConfig) -> Result<Self> {
        let (sender, receiver) = TcpTransport::with_config(config).connect(addr).await?;
        info!("Connected to playout at {}", addr);
        Ok(Self::new(Arc::new(sender), Box::new(receiver)))
    }
}
