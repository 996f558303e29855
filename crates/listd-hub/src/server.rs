//! Client-facing accept loop
//!
//! The server is transport-agnostic: it accepts from anything implementing
//! [`TransportServer`], registers each connection with the hub and pumps the
//! connection's requests into it until the peer goes away.

use listd_transport::{
    TcpConfig, TcpServer, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::{
    client::ClientHandle,
    error::Result,
    hub::HubHandle,
    peers::PeerRegistry,
};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    hub: HubHandle,
    peers: Arc<PeerRegistry>,
    running: Arc<RwLock<bool>>,
    stop: Arc<Notify>,
    tcp_config: TcpConfig,
}

impl Server {
    pub fn new(hub: HubHandle) -> Self {
        Self {
            hub,
            peers: Arc::new(PeerRegistry::new()),
            running: Arc::new(RwLock::new(false)),
            stop: Arc::new(Notify::new()),
            tcp_config: TcpConfig::default(),
        }
    }

    /// Use this configuration for accepted TCP connections
    pub fn with_tcp_config(mut self, config: TcpConfig) -> Self {
        self.tcp_config = config;
        self
    }

    /// Accept clients from any transport until stopped or the hub closes
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        info!("Accepting client connections");
        *self.running.write() = true;

        while *self.running.read() {
            let accepted = tokio::select! {
                _ = self.stop.notified() => break,
                accepted = server.accept() => accepted,
            };

            match accepted {
                Ok((sender, receiver, addr)) => {
                    self.handle_connection(Arc::new(sender), receiver, addr);
                }
                Err(e) => {
                    if self.hub.is_closed() {
                        break;
                    }
                    error!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        *self.running.write() = false;
        server.close().await?;
        info!("No longer accepting connections");
        Ok(())
    }

    /// Bind a TCP listener and serve on it
    pub async fn serve_tcp(&self, addr: &str) -> Result<()> {
        let server = TcpServer::bind_with_config(addr, self.tcp_config.clone()).await?;
        self.serve_on(server).await
    }

    /// Stop accepting; connected clients are left alone
    pub fn stop(&self) {
        *self.running.write() = false;
        self.stop.notify_one();
    }

    /// Stop accepting and close every connected client
    pub async fn shutdown(&self) {
        self.stop();
        let peers = self.peers.snapshot();
        info!("Closing {} client connection(s)", peers.len());
        futures::future::join_all(peers.iter().map(|(_, sender)| sender.close())).await;
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    fn handle_connection(
        &self,
        sender: Arc<dyn TransportSender>,
        mut receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        if !self.peers.add(addr, Arc::clone(&sender)) {
            warn!("Rejecting duplicate connection from {}", addr);
            tokio::spawn(async move {
                let _ = sender.close().await;
            });
            return;
        }

        let hub = self.hub.clone();
        let peers = Arc::clone(&self.peers);

        tokio::spawn(async move {
            let client = ClientHandle::new(addr, Arc::clone(&sender));
            let id = client.id();

            if hub.add_client(client).await.is_err() {
                debug!("Hub closed; dropping {}", addr);
                peers.remove(&addr);
                let _ = sender.close().await;
                return;
            }

            loop {
                match receiver.recv().await {
                    Some(TransportEvent::Message(message)) => {
                        if hub.request(id, message).await.is_err() {
                            break;
                        }
                    }
                    Some(TransportEvent::Disconnected { reason }) => {
                        debug!("Client {} disconnected: {:?}", addr, reason);
                        break;
                    }
                    Some(TransportEvent::Error(e)) => {
                        warn!("Transport error from {}: {}", addr, e);
                        break;
                    }
                    Some(TransportEvent::Connected) => {}
                    None => break,
                }
            }

            let _ = hub.remove_client(id).await;
            peers.remove(&addr);
        });
    }
}
