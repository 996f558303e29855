//! The hub event loop
//!
//! A single task owns the playlist, the cached playout state and the set of
//! clients. Everything else talks to it over channels, so no state here is
//! ever shared or locked.

use futures::future::join_all;
use listd_core::{Message, Response, Word};
use listd_transport::{TransportError, TransportEvent};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    client::{ClientHandle, ClientId, ClientRequest},
    downstream::Downstream,
    error::{HubError, Result},
    handlers::Intercept,
    state::{HubState, Outcome},
};

pub const DEFAULT_SLOW_CLIENT_TIMEOUT: Duration = Duration::from_millis(500);

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Name reported in front of our version in OHAI
    pub name: String,
    /// Capacity of each of the hub's inbound channels
    pub channel_capacity: usize,
    /// How long a full client queue may take to drain before the client
    /// is disconnected
    pub slow_client_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: "listd".to_string(),
            channel_capacity: 1024,
            slow_client_timeout: DEFAULT_SLOW_CLIENT_TIMEOUT,
        }
    }
}

/// Cloneable sending side of a running [`Hub`]
#[derive(Clone)]
pub struct HubHandle {
    requests: mpsc::Sender<ClientRequest>,
    add: mpsc::Sender<ClientHandle>,
    remove: mpsc::Sender<ClientId>,
    quit: mpsc::Sender<()>,
}

impl HubHandle {
    /// Register a client; it is sent the full bootstrap dump
    pub async fn add_client(&self, client: ClientHandle) -> Result<()> {
        self.add.send(client).await.map_err(|_| HubError::HubClosed)
    }

    /// Unregister a client and close its outbound side
    pub async fn remove_client(&self, client: ClientId) -> Result<()> {
        self.remove.send(client).await.map_err(|_| HubError::HubClosed)
    }

    /// Submit a request on behalf of a client
    pub async fn request(&self, client: ClientId, message: Message) -> Result<()> {
        self.requests
            .send(ClientRequest { client, message })
            .await
            .map_err(|_| HubError::HubClosed)
    }

    /// Close every client and stop the loop
    pub async fn quit(&self) -> Result<()> {
        self.quit.send(()).await.map_err(|_| HubError::HubClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.quit.is_closed()
    }
}

enum HubEvent {
    Quit,
    Add(ClientHandle),
    Remove(ClientId),
    Downstream(Option<TransportEvent>),
    Request(ClientRequest),
}

pub struct Hub {
    state: HubState,
    clients: HashMap<ClientId, ClientHandle>,
    downstream: Downstream,
    slow_client_timeout: Duration,
    request_rx: mpsc::Receiver<ClientRequest>,
    add_rx: mpsc::Receiver<ClientHandle>,
    remove_rx: mpsc::Receiver<ClientId>,
    quit_rx: mpsc::Receiver<()>,
}

impl Hub {
    pub fn new(config: HubConfig, downstream: Downstream) -> (Self, HubHandle) {
        let capacity = config.channel_capacity.max(1);
        let (requests, request_rx) = mpsc::channel(capacity);
        let (add, add_rx) = mpsc::channel(capacity);
        let (remove, remove_rx) = mpsc::channel(capacity);
        let (quit, quit_rx) = mpsc::channel(1);

        let hub = Self {
            state: HubState::new(config.name),
            clients: HashMap::new(),
            downstream,
            slow_client_timeout: config.slow_client_timeout,
            request_rx,
            add_rx,
            remove_rx,
            quit_rx,
        };
        let handle = HubHandle {
            requests,
            add,
            remove,
            quit,
        };
        (hub, handle)
    }

    /// Run until quit, downstream loss, or a downstream protocol violation
    ///
    /// Every client is closed before this returns.
    pub async fn run(mut self) -> Result<()> {
        info!("Hub running");

        let result = loop {
            // Registration is handled before traffic so that a new client's
            // first request never overtakes its bootstrap.
            let event = tokio::select! {
                biased;
                _ = self.quit_rx.recv() => HubEvent::Quit,
                Some(client) = self.add_rx.recv() => HubEvent::Add(client),
                Some(id) = self.remove_rx.recv() => HubEvent::Remove(id),
                event = self.downstream.receiver.recv() => HubEvent::Downstream(event),
                Some(request) = self.request_rx.recv() => HubEvent::Request(request),
            };

            match event {
                HubEvent::Quit => {
                    info!("Closing all connections");
                    break Ok(());
                }
                HubEvent::Add(client) => self.add_client(client).await,
                HubEvent::Remove(id) => self.remove_client(id).await,
                HubEvent::Request(request) => self.process_request(request).await,
                HubEvent::Downstream(Some(TransportEvent::Message(response))) => {
                    if let Err(e) = self.process_response(response).await {
                        break Err(e);
                    }
                }
                HubEvent::Downstream(Some(TransportEvent::Connected)) => {}
                HubEvent::Downstream(Some(TransportEvent::Disconnected { reason })) => {
                    break Err(HubError::DownstreamLost(
                        reason.unwrap_or_else(|| "connection closed".to_string()),
                    ));
                }
                HubEvent::Downstream(Some(TransportEvent::Error(e))) => {
                    break Err(HubError::DownstreamLost(e));
                }
                HubEvent::Downstream(None) => {
                    break Err(HubError::DownstreamLost("channel closed".to_string()));
                }
            }
        };

        if let Err(e) = &result {
            error!("Hub stopping: {}", e);
        }
        self.close_all().await;
        result
    }

    async fn add_client(&mut self, client: ClientHandle) {
        let id = client.id();
        info!("New connection from {} ({})", client.addr(), id);
        self.clients.insert(id, client);

        for message in self.state.bootstrap() {
            if !self.send_to(id, message).await {
                break;
            }
        }
    }

    async fn remove_client(&mut self, id: ClientId) {
        if let Some(client) = self.clients.remove(&id) {
            client.close().await;
            info!("Closed connection from {} ({})", client.addr(), id);
        }
    }

    async fn close_all(&mut self) {
        for (_, client) in self.clients.drain() {
            client.close().await;
        }
    }

    /// Handle a request from a client
    ///
    /// Anything not intercepted goes to the playout service as-is.
    async fn process_request(&mut self, request: ClientRequest) {
        let ClientRequest { client, message } = request;
        debug!("Request from {}: {}", client, message);

        let Some(intercept) = Intercept::from_word(message.word()) else {
            self.forward(message).await;
            return;
        };

        let Outcome {
            responses,
            downstream,
        } = intercept.handle(&mut self.state, &message);

        for rq in downstream {
            self.forward(rq).await;
        }
        for response in responses {
            if response.is_failure() {
                // Failures go to the sender only, with its request for context
                let response = response.with_args(message.to_words());
                self.send_to(client, response).await;
            } else {
                self.broadcast(&response).await;
            }
        }
    }

    /// Handle a response from the playout service
    async fn process_response(&mut self, response: Message) -> Result<()> {
        debug!("Response from playout: {}", response);

        let rs = match response.word() {
            Word::Response(rs) => *rs,
            _ => {
                self.broadcast(&response).await;
                return Ok(());
            }
        };

        match rs {
            Response::End => {
                let Outcome {
                    responses,
                    downstream,
                } = self.state.on_end();
                for rq in downstream {
                    self.forward(rq).await;
                }
                for msg in &responses {
                    self.broadcast(msg).await;
                }
                self.broadcast(&response).await;
            }
            Response::Time | Response::State => {
                self.broadcast(&response).await;
                if let Err(e) = self.state.downstream.update(&response) {
                    warn!("Ignoring malformed {} from playout: {}", rs.as_str(), e);
                }
            }
            Response::Ohai | Response::Features => {
                self.state
                    .downstream
                    .update(&response)
                    .map_err(HubError::DownstreamProtocol)?;
                debug!("Playout state updated from {}", rs.as_str());
            }
            _ => self.broadcast(&response).await,
        }
        Ok(())
    }

    async fn forward(&mut self, request: Message) {
        debug!("Forwarding to playout: {}", request);
        if let Err(e) = self.downstream.sender.send(request).await {
            error!("Failed to forward to playout: {}", e);
        }
    }

    /// Queue a message for one client; drops the client if it cannot take it
    ///
    /// Returns whether the client is still registered.
    async fn send_to(&mut self, id: ClientId, message: Message) -> bool {
        let Some(client) = self.clients.get(&id) else {
            return false;
        };
        let result = client.send_within(message, self.slow_client_timeout).await;
        match result {
            Ok(()) => true,
            Err(e) => {
                self.drop_client(id, e).await;
                false
            }
        }
    }

    /// Queue a message for every registered client
    ///
    /// Clients are served concurrently, so one full queue delays the others
    /// by at most the slow-client timeout.
    async fn broadcast(&mut self, message: &Message) {
        let grace = self.slow_client_timeout;
        let sends = self.clients.iter().map(|(id, client)| {
            let message = message.clone();
            async move { (*id, client.send_within(message, grace).await) }
        });
        let failed: Vec<(ClientId, TransportError)> = join_all(sends)
            .await
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|e| (id, e)))
            .collect();
        for (id, e) in failed {
            self.drop_client(id, e).await;
        }
    }

    async fn drop_client(&mut self, id: ClientId, reason: TransportError) {
        if let Some(client) = self.clients.remove(&id) {
            match reason {
                TransportError::BufferFull => {
                    warn!("Client {} can't keep up; disconnecting", client.addr())
                }
                e => debug!("Client {} unreachable: {}", client.addr(), e),
            }
            client.close().await;
        }
    }
}
