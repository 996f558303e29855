//! Common test helpers for listd
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A scripted playout service ([`MockPlayout`])
//! - A raw line-protocol client ([`LineClient`])
//! - A hub, server and playout started together and torn down on drop ([`TestHub`])

use listd_core::{pack, Message, Response, Tokeniser};
use listd_hub::{Downstream, Hub, HubConfig, HubHandle, Server};
use listd_transport::{
    TcpConfig, TcpSender, TcpServer, TransportEvent, TransportReceiver, TransportSender,
    TransportServer,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait before deciding nothing more is coming
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Identifier the mock playout service announces in its OHAI
pub const MOCK_IDENTIFIER: &str = "playd-mock";

/// Features the mock playout service announces by default
pub const MOCK_FEATURES: &[&str] = &["FileLoad", "PlayStop", "Seek", "End", "TimeReport"];

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

// ============================================================================
// Mock Playout Service
// ============================================================================

/// A playout service that greets, records every request and replies on demand
pub struct MockPlayout {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Message>>>,
    sender: Arc<Mutex<Option<Arc<TcpSender>>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockPlayout {
    /// Start with the default feature list
    pub async fn start() -> Self {
        Self::start_with_features(MOCK_FEATURES).await
    }

    /// Start announcing the given features
    ///
    /// FEATURES is sent before OHAI, so a hub reporting the mock's identifier
    /// has already seen its features.
    pub async fn start_with_features(features: &[&str]) -> Self {
        let mut server = TcpServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let greeting = vec![
            Message::response(Response::Features).with_args(features.iter().copied()),
            Message::response(Response::Ohai).with_arg(MOCK_IDENTIFIER),
        ];
        let received = Arc::new(Mutex::new(Vec::new()));
        let sender = Arc::new(Mutex::new(None));

        let received_clone = received.clone();
        let sender_clone = sender.clone();
        let handle = tokio::spawn(async move {
            let Ok((tx, mut rx, _)) = server.accept().await else {
                return;
            };
            for message in greeting {
                if tx.send(message).await.is_err() {
                    return;
                }
            }
            *sender_clone.lock() = Some(Arc::new(tx));

            while let Some(event) = rx.recv().await {
                match event {
                    TransportEvent::Message(message) => received_clone.lock().push(message),
                    TransportEvent::Disconnected { .. } | TransportEvent::Error(_) => break,
                    TransportEvent::Connected => {}
                }
            }
        });

        Self {
            addr,
            received,
            sender,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the hub has connected and been greeted
    pub fn is_connected(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Send a response to the hub
    pub async fn send(&self, message: Message) {
        let connected = wait_for(
            || async { self.is_connected() },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await;
        assert!(connected, "hub never connected to the mock playout");

        let sender = self.sender.lock().clone().unwrap();
        sender.send(message).await.unwrap();
    }

    /// Every request received so far
    pub fn received(&self) -> Vec<Message> {
        self.received.lock().clone()
    }

    /// Wait for a request matching `pred`, returning the first match
    pub async fn wait_for_request<P>(&self, pred: P) -> Option<Message>
    where
        P: Fn(&Message) -> bool,
    {
        let found = wait_for(
            || async { self.received.lock().iter().any(&pred) },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await;
        if !found {
            return None;
        }
        self.received.lock().iter().find(|m| pred(m)).cloned()
    }

    /// Drop the connection to the hub
    pub async fn disconnect(&mut self) {
        let sender = self.sender.lock().take();
        if let Some(sender) = sender {
            let _ = sender.close().await;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MockPlayout {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Line Client
// ============================================================================

/// A bare TCP client speaking the line protocol
pub struct LineClient {
    stream: TcpStream,
    tokeniser: Tokeniser,
    pending: VecDeque<Message>,
}

impl LineClient {
    pub async fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            tokeniser: Tokeniser::new(),
            pending: VecDeque::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.stream.local_addr().unwrap()
    }

    /// Write raw bytes, bypassing the packer
    pub async fn send_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await
    }

    pub async fn send(&mut self, message: &Message) -> std::io::Result<()> {
        self.send_raw(&pack(message)).await
    }

    /// Next message, or `None` on timeout or disconnect
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<Message> {
        let deadline = Instant::now() + wait;
        let mut buf = [0u8; 4096];
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(message);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let n = timeout(remaining, self.stream.read(&mut buf)).await.ok()?.ok()?;
            if n == 0 {
                return None;
            }
            for words in self.tokeniser.feed(&buf[..n]).ok()? {
                self.pending.push_back(Message::from_words(words).ok()?);
            }
        }
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.recv_timeout(DEFAULT_TIMEOUT).await
    }

    /// Receive a message and check its word
    pub async fn expect(&mut self, word: &str) -> Message {
        let message = self
            .recv()
            .await
            .unwrap_or_else(|| panic!("expected {}, got nothing", word));
        assert_eq!(message.word().to_string(), word, "unexpected message {}", message);
        message
    }

    /// Skip messages until one with `word` arrives
    pub async fn recv_until(&mut self, word: &str) -> Option<Message> {
        loop {
            let message = self.recv().await?;
            if message.word().to_string() == word {
                return Some(message);
            }
        }
    }

    /// Read the whole bootstrap sequence (OHAI through the last ITEM)
    pub async fn read_bootstrap(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        loop {
            let message = self.recv().await.expect("bootstrap ended early");
            let is_count = message.word().to_string() == "COUNT";
            let count = message.arg(0).and_then(|n| n.parse::<usize>().ok());
            messages.push(message);
            if is_count {
                for _ in 0..count.unwrap_or(0) {
                    messages.push(self.expect("ITEM").await);
                }
                return messages;
            }
        }
    }

    /// Whether the server has closed this connection
    pub async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 4096];
        loop {
            match timeout(DEFAULT_TIMEOUT, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}

// ============================================================================
// Test Hub
// ============================================================================

/// A mock playout, a hub and a TCP server, stopped on drop
pub struct TestHub {
    playout: MockPlayout,
    addr: SocketAddr,
    handle: HubHandle,
    server: Arc<Server>,
    hub_task: Option<JoinHandle<listd_hub::Result<()>>>,
    server_task: Option<JoinHandle<()>>,
}

impl TestHub {
    pub async fn start() -> Self {
        Self::start_with_config(HubConfig::default(), TcpConfig::default()).await
    }

    pub async fn start_with_config(config: HubConfig, tcp: TcpConfig) -> Self {
        let playout = MockPlayout::start().await;
        let downstream = Downstream::connect_tcp(&playout.addr().to_string(), tcp.clone())
            .await
            .unwrap();
        let (hub, handle) = Hub::new(config, downstream);
        let hub_task = tokio::spawn(hub.run());

        let listener = TcpServer::bind_with_config("127.0.0.1:0", tcp.clone())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(handle.clone()).with_tcp_config(tcp));
        let server_clone = server.clone();
        let server_task = tokio::spawn(async move {
            let _ = server_clone.serve_on(listener).await;
        });

        let test_hub = Self {
            playout,
            addr,
            handle,
            server,
            hub_task: Some(hub_task),
            server_task: Some(server_task),
        };

        // Ready once a client is greeted with the playout's identifier
        let ready = wait_for(
            || async move {
                let Ok(mut greeter) = LineClient::connect(addr).await else {
                    return false;
                };
                greeter
                    .recv()
                    .await
                    .and_then(|ohai| ohai.arg(0).map(|id| id.ends_with(MOCK_IDENTIFIER)))
                    .unwrap_or(false)
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await;
        assert!(ready, "hub never picked up the playout greeting");

        // Let the greeters' disconnections drain
        let server = test_hub.server.clone();
        wait_for(
            || {
                let server = server.clone();
                async move { server.peer_count() == 0 }
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await;

        test_hub
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn playout(&self) -> &MockPlayout {
        &self.playout
    }

    pub fn playout_mut(&mut self) -> &mut MockPlayout {
        &mut self.playout
    }

    pub fn handle(&self) -> &HubHandle {
        &self.handle
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    pub async fn connect_client(&self) -> LineClient {
        LineClient::connect(self.addr).await.unwrap()
    }

    /// Connect a client and consume its bootstrap
    pub async fn connect_ready_client(&self) -> LineClient {
        let mut client = self.connect_client().await;
        client.read_bootstrap().await;
        client
    }

    /// Wait for the hub loop to finish and return its result
    pub async fn hub_result(&mut self) -> Option<listd_hub::Result<()>> {
        let task = self.hub_task.take()?;
        timeout(DEFAULT_TIMEOUT, task).await.ok()?.ok()
    }

    /// Stop everything explicitly (also happens on drop)
    pub fn stop(&mut self) {
        self.server.stop();
        if let Some(handle) = self.server_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.hub_task.take() {
            handle.abort();
        }
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.stop();
    }
}
