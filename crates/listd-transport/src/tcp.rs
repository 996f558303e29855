//! TCP transport implementation
//!
//! Line-framed TCP. Every connection is served by two tasks: a reader that
//! tokenises the byte stream into messages, and a writer that drains one
//! bounded FIFO queue. Either task ending takes the whole connection down.

use async_trait::async_trait;
use bytes::BytesMut;
use listd_core::{codec, Message, Tokeniser, DEFAULT_MAX_LINE_LENGTH};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::error::{Result, TransportError};
use crate::traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};

/// Default depth of each connection's outbound queue
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// TCP configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Maximum length of one line in bytes
    pub max_line_length: usize,
    /// Messages that may wait in a connection's outbound queue
    pub outbound_queue_depth: usize,
    /// Read buffer size
    pub read_buffer_size: usize,
    /// Keep-alive interval in seconds (0 = disabled)
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            outbound_queue_depth: DEFAULT_QUEUE_DEPTH,
            read_buffer_size: 8192,
            keepalive_secs: 30,
        }
    }
}

/// TCP transport (outgoing connections)
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            config: TcpConfig::default(),
        }
    }

    pub fn with_config(config: TcpConfig) -> Self {
        Self { config }
    }

    /// Connect to a TCP server
    pub async fn connect(&self, addr: &str) -> Result<(TcpSender, TcpReceiver)> {
        info!("Connecting to TCP: {}", addr);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if self.config.keepalive_secs > 0 {
            let socket = socket2::SockRef::from(&stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(std::time::Duration::from_secs(self.config.keepalive_secs));
            let _ = socket.set_tcp_keepalive(&keepalive);
        }

        let (sender, receiver) = spawn_connection(stream, &self.config);
        info!("TCP connected to {}", addr);
        Ok((sender, receiver))
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a stream and start its reader and writer tasks
fn spawn_connection(stream: TcpStream, config: &TcpConfig) -> (TcpSender, TcpReceiver) {
    let connected = Arc::new(Mutex::new(true));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let (outgoing_tx, outgoing_rx) = mpsc::channel::<Message>(config.outbound_queue_depth);
    let (incoming_tx, incoming_rx) = mpsc::channel::<TransportEvent>(config.outbound_queue_depth);

    let (reader, writer) = stream.into_split();

    tokio::spawn(run_reader(
        reader,
        incoming_tx,
        Tokeniser::with_max_line_length(config.max_line_length),
        config.read_buffer_size,
        shutdown_tx.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_writer(
        writer,
        outgoing_rx,
        shutdown_tx.clone(),
        shutdown_rx,
        connected.clone(),
    ));

    let sender = TcpSender {
        tx: outgoing_tx,
        connected,
        shutdown: shutdown_tx,
    };
    (sender, TcpReceiver { rx: incoming_rx })
}

enum ReadOutcome {
    Data,
    Eof,
    Shutdown,
    Failed(String),
}

async fn run_reader(
    mut reader: OwnedReadHalf,
    incoming_tx: mpsc::Sender<TransportEvent>,
    mut tokeniser: Tokeniser,
    read_buffer_size: usize,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut read_buf = BytesMut::with_capacity(read_buffer_size);

    let last_event = loop {
        read_buf.clear();
        let outcome = tokio::select! {
            _ = shutdown_rx.changed() => ReadOutcome::Shutdown,
            result = reader.read_buf(&mut read_buf) => match result {
                Ok(0) => ReadOutcome::Eof,
                Ok(_) => ReadOutcome::Data,
                Err(e) => ReadOutcome::Failed(e.to_string()),
            },
        };

        match outcome {
            ReadOutcome::Data => {
                let lines = match tokeniser.feed(&read_buf) {
                    Ok(lines) => lines,
                    Err(e) => {
                        error!("TCP framing error: {}", e);
                        break TransportEvent::Error(e.to_string());
                    }
                };
                let mut receiver_gone = false;
                for message in lines.into_iter().filter_map(|w| Message::from_words(w).ok()) {
                    if incoming_tx.send(TransportEvent::Message(message)).await.is_err() {
                        receiver_gone = true;
                        break;
                    }
                }
                if receiver_gone {
                    break TransportEvent::Disconnected { reason: None };
                }
            }
            ReadOutcome::Eof => {
                debug!("TCP connection closed by peer");
                break TransportEvent::Disconnected { reason: None };
            }
            ReadOutcome::Shutdown => {
                debug!("TCP connection closed locally");
                break TransportEvent::Disconnected {
                    reason: Some("closed locally".to_string()),
                };
            }
            ReadOutcome::Failed(e) => {
                error!("TCP read error: {}", e);
                break TransportEvent::Error(e);
            }
        }
    };

    let _ = incoming_tx.send(last_event).await;
    shutdown_tx.send_replace(true);
}

async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut outgoing_rx: mpsc::Receiver<Message>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
    connected: Arc<Mutex<bool>>,
) {
    loop {
        tokio::select! {
            biased;

            message = outgoing_rx.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = writer.write_all(&codec::pack(&message)).await {
                    error!("TCP write error: {}", e);
                    break;
                }
            }

            _ = shutdown_rx.changed() => {
                // Flush whatever was queued before the close
                while let Ok(message) = outgoing_rx.try_recv() {
                    if writer.write_all(&codec::pack(&message)).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    *connected.lock() = false;
    let _ = writer.shutdown().await;
    shutdown_tx.send_replace(true);
}

/// TCP sender for writing messages
pub struct TcpSender {
    tx: mpsc::Sender<Message>,
    connected: Arc<Mutex<bool>>,
    shutdown: Arc<watch::Sender<bool>>,
}

#[async_trait]
impl TransportSender for TcpSender {
    async fn send(&self, message: Message) -> Result<()> {
        if !*self.connected.lock() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .send(message)
            .await
            .map_err(|_| TransportError::SendFailed("Channel closed".into()))
    }

    fn try_send(&self, message: Message) -> Result<()> {
        if !*self.connected.lock() {
            return Err(TransportError::NotConnected);
        }

        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        *self.connected.lock() = false;
        self.shutdown.send_replace(true);
        Ok(())
    }
}

/// TCP receiver for reading messages
pub struct TcpReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for TcpReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// TCP server for accepting connections
pub struct TcpServer {
    listener: TcpListener,
    config: TcpConfig,
}

impl TcpServer {
    /// Bind to an address and create a new TCP server
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_config(addr, TcpConfig::default()).await
    }

    /// Bind with custom configuration
    pub async fn bind_with_config(addr: &str, config: TcpConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        info!("TCP server listening on {}", addr);

        Ok(Self { listener, config })
    }
}

#[async_trait]
impl TransportServer for TcpServer {
    type Sender = TcpSender;
    type Receiver = TcpReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::AcceptFailed(e.to_string()))?;

        debug!("TCP connection accepted from {}", peer_addr);

        let (sender, receiver) = spawn_connection(stream, &self.config);
        Ok((sender, receiver, peer_addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    async fn close(&self) -> Result<()> {
        // TcpListener doesn't have a close method - it closes when dropped
        Ok(())
    }
}
