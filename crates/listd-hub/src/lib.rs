//! listd Hub
//!
//! The hub sits between many clients and a single playout service:
//! - Keeps a shared playlist with index+hash checked mutation
//! - Answers playlist, dump and auto-advance requests itself
//! - Forwards everything else to the playout service
//! - Broadcasts playout responses to every client
//! - Loads the next item when the current one ends (auto-advance)
//!
//! # Example
//!
//! ```no_run
//! use listd_hub::{Downstream, Hub, HubConfig, Server};
//! use listd_transport::TcpConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downstream = Downstream::connect_tcp("127.0.0.1:1351", TcpConfig::default()).await?;
//!     let (hub, handle) = Hub::new(HubConfig::default(), downstream);
//!     tokio::spawn(hub.run());
//!
//!     Server::new(handle).serve_tcp("127.0.0.1:1350").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod downstream;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod peers;
pub mod playlist;
pub mod server;
pub mod state;

pub use client::{ClientHandle, ClientId, ClientRequest};
pub use downstream::Downstream;
pub use error::{HubError, Result};
pub use handlers::{Handler, Intercept};
pub use hub::{Hub, HubConfig, HubHandle, DEFAULT_SLOW_CLIENT_TIMEOUT};
pub use peers::PeerRegistry;
pub use playlist::{ItemKind, Playlist, PlaylistError, PlaylistItem};
pub use server::Server;
pub use state::{HubState, Outcome};
