//! Hub error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("lost connection to playout: {0}")]
    DownstreamLost(String),

    #[error("playout protocol violation: {0}")]
    DownstreamProtocol(#[source] listd_core::Error),

    #[error("hub is not running")]
    HubClosed,

    #[error("transport error: {0}")]
    Transport(#[from] listd_transport::TransportError),
}
