//! listd Core
//!
//! Protocol primitives shared by the hub, its transports and its tests.
//!
//! This crate provides:
//! - Command and response words ([`Word`], [`Request`], [`Response`])
//! - Protocol messages ([`Message`])
//! - Line tokenising and packing ([`codec`])
//! - Feature negotiation ([`FeatureSet`])
//! - The cached view of a playout service ([`ServiceState`])

pub mod codec;
pub mod error;
pub mod features;
pub mod message;
pub mod state;
pub mod word;

pub use codec::{pack, Tokeniser};
pub use error::{Error, Result};
pub use features::{Feature, FeatureSet};
pub use message::Message;
pub use state::{PlaybackState, ServiceState};
pub use word::{Request, Response, Word};

/// Version of this implementation, reported in the merged OHAI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default address clients connect to
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:1350";

/// Default address of the playout service
pub const DEFAULT_PLAYOUT_ADDR: &str = "127.0.0.1:1351";

/// Default maximum length of a single protocol line in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;
