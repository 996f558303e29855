//! Error types for the listd protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A line with no words at all
    #[error("empty message")]
    EmptyMessage,

    /// Line exceeded the configured limit
    #[error("line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    /// A word was not valid UTF-8
    #[error("invalid utf-8 in word")]
    InvalidUtf8,

    /// Wrong number of arguments for a word
    #[error("{word}: expected {expected} argument(s), got {actual}")]
    ArgumentCount {
        word: String,
        expected: usize,
        actual: usize,
    },

    /// Unknown playback state name
    #[error("unknown playback state: {0}")]
    UnknownState(String),

    /// Unparseable time value
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// Message cannot update the service state
    #[error("unexpected word for state update: {0}")]
    UnexpectedWord(String),
}
