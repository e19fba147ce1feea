use thiserror::Error;
use trackwire_net_codec::{ApplicationException, CodecError, MessageType};
use trackwire_net_tracker::TrackerError;

/// Failure of a single call, or of a connection's dispatch loop.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Remote exception: {0}")]
    Remote(ApplicationException),

    #[error("Reply for wrong method: expected {expected:?}, got {actual:?}")]
    WrongMethodName { expected: String, actual: String },

    #[error("Out of sequence reply: expected {expected}, got {actual}")]
    BadSequenceId { expected: i32, actual: i32 },

    #[error("Invalid message type: {0}")]
    InvalidMessageType(MessageType),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
