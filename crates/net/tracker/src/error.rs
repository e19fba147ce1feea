use trackwire_net_codec::{ApplicationException, CodecError, ExceptionKind, MessageType};

/// Errors surfaced by negotiation and header exchange.
///
/// A peer that does not know the handshake is not an error; everything here
/// leaves the call (or the extension on this connection) unusable.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("tracker negotiation failed: wrong method name {0:?}")]
    WrongMethodName(String),
    #[error("tracker negotiation failed: out of sequence response (expected {expected}, got {actual})")]
    BadSequenceId { expected: i32, actual: i32 },
    #[error("tracker negotiation failed: invalid message type {0}")]
    InvalidMessageType(MessageType),
    #[error("tracker negotiation failed: {0}")]
    Remote(ApplicationException),
}

impl TrackerError {
    /// The exception a server should answer with for this failure.
    pub fn to_application_exception(&self) -> ApplicationException {
        let kind = match self {
            Self::Codec(_) => ExceptionKind::ProtocolError,
            Self::WrongMethodName(_) => ExceptionKind::WrongMethodName,
            Self::BadSequenceId { .. } => ExceptionKind::BadSequenceId,
            Self::InvalidMessageType(_) => ExceptionKind::InvalidMessageType,
            Self::Remote(exc) => return exc.clone(),
        };
        ApplicationException::new(kind, self.to_string())
    }
}
