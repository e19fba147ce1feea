use thiserror::Error;

use crate::TType;

/// Errors raised while encoding, decoding or moving message frames.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Bad protocol version: {0:#010x}")]
    BadVersion(u32),

    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("Invalid field type: {0}")]
    InvalidFieldType(u8),

    #[error("Unexpected field type for {field}: expected {expected}, got {actual}")]
    UnexpectedFieldType {
        field: &'static str,
        expected: TType,
        actual: TType,
    },

    #[error("Negative size: {0}")]
    NegativeSize(i32),

    #[error("Maximum {0} length exceeded limit {1}, received {2}")]
    LengthLimitExceeded(&'static str, usize, usize),

    #[error("Maximum nesting depth {0} exceeded while skipping")]
    DepthLimitExceeded(usize),

    #[error("Invalid UTF-8 string: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Trailing bytes after message end: {0}")]
    TrailingBytes(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
