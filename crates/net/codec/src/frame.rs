//! Length-prefixed message framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::CodecError;

/// Default upper bound for a single frame, matching the Thrift framed transport.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16_384_000;

const LENGTH_PREFIX: usize = 4;

/// Largest length the prefix can express.
const MAX_PREFIX_LEN: usize = u32::MAX as usize;

/// Frames each message with a 4-byte big-endian length prefix.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Limits above what a 4-byte prefix can carry are clamped.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_PREFIX_LEN),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl asynchronous_codec::Encoder for FrameCodec {
    type Item<'a> = Bytes;
    type Error = CodecError;

    fn encode(&mut self, item: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let too_long =
            || CodecError::LengthLimitExceeded("frame", self.max_frame_size, item.len());
        if item.len() > self.max_frame_size {
            return Err(too_long());
        }
        let len = u32::try_from(item.len()).map_err(|_| too_long())?;
        dst.reserve(LENGTH_PREFIX + item.len());
        dst.put_u32(len);
        dst.put_slice(&item);
        Ok(())
    }
}

impl asynchronous_codec::Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(mut prefix) = src.get(..LENGTH_PREFIX) else {
            return Ok(None);
        };
        let len = prefix.get_u32() as usize;
        if len > self.max_frame_size {
            return Err(CodecError::LengthLimitExceeded(
                "frame",
                self.max_frame_size,
                len,
            ));
        }
        if src.len() < LENGTH_PREFIX + len {
            src.reserve(LENGTH_PREFIX + len - src.len());
            return Ok(None);
        }
        src.advance(LENGTH_PREFIX);
        Ok(Some(src.split_to(len).freeze()))
    }
}
