//! Binary protocol encoder and decoder.
//!
//! The encoding follows the strict Thrift binary protocol: big-endian integers,
//! length-prefixed strings, a versioned message header and type-tagged struct
//! fields terminated by a stop byte. A whole message is built in memory by
//! [`ProtocolWriter`] and handed to a channel as one frame; the receiving side
//! decodes it with [`ProtocolReader`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    CodecError, FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType,
    TType,
};

/// Strict binary protocol version marker, or-ed with the message type.
pub const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;
const MESSAGE_TYPE_MASK: u32 = 0x0000_00ff;

/// Nesting limit when skipping unknown values.
pub const MAX_SKIP_DEPTH: usize = 64;

/// Builds the encoded form of one message.
#[derive(Debug, Default)]
pub struct ProtocolWriter {
    buf: BytesMut,
}

impl ProtocolWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing and return the encoded bytes.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Append everything another writer produced.
    pub fn append(&mut self, other: ProtocolWriter) {
        self.buf.extend_from_slice(&other.buf);
    }

    pub fn write_message_begin(&mut self, ident: &MessageIdentifier) -> Result<(), CodecError> {
        self.buf.put_u32(VERSION_1 | ident.kind as u32);
        self.write_string(&ident.name)?;
        self.buf.put_i32(ident.seq_id);
        Ok(())
    }

    pub fn write_message_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn write_struct_begin(&mut self, _name: &str) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn write_struct_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn write_field_begin(
        &mut self,
        _name: &str,
        ttype: TType,
        id: i16,
    ) -> Result<(), CodecError> {
        self.buf.put_u8(ttype as u8);
        self.buf.put_i16(id);
        Ok(())
    }

    pub fn write_field_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn write_field_stop(&mut self) -> Result<(), CodecError> {
        self.buf.put_u8(TType::Stop as u8);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), CodecError> {
        self.buf.put_u8(u8::from(value));
        Ok(())
    }

    pub fn write_byte(&mut self, value: i8) -> Result<(), CodecError> {
        self.buf.put_i8(value);
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), CodecError> {
        self.buf.put_i16(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.buf.put_i32(value);
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), CodecError> {
        self.buf.put_i64(value);
        Ok(())
    }

    pub fn write_double(&mut self, value: f64) -> Result<(), CodecError> {
        self.buf.put_f64(value);
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.write_binary(value.as_bytes())
    }

    pub fn write_binary(&mut self, value: &[u8]) -> Result<(), CodecError> {
        self.buf.put_i32(encode_size("binary", value.len())?);
        self.buf.put_slice(value);
        Ok(())
    }

    pub fn write_map_begin(&mut self, ident: &MapIdentifier) -> Result<(), CodecError> {
        self.buf.put_u8(ident.key_type as u8);
        self.buf.put_u8(ident.value_type as u8);
        self.buf.put_i32(encode_size("map", ident.size)?);
        Ok(())
    }

    pub fn write_map_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn write_list_begin(&mut self, ident: &ListIdentifier) -> Result<(), CodecError> {
        self.buf.put_u8(ident.element_type as u8);
        self.buf.put_i32(encode_size("list", ident.size)?);
        Ok(())
    }

    pub fn write_list_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn write_set_begin(&mut self, ident: &ListIdentifier) -> Result<(), CodecError> {
        self.write_list_begin(ident)
    }

    pub fn write_set_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }
}

fn encode_size(what: &'static str, size: usize) -> Result<i32, CodecError> {
    i32::try_from(size).map_err(|_| CodecError::LengthLimitExceeded(what, i32::MAX as usize, size))
}

/// Decodes one received message.
#[derive(Debug, Clone)]
pub struct ProtocolReader {
    buf: Bytes,
}

impl ProtocolReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    pub fn read_message_begin(&mut self) -> Result<MessageIdentifier, CodecError> {
        let header = self.read_u32()?;
        if header & VERSION_MASK != VERSION_1 {
            return Err(CodecError::BadVersion(header));
        }
        let raw_kind = (header & MESSAGE_TYPE_MASK) as u8;
        let kind =
            MessageType::from_repr(raw_kind).ok_or(CodecError::InvalidMessageType(raw_kind))?;
        let name = self.read_string()?;
        let seq_id = self.read_i32()?;
        Ok(MessageIdentifier { name, kind, seq_id })
    }

    /// Ends the message; a frame must be consumed entirely.
    pub fn read_message_end(&mut self) -> Result<(), CodecError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    pub fn read_struct_begin(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn read_struct_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn read_field_begin(&mut self) -> Result<FieldIdentifier, CodecError> {
        let ttype = self.read_ttype()?;
        if ttype == TType::Stop {
            return Ok(FieldIdentifier { ttype, id: 0 });
        }
        let id = self.read_i16()?;
        Ok(FieldIdentifier { ttype, id })
    }

    pub fn read_field_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8() != 0)
    }

    pub fn read_byte(&mut self) -> Result<i8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_double(&mut self) -> Result<f64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_binary()?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    pub fn read_binary(&mut self) -> Result<Bytes, CodecError> {
        let len = self.read_size()?;
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn read_map_begin(&mut self) -> Result<MapIdentifier, CodecError> {
        let key_type = self.read_ttype()?;
        let value_type = self.read_ttype()?;
        let size = self.read_size()?;
        Ok(MapIdentifier {
            key_type,
            value_type,
            size,
        })
    }

    pub fn read_map_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn read_list_begin(&mut self) -> Result<ListIdentifier, CodecError> {
        let element_type = self.read_ttype()?;
        let size = self.read_size()?;
        Ok(ListIdentifier { element_type, size })
    }

    pub fn read_list_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    pub fn read_set_begin(&mut self) -> Result<ListIdentifier, CodecError> {
        self.read_list_begin()
    }

    pub fn read_set_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    /// Consume and discard a value of the given type.
    pub fn skip(&mut self, ttype: TType) -> Result<(), CodecError> {
        self.skip_nested(ttype, MAX_SKIP_DEPTH)
    }

    fn skip_nested(&mut self, ttype: TType, depth: usize) -> Result<(), CodecError> {
        if depth == 0 {
            return Err(CodecError::DepthLimitExceeded(MAX_SKIP_DEPTH));
        }
        match ttype {
            // Carry no payload, so a container of them could spin without consuming input.
            TType::Stop | TType::Void => return Err(CodecError::InvalidFieldType(ttype as u8)),
            TType::Bool | TType::Byte => self.advance(1)?,
            TType::I16 => self.advance(2)?,
            TType::I32 => self.advance(4)?,
            TType::Double | TType::I64 => self.advance(8)?,
            TType::String => {
                let len = self.read_size()?;
                self.advance(len)?;
            }
            TType::Struct => loop {
                let field = self.read_field_begin()?;
                if field.ttype == TType::Stop {
                    break;
                }
                self.skip_nested(field.ttype, depth - 1)?;
            },
            TType::Map => {
                let map = self.read_map_begin()?;
                for _ in 0..map.size {
                    self.skip_nested(map.key_type, depth - 1)?;
                    self.skip_nested(map.value_type, depth - 1)?;
                }
            }
            TType::Set | TType::List => {
                let list = self.read_list_begin()?;
                for _ in 0..list.size {
                    self.skip_nested(list.element_type, depth - 1)?;
                }
            }
        }
        Ok(())
    }

    fn advance(&mut self, n: usize) -> Result<(), CodecError> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn read_ttype(&mut self) -> Result<TType, CodecError> {
        self.ensure(1)?;
        let raw = self.buf.get_u8();
        TType::from_repr(raw).ok_or(CodecError::InvalidFieldType(raw))
    }

    fn read_size(&mut self) -> Result<usize, CodecError> {
        let size = self.read_i32()?;
        usize::try_from(size).map_err(|_| CodecError::NegativeSize(size))
    }
}
