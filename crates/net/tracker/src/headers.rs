//! Payloads exchanged by the tracking extension.

use std::collections::HashMap;

use trackwire_net_codec::{
    CodecError, MapIdentifier, ProtocolReader, ProtocolWriter, TType, WireStruct,
};

use crate::{CallContext, derive_request_id, derive_sequence};

/// Handshake proposal sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeArgs {
    pub app_id: String,
    pub version: i32,
}

/// Handshake answer carrying the version the server settled on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeReply {
    pub version: i32,
}

/// Tracking header written in front of a call's arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeader {
    pub request_id: String,
    pub seq: String,
    pub meta: HashMap<String, String>,
}

impl RequestHeader {
    /// Header for a call issued from within `ctx`.
    pub fn for_call(ctx: &CallContext) -> Self {
        Self {
            request_id: derive_request_id(ctx.request_id()),
            seq: derive_sequence(ctx.sequence()),
            meta: ctx.meta().clone(),
        }
    }
}

impl WireStruct for UpgradeArgs {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("UpgradeArgs")?;
        out.write_field_begin("app_id", TType::String, 1)?;
        out.write_string(&self.app_id)?;
        out.write_field_end()?;
        out.write_field_begin("version", TType::I32, 2)?;
        out.write_i32(self.version)?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut args = Self::default();
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (1, TType::String) => args.app_id = input.read_string()?,
                (2, TType::I32) => args.version = input.read_i32()?,
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(args)
    }
}

impl WireStruct for UpgradeReply {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("UpgradeReply")?;
        out.write_field_begin("version", TType::I32, 1)?;
        out.write_i32(self.version)?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut reply = Self::default();
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (1, TType::I32) => reply.version = input.read_i32()?,
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(reply)
    }
}

impl WireStruct for RequestHeader {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("RequestHeader")?;
        out.write_field_begin("request_id", TType::String, 1)?;
        out.write_string(&self.request_id)?;
        out.write_field_end()?;
        out.write_field_begin("seq", TType::String, 2)?;
        out.write_string(&self.seq)?;
        out.write_field_end()?;
        out.write_field_begin("meta", TType::Map, 3)?;
        out.write_map_begin(&MapIdentifier {
            key_type: TType::String,
            value_type: TType::String,
            size: self.meta.len(),
        })?;
        for (key, value) in &self.meta {
            out.write_string(key)?;
            out.write_string(value)?;
        }
        out.write_map_end()?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut header = Self::default();
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (1, TType::String) => header.request_id = input.read_string()?,
                (2, TType::String) => header.seq = input.read_string()?,
                (3, TType::Map) => header.meta = read_string_map(input)?,
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(header)
    }
}

fn read_string_map(input: &mut ProtocolReader) -> Result<HashMap<String, String>, CodecError> {
    let map = input.read_map_begin()?;
    for ttype in [map.key_type, map.value_type] {
        if ttype != TType::String {
            return Err(CodecError::UnexpectedFieldType {
                field: "meta",
                expected: TType::String,
                actual: ttype,
            });
        }
    }
    // Each entry takes at least 8 bytes; don't trust the declared size.
    let mut entries = HashMap::with_capacity(map.size.min(input.remaining() / 8));
    for _ in 0..map.size {
        let key = input.read_string()?;
        let value = input.read_string()?;
        entries.insert(key, value);
    }
    input.read_map_end()?;
    Ok(entries)
}
