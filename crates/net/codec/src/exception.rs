//! Application-level exceptions carried in `Exception` replies.

use std::fmt;

use strum::{Display, FromRepr};

use crate::{CodecError, ProtocolReader, ProtocolWriter, TType, WireStruct};

/// Kind of an application exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(i32)]
pub enum ExceptionKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
    InvalidTransform = 8,
    InvalidProtocol = 9,
    UnsupportedClientType = 10,
}

/// Exception sent by a peer instead of a normal reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    kind: ExceptionKind,
    message: String,
}

impl ApplicationException {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ExceptionKind::UnknownMethod,
            format!("Unknown function {method}"),
        )
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApplicationException {}

impl WireStruct for ApplicationException {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("TApplicationException")?;
        out.write_field_begin("message", TType::String, 1)?;
        out.write_string(&self.message)?;
        out.write_field_end()?;
        out.write_field_begin("type", TType::I32, 2)?;
        out.write_i32(self.kind as i32)?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut message = String::new();
        let mut kind = ExceptionKind::Unknown;

        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (1, TType::String) => message = input.read_string()?,
                // Kinds from newer peers degrade to Unknown.
                (2, TType::I32) => {
                    kind = ExceptionKind::from_repr(input.read_i32()?)
                        .unwrap_or(ExceptionKind::Unknown)
                }
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;

        Ok(Self { kind, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_wire_format() {
        let exc = ApplicationException::unknown_method("ElemeThriftTrackingAPI");
        let mut out = ProtocolWriter::new();
        exc.write(&mut out).unwrap();

        let mut input = ProtocolReader::new(out.freeze());
        let decoded = ApplicationException::read(&mut input).unwrap();
        assert_eq!(decoded.kind(), ExceptionKind::UnknownMethod);
        assert_eq!(decoded.message(), "Unknown function ElemeThriftTrackingAPI");
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_unrecognised_kind_degrades_to_unknown() {
        let mut out = ProtocolWriter::new();
        out.write_field_begin("type", TType::I32, 2).unwrap();
        out.write_i32(4242).unwrap();
        out.write_field_begin("extra", TType::I64, 9).unwrap();
        out.write_i64(1).unwrap();
        out.write_field_stop().unwrap();

        let decoded = ApplicationException::read(&mut ProtocolReader::new(out.freeze())).unwrap();
        assert_eq!(decoded.kind(), ExceptionKind::Unknown);
        assert!(decoded.message().is_empty());
    }
}
