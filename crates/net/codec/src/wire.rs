use crate::{CodecError, ProtocolReader, ProtocolWriter};

/// A structured payload that rides inside a message body.
///
/// Implementors write themselves as a struct (fields terminated by a stop byte)
/// and must skip fields they do not recognise when reading, so peers can add
/// fields without breaking older readers.
pub trait WireStruct {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError>;

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError>
    where
        Self: Sized;
}

/// The empty struct, used for calls without arguments and void results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Void;

impl WireStruct for Void {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("Void")?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        input.skip(crate::TType::Struct)?;
        Ok(Void)
    }
}
