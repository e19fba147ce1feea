//! Message envelope and field type identifiers.

use strum::{Display, FromRepr};

/// Kind of an RPC message, as carried in the envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

/// Wire type tag of a struct field or container element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum TType {
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
}

/// The envelope written before every message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIdentifier {
    pub name: String,
    pub kind: MessageType,
    pub seq_id: i32,
}

impl MessageIdentifier {
    pub fn new(name: impl Into<String>, kind: MessageType, seq_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            seq_id,
        }
    }
}

/// Header of a struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIdentifier {
    pub ttype: TType,
    pub id: i16,
}

/// Header of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapIdentifier {
    pub key_type: TType,
    pub value_type: TType,
    pub size: usize,
}

/// Header of a list or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListIdentifier {
    pub element_type: TType,
    pub size: usize,
}
