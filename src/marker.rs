//! Value-encoding tag bytes. Every encoded value starts with one of these,
//! and the concrete assignments are part of the on-disk contract: they must
//! never change for the lifetime of the format.

/// Leading tag byte of an encoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    Null,
    True,
    False,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt64,
    Float32,
    Float64,
    RawNumber,
    Date,
    Data,
    String,
    SharedString,
    SharedStringRef,
    ExternStringRef,
    Array,
    Dict,
}

impl Marker {
    /// Convert a tag byte into a marker. Returns `None` if the byte isn't an
    /// assigned tag.
    pub fn from_u8(n: u8) -> Option<Marker> {
        match n {
            0x00 => Some(Marker::Null),
            0x01 => Some(Marker::True),
            0x02 => Some(Marker::False),
            0x03 => Some(Marker::Int8),
            0x04 => Some(Marker::Int16),
            0x05 => Some(Marker::Int32),
            0x06 => Some(Marker::Int64),
            0x07 => Some(Marker::UInt64),
            0x08 => Some(Marker::Float32),
            0x09 => Some(Marker::Float64),
            0x0a => Some(Marker::RawNumber),
            0x0b => Some(Marker::Date),
            0x0c => Some(Marker::Data),
            0x0d => Some(Marker::String),
            0x0e => Some(Marker::SharedString),
            0x0f => Some(Marker::SharedStringRef),
            0x10 => Some(Marker::ExternStringRef),
            0x11 => Some(Marker::Array),
            0x12 => Some(Marker::Dict),
            _ => None,
        }
    }

    /// Convert a marker into its single-byte representation.
    pub fn into_u8(self) -> u8 {
        match self {
            Marker::Null => 0x00,
            Marker::True => 0x01,
            Marker::False => 0x02,
            Marker::Int8 => 0x03,
            Marker::Int16 => 0x04,
            Marker::Int32 => 0x05,
            Marker::Int64 => 0x06,
            Marker::UInt64 => 0x07,
            Marker::Float32 => 0x08,
            Marker::Float64 => 0x09,
            Marker::RawNumber => 0x0a,
            Marker::Date => 0x0b,
            Marker::Data => 0x0c,
            Marker::String => 0x0d,
            Marker::SharedString => 0x0e,
            Marker::SharedStringRef => 0x0f,
            Marker::ExternStringRef => 0x10,
            Marker::Array => 0x11,
            Marker::Dict => 0x12,
        }
    }
}

impl From<Marker> for u8 {
    fn from(val: Marker) -> u8 {
        val.into_u8()
    }
}
