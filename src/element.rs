//! Decoded value elements and the parser that walks an encoded buffer.
//!
//! Parsing works over a single complete buffer: shared-string references
//! reach backwards by byte offset, so the parser keeps its absolute position
//! rather than consuming its input. It never decodes incrementally from a
//! stream.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::integer::Integer;
use crate::marker::Marker;
use crate::varint;

/// One decoded value event. Containers are announced with their element
/// count; their contents follow as further elements (a dict yields
/// `count` key elements interleaved with `count` value elements).
#[derive(Clone, Debug, PartialEq)]
pub enum Element<'a> {
    Null,
    Bool(bool),
    Int(Integer),
    F32(f32),
    F64(f64),
    RawNumber(&'a [u8]),
    Date(i64),
    Bin(&'a [u8]),
    Str(&'a str),
    Array(usize),
    Dict(usize),
}

/// Walks a complete encoded buffer, yielding one [`Element`] per value.
///
/// Shared-string back references and extern-string ids are resolved to the
/// strings they denote, so consumers only ever see `Element::Str`. The first
/// error poisons the parser; afterwards `next` returns `None`.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
    extern_strings: Option<&'a [String]>,
    errored: bool,
}

impl<'a> Parser<'a> {
    /// Parse a buffer that uses no extern strings.
    pub fn new(buf: &'a [u8]) -> Parser<'a> {
        Self {
            buf,
            pos: 0,
            extern_strings: None,
            errored: false,
        }
    }

    /// Parse a buffer, resolving extern-string references against `table`.
    pub fn with_extern_strings(buf: &'a [u8], table: &'a [String]) -> Parser<'a> {
        Self {
            buf,
            pos: 0,
            extern_strings: Some(table),
            errored: false,
        }
    }

    /// The tag byte of the next value, if any remains.
    pub fn peek_marker(&self) -> Option<Marker> {
        self.buf.get(self.pos).and_then(|n| Marker::from_u8(*n))
    }

    fn take(&mut self, len: usize, step: &'static str) -> Result<&'a [u8]> {
        let rem = &self.buf[self.pos..];
        if rem.len() < len {
            return Err(Error::LengthTooShort {
                step,
                actual: rem.len(),
                expected: len,
            });
        }
        self.pos += len;
        Ok(&rem[..len])
    }

    fn read_uvarint(&mut self, step: &'static str) -> Result<u64> {
        let mut data = &self.buf[self.pos..];
        let before = data.len();
        let v = varint::get_uvarint(&mut data)
            .ok_or_else(|| Error::BadEncode(format!("bad varint on step [{}]", step)))?;
        self.pos += before - data.len();
        Ok(v)
    }

    // Parse the element introduced by `marker`, whose tag byte sat at
    // `tag_pos`. Does not set the errored flag; that's up to the caller.
    fn parse_element(&mut self, marker: Marker, tag_pos: usize) -> Result<Element<'a>> {
        use self::Marker::*;
        let elem = match marker {
            Null => Element::Null,
            True => Element::Bool(true),
            False => Element::Bool(false),
            Int8 => {
                let b = self.take(1, "decode Int8")?;
                Element::Int(Integer::from(b[0] as i8))
            }
            Int16 => {
                let v = BigEndian::read_i16(self.take(2, "decode Int16")?);
                if (i8::MIN as i16..=i8::MAX as i16).contains(&v) {
                    return Err(Error::BadEncode(format!(
                        "Got Int16 with value = {}. This is not the narrowest encoding.",
                        v
                    )));
                }
                Element::Int(Integer::from(v))
            }
            Int32 => {
                let v = BigEndian::read_i32(self.take(4, "decode Int32")?);
                if (i16::MIN as i32..=i16::MAX as i32).contains(&v) {
                    return Err(Error::BadEncode(format!(
                        "Got Int32 with value = {}. This is not the narrowest encoding.",
                        v
                    )));
                }
                Element::Int(Integer::from(v))
            }
            Int64 => {
                let v = BigEndian::read_i64(self.take(8, "decode Int64")?);
                if (i32::MIN as i64..=i32::MAX as i64).contains(&v) {
                    return Err(Error::BadEncode(format!(
                        "Got Int64 with value = {}. This is not the narrowest encoding.",
                        v
                    )));
                }
                Element::Int(Integer::from(v))
            }
            UInt64 => {
                let v = BigEndian::read_u64(self.take(8, "decode UInt64")?);
                if v < i64::MAX as u64 {
                    return Err(Error::BadEncode(format!(
                        "Got UInt64 with value = {}. This should use a signed encoding.",
                        v
                    )));
                }
                Element::Int(Integer::from(v))
            }
            Float32 => {
                let v = BigEndian::read_f32(self.take(4, "decode Float32")?);
                Element::F32(v)
            }
            Float64 => {
                let v = BigEndian::read_f64(self.take(8, "decode Float64")?);
                Element::F64(v)
            }
            RawNumber => {
                let len = self.read_len("decode RawNumber length")?;
                Element::RawNumber(self.take(len, "get RawNumber content")?)
            }
            Date => {
                let v = self.read_uvarint("decode Date")?;
                Element::Date(v as i64)
            }
            Data => {
                let len = self.read_len("decode Data length")?;
                Element::Bin(self.take(len, "get Data content")?)
            }
            String | SharedString => {
                let len = self.read_len("decode string length")?;
                let bytes = self.take(len, "get string content")?;
                Element::Str(as_utf8(bytes)?)
            }
            SharedStringRef => {
                let delta = self.read_uvarint("decode shared string offset")?;
                let target = usize::try_from(delta)
                    .ok()
                    .and_then(|d| tag_pos.checked_sub(d))
                    .ok_or_else(|| {
                        Error::BadEncode("shared string offset reaches before the buffer".into())
                    })?;
                Element::Str(self.string_at(target)?)
            }
            ExternStringRef => {
                let id = self.read_uvarint("decode extern string id")?;
                if id == 0 {
                    return Err(Error::BadEncode("extern string id 0 is invalid".into()));
                }
                let table = self.extern_strings.ok_or_else(|| {
                    Error::BadEncode("no extern string table to resolve against".into())
                })?;
                let s = usize::try_from(id - 1)
                    .ok()
                    .and_then(|i| table.get(i))
                    .ok_or_else(|| {
                        Error::BadEncode(format!("extern string id {} out of range", id))
                    })?;
                Element::Str(s)
            }
            Array => {
                let count = self.read_len("decode array count")?;
                Element::Array(count)
            }
            Dict => {
                let count = self.read_len("decode dict count")?;
                let index_len = count.checked_mul(2).ok_or_else(|| {
                    Error::BadEncode("dict count overflows its hash index".into())
                })?;
                self.take(index_len, "get dict hash index")?;
                Element::Dict(count)
            }
        };
        Ok(elem)
    }

    fn read_len(&mut self, step: &'static str) -> Result<usize> {
        let v = self.read_uvarint(step)?;
        usize::try_from(v).map_err(|_| Error::BadEncode(format!("oversized length on [{}]", step)))
    }

    // Resolve the string whose tag byte sits at `target`, without moving the
    // parse position.
    fn string_at(&self, target: usize) -> Result<&'a str> {
        match self.buf.get(target).copied().and_then(Marker::from_u8) {
            Some(Marker::String) | Some(Marker::SharedString) => (),
            _ => {
                return Err(Error::BadEncode(
                    "shared string reference does not point at a string".into(),
                ))
            }
        }
        let mut cursor = &self.buf[target + 1..];
        let before = cursor.len();
        let len = varint::get_uvarint(&mut cursor)
            .ok_or_else(|| Error::BadEncode("bad varint in shared string".into()))?;
        let len = usize::try_from(len)
            .map_err(|_| Error::BadEncode("oversized shared string length".into()))?;
        if cursor.len() < len {
            return Err(Error::LengthTooShort {
                step: "get shared string content",
                actual: cursor.len(),
                expected: len,
            });
        }
        let start = target + 1 + (before - cursor.len());
        as_utf8(&self.buf[start..start + len])
    }
}

fn as_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::BadEncode("string is not valid UTF-8".into()))
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored || self.pos >= self.buf.len() {
            return None;
        }
        let tag_pos = self.pos;
        let byte = self.buf[self.pos];
        self.pos += 1;
        let marker = match Marker::from_u8(byte) {
            Some(m) => m,
            None => {
                self.errored = true;
                return Some(Err(Error::BadEncode(format!(
                    "unassigned tag byte 0x{:02x}",
                    byte
                ))));
            }
        };
        let result = self.parse_element(marker, tag_pos);
        if result.is_err() {
            self.errored = true;
        }
        Some(result)
    }
}
