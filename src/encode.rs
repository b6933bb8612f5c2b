//! The event-driven value encoder.
//!
//! A [`ValueEncoder`] turns a stream of typed value events into the tagged
//! binary form: scalars are written in their narrowest encoding, arrays and
//! dicts are declared up front with an element count, and dict keys get a
//! 16-bit hash index that supports random key lookup later.
//!
//! Strings can be deduplicated two ways. Within one document, a repeated
//! string of reasonable length is written once and then referred to by byte
//! offset; the first occurrence's tag is promoted in place through
//! [`Writer::rewrite`]. Across documents, strings found in (or added to) an
//! externally owned table are written as 1-based table references.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::varint::{self, MAX_VARINT_LEN};
use crate::writer::Writer;
use crate::{MAX_SHARED_STRING_LEN, MIN_SHARED_STRING_LEN};

/// 16-bit hash of a dict key, as stored in the dict's hash index.
///
/// The hash is advisory (lookups verify by comparing keys), but it must stay
/// stable for the lifetime of the on-disk format.
pub fn hash_code(key: &[u8]) -> u16 {
    // FNV-1a over the UTF-8 bytes, folded to 16 bits.
    let mut h: u32 = 0x811c_9dc5;
    for &b in key {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    (h ^ (h >> 16)) as u16
}

// One open container. The bottom frame is a sentinel with expected == 0 that
// never rejects writes.
struct State {
    expected: u32,
    i: u32,
    // Dict frames only: the key hashes gathered so far, and the output
    // position of the placeholder index they will overwrite.
    hashes: Option<Vec<u16>>,
    index_pos: usize,
}

/// Encodes a stream of value events into a [`Writer`].
///
/// The extern-string table, when given, is owned by the caller and may be
/// appended to (up to `max_extern_strings` entries) but never shrunk.
pub struct ValueEncoder<'a> {
    out: &'a mut Writer,
    states: Vec<State>,
    enable_shared_strings: bool,
    shared_strings: HashMap<String, u32>,
    extern_strings: Option<&'a mut Vec<String>>,
    extern_lookup: HashMap<String, u32>,
    max_extern_strings: u32,
}

impl<'a> ValueEncoder<'a> {
    /// Create an encoder writing to `out`.
    pub fn new(
        out: &'a mut Writer,
        extern_strings: Option<&'a mut Vec<String>>,
        max_extern_strings: u32,
    ) -> Self {
        // Invert the extern table, if given:
        let mut extern_lookup = HashMap::new();
        if let Some(table) = &extern_strings {
            for (i, s) in table.iter().enumerate() {
                extern_lookup.insert(s.clone(), i as u32 + 1);
            }
        }
        ValueEncoder {
            out,
            states: vec![State {
                expected: 0,
                i: 0,
                hashes: None,
                index_pos: 0,
            }],
            enable_shared_strings: false,
            shared_strings: HashMap::new(),
            extern_strings,
            extern_lookup,
            max_extern_strings,
        }
    }

    /// Turn intra-document string sharing on or off. Off by default.
    pub fn set_shared_strings(&mut self, enable: bool) {
        self.enable_shared_strings = enable;
    }

    fn top(&mut self) -> &mut State {
        self.states
            .last_mut()
            .expect("state stack always has a bottom frame")
    }

    fn count_item(&mut self) -> Result<()> {
        let bottom = self.states.len() == 1;
        let state = self.top();
        if !bottom && state.i >= state.expected {
            return Err(Error::CountMismatch {
                expected: state.expected,
                actual: state.i + 1,
            });
        }
        state.i += 1;
        Ok(())
    }

    fn add_type_code(&mut self, code: Marker) -> Result<()> {
        self.count_item()?;
        self.out.push(code.into_u8());
        Ok(())
    }

    fn add_uvarint(&mut self, n: u64) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = varint::encode_uvarint(n, &mut buf);
        self.out.write(&buf[..len]);
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.add_type_code(Marker::Null)
    }

    pub fn write_bool(&mut self, b: bool) -> Result<()> {
        self.add_type_code(if b { Marker::True } else { Marker::False })
    }

    /// Write an integer in the narrowest of the 1/2/4/8-byte encodings that
    /// holds it in two's complement.
    pub fn write_int(&mut self, i: i64) -> Result<()> {
        let bytes = i.to_be_bytes();
        let (code, size) = if (i8::MIN as i64..=i8::MAX as i64).contains(&i) {
            (Marker::Int8, 1)
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&i) {
            (Marker::Int16, 2)
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&i) {
            (Marker::Int32, 4)
        } else {
            (Marker::Int64, 8)
        };
        self.add_type_code(code)?;
        self.out.write(&bytes[8 - size..]);
        Ok(())
    }

    pub fn write_uint(&mut self, u: u64) -> Result<()> {
        if u < i64::MAX as u64 {
            return self.write_int(u as i64);
        }
        self.add_type_code(Marker::UInt64)?;
        self.out.write(&u.to_be_bytes());
        Ok(())
    }

    /// Write a double, collapsing exactly-integral values to the integer
    /// encodings. NaN cannot be encoded.
    pub fn write_double(&mut self, n: f64) -> Result<()> {
        if n.is_nan() {
            return Err(Error::InvalidValue("can't encode NaN".into()));
        }
        if n.trunc() == n && n >= i64::MIN as f64 && n < i64::MAX as f64 {
            return self.write_int(n as i64);
        }
        self.add_type_code(Marker::Float64)?;
        self.out.write(&n.to_be_bytes());
        Ok(())
    }

    pub fn write_float(&mut self, n: f32) -> Result<()> {
        if n.is_nan() {
            return Err(Error::InvalidValue("can't encode NaN".into()));
        }
        if n.trunc() == n && n >= i32::MIN as f32 && n < i32::MAX as f32 {
            return self.write_int(i64::from(n as i32));
        }
        self.add_type_code(Marker::Float32)?;
        self.out.write(&n.to_be_bytes());
        Ok(())
    }

    /// Write a number as its original decimal digits, for callers that must
    /// preserve exact textual representation.
    pub fn write_raw_number(&mut self, digits: &[u8]) -> Result<()> {
        self.add_type_code(Marker::RawNumber)?;
        self.add_uvarint(digits.len() as u64);
        self.out.write(digits);
        Ok(())
    }

    /// Write a date as seconds since the Unix epoch.
    pub fn write_date(&mut self, epoch_seconds: i64) -> Result<()> {
        self.add_type_code(Marker::Date)?;
        self.add_uvarint(epoch_seconds as u64);
        Ok(())
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.add_type_code(Marker::Data)?;
        self.add_uvarint(data.len() as u64);
        self.out.write(data);
        Ok(())
    }

    /// Write a string, preferring an extern-table reference, then an
    /// intra-document shared reference, then the string itself.
    pub fn write_string(&mut self, s: &str, can_add_extern: bool) -> Result<()> {
        if self.extern_strings.is_some() {
            if let Some(&id) = self.extern_lookup.get(s) {
                return self.write_extern_string(id);
            }
            if can_add_extern {
                let max = self.max_extern_strings;
                let new_id = match self.extern_strings.as_deref_mut() {
                    Some(table) if (table.len() as u32) < max => {
                        table.push(s.to_string());
                        Some(table.len() as u32)
                    }
                    _ => None,
                };
                if let Some(id) = new_id {
                    self.extern_lookup.insert(s.to_string(), id);
                    return self.write_extern_string(id);
                }
            }
        }

        let len = s.len();
        if self.enable_shared_strings
            && (MIN_SHARED_STRING_LEN..=MAX_SHARED_STRING_LEN).contains(&len)
        {
            let cur_offset = self.out.len();
            if cur_offset > u32::MAX as usize {
                return Err(Error::OutputTooLarge);
            }
            if let Some(&prev) = self.shared_strings.get(s) {
                // Promote the first occurrence in place, then refer back to it:
                self.out
                    .rewrite(prev as usize, &[Marker::SharedString.into_u8()]);
                self.add_type_code(Marker::SharedStringRef)?;
                self.add_uvarint(cur_offset as u64 - u64::from(prev));
                return Ok(());
            }
            self.shared_strings.insert(s.to_string(), cur_offset as u32);
        }

        // First appearance, or unshareable, so write the string itself:
        self.add_type_code(Marker::String)?;
        self.add_uvarint(len as u64);
        self.out.write(s.as_bytes());
        Ok(())
    }

    fn write_extern_string(&mut self, extern_ref: u32) -> Result<()> {
        if extern_ref == 0 {
            return Err(Error::InvalidValue("extern string id 0 is invalid".into()));
        }
        self.add_type_code(Marker::ExternStringRef)?;
        self.add_uvarint(u64::from(extern_ref));
        Ok(())
    }

    fn push_count(&mut self, count: u32) {
        self.add_uvarint(u64::from(count));
        self.states.push(State {
            expected: count,
            i: 0,
            hashes: None,
            index_pos: 0,
        });
    }

    /// Open an array of exactly `count` values. Close it with
    /// [`end_array`](ValueEncoder::end_array) once they are written.
    pub fn begin_array(&mut self, count: u32) -> Result<()> {
        self.add_type_code(Marker::Array)?;
        self.push_count(count);
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.pop_state()
    }

    /// Open a dict of exactly `count` key-value pairs. Each pair is one
    /// `write_key` (or `write_extern_key`) followed by one value write.
    pub fn begin_dict(&mut self, count: u32) -> Result<()> {
        self.add_type_code(Marker::Dict)?;
        self.push_count(count);
        // Write an empty hash list as a placeholder to fill in later:
        let index_pos = self.out.len();
        self.out.write(&vec![0u8; count as usize * 2]);
        let state = self.top();
        state.hashes = Some(vec![0u16; count as usize]);
        state.index_pos = index_pos;
        Ok(())
    }

    pub fn write_key(&mut self, key: &str, can_add_extern: bool) -> Result<()> {
        self.set_key_hash(hash_code(key.as_bytes()))?;
        self.write_string(key, can_add_extern)?;
        self.top().i -= 1; // the key doesn't count as a dict item
        Ok(())
    }

    /// Write a key already known to be in the extern table, with its
    /// precomputed [`hash_code`].
    pub fn write_extern_key(&mut self, extern_ref: u32, hash: u16) -> Result<()> {
        self.set_key_hash(hash)?;
        self.write_extern_string(extern_ref)?;
        self.top().i -= 1; // the key doesn't count as a dict item
        Ok(())
    }

    fn set_key_hash(&mut self, hash: u16) -> Result<()> {
        let state = self.top();
        let expected = state.expected;
        let actual = state.i + 1;
        match state.hashes.as_mut() {
            None => Err(Error::InvalidValue("key written outside of a dict".into())),
            Some(hashes) => {
                let i = (actual - 1) as usize;
                if i >= hashes.len() {
                    return Err(Error::CountMismatch { expected, actual });
                }
                hashes[i] = hash;
                Ok(())
            }
        }
    }

    /// Fill in the hash index and close the dict.
    pub fn end_dict(&mut self) -> Result<()> {
        {
            let state = self.top();
            if state.hashes.is_none() {
                return Err(Error::InvalidValue("end_dict outside of a dict".into()));
            }
            if state.i != state.expected {
                return Err(Error::CountMismatch {
                    expected: state.expected,
                    actual: state.i,
                });
            }
        }
        let state = self
            .states
            .pop()
            .expect("state stack always has a bottom frame");
        let hashes = state.hashes.unwrap_or_default();
        let mut bytes = Vec::with_capacity(hashes.len() * 2);
        for h in &hashes {
            bytes.extend_from_slice(&h.to_le_bytes());
        }
        self.out.rewrite(state.index_pos, &bytes);
        Ok(())
    }

    fn pop_state(&mut self) -> Result<()> {
        if self.states.len() <= 1 {
            return Err(Error::InvalidValue("unbalanced container end".into()));
        }
        let state = self.top();
        if state.i != state.expected {
            return Err(Error::CountMismatch {
                expected: state.expected,
                actual: state.i,
            });
        }
        self.states.pop();
        Ok(())
    }
}
