//! Canonical CBOR byte encoding of [`DsonValue`]
//!
//! Definite lengths only, shortest-form heads, map keys in ascending order.
//! Typed scalars travel as byte strings whose first byte is a type tag.

use super::value::DsonValue;
use crate::error::DsonError;
use crate::primitives::{Euid, Hash256, RadixAddress, Rri, UInt256};
use std::collections::BTreeMap;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;

const TAG_BYTES: u8 = 0x01;
const TAG_EUID: u8 = 0x02;
const TAG_HASH: u8 = 0x03;
const TAG_ADDRESS: u8 = 0x04;
const TAG_U256: u8 = 0x05;
const TAG_RRI: u8 = 0x06;

/// Canonical CBOR writer
pub struct CborEncoder {
    buffer: Vec<u8>,
}

impl CborEncoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn write_head(&mut self, major: u8, value: u64) {
        let major = major << 5;
        if value < 24 {
            self.buffer.push(major | value as u8);
        } else if value <= u8::MAX as u64 {
            self.buffer.push(major | 24);
            self.buffer.push(value as u8);
        } else if value <= u16::MAX as u64 {
            self.buffer.push(major | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.buffer.push(major | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(major | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn write_tagged(&mut self, tag: u8, payload: &[u8]) {
        self.write_head(MAJOR_BYTES, payload.len() as u64 + 1);
        self.buffer.push(tag);
        self.buffer.extend_from_slice(payload);
    }

    fn write_text(&mut self, s: &str) {
        self.write_head(MAJOR_TEXT, s.len() as u64);
        self.buffer.extend_from_slice(s.as_bytes());
    }

    pub fn write(&mut self, value: &DsonValue) {
        match value {
            DsonValue::Null => self.buffer.push(MAJOR_SIMPLE << 5 | SIMPLE_NULL),
            DsonValue::Bool(false) => self.buffer.push(MAJOR_SIMPLE << 5 | SIMPLE_FALSE),
            DsonValue::Bool(true) => self.buffer.push(MAJOR_SIMPLE << 5 | SIMPLE_TRUE),
            DsonValue::Int(i) if *i >= 0 => self.write_head(MAJOR_UNSIGNED, *i as u64),
            // -1 - n encoding; !i == -1 - i for two's complement
            DsonValue::Int(i) => self.write_head(MAJOR_NEGATIVE, !*i as u64),
            DsonValue::Text(s) => self.write_text(s),
            DsonValue::Bytes(b) => self.write_tagged(TAG_BYTES, b),
            DsonValue::Euid(e) => self.write_tagged(TAG_EUID, e.as_bytes()),
            DsonValue::Hash(h) => self.write_tagged(TAG_HASH, h.as_bytes()),
            DsonValue::Address(a) => self.write_tagged(TAG_ADDRESS, &a.to_bytes()),
            DsonValue::U256(v) => self.write_tagged(TAG_U256, &v.to_be_bytes()),
            DsonValue::Rri(r) => self.write_tagged(TAG_RRI, r.to_string().as_bytes()),
            DsonValue::Array(items) => {
                self.write_head(MAJOR_ARRAY, items.len() as u64);
                for item in items {
                    self.write(item);
                }
            }
            DsonValue::Map(map) => {
                self.write_head(MAJOR_MAP, map.len() as u64);
                for (key, item) in map {
                    self.write_text(key);
                    self.write(item);
                }
            }
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for CborEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn encode_value(value: &DsonValue) -> Vec<u8> {
    let mut encoder = CborEncoder::new();
    encoder.write(value);
    encoder.finalize()
}

/// Strict decoder: rejects indefinite lengths, non-shortest heads, unsorted
/// or duplicate map keys, unknown tags and trailing bytes.
pub struct CborDecoder<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> CborDecoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DsonError> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|&end| end <= self.input.len())
            .ok_or(DsonError::Truncated(self.offset))?;
        let slice = &self.input[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_head(&mut self) -> Result<(u8, u8, u64), DsonError> {
        let start = self.offset;
        let initial = self.take(1)?[0];
        let major = initial >> 5;
        let info = initial & 0x1f;
        let value = match info {
            0..=23 => info as u64,
            24 => self.take(1)?[0] as u64,
            25 => {
                let b = self.take(2)?;
                u16::from_be_bytes([b[0], b[1]]) as u64
            }
            26 => {
                let b = self.take(4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64
            }
            27 => {
                let b = self.take(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(b);
                u64::from_be_bytes(buf)
            }
            _ => return Err(DsonError::UnsupportedCbor { major, info }),
        };
        let minimal = match info {
            24 => value >= 24,
            25 => value > u8::MAX as u64,
            26 => value > u16::MAX as u64,
            27 => value > u32::MAX as u64,
            _ => true,
        };
        if !minimal && major != MAJOR_SIMPLE {
            return Err(DsonError::NonCanonical(start));
        }
        Ok((major, info, value))
    }

    fn read_len(&self, value: u64) -> Result<usize, DsonError> {
        usize::try_from(value)
            .ok()
            .filter(|&len| len <= self.input.len() - self.offset)
            .ok_or(DsonError::Truncated(self.offset))
    }

    fn read_text(&mut self, len: u64) -> Result<String, DsonError> {
        let len = self.read_len(len)?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DsonError::InvalidUtf8)
    }

    pub fn read(&mut self) -> Result<DsonValue, DsonError> {
        let (major, info, value) = self.read_head()?;
        match major {
            MAJOR_UNSIGNED => i64::try_from(value)
                .map(DsonValue::Int)
                .map_err(|_| DsonError::UnsupportedCbor { major, info }),
            MAJOR_NEGATIVE => i64::try_from(value)
                .map(|n| DsonValue::Int(!n))
                .map_err(|_| DsonError::UnsupportedCbor { major, info }),
            MAJOR_BYTES => {
                let len = self.read_len(value)?;
                let bytes = self.take(len)?;
                decode_tagged(bytes)
            }
            MAJOR_TEXT => self.read_text(value).map(DsonValue::Text),
            MAJOR_ARRAY => {
                let len = self.read_len(value)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read()?);
                }
                Ok(DsonValue::Array(items))
            }
            MAJOR_MAP => {
                let len = self.read_len(value)?;
                let mut map = BTreeMap::new();
                let mut previous: Option<String> = None;
                for _ in 0..len {
                    let key_offset = self.offset;
                    let (key_major, _, key_len) = self.read_head()?;
                    if key_major != MAJOR_TEXT {
                        return Err(DsonError::NonStringKey);
                    }
                    let key = self.read_text(key_len)?;
                    if let Some(prev) = &previous {
                        if *prev == key {
                            return Err(DsonError::DuplicateKey(key));
                        }
                        if *prev > key {
                            return Err(DsonError::NonCanonical(key_offset));
                        }
                    }
                    let item = self.read()?;
                    previous = Some(key.clone());
                    map.insert(key, item);
                }
                Ok(DsonValue::Map(map))
            }
            MAJOR_SIMPLE => match info {
                SIMPLE_FALSE => Ok(DsonValue::Bool(false)),
                SIMPLE_TRUE => Ok(DsonValue::Bool(true)),
                SIMPLE_NULL => Ok(DsonValue::Null),
                _ => Err(DsonError::UnsupportedCbor { major, info }),
            },
            _ => Err(DsonError::UnsupportedCbor { major, info }),
        }
    }

    pub fn finish(self) -> Result<(), DsonError> {
        if self.offset == self.input.len() {
            Ok(())
        } else {
            Err(DsonError::TrailingBytes(self.offset))
        }
    }
}

fn decode_tagged(bytes: &[u8]) -> Result<DsonValue, DsonError> {
    let (&tag, payload) = bytes.split_first().ok_or(DsonError::MissingTag)?;
    let value = match tag {
        TAG_BYTES => DsonValue::Bytes(payload.to_vec()),
        TAG_EUID => DsonValue::Euid(Euid::from_slice(payload)?),
        TAG_HASH => DsonValue::Hash(Hash256::from_slice(payload)?),
        TAG_ADDRESS => DsonValue::Address(RadixAddress::from_bytes(payload)?),
        TAG_U256 => DsonValue::U256(UInt256::from_be_slice(payload)?),
        TAG_RRI => {
            let text = std::str::from_utf8(payload).map_err(|_| DsonError::InvalidUtf8)?;
            DsonValue::Rri(text.parse::<Rri>()?)
        }
        other => return Err(DsonError::UnknownTag(other)),
    };
    Ok(value)
}

pub fn decode_value(bytes: &[u8]) -> Result<DsonValue, DsonError> {
    let mut decoder = CborDecoder::new(bytes);
    let value = decoder.read()?;
    decoder.finish()?;
    Ok(value)
}
