//! Compact binary map encoding.
//!
//! Tag-length-value format: one tag byte per value (`0x01` text, `0x02`
//! blob, `0x03` map) followed by an unsigned LEB128 length (byte count for
//! text/blob, entry count for maps). Map entries are a LEB128-prefixed UTF-8
//! key followed by a value. Maps are ordered by key, so encoding a given
//! value is deterministic.

use std::collections::BTreeMap;

const TAG_TEXT: u8 = 0x01;
const TAG_BLOB: u8 = 0x02;
const TAG_MAP: u8 = 0x03;

/// Errors produced while decoding binpack data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("truncated input")]
    Truncated,

    #[error("unknown tag byte 0x{0:02x}")]
    UnknownTag(u8),

    #[error("varint too large")]
    VarintOverflow,

    #[error("invalid UTF-8 in text value")]
    InvalidUtf8,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// One binpack value: text, raw bytes, or a nested map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Blob(Vec<u8>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// An empty map value.
    pub fn empty_map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Insert an entry if this value is a map; no-op otherwise.
    pub fn put(&mut self, key: &str, value: impl Into<Self>) {
        if let Self::Map(m) = self {
            m.insert(key.to_string(), value.into());
        }
    }

    /// Look up a map entry.
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Encode this value to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_value(&mut out, self);
        out
    }

    /// Decode a single value from `bytes`, requiring the whole input to be
    /// consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let value = read_value(&mut cursor)?;
        let rest = cursor.bytes.len() - cursor.pos;
        if rest > 0 {
            return Err(CodecError::TrailingBytes(rest));
        }
        Ok(value)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Blob(b.to_vec())
    }
}

fn write_varint(out: &mut Vec<u8>, mut n: u64) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Text(s) => {
            out.push(TAG_TEXT);
            write_varint(out, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            out.push(TAG_BLOB);
            write_varint(out, b.len() as u64);
            out.extend_from_slice(b);
        }
        Value::Map(m) => {
            out.push(TAG_MAP);
            write_varint(out, m.len() as u64);
            for (k, v) in m {
                write_varint(out, k.len() as u64);
                out.extend_from_slice(k.as_bytes());
                write_value(out, v);
            }
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self.bytes.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&[u8], CodecError> {
        let end = self.pos.checked_add(len).ok_or(CodecError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn varint(&mut self) -> Result<u64, CodecError> {
        let mut n: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.byte()?;
            if shift >= 64 {
                return Err(CodecError::VarintOverflow);
            }
            n |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(n);
            }
            shift += 7;
        }
    }

    fn length(&mut self) -> Result<usize, CodecError> {
        usize::try_from(self.varint()?).map_err(|_| CodecError::VarintOverflow)
    }

    fn text(&mut self) -> Result<String, CodecError> {
        let len = self.length()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

fn read_value(cursor: &mut Cursor<'_>) -> Result<Value, CodecError> {
    match cursor.byte()? {
        TAG_TEXT => Ok(Value::Text(cursor.text()?)),
        TAG_BLOB => {
            let len = cursor.length()?;
            Ok(Value::Blob(cursor.take(len)?.to_vec()))
        }
        TAG_MAP => {
            let count = cursor.length()?;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key = cursor.text()?;
                let value = read_value(cursor)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        tag => Err(CodecError::UnknownTag(tag)),
    }
}
