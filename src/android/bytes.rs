//! Byte-level primitives shared by the manifest and resource table rewriters.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Text encodings a placeholder can be stored in inside a compiled artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    /// 8-bit text, as used by UTF-8 string pools.
    Utf8,
    /// 16-bit little-endian code units without a byte-order mark.
    Utf16Le,
}

impl TextEncoding {
    /// Encode `text` into the raw bytes this encoding would store.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => encode_utf16le(text),
        }
    }

    /// Length of `text` in this encoding's natural unit (bytes or code units).
    pub fn unit_len(self, text: &str) -> usize {
        match self {
            TextEncoding::Utf8 => text.len(),
            TextEncoding::Utf16Le => text.encode_utf16().count(),
        }
    }

    pub(crate) fn unit_name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8 bytes",
            TextEncoding::Utf16Le => "UTF-16 code units",
        }
    }

    pub(crate) fn flag(self) -> Encodings {
        match self {
            TextEncoding::Utf8 => Encodings::UTF8,
            TextEncoding::Utf16Le => Encodings::UTF16LE,
        }
    }
}

bitflags! {
    /// Set of encodings in which a placeholder was found.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Encodings: u8 {
        const UTF8 = 0b01;
        const UTF16LE = 0b10;
    }
}

/// A placeholder match discovered during a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub offset: usize,
    pub encoding: TextEncoding,
}

/// Patched bytes together with every occurrence that was rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewrite {
    pub bytes: Vec<u8>,
    pub occurrences: Vec<Occurrence>,
}

impl Rewrite {
    /// Encodings that produced at least one occurrence.
    pub fn encodings(&self) -> Encodings {
        self.occurrences
            .iter()
            .fold(Encodings::empty(), |set, occ| set | occ.encoding.flag())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Returns whether `pattern` occurs in `buffer` starting exactly at `offset`.
///
/// Matches that would run past the end of the buffer are rejected, and an empty
/// pattern never matches.
pub fn matches_at(buffer: &[u8], offset: usize, pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let end = match offset.checked_add(pattern.len()) {
        Some(end) => end,
        None => return false,
    };
    match buffer.get(offset..end) {
        Some(window) => window == pattern,
        None => false,
    }
}

/// Encode `text` as UTF-16LE code units, no byte-order mark.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Zero `buffer[start..end]`, clamped to the buffer length.
pub(crate) fn zero_fill(buffer: &mut [u8], start: usize, end: usize) {
    let end = end.min(buffer.len());
    if start < end {
        buffer[start..end].fill(0);
    }
}

/// Copy `data` into `buffer` at `offset`, dropping whatever would fall past the end.
pub(crate) fn write_clamped(buffer: &mut [u8], offset: usize, data: &[u8]) {
    if offset >= buffer.len() {
        return;
    }
    let len = data.len().min(buffer.len() - offset);
    buffer[offset..offset + len].copy_from_slice(&data[..len]);
}

pub(crate) fn read_u16_le(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = buffer.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}
