//! Display string rewriting for compiled `resources.arsc` tables.
//!
//! Resource string pools store UTF-16 records as a 16-bit character count, the
//! code units themselves, then a 16-bit null terminator:
//!
//! ```text
//! | count (u16 LE) | count * u16 LE code units | 0x0000 |
//! ```
//!
//! A record is patched in place: its region (string bytes plus terminator) keeps
//! its size, the new string is terminated early and the tail is zeroed.

use crate::android::bytes::{
    encode_utf16le, matches_at, read_u16_le, write_clamped, zero_fill, Occurrence, Rewrite,
    TextEncoding,
};
use crate::android::error::{PatchError, PatchResult};
use log::{debug, warn};

const TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Replace every UTF-16LE record holding `old_value` with `new_value`.
///
/// The record's character count is corrected when the two bytes before the match
/// hold the old count. When they hold anything else they are left alone and only
/// the string content is rewritten.
pub fn rewrite_string(resources: &[u8], old_value: &str, new_value: &str) -> PatchResult<Vec<u8>> {
    rewrite_string_with_report(resources, old_value, new_value).map(Rewrite::into_bytes)
}

/// Like [`rewrite_string`], additionally returning each rewritten occurrence.
pub fn rewrite_string_with_report(
    resources: &[u8],
    old_value: &str,
    new_value: &str,
) -> PatchResult<Rewrite> {
    let old_chars = TextEncoding::Utf16Le.unit_len(old_value);
    let new_chars = TextEncoding::Utf16Le.unit_len(new_value);
    if new_chars > old_chars {
        return Err(PatchError::InputTooLong {
            encoding: TextEncoding::Utf16Le,
            placeholder_len: old_chars,
            replacement_len: new_chars,
        });
    }

    let mut bytes = resources.to_vec();
    let pattern = encode_utf16le(old_value);
    let replacement = encode_utf16le(new_value);
    let new_count = (new_chars as u16).to_le_bytes();
    let mut occurrences = Vec::new();

    let mut cursor = 0;
    while cursor < bytes.len() {
        if !matches_at(&bytes, cursor, &pattern) {
            cursor += 1;
            continue;
        }

        match cursor.checked_sub(2).and_then(|at| read_u16_le(&bytes, at)) {
            Some(count) if count as usize == old_chars => {
                bytes[cursor - 2..cursor].copy_from_slice(&new_count);
            }
            Some(count) => warn!(
                "string at {cursor:#x} has length prefix {count}, expected {old_chars}; leaving prefix as is"
            ),
            None => warn!("string at {cursor:#x} has no room for a length prefix"),
        }

        let region_end = cursor + pattern.len() + TERMINATOR.len();
        bytes[cursor..cursor + replacement.len()].copy_from_slice(&replacement);
        write_clamped(&mut bytes, cursor + replacement.len(), &TERMINATOR);
        zero_fill(
            &mut bytes,
            cursor + replacement.len() + TERMINATOR.len(),
            region_end,
        );
        debug!("resource string at offset {cursor:#x} rewritten to {new_chars} chars");

        occurrences.push(Occurrence {
            offset: cursor,
            encoding: TextEncoding::Utf16Le,
        });
        cursor = region_end;
    }

    if occurrences.is_empty() {
        return Err(PatchError::PatternNotFound {
            placeholder: old_value.to_string(),
        });
    }
    Ok(Rewrite { bytes, occurrences })
}
