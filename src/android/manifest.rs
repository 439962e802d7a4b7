//! Package identifier rewriting for compiled `AndroidManifest.xml` files.
//!
//! The manifest's string pool may hold the identifier as 8-bit or 16-bit text
//! (and some templates carry both), so both encodings are always scanned.

use crate::android::bytes::{matches_at, zero_fill, Occurrence, Rewrite, TextEncoding};
use crate::android::error::{PatchError, PatchResult};
use log::debug;

const SCAN_ORDER: [TextEncoding; 2] = [TextEncoding::Utf8, TextEncoding::Utf16Le];

/// Replace every occurrence of `old_id` in a binary manifest with `new_id`.
///
/// Each match is overwritten in place and the remainder of the matched region is
/// zero-padded, so the returned buffer always has the same length as `manifest`.
///
/// # Examples
///
/// ```
/// use apkstamp::android::manifest::rewrite_identifier;
///
/// let manifest = b"..com.placeholder.app..".to_vec();
/// let patched = rewrite_identifier(&manifest, "com.placeholder.app", "com.acme.x").unwrap();
/// assert_eq!(&patched[2..12], b"com.acme.x");
/// assert_eq!(patched.len(), manifest.len());
/// ```
pub fn rewrite_identifier(manifest: &[u8], old_id: &str, new_id: &str) -> PatchResult<Vec<u8>> {
    rewrite_identifier_with_report(manifest, old_id, new_id).map(Rewrite::into_bytes)
}

/// Like [`rewrite_identifier`], additionally returning each rewritten occurrence.
pub fn rewrite_identifier_with_report(
    manifest: &[u8],
    old_id: &str,
    new_id: &str,
) -> PatchResult<Rewrite> {
    for encoding in SCAN_ORDER {
        let placeholder_len = encoding.unit_len(old_id);
        let replacement_len = encoding.unit_len(new_id);
        if replacement_len > placeholder_len {
            return Err(PatchError::InputTooLong {
                encoding,
                placeholder_len,
                replacement_len,
            });
        }
    }

    let mut bytes = manifest.to_vec();
    let mut occurrences = Vec::new();
    for encoding in SCAN_ORDER {
        let pattern = encoding.encode(old_id);
        let replacement = encoding.encode(new_id);
        replace_all(&mut bytes, &pattern, &replacement, encoding, &mut occurrences);
    }

    if occurrences.is_empty() {
        return Err(PatchError::PatternNotFound {
            placeholder: old_id.to_string(),
        });
    }
    Ok(Rewrite { bytes, occurrences })
}

fn replace_all(
    bytes: &mut [u8],
    pattern: &[u8],
    replacement: &[u8],
    encoding: TextEncoding,
    occurrences: &mut Vec<Occurrence>,
) {
    let mut cursor = 0;
    while cursor < bytes.len() {
        if !matches_at(bytes, cursor, pattern) {
            cursor += 1;
            continue;
        }
        debug!("identifier ({encoding:?}) at offset {cursor:#x}");
        bytes[cursor..cursor + replacement.len()].copy_from_slice(replacement);
        zero_fill(bytes, cursor + replacement.len(), cursor + pattern.len());
        occurrences.push(Occurrence {
            offset: cursor,
            encoding,
        });
        cursor += pattern.len();
    }
}
