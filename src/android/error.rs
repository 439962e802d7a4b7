use crate::android::bytes::TextEncoding;
use std::fmt;

/// Result alias for the byte-level rewriters.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors surfaced by the manifest and resource table rewriters.
///
/// Both variants are raised before the caller's buffer could be observed as
/// modified; the rewriters only ever touch their own copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchError {
    /// The replacement does not fit in the space occupied by the placeholder.
    InputTooLong {
        encoding: TextEncoding,
        placeholder_len: usize,
        replacement_len: usize,
    },
    /// The placeholder was not found in any of the scanned encodings.
    PatternNotFound { placeholder: String },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::InputTooLong {
                encoding,
                placeholder_len,
                replacement_len,
            } => write!(
                f,
                "replacement is {replacement_len} {} but the placeholder only has room for {placeholder_len}",
                encoding.unit_name()
            ),
            PatchError::PatternNotFound { placeholder } => {
                write!(f, "placeholder '{placeholder}' not found")
            }
        }
    }
}

impl std::error::Error for PatchError {}
