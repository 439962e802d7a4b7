//! # apkstamp
//!
//! A library for stamping prebuilt Android template APKs: the placeholder package
//! name in the compiled `AndroidManifest.xml` and the placeholder display name in
//! `resources.arsc` are overwritten in place, without recompiling or reparsing
//! either file.
//!
//! The byte-level rewriters in [`android`] never grow a buffer and never modify
//! the caller's bytes; they return a patched copy of identical length or a
//! [`PatchError`].
//!
//! ```
//! use apkstamp::{rewrite_string, PatchError};
//!
//! let mut table = vec![0x07, 0x00];
//! table.extend("TestApp".encode_utf16().flat_map(u16::to_le_bytes));
//! table.extend([0x00, 0x00]);
//!
//! let patched = rewrite_string(&table, "TestApp", "App").unwrap();
//! assert_eq!(&patched[..2], &[0x03, 0x00]);
//! assert_eq!(patched.len(), table.len());
//!
//! assert!(matches!(
//!     rewrite_string(&table, "TestApp", "LongerName"),
//!     Err(PatchError::InputTooLong { .. })
//! ));
//! ```

pub mod android;
pub mod template;

pub use crate::android::bytes::{matches_at, Encodings, Occurrence, Rewrite, TextEncoding};
pub use crate::android::error::{PatchError, PatchResult};
pub use crate::android::manifest::rewrite_identifier;
pub use crate::android::resources::rewrite_string;
pub use crate::template::{stamp_apk, StampError, StampReport, TemplateConfig};
