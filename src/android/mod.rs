//! Android artifact handling: byte-level rewriters for compiled manifests and
//! resource tables, and an in-memory APK container.

pub mod bytes;
pub mod error;
pub mod manifest;
pub mod resources;
pub mod zip;
