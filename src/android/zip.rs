use log::debug;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Component, Path};
use zip::read::ZipArchive;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Entry holding the compiled manifest.
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
/// Entry holding the compiled resource table.
pub const RESOURCES_ENTRY: &str = "resources.arsc";

/// Result alias for APK (ZIP) operations.
pub type ApkZipResult<T> = Result<T, ApkZipError>;

/// Errors surfaced by the APK packing/unpacking helpers.
#[derive(Debug)]
pub enum ApkZipError {
    Io(io::Error),
    Zip(zip::result::ZipError),
    InvalidInput(String),
}

impl std::fmt::Display for ApkZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApkZipError::Io(err) => write!(f, "I/O error: {err}"),
            ApkZipError::Zip(err) => write!(f, "ZIP error: {err}"),
            ApkZipError::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApkZipError {}

impl From<io::Error> for ApkZipError {
    fn from(value: io::Error) -> Self {
        ApkZipError::Io(value)
    }
}

impl From<zip::result::ZipError> for ApkZipError {
    fn from(value: zip::result::ZipError) -> Self {
        ApkZipError::Zip(value)
    }
}

/// Compression preference for an APK entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApkCompression {
    Stored,
    Deflated,
}

/// A single file entry stored in [`ApkFile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApkEntry {
    pub data: Vec<u8>,
    pub unix_mode: Option<u32>,
    pub compression: Option<ApkCompression>,
}

impl ApkEntry {
    pub fn new(data: Vec<u8>) -> Self {
        ApkEntry {
            data,
            unix_mode: None,
            compression: None,
        }
    }

    pub fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.unix_mode = mode;
        self
    }

    pub fn with_compression(mut self, compression: Option<ApkCompression>) -> Self {
        self.compression = compression;
        self
    }
}

/// An in-memory template APK.
///
/// Entries live in a `BTreeMap` so stamping never touches the filesystem and the
/// output ordering is deterministic.
#[derive(Clone, Debug, Default)]
pub struct ApkFile {
    entries: BTreeMap<String, ApkEntry>,
}

impl ApkFile {
    pub fn new() -> Self {
        ApkFile {
            entries: BTreeMap::new(),
        }
    }

    /// Load an APK from disk into memory.
    pub fn from_file(path: impl AsRef<Path>) -> ApkZipResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Load an APK from an in-memory ZIP image.
    pub fn from_bytes(bytes: &[u8]) -> ApkZipResult<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> ApkZipResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            let name = normalize_entry_name(entry.name())?;
            let compression = match entry.compression() {
                zip::CompressionMethod::Stored => Some(ApkCompression::Stored),
                zip::CompressionMethod::Deflated => Some(ApkCompression::Deflated),
                _ => None,
            };
            let apk_entry = ApkEntry::new(data)
                .with_mode(entry.unix_mode())
                .with_compression(compression);
            entries.insert(name, apk_entry);
        }
        debug!("loaded APK with {} entries", entries.len());
        Ok(ApkFile { entries })
    }

    /// Serialize the APK into a ZIP image.
    ///
    /// The result is unsigned; the caller is expected to run it through a signer.
    pub fn to_bytes(&self) -> ApkZipResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, entry) in &self.entries {
            let (compression, alignment) = plan_entry(name, entry);
            let mut options = FileOptions::default().compression_method(compression);
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }
            match alignment {
                Some(align) => {
                    writer.start_file_aligned(name.as_str(), options, align)?;
                }
                None => writer.start_file(name.as_str(), options)?,
            }
            writer.write_all(&entry.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    /// Serialize the APK to disk, creating parent directories as needed.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> ApkZipResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Iterate over entry names.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Borrow an entry by name (e.g., `resources.arsc`).
    pub fn entry(&self, name: &str) -> Option<&ApkEntry> {
        self.entries.get(name)
    }

    /// Replace the contents of an entry (or add a new entry).
    ///
    /// An existing entry keeps its mode and compression preference.
    pub fn replace_entry(&mut self, name: impl AsRef<str>, data: Vec<u8>) -> ApkZipResult<()> {
        let normalized = normalize_entry_name(name.as_ref())?;
        match self.entries.get_mut(&normalized) {
            Some(existing) => existing.data = data,
            None => {
                self.entries.insert(normalized, ApkEntry::new(data));
            }
        }
        Ok(())
    }

    /// Remove an entry by name.
    pub fn remove_entry(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Drop the JAR (v1) signature files, which no longer verify once any entry
    /// has been patched. Returns the removed entry names.
    pub fn strip_signature(&mut self) -> Vec<String> {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|name| is_signature_entry(name))
            .cloned()
            .collect();
        for name in &stale {
            self.entries.remove(name);
        }
        stale
    }
}

fn is_signature_entry(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    upper == "MANIFEST.MF"
        || [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|ext| upper.ends_with(ext))
}

/// Compression method and data alignment an entry is written with.
fn plan_entry(name: &str, entry: &ApkEntry) -> (CompressionMethod, Option<u16>) {
    let lower = name.to_ascii_lowercase();
    let mut stored = must_store(&lower);
    // resources.arsc must stay stored and aligned for Android R+ to mmap it.
    if name != RESOURCES_ENTRY {
        match entry.compression {
            Some(ApkCompression::Stored) => stored = true,
            Some(ApkCompression::Deflated) => stored = false,
            None => {}
        }
    }
    if !stored {
        return (CompressionMethod::Deflated, None);
    }
    let alignment = if lower.starts_with("lib/") && lower.ends_with(".so") {
        16 * 1024
    } else {
        4
    };
    (CompressionMethod::Stored, Some(alignment))
}

fn must_store(lower: &str) -> bool {
    lower.ends_with(".arsc")
        || lower.ends_with(".so")
        || matches!(
            lower.rsplit('.').next(),
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "mp3" | "ogg" | "wav" | "mp4" | "webm")
        )
}

fn normalize_entry_name(name: &str) -> ApkZipResult<String> {
    let mut parts = Vec::new();
    for comp in Path::new(name).components() {
        match comp {
            Component::Normal(part) => parts.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            _ => {
                return Err(ApkZipError::InvalidInput(format!(
                    "entry name '{name}' escapes the archive root"
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(ApkZipError::InvalidInput(
            "entry name must not be empty".to_string(),
        ));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_apk() -> ApkFile {
        let mut apk = ApkFile::new();
        apk.replace_entry(MANIFEST_ENTRY, vec![0x03, 0x00, 0x08, 0x00, 1, 2, 3])
            .unwrap();
        apk.replace_entry(RESOURCES_ENTRY, vec![0x02, 0x00, 0x0C, 0x00, 9, 9])
            .unwrap();
        apk.replace_entry("classes.dex", b"dex\n035\0".to_vec())
            .unwrap();
        apk.replace_entry("res/layout/main.xml", vec![7; 64]).unwrap();
        apk
    }

    #[test]
    fn survives_serialization() {
        let apk = sample_apk();
        let bytes = apk.to_bytes().unwrap();
        let reloaded = ApkFile::from_bytes(&bytes).unwrap();

        let names: Vec<&str> = reloaded.entry_names().collect();
        assert_eq!(
            names,
            vec![MANIFEST_ENTRY, "classes.dex", "res/layout/main.xml", RESOURCES_ENTRY]
        );
        for name in apk.entry_names() {
            assert_eq!(
                reloaded.entry(name).unwrap().data,
                apk.entry(name).unwrap().data
            );
        }
    }

    #[test]
    fn resource_table_is_stored_and_aligned() {
        let mut apk = sample_apk();
        apk.entries
            .get_mut(RESOURCES_ENTRY)
            .unwrap()
            .compression = Some(ApkCompression::Deflated);
        let bytes = apk.to_bytes().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let entry = archive.by_name(RESOURCES_ENTRY).unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
        assert_eq!(entry.data_start() % 4, 0);
    }

    #[test]
    fn keeps_non_ascii_entry_names() {
        let mut apk = sample_apk();
        apk.replace_entry("assets/café.html", b"<p>bonjour</p>".to_vec())
            .unwrap();
        let reloaded = ApkFile::from_bytes(&apk.to_bytes().unwrap()).unwrap();

        assert!(reloaded.entry_names().any(|name| name == "assets/café.html"));
        assert_eq!(
            reloaded.entry("assets/café.html").unwrap().data,
            b"<p>bonjour</p>".to_vec()
        );
    }

    #[test]
    fn native_libraries_are_page_aligned() {
        let mut apk = sample_apk();
        apk.replace_entry("lib/arm64-v8a/libshell.so", vec![0x7F, b'E', b'L', b'F'])
            .unwrap();
        let bytes = apk.to_bytes().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let entry = archive.by_name("lib/arm64-v8a/libshell.so").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
        assert_eq!(entry.data_start() % (16 * 1024), 0);
    }

    #[test]
    fn deflates_everything_else() {
        let bytes = sample_apk().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let entry = archive.by_name("classes.dex").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn replacing_keeps_entry_settings() {
        let mut apk = ApkFile::new();
        apk.entries.insert(
            "assets/logo.bin".to_string(),
            ApkEntry::new(vec![1]).with_mode(Some(0o600)),
        );
        apk.replace_entry("./assets/logo.bin", vec![2, 3]).unwrap();
        let entry = apk.entry("assets/logo.bin").unwrap();
        assert_eq!(entry.data, vec![2, 3]);
        assert_eq!(entry.unix_mode, Some(0o600));
    }

    #[test]
    fn rejects_escaping_entry_names() {
        let mut apk = ApkFile::new();
        assert!(matches!(
            apk.replace_entry("../evil", vec![]),
            Err(ApkZipError::InvalidInput(_))
        ));
        assert!(matches!(
            apk.replace_entry("", vec![]),
            Err(ApkZipError::InvalidInput(_))
        ));
    }

    #[test]
    fn strips_only_signature_files() {
        let mut apk = sample_apk();
        for name in [
            "META-INF/MANIFEST.MF",
            "META-INF/CERT.SF",
            "META-INF/CERT.RSA",
            "META-INF/services/x.Provider",
        ] {
            apk.replace_entry(name, vec![0]).unwrap();
        }
        let mut removed = apk.strip_signature();
        removed.sort();
        assert_eq!(
            removed,
            vec!["META-INF/CERT.RSA", "META-INF/CERT.SF", "META-INF/MANIFEST.MF"]
        );
        assert!(apk.entry("META-INF/services/x.Provider").is_some());
        assert!(apk.entry(MANIFEST_ENTRY).is_some());
    }
}
