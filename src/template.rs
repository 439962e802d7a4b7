//! Stamping a prebuilt WebView template APK with a caller's identity.
//!
//! A template APK ships with a placeholder package name in its manifest and a
//! placeholder display name in its resource table. Stamping rewrites both in place
//! and drops an `assets/config.json` next to them for the shell to read at start-up.
//!
//! # Examples
//!
//! ```no_run
//! use apkstamp::android::zip::ApkFile;
//! use apkstamp::template::{stamp_apk, TemplateConfig};
//!
//! let config = TemplateConfig::from_file("stamp.json").unwrap();
//! let mut apk = ApkFile::from_file("template.apk").unwrap();
//! let report = stamp_apk(&mut apk, &config).unwrap();
//! println!("{} manifest occurrences patched", report.manifest.len());
//! apk.write_to_file("out/app-unsigned.apk").unwrap();
//! ```

use crate::android::bytes::Occurrence;
use crate::android::error::PatchError;
use crate::android::manifest::rewrite_identifier_with_report;
use crate::android::resources::rewrite_string_with_report;
use crate::android::zip::{ApkFile, ApkZipError, MANIFEST_ENTRY, RESOURCES_ENTRY};
use log::info;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::{all_consuming, recognize};
use nom::multi::separated_list1;
use nom::sequence::pair;
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Package name baked into the template manifest.
pub const PACKAGE_PLACEHOLDER: &str = "com.appy.generated.webapp.placeholder.app";
/// Display name baked into the template resource table.
pub const APP_NAME_PLACEHOLDER: &str = "Appy Generated Placeholder App Name";
/// Longest package name any template reserves space for.
pub const MAX_PACKAGE_NAME_LEN: usize = 50;
/// Asset the shell reads its start-up settings from.
pub const SHELL_CONFIG_ENTRY: &str = "assets/config.json";

/// Result alias for stamping operations.
pub type StampResult<T> = Result<T, StampError>;

/// Errors surfaced while stamping a template.
#[derive(Debug)]
pub enum StampError {
    /// A byte-level rewrite failed.
    Patch { entry: &'static str, source: PatchError },
    /// The APK container could not be read or written.
    Apk(ApkZipError),
    /// The stamp configuration was not valid JSON.
    Json(serde_json::Error),
    Io(io::Error),
    /// The template is missing an entry stamping needs.
    MissingEntry(&'static str),
    /// The stamp configuration is well-formed but unusable.
    InvalidConfig(String),
}

impl fmt::Display for StampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StampError::Patch { entry, source } => write!(f, "patching {entry}: {source}"),
            StampError::Apk(err) => write!(f, "APK error: {err}"),
            StampError::Json(err) => write!(f, "JSON error: {err}"),
            StampError::Io(err) => write!(f, "I/O error: {err}"),
            StampError::MissingEntry(name) => write!(f, "template has no {name} entry"),
            StampError::InvalidConfig(msg) => write!(f, "invalid stamp configuration: {msg}"),
        }
    }
}

impl std::error::Error for StampError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StampError::Patch { source, .. } => Some(source),
            StampError::Apk(err) => Some(err),
            StampError::Json(err) => Some(err),
            StampError::Io(err) => Some(err),
            StampError::MissingEntry(_) | StampError::InvalidConfig(_) => None,
        }
    }
}

impl From<ApkZipError> for StampError {
    fn from(value: ApkZipError) -> Self {
        StampError::Apk(value)
    }
}

impl From<serde_json::Error> for StampError {
    fn from(value: serde_json::Error) -> Self {
        StampError::Json(value)
    }
}

impl From<io::Error> for StampError {
    fn from(value: io::Error) -> Self {
        StampError::Io(value)
    }
}

/// Placeholders the template was built with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplatePlaceholders {
    pub package_name: String,
    pub app_name: String,
}

impl Default for TemplatePlaceholders {
    fn default() -> Self {
        TemplatePlaceholders {
            package_name: PACKAGE_PLACEHOLDER.to_string(),
            app_name: APP_NAME_PLACEHOLDER.to_string(),
        }
    }
}

/// Settings the shell application reads from `assets/config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    pub url: String,
    #[serde(default)]
    pub status_bar_dark: bool,
}

/// Everything needed to turn the template into a branded APK.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    pub package_name: String,
    pub app_name: String,
    #[serde(flatten)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub placeholders: TemplatePlaceholders,
}

impl TemplateConfig {
    pub fn new(
        package_name: impl Into<String>,
        app_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        TemplateConfig {
            package_name: package_name.into(),
            app_name: app_name.into(),
            shell: ShellConfig {
                url: url.into(),
                status_bar_dark: false,
            },
            placeholders: TemplatePlaceholders::default(),
        }
    }

    pub fn from_json_str(json: &str) -> StampResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> StampResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Check the configuration against what the template can hold.
    ///
    /// The package name must also fit in the template's own placeholder, which may
    /// be shorter than [`MAX_PACKAGE_NAME_LEN`]. The app name's room is checked by
    /// the resource rewriter.
    pub fn validate(&self) -> StampResult<()> {
        validate_package_name(&self.package_name)?;
        let room = self.placeholders.package_name.len();
        if self.package_name.len() > room {
            return Err(StampError::InvalidConfig(format!(
                "package name '{}' does not fit the template's {room}-character placeholder",
                self.package_name
            )));
        }
        if self.app_name.is_empty() {
            return Err(StampError::InvalidConfig("app name is empty".to_string()));
        }
        if self.shell.url.trim().is_empty() {
            return Err(StampError::InvalidConfig("url is empty".to_string()));
        }
        Ok(())
    }
}

fn java_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn package_segments(input: &str) -> IResult<&str, Vec<&str>> {
    all_consuming(separated_list1(char('.'), java_identifier))(input)
}

/// Validate an Android application id: at least two dot-separated segments, each
/// starting with a letter or underscore, and no longer than the template allows.
pub fn validate_package_name(name: &str) -> StampResult<()> {
    if name.len() > MAX_PACKAGE_NAME_LEN {
        return Err(StampError::InvalidConfig(format!(
            "package name '{name}' is longer than {MAX_PACKAGE_NAME_LEN} characters"
        )));
    }
    match package_segments(name) {
        Ok((_, segments)) if segments.len() >= 2 => Ok(()),
        Ok(_) => Err(StampError::InvalidConfig(format!(
            "package name '{name}' needs at least two segments"
        ))),
        Err(_) => Err(StampError::InvalidConfig(format!(
            "package name '{name}' is not a valid application id"
        ))),
    }
}

/// What a successful stamp changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StampReport {
    pub manifest: Vec<Occurrence>,
    pub resources: Vec<Occurrence>,
    pub removed_signature_entries: Vec<String>,
}

/// Stamp `apk` in place with `config`.
///
/// All rewrites are computed before the APK is touched, so on error the APK is
/// left exactly as it was. The stale v1 signature is removed; the result must be
/// re-signed before installation.
pub fn stamp_apk(apk: &mut ApkFile, config: &TemplateConfig) -> StampResult<StampReport> {
    config.validate()?;
    let placeholders = &config.placeholders;

    let manifest = apk
        .entry(MANIFEST_ENTRY)
        .ok_or(StampError::MissingEntry(MANIFEST_ENTRY))?;
    let manifest = rewrite_identifier_with_report(
        &manifest.data,
        &placeholders.package_name,
        &config.package_name,
    )
    .map_err(|source| StampError::Patch {
        entry: MANIFEST_ENTRY,
        source,
    })?;

    let resources = apk
        .entry(RESOURCES_ENTRY)
        .ok_or(StampError::MissingEntry(RESOURCES_ENTRY))?;
    let resources =
        rewrite_string_with_report(&resources.data, &placeholders.app_name, &config.app_name)
            .map_err(|source| StampError::Patch {
                entry: RESOURCES_ENTRY,
                source,
            })?;

    let shell_config = serde_json::to_vec_pretty(&config.shell)?;

    apk.replace_entry(MANIFEST_ENTRY, manifest.bytes)?;
    apk.replace_entry(RESOURCES_ENTRY, resources.bytes)?;
    apk.replace_entry(SHELL_CONFIG_ENTRY, shell_config)?;
    let removed_signature_entries = apk.strip_signature();

    info!(
        "stamped {} as '{}': {} manifest and {} resource occurrences, {} signature entries dropped",
        config.package_name,
        config.app_name,
        manifest.occurrences.len(),
        resources.occurrences.len(),
        removed_signature_entries.len()
    );
    Ok(StampReport {
        manifest: manifest.occurrences,
        resources: resources.occurrences,
        removed_signature_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_package_names() {
        for name in ["com.example.myapp", "a.b", "org.foo_bar.Baz2", "_x.y"] {
            assert!(validate_package_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_bad_package_names() {
        for name in [
            "myapp",
            "com..example",
            "com.example.",
            ".com.example",
            "com.1example",
            "com.exa-mple",
            "com.example.myapp ",
            "",
        ] {
            assert!(
                matches!(validate_package_name(name), Err(StampError::InvalidConfig(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_package_names_over_the_cap() {
        let name = format!("com.{}", "a".repeat(MAX_PACKAGE_NAME_LEN));
        assert!(matches!(
            validate_package_name(&name),
            Err(StampError::InvalidConfig(_))
        ));
        let name = format!("com.{}", "a".repeat(MAX_PACKAGE_NAME_LEN - 4));
        assert!(validate_package_name(&name).is_ok());
    }

    #[test]
    fn parses_config_with_default_placeholders() {
        let config = TemplateConfig::from_json_str(
            r#"{
                "packageName": "com.example.myapp",
                "appName": "My App",
                "url": "https://example.org",
                "statusBarDark": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.package_name, "com.example.myapp");
        assert_eq!(config.shell.url, "https://example.org");
        assert!(config.shell.status_bar_dark);
        assert_eq!(config.placeholders, TemplatePlaceholders::default());
        config.validate().unwrap();
    }

    #[test]
    fn parses_custom_placeholders() {
        let config = TemplateConfig::from_json_str(
            r#"{
                "packageName": "com.example.myapp",
                "appName": "App",
                "url": "https://example.org",
                "placeholders": { "appName": "TestApp" }
            }"#,
        )
        .unwrap();
        assert!(!config.shell.status_bar_dark);
        assert_eq!(config.placeholders.app_name, "TestApp");
        assert_eq!(config.placeholders.package_name, PACKAGE_PLACEHOLDER);
    }

    #[test]
    fn reports_malformed_json() {
        let err = TemplateConfig::from_json_str(r#"{ "packageName": "com.a.b" }"#).unwrap_err();
        assert!(matches!(err, StampError::Json(_)));
    }

    #[test]
    fn shell_config_uses_camel_case() {
        let shell = ShellConfig {
            url: "https://example.com".to_string(),
            status_bar_dark: true,
        };
        let json: serde_json::Value = serde_json::to_value(&shell).unwrap();
        assert_eq!(json["url"], "https://example.com");
        assert_eq!(json["statusBarDark"], true);
    }

    #[test]
    fn validate_checks_room_in_placeholder() {
        // Under the global cap but longer than the default placeholder.
        let name = format!("com.{}", "a".repeat(PACKAGE_PLACEHOLDER.len() - 3));
        assert!(name.len() <= MAX_PACKAGE_NAME_LEN);
        assert!(validate_package_name(&name).is_ok());

        let config = TemplateConfig::new(name.as_str(), "App", "https://example.com");
        assert!(matches!(config.validate(), Err(StampError::InvalidConfig(_))));

        let mut config = config;
        config.placeholders.package_name = format!("com.{}", "p".repeat(46));
        config.validate().unwrap();

        let fits = format!("com.{}", "a".repeat(PACKAGE_PLACEHOLDER.len() - 4));
        TemplateConfig::new(fits, "App", "https://example.com")
            .validate()
            .unwrap();
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let config = TemplateConfig::new("com.example.app", "", "https://example.com");
        assert!(matches!(config.validate(), Err(StampError::InvalidConfig(_))));
        let config = TemplateConfig::new("com.example.app", "App", "  ");
        assert!(matches!(config.validate(), Err(StampError::InvalidConfig(_))));
    }
}
