//! Embedded bundle manifests (XAPK, APKM, APKS).
//!
//! Each container format ships a JSON document describing the package.
//! The three dialects are read into their own shapes and normalized into
//! [`BundleManifest`].

use std::collections::BTreeSet;
use std::path::Path;

use apkit_schema::{PackageName, Sha256Digest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a manifest document was rejected.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Not JSON, or a structural key has the wrong type.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A required key is absent or empty.
    #[error("missing required key `{0}`")]
    Missing(&'static str),

    /// A required key is present but not usable.
    #[error("invalid value for `{key}`: {value}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// The value as found in the document.
        value: String,
    },
}

/// Supported multi-APK container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleFormat {
    /// APKPure-style `.xapk` with `manifest.json`.
    Xapk,
    /// APKMirror `.apkm` with `info.json`.
    Apkm,
    /// Split APKs Installer `.apks` with `meta.sai_v2.json` / `meta.sai_v1.json`.
    Apks,
}

impl BundleFormat {
    /// Every format, in probing order.
    pub const ALL: [Self; 3] = [Self::Xapk, Self::Apkm, Self::Apks];

    /// Lower-case name, also the file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xapk => "xapk",
            Self::Apkm => "apkm",
            Self::Apks => "apks",
        }
    }

    /// Manifest entry names, most preferred first.
    pub fn manifest_entries(self) -> &'static [&'static str] {
        match self {
            Self::Xapk => &["manifest.json"],
            Self::Apkm => &["info.json"],
            Self::Apks => &["meta.sai_v2.json", "meta.sai_v1.json"],
        }
    }

    /// Guess the format from a file extension (case-insensitive).
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == ext)
    }

    /// Pick the format for an archive with the given entry names.
    ///
    /// The extension wins when its manifest is present; otherwise each
    /// format is tried in [`ALL`](Self::ALL) order.
    pub fn detect<'a>(path: &Path, entries: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let entries: BTreeSet<&str> = entries.into_iter().collect();
        let has_manifest = |format: Self| {
            format
                .manifest_entries()
                .iter()
                .any(|name| entries.contains(name))
        };
        Self::from_extension(path)
            .filter(|f| has_manifest(*f))
            .or_else(|| Self::ALL.into_iter().find(|f| has_manifest(*f)))
    }
}

impl std::fmt::Display for BundleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// A split listed explicitly in the manifest (XAPK `split_apks`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredSplit {
    /// Entry name inside the archive.
    pub file: String,
    /// Split id: `base`, `config.<qualifier>`, or a feature name.
    pub id: String,
    /// Content digest, when the manifest carries one.
    pub sha256: Option<Sha256Digest>,
}

/// Bundle-level facts from the embedded manifest, format-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleManifest {
    /// Package identifier.
    pub package_name: PackageName,
    /// Version code.
    pub version_code: u64,
    /// Display version.
    pub version_name: Option<String>,
    /// Minimum platform version.
    pub min_sdk_version: Option<u32>,
    /// Target platform version.
    pub target_sdk_version: Option<u32>,
    /// Human-readable application name.
    pub app_name: Option<String>,
    /// Version of the container format itself.
    pub format_version: Option<u64>,
    /// Permissions listed by the packager.
    pub permissions: BTreeSet<String>,
    /// Declared total uncompressed size.
    pub total_size: Option<u64>,
    /// Explicitly declared members.
    pub splits: Vec<DeclaredSplit>,
}

impl BundleManifest {
    /// Entry name of the base APK this format implies, if determinable.
    pub fn base_entry(&self, format: BundleFormat) -> Option<String> {
        match format {
            BundleFormat::Xapk => Some(format!("{}.apk", self.package_name)),
            BundleFormat::Apkm | BundleFormat::Apks => Some("base.apk".to_string()),
        }
    }
}

/// Accepts `123`, `"123"`, and `" 123 "`.
fn number(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn required_number(key: &'static str, value: Option<&Value>) -> Result<u64, ManifestError> {
    match value {
        None | Some(Value::Null) => Err(ManifestError::Missing(key)),
        Some(v) => number(Some(v)).ok_or_else(|| ManifestError::Invalid {
            key,
            value: v.to_string(),
        }),
    }
}

fn required_text(key: &'static str, value: Option<String>) -> Result<PackageName, ManifestError> {
    text(value)
        .map(PackageName::new)
        .ok_or(ManifestError::Missing(key))
}

fn small_number(value: Option<&Value>) -> Option<u32> {
    number(value).and_then(|n| u32::try_from(n).ok())
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct XapkJson {
    package_name: Option<String>,
    version_code: Option<Value>,
    version_name: Option<String>,
    min_sdk_version: Option<Value>,
    target_sdk_version: Option<Value>,
    name: Option<String>,
    xapk_version: Option<Value>,
    permissions: Vec<String>,
    total_size: Option<Value>,
    split_apks: Vec<XapkSplitJson>,
}

#[derive(Deserialize)]
struct XapkSplitJson {
    file: String,
    id: String,
    #[serde(default)]
    sha256: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApkmJson {
    pname: Option<String>,
    versioncode: Option<Value>,
    release_version: Option<String>,
    min_api: Option<Value>,
    app_name: Option<String>,
    apkm_version: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SaiJson {
    package: Option<String>,
    label: Option<String>,
    version_code: Option<Value>,
    version_name: Option<String>,
    min_sdk: Option<Value>,
    target_sdk: Option<Value>,
    meta_version: Option<Value>,
}

/// Parse a manifest document written in `format`'s dialect.
///
/// The package identifier and version code are required; other missing or
/// unreadable keys become `None`.
///
/// # Errors
///
/// Returns [`ManifestError`] for malformed documents or a missing or
/// non-numeric package identifier or version code.
pub fn parse(format: BundleFormat, json: &str) -> Result<BundleManifest, ManifestError> {
    let manifest = match format {
        BundleFormat::Xapk => {
            let raw: XapkJson = serde_json::from_str(json)?;
            BundleManifest {
                package_name: required_text("package_name", raw.package_name)?,
                version_code: required_number("version_code", raw.version_code.as_ref())?,
                version_name: text(raw.version_name),
                min_sdk_version: small_number(raw.min_sdk_version.as_ref()),
                target_sdk_version: small_number(raw.target_sdk_version.as_ref()),
                app_name: text(raw.name),
                format_version: number(raw.xapk_version.as_ref()),
                permissions: raw.permissions.into_iter().collect(),
                total_size: number(raw.total_size.as_ref()),
                splits: raw
                    .split_apks
                    .into_iter()
                    .map(|s| DeclaredSplit {
                        file: s.file,
                        id: s.id,
                        sha256: s.sha256.and_then(|d| Sha256Digest::new(d).ok()),
                    })
                    .collect(),
            }
        }
        BundleFormat::Apkm => {
            let raw: ApkmJson = serde_json::from_str(json)?;
            BundleManifest {
                package_name: required_text("pname", raw.pname)?,
                version_code: required_number("versioncode", raw.versioncode.as_ref())?,
                version_name: text(raw.release_version),
                min_sdk_version: small_number(raw.min_api.as_ref()),
                app_name: text(raw.app_name),
                format_version: number(raw.apkm_version.as_ref()),
                ..BundleManifest::default()
            }
        }
        BundleFormat::Apks => {
            let raw: SaiJson = serde_json::from_str(json)?;
            BundleManifest {
                package_name: required_text("package", raw.package)?,
                version_code: required_number("version_code", raw.version_code.as_ref())?,
                version_name: text(raw.version_name),
                min_sdk_version: small_number(raw.min_sdk.as_ref()),
                target_sdk_version: small_number(raw.target_sdk.as_ref()),
                app_name: text(raw.label),
                format_version: number(raw.meta_version.as_ref()),
                ..BundleManifest::default()
            }
        }
    };
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xapk() {
        let json = r#"{
            "xapk_version": 2,
            "package_name": "com.whatsapp",
            "name": "WhatsApp",
            "version_code": "231078",
            "version_name": "2.23.10.78",
            "min_sdk_version": "16",
            "target_sdk_version": "33",
            "permissions": ["android.permission.INTERNET", "android.permission.CAMERA"],
            "total_size": 60123456,
            "split_apks": [
                {"file": "com.whatsapp.apk", "id": "base"},
                {"file": "config.arm64_v8a.apk", "id": "config.arm64_v8a"}
            ],
            "expansions": []
        }"#;
        let m = parse(BundleFormat::Xapk, json).unwrap();
        assert_eq!(m.package_name, "com.whatsapp");
        assert_eq!(m.version_code, 231_078);
        assert_eq!(m.min_sdk_version, Some(16));
        assert_eq!(m.target_sdk_version, Some(33));
        assert_eq!(m.app_name.as_deref(), Some("WhatsApp"));
        assert_eq!(m.format_version, Some(2));
        assert_eq!(m.permissions.len(), 2);
        assert_eq!(m.total_size, Some(60_123_456));
        assert_eq!(m.splits.len(), 2);
        assert_eq!(
            m.base_entry(BundleFormat::Xapk).as_deref(),
            Some("com.whatsapp.apk")
        );
    }

    #[test]
    fn test_parse_apkm() {
        let json = r#"{"pname": "org.mozilla.firefox", "versioncode": 2015961543,
            "release_version": "117.0", "min_api": "21", "app_name": "Firefox",
            "apkm_version": 5, "capabilities": ["split"]}"#;
        let m = parse(BundleFormat::Apkm, json).unwrap();
        assert_eq!(m.package_name, "org.mozilla.firefox");
        assert_eq!(m.version_code, 2_015_961_543);
        assert_eq!(m.version_name.as_deref(), Some("117.0"));
        assert_eq!(m.min_sdk_version, Some(21));
        assert_eq!(m.base_entry(BundleFormat::Apkm).as_deref(), Some("base.apk"));
    }

    #[test]
    fn test_parse_sai() {
        let json = r#"{"package": "org.example", "label": "Example", "version_code": 12,
            "version_name": "1.2", "min_sdk": 24, "target_sdk": 34, "meta_version": 2}"#;
        let m = parse(BundleFormat::Apks, json).unwrap();
        assert_eq!(m.package_name, "org.example");
        assert_eq!(m.version_code, 12);
        assert_eq!(m.app_name.as_deref(), Some("Example"));
        assert_eq!(m.min_sdk_version, Some(24));
        assert_eq!(m.format_version, Some(2));
    }

    #[test]
    fn test_requires_package_and_version_code() {
        let err = parse(BundleFormat::Apkm, "{}").unwrap_err();
        assert!(matches!(err, ManifestError::Missing("pname")));

        let err = parse(BundleFormat::Xapk, r#"{"package_name": "a.b"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Missing("version_code")));

        let err = parse(BundleFormat::Apks, r#"{"package": " ", "version_code": 1}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Missing("package")));

        assert!(matches!(
            parse(BundleFormat::Xapk, "not json").unwrap_err(),
            ManifestError::Json(_)
        ));
    }

    #[test]
    fn test_rejects_junk_version_code() {
        let err = parse(BundleFormat::Apkm, r#"{"pname": "a.b", "versioncode": "v1"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { key: "versioncode", .. }));
        assert!(err.to_string().contains("\"v1\""));
    }

    #[test]
    fn test_tolerates_junk_optional_numbers() {
        let m = parse(
            BundleFormat::Apkm,
            r#"{"pname": "a.b", "versioncode": 3, "min_api": "n/a"}"#,
        )
        .unwrap();
        assert_eq!(m.version_code, 3);
        assert_eq!(m.min_sdk_version, None);
    }

    #[test]
    fn test_detect() {
        let xapk = ["manifest.json", "a.apk"];
        let sai = ["meta.sai_v1.json", "base.apk"];
        assert_eq!(
            BundleFormat::detect(Path::new("x.XAPK"), xapk),
            Some(BundleFormat::Xapk)
        );
        // Extension without its manifest falls back to probing
        assert_eq!(
            BundleFormat::detect(Path::new("x.xapk"), sai),
            Some(BundleFormat::Apks)
        );
        assert_eq!(
            BundleFormat::detect(Path::new("download.zip"), ["info.json"]),
            Some(BundleFormat::Apkm)
        );
        assert_eq!(BundleFormat::detect(Path::new("x.apks"), ["toc.pb"]), None);
    }
}
