//! Identifiers and role vocabularies shared by the resolver and the installer.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

use crate::{Abi, Density};

/// Application identifier in reverse-domain form (e.g. `org.example.app`).
///
/// Android package names are case-sensitive, so unlike most name newtypes
/// no normalization happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Wrap a package identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

vocabulary! {
    /// Where the application may be installed (`install-location:`).
    #[derive(Default)]
    pub enum InstallLocation {
        /// Let the system decide.
        #[default]
        Auto => "auto",
        /// Internal storage only.
        InternalOnly => "internalOnly",
        /// Prefer external storage when available.
        PreferExternal => "preferExternal",
    }
}

vocabulary! {
    /// Screen-size class from `supports-screens:`.
    pub enum ScreenSize {
        /// `small`
        Small => "small",
        /// `normal`
        Normal => "normal",
        /// `large`
        Large => "large",
        /// `xlarge`
        Xlarge => "xlarge",
    }
}

/// What a split APK contributes, derived from its own parsed metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    /// Native libraries for one ABI.
    Abi,
    /// Resources for one density bucket.
    Density,
    /// Resources for one language.
    Language,
    /// Anything else (dynamic features, asset packs).
    Other,
}

/// Role of a member inside a multi-APK bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MemberRole {
    /// The APK carrying the application code and manifest.
    Base,
    /// Configuration split for one ABI.
    Abi(Abi),
    /// Configuration split for one density bucket.
    Density(Density),
    /// Configuration split for one locale (e.g. `en`, `pt-rBR`).
    Language(String),
    /// Feature split, by split id.
    Feature(String),
    /// Could not be classified.
    Unknown,
}

impl MemberRole {
    /// Whether the member is a device-configuration split (ABI, density, language).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Abi(_) | Self::Density(_) | Self::Language(_))
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Abi(abi) => write!(f, "abi:{abi}"),
            Self::Density(density) => write!(f, "density:{density}"),
            Self::Language(locale) => write!(f, "language:{locale}"),
            Self::Feature(name) => write!(f, "feature:{name}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
