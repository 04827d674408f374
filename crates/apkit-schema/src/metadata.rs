//! The typed record produced from one APK's badging dump.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Abi, Density, InstallLocation, PackageName, ScreenSize, SplitKind};

/// Everything `aapt dump badging` tells us about a single APK.
///
/// Built once per file and never mutated afterwards; re-run the inspection
/// to refresh it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Application identifier, e.g. `org.telegram.messenger`.
    pub package_name: PackageName,
    /// Monotonic integer version (`versionCode`).
    pub version_code: u64,
    /// Free-form display version (`versionName`).
    pub version_name: Option<String>,
    /// `minSdkVersion`
    pub min_sdk_version: Option<u32>,
    /// `targetSdkVersion`
    pub target_sdk_version: Option<u32>,
    /// `compileSdkVersion`
    pub compile_sdk_version: Option<u32>,
    /// Install-location preference; `auto` when undeclared.
    pub install_location: InstallLocation,
    /// Default application label.
    pub label: Option<String>,
    /// Localized labels, locale to text.
    pub labels: BTreeMap<String, String>,
    /// Requested permissions.
    pub permissions: BTreeSet<String>,
    /// Shared libraries, required or optional.
    pub libraries: BTreeSet<String>,
    /// Declared hardware/software features, required or optional.
    pub features: BTreeSet<String>,
    /// Supported screen-size classes.
    pub supported_screens: BTreeSet<ScreenSize>,
    /// Main launcher activity.
    pub launchable_activity: Option<String>,
    /// `supports-any-density`
    pub supports_any_density: bool,
    /// Locales the resources are translated into.
    pub locales: BTreeSet<String>,
    /// Density buckets the resources cover.
    pub densities: BTreeSet<Density>,
    /// ABIs native code is shipped for.
    pub abis: BTreeSet<Abi>,
    /// Launcher icon path per density bucket.
    pub icons: BTreeMap<Density, String>,
    /// `application-debuggable`
    pub debuggable: bool,
    /// Split id when this file is a split APK.
    pub split_name: Option<String>,
}

impl PackageMetadata {
    /// A record with only the two mandatory fields filled in.
    pub fn new(package_name: impl Into<PackageName>, version_code: u64) -> Self {
        Self {
            package_name: package_name.into(),
            version_code,
            ..Self::default()
        }
    }

    /// Whether this file is a split rather than a full APK.
    pub fn is_split(&self) -> bool {
        self.split_name.is_some()
    }

    /// Classify a split by what it contributes; `None` for full APKs.
    ///
    /// The last dotted component of the split id decides: `*dpi` is a
    /// density split, a declared locale is a language split, and a single
    /// declared ABI makes it an ABI split.
    pub fn split_kind(&self) -> Option<SplitKind> {
        let split = self.split_name.as_deref()?;
        let tail = split.rsplit('.').next().unwrap_or(split);
        if tail.ends_with("dpi") {
            Some(SplitKind::Density)
        } else if self.locales.iter().any(|l| l == tail || l.starts_with(tail)) {
            Some(SplitKind::Language)
        } else if self.abis.len() == 1 {
            Some(SplitKind::Abi)
        } else {
            Some(SplitKind::Other)
        }
    }

    /// Best label to show a human: the default one, else any localized one.
    pub fn display_label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .or_else(|| self.labels.values().next().map(String::as_str))
    }

    /// Plain mapping representation for structured output.
    ///
    /// Enum-valued fields appear in the tool's own spelling (`arm64-v8a`,
    /// `preferExternal`), densities as integers. `is_split` and `split_kind`
    /// are added as derived keys.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert("is_split".to_string(), Value::Bool(self.is_split()));
        map.insert(
            "split_kind".to_string(),
            self.split_kind()
                .and_then(|kind| serde_json::to_value(kind).ok())
                .unwrap_or(Value::Null),
        );
        map
    }

    /// Like [`to_map`](Self::to_map), restricted to the named keys.
    ///
    /// Unknown names are ignored.
    pub fn to_map_only<S: AsRef<str>>(&self, only: &[S]) -> Map<String, Value> {
        let mut map = self.to_map();
        map.retain(|key, _| only.iter().any(|o| o.as_ref() == key));
        map
    }
}
