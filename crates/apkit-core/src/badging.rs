//! `aapt dump badging` output parser.
//!
//! The dump is one attribute per line: a tag, a colon, then either quoted
//! positional values (`sdkVersion:'21'`) or `key='value'` pairs
//! (`package: name='org.example' versionCode='7'`). Set-valued attributes
//! such as permissions repeat the tag once per element. Lines can come in
//! any order and most of them are optional.

use std::sync::LazyLock;

use apkit_schema::{Abi, Density, InstallLocation, PackageMetadata, PackageName, ScreenSize};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// A required attribute was missing or could not be coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed badging output: {field} {reason}")]
pub struct MalformedMetadata {
    /// Name of the offending attribute.
    pub field: &'static str,
    /// What was wrong with it.
    pub reason: String,
}

impl MalformedMetadata {
    fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: "is missing".to_string(),
        }
    }
}

/// `key='value'` or a bare `'value'`. Quotes inside values arrive escaped.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:([A-Za-z][\w.\-]*)=)?'((?:[^'\\]|\\.)*)'").expect("token pattern is valid")
});

#[derive(Debug)]
struct Token<'a> {
    key: Option<&'a str>,
    value: String,
}

fn tokenize(rest: &str) -> Vec<Token<'_>> {
    TOKEN
        .captures_iter(rest)
        .map(|caps| Token {
            key: caps.get(1).map(|m| m.as_str()),
            value: caps
                .get(2)
                .map(|m| m.as_str().replace("\\'", "'"))
                .unwrap_or_default(),
        })
        .collect()
}

fn keyed<'t>(tokens: &'t [Token<'_>], key: &str) -> Option<&'t str> {
    tokens
        .iter()
        .rev()
        .find(|t| t.key == Some(key))
        .map(|t| t.value.as_str())
}

fn positional<'t>(tokens: &'t [Token<'_>]) -> impl Iterator<Item = &'t str> {
    tokens
        .iter()
        .filter(|t| t.key.is_none())
        .map(|t| t.value.as_str())
}

fn first_positional<'t>(tokens: &'t [Token<'_>]) -> Option<&'t str> {
    positional(tokens).next()
}

/// `name='x'` on current tool versions, a bare `'x'` on older ones.
fn name_or_first<'t>(tokens: &'t [Token<'_>]) -> Option<&'t str> {
    keyed(tokens, "name").or_else(|| first_positional(tokens))
}

fn optional_number<T: std::str::FromStr>(field: &str, value: &str) -> Option<T> {
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        debug!(field, value, "dropping non-numeric value");
    }
    parsed
}

fn is_locale_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Split a line into its tag and the remainder after the first colon.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (tag, rest) = line.split_once(':').unwrap_or((line, ""));
    let tag = tag.trim();
    if tag.is_empty() || tag.contains(['\'', ' ']) {
        return None;
    }
    Some((tag, rest))
}

/// Parse one APK's badging dump into a typed record.
///
/// Conflicting duplicates of a scalar attribute resolve to the last
/// occurrence. Unparseable optional values are dropped individually.
///
/// # Errors
///
/// Returns [`MalformedMetadata`] if the package name or version code is
/// missing, or the version code is not a non-negative integer.
///
/// # Example
///
/// ```
/// let meta = apkit_core::badging::parse(
///     "package: name='org.example' versionCode='7' versionName='1.0'\nsdkVersion:'21'",
/// )
/// .unwrap();
/// assert_eq!(meta.package_name, "org.example");
/// assert_eq!(meta.version_code, 7);
/// assert_eq!(meta.min_sdk_version, Some(21));
/// ```
pub fn parse(raw: &str) -> Result<PackageMetadata, MalformedMetadata> {
    let mut meta = PackageMetadata::default();
    let mut package_name: Option<String> = None;
    let mut version_code: Option<String> = None;
    let mut application_label: Option<String> = None;

    for line in raw.lines() {
        let Some((tag, rest)) = split_line(line) else {
            continue;
        };
        let tokens = tokenize(rest);

        match tag {
            "package" => {
                if let Some(name) = keyed(&tokens, "name") {
                    package_name = Some(name.to_string());
                }
                if let Some(code) = keyed(&tokens, "versionCode") {
                    version_code = Some(code.to_string());
                }
                if let Some(name) = keyed(&tokens, "versionName") {
                    meta.version_name = non_empty(name);
                }
                if let Some(split) = keyed(&tokens, "split") {
                    meta.split_name = non_empty(split);
                }
                if let Some(sdk) = keyed(&tokens, "compileSdkVersion") {
                    meta.compile_sdk_version = optional_number("compileSdkVersion", sdk);
                }
            }
            "sdkVersion" => {
                if let Some(sdk) = first_positional(&tokens) {
                    meta.min_sdk_version = optional_number("sdkVersion", sdk);
                }
            }
            "targetSdkVersion" => {
                if let Some(sdk) = first_positional(&tokens) {
                    meta.target_sdk_version = optional_number("targetSdkVersion", sdk);
                }
            }
            "install-location" => {
                if let Some(location) = first_positional(&tokens) {
                    meta.install_location = InstallLocation::from(location);
                }
            }
            "application-label" => {
                if let Some(label) = first_positional(&tokens) {
                    meta.label = non_empty(label);
                }
            }
            "application" => {
                if let Some(label) = keyed(&tokens, "label") {
                    application_label = non_empty(label);
                }
            }
            "application-debuggable" => meta.debuggable = true,
            "uses-permission" | "uses-permission-sdk-23" => {
                if let Some(name) = name_or_first(&tokens) {
                    meta.permissions.insert(name.to_string());
                }
            }
            "uses-library" | "uses-library-not-required" => {
                if let Some(name) = name_or_first(&tokens) {
                    meta.libraries.insert(name.to_string());
                }
            }
            "uses-feature" | "uses-feature-not-required" => {
                if let Some(name) = name_or_first(&tokens) {
                    meta.features.insert(name.to_string());
                }
            }
            "launchable-activity" => {
                if let Some(name) = keyed(&tokens, "name") {
                    meta.launchable_activity = non_empty(name);
                }
            }
            "supports-screens" => {
                meta.supported_screens
                    .extend(positional(&tokens).map(ScreenSize::from));
            }
            "supports-any-density" => {
                meta.supports_any_density = first_positional(&tokens) == Some("true");
            }
            "locales" => {
                meta.locales.extend(
                    positional(&tokens)
                        .filter(|l| is_locale_token(l))
                        .map(str::to_string),
                );
            }
            "densities" => {
                for value in positional(&tokens) {
                    match optional_number::<u16>("densities", value).and_then(Density::new) {
                        Some(density) => {
                            meta.densities.insert(density);
                        }
                        None => debug!(value, "dropping unknown density bucket"),
                    }
                }
            }
            "native-code" => {
                meta.abis.extend(positional(&tokens).map(Abi::from));
            }
            _ => {
                if let Some(locale) = tag.strip_prefix("application-label-") {
                    if let Some(label) = first_positional(&tokens) {
                        meta.labels.insert(locale.to_string(), label.to_string());
                    }
                } else if let Some(dpi) = tag.strip_prefix("application-icon-") {
                    let density = optional_number::<u16>("application-icon", dpi)
                        .and_then(Density::new);
                    match (density, first_positional(&tokens)) {
                        (Some(density), Some(path)) => {
                            meta.icons.insert(density, path.to_string());
                        }
                        _ => debug!(tag, "dropping icon with unknown density"),
                    }
                }
            }
        }
    }

    let package_name = package_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| MalformedMetadata::missing("package name"))?;
    let version_code = version_code.ok_or_else(|| MalformedMetadata::missing("versionCode"))?;
    meta.version_code = version_code
        .trim()
        .parse()
        .map_err(|_| MalformedMetadata {
            field: "versionCode",
            reason: format!("'{version_code}' is not a non-negative integer"),
        })?;
    meta.package_name = PackageName::new(package_name);
    if meta.label.is_none() {
        meta.label = application_label;
    }

    Ok(meta)
}
