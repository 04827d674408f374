//! Member role classification.
//!
//! Roles come from the manifest when it declares them, and from entry names
//! otherwise (`config.arm64_v8a.apk`, `split_config.xxhdpi.apk`, ...).

use apkit_schema::{Abi, Density, MemberRole};

use super::manifest::DeclaredSplit;

/// Map a configuration qualifier to a role: ABI, then density, then locale.
pub fn classify_token(token: &str) -> Option<MemberRole> {
    if let Some(abi) = Abi::from_split_token(token) {
        Some(MemberRole::Abi(abi))
    } else if let Some(density) = Density::from_qualifier(token) {
        Some(MemberRole::Density(density))
    } else if is_language_token(token) {
        Some(MemberRole::Language(token.to_string()))
    } else {
        None
    }
}

/// `en`, `fil`, `pt_BR`, `pt-rBR`, `zh-CN`.
fn is_language_token(token: &str) -> bool {
    let (language, region) = match token.split_once(['_', '-']) {
        Some((language, region)) => (language, Some(region)),
        None => (token, None),
    };
    let language_ok =
        (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.is_none_or(|r| {
        let r = r.strip_prefix('r').unwrap_or(r);
        r.len() == 2 && r.chars().all(|c| c.is_ascii_uppercase())
    });
    language_ok && region_ok
}

/// Qualifier carried by a configuration split's file name, if any.
pub fn config_token(entry: &str) -> Option<&str> {
    let file_name = entry.rsplit('/').next().unwrap_or(entry);
    let stem = strip_suffix_ignore_case(file_name, ".apk")?;
    stem.strip_prefix("split_config.")
        .or_else(|| stem.strip_prefix("config."))
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = s.len().checked_sub(suffix.len())?;
    (s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(suffix)).then(|| &s[..cut])
}

/// Whether an archive entry is an APK.
pub fn is_apk_entry(entry: &str) -> bool {
    !entry.ends_with('/') && strip_suffix_ignore_case(entry, ".apk").is_some()
}

/// Role implied by a declared split id.
fn declared_role(id: &str) -> MemberRole {
    if id == "base" {
        MemberRole::Base
    } else if let Some(token) = id.strip_prefix("config.") {
        classify_token(token).unwrap_or(MemberRole::Unknown)
    } else {
        MemberRole::Feature(id.to_string())
    }
}

/// Assign a role to every APK entry.
///
/// Declared roles win. Otherwise `base_entry` marks the base, and
/// configuration file names are classified by their qualifier. Of the
/// entries left over, a lone one becomes the base if none was found; the
/// rest are [`MemberRole::Unknown`].
pub fn classify<S: AsRef<str>>(
    entries: &[S],
    base_entry: Option<&str>,
    declared: &[DeclaredSplit],
) -> Vec<MemberRole> {
    let mut roles: Vec<Option<MemberRole>> = entries
        .iter()
        .map(|entry| {
            let entry = entry.as_ref();
            if let Some(split) = declared.iter().find(|d| d.file == entry) {
                Some(declared_role(&split.id))
            } else if Some(entry) == base_entry {
                Some(MemberRole::Base)
            } else if let Some(token) = config_token(entry) {
                Some(classify_token(token).unwrap_or(MemberRole::Unknown))
            } else {
                None
            }
        })
        .collect();

    let has_base = roles.iter().any(|r| r == &Some(MemberRole::Base));
    let leftovers = roles.iter().filter(|r| r.is_none()).count();
    let promote = !has_base && leftovers == 1;

    roles
        .iter_mut()
        .map(|role| {
            role.take().unwrap_or(if promote {
                MemberRole::Base
            } else {
                MemberRole::Unknown
            })
        })
        .collect()
}
