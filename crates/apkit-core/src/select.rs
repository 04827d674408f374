//! Choosing which bundle members a device needs.

use apkit_schema::{Abi, Density, MemberRole};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bundle::{BrokenMember, Bundle, MemberRef};

/// What a target device supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Supported ABIs, most preferred first.
    pub abis: Vec<Abi>,
    /// Screen density in dpi, if known.
    pub density: Option<u16>,
    /// Active locales, e.g. `en-US`.
    pub locales: Vec<String>,
    /// Platform version (API level), if known.
    pub sdk: Option<u32>,
}

/// A device profile plus whether to enforce compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRequest {
    /// The target device.
    pub device: DeviceProfile,
    /// Refuse packages the device cannot run.
    pub check: bool,
}

impl CompatibilityRequest {
    /// A checked request for `device`.
    pub fn new(device: DeviceProfile) -> Self {
        Self {
            device,
            check: true,
        }
    }
}

/// Members chosen for one device.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Chosen members, base first.
    pub members: Vec<MemberRef<'a>>,
    /// Non-fatal problems noticed while choosing.
    pub warnings: Vec<String>,
    /// Members dropped because they could not be inspected.
    pub skipped: Vec<BrokenMember>,
}

impl Selection<'_> {
    /// Sum of the chosen members' uncompressed sizes.
    pub fn total_size(&self) -> u64 {
        self.members.iter().map(MemberRef::size).sum()
    }

    /// Entry names of the chosen members.
    pub fn entries(&self) -> Vec<&str> {
        self.members.iter().map(MemberRef::entry).collect()
    }
}

/// Normalize `pt-rBR`, `pt_BR`, and `PT-br` to `pt-br`.
fn normalize_locale(locale: &str) -> String {
    let lowered = locale.replace('_', "-").to_ascii_lowercase();
    match lowered.split_once('-') {
        Some((language, region)) => {
            let region = if region.len() == 3 {
                region.strip_prefix('r').unwrap_or(region)
            } else {
                region
            };
            format!("{language}-{region}")
        }
        None => lowered,
    }
}

/// Exact tag match, or same primary language subtag.
pub fn locale_matches(split: &str, device: &str) -> bool {
    let split = normalize_locale(split);
    let device = normalize_locale(device);
    let primary = |tag: &str| tag.split('-').next().unwrap_or_default().to_string();
    split == device || primary(&split) == primary(&device)
}

/// Pick the density bucket closest to `dpi`: the smallest one at or above
/// it, else the largest one below.
pub fn closest_density(available: impl IntoIterator<Item = Density>, dpi: u16) -> Option<Density> {
    let mut above: Option<Density> = None;
    let mut below: Option<Density> = None;
    for density in available {
        if density.is_sentinel() {
            continue;
        }
        if density.dpi() >= dpi {
            if above.is_none_or(|a| density.dpi() < a.dpi()) {
                above = Some(density);
            }
        } else if below.is_none_or(|b| density.dpi() > b.dpi()) {
            below = Some(density);
        }
    }
    above.or(below)
}

/// Choose the members `device` needs from `bundle`.
///
/// The base is always chosen. Of the ABI splits, the one for the device's
/// most preferred ABI; of the density splits, the closest bucket; every
/// language split matching a device locale; and every feature or
/// unclassified member.
///
/// With `skip_broken` set on the bundle, chosen splits are inspected and
/// dropped if that fails.
pub fn select_members<'a>(bundle: &'a Bundle, device: &DeviceProfile) -> Selection<'a> {
    let mut members = vec![bundle.base()];
    let mut warnings = Vec::new();

    let abi_splits: Vec<(MemberRef<'a>, &Abi)> = bundle
        .splits()
        .filter_map(|m| match m.role() {
            MemberRole::Abi(abi) => Some((m, abi)),
            _ => None,
        })
        .collect();
    if !abi_splits.is_empty() {
        let chosen = device
            .abis
            .iter()
            .find_map(|wanted| abi_splits.iter().find(|(_, abi)| *abi == wanted));
        match chosen {
            Some((member, _)) => members.push(*member),
            None => warnings.push(format!(
                "no ABI split matches device ABIs [{}]; installing without native libraries",
                join(&device.abis)
            )),
        }
    }

    let density_splits: Vec<(MemberRef<'a>, Density)> = bundle
        .splits()
        .filter_map(|m| match m.role() {
            MemberRole::Density(d) => Some((m, *d)),
            _ => None,
        })
        .collect();
    if !density_splits.is_empty() {
        match device.density {
            Some(dpi) => {
                if let Some(best) = closest_density(density_splits.iter().map(|(_, d)| *d), dpi) {
                    members.extend(
                        density_splits
                            .iter()
                            .filter(|(_, d)| *d == best)
                            .map(|(m, _)| *m),
                    );
                }
            }
            None => warnings.push("device density unknown; skipping density splits".to_string()),
        }
    }

    for member in bundle.splits() {
        match member.role() {
            MemberRole::Language(locale) => {
                if device.locales.iter().any(|l| locale_matches(locale, l)) {
                    members.push(member);
                }
            }
            MemberRole::Feature(_) | MemberRole::Unknown => members.push(member),
            MemberRole::Base | MemberRole::Abi(_) | MemberRole::Density(_) => {}
        }
    }

    let mut skipped = Vec::new();
    if bundle.options().skip_broken {
        members.retain(|member| {
            if member.is_base() {
                return true;
            }
            match member.metadata() {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "skipping broken member");
                    skipped.push(BrokenMember {
                        entry: member.entry().to_string(),
                        reason: e.to_string(),
                    });
                    false
                }
            }
        });
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    debug!(members = ?members.iter().map(MemberRef::entry).collect::<Vec<_>>(), "selected");

    Selection {
        members,
        warnings,
        skipped,
    }
}

fn join(abis: &[Abi]) -> String {
    abis.iter()
        .map(Abi::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
