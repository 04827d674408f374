//! Info command

use std::path::Path;

use anyhow::Result;
use apkit_core::bundle::{Aggregate, Bundle};
use apkit_core::PackageMetadata;
use serde_json::{Map, Value, json};

use crate::context::{Context, Package};
use crate::ui::{self, theme::format_size};

/// Options for `apkit info`.
#[derive(Debug, Clone, Default)]
pub struct InfoOptions {
    pub json: bool,
    pub no_recursion: bool,
    pub only: Vec<String>,
    pub skip_broken: bool,
}

/// Show metadata for an APK or bundle
pub fn info(ctx: &Context, file: &Path, opts: &InfoOptions) -> Result<()> {
    match ctx.open_package(file, opts.skip_broken)? {
        Package::Apk(apk) => {
            if opts.json {
                return ui::print_json(&Value::Object(metadata_map(apk.metadata(), &opts.only)));
            }
            print_metadata(apk.metadata(), apk.size().ok());
            Ok(())
        }
        Package::Bundle(bundle) => {
            if opts.no_recursion {
                return bundle_summary(&bundle, opts.json);
            }
            let aggregate = bundle.aggregate()?;
            if opts.json {
                return ui::print_json(&bundle_json(&bundle, &aggregate, &opts.only));
            }
            print_metadata(&aggregate.metadata, Some(bundle_size(&bundle)));
            print_members(&bundle);
            for broken in &aggregate.skipped {
                ui::skipped(&format!("skipped {}: {}", broken.entry, broken.reason));
            }
            bundle.close()?;
            Ok(())
        }
    }
}

fn metadata_map(meta: &PackageMetadata, only: &[String]) -> Map<String, Value> {
    if only.is_empty() {
        meta.to_map()
    } else {
        meta.to_map_only(only)
    }
}

fn bundle_size(bundle: &Bundle) -> u64 {
    bundle.members().map(|m| m.size()).sum()
}

fn bundle_json(bundle: &Bundle, aggregate: &Aggregate, only: &[String]) -> Value {
    let members: Vec<_> = bundle.members().map(|m| m.member().clone()).collect();
    json!({
        "format": bundle.format(),
        "manifest": bundle.manifest(),
        "members": members,
        "metadata": metadata_map(&aggregate.metadata, only),
        "skipped": aggregate.skipped,
    })
}

/// Manifest and member table only; nothing is inspected.
fn bundle_summary(bundle: &Bundle, json: bool) -> Result<()> {
    let manifest = bundle.manifest();
    if json {
        let members: Vec<_> = bundle.members().map(|m| m.member().clone()).collect();
        return ui::print_json(&json!({
            "format": bundle.format(),
            "manifest": manifest,
            "members": members,
        }));
    }

    let version = manifest.version_name.as_deref().unwrap_or("");
    ui::heading(manifest.package_name.as_str(), version);
    ui::field("format", bundle.format());
    ui::field_opt("label", manifest.app_name.as_deref());
    ui::field("version code", manifest.version_code);
    ui::field_opt("min sdk", manifest.min_sdk_version);
    ui::field_opt("target sdk", manifest.target_sdk_version);
    ui::field_list("permissions", &manifest.permissions);
    ui::field("size", format_size(bundle_size(bundle)));
    print_members(bundle);
    Ok(())
}

fn print_metadata(meta: &PackageMetadata, size: Option<u64>) {
    ui::heading(
        meta.package_name.as_str(),
        meta.version_name.as_deref().unwrap_or(""),
    );
    ui::field_opt("label", meta.display_label());
    ui::field("version code", meta.version_code);
    ui::field_opt("min sdk", meta.min_sdk_version);
    ui::field_opt("target sdk", meta.target_sdk_version);
    ui::field_opt("compile sdk", meta.compile_sdk_version);
    ui::field("install", &meta.install_location);
    ui::field_opt("split", meta.split_name.as_deref());
    ui::field_opt("activity", meta.launchable_activity.as_deref());
    ui::field_list("abis", &meta.abis);
    ui::field_list("densities", &meta.densities);
    ui::field_list("locales", &meta.locales);
    ui::field_list("screens", &meta.supported_screens);
    ui::field_list("permissions", &meta.permissions);
    ui::field_list("features", &meta.features);
    ui::field_list("libraries", &meta.libraries);
    if meta.debuggable {
        ui::field("debuggable", "yes");
    }
    ui::field_opt("size", size.map(format_size));
}

fn print_members(bundle: &Bundle) {
    println!();
    for member in bundle.members() {
        ui::field(
            &member.role().to_string(),
            format!("{} ({})", member.entry(), format_size(member.size())),
        );
    }
}
