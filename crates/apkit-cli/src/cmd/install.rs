//! Install command

use std::path::Path;

use anyhow::{Context as _, Result, bail};
use apkit_core::{
    CompatibilityRequest, DeviceBridge as _, InstallFlags, InstallOptions, InstallResult,
};
use tracing::debug;

use crate::context::{Context, Package};
use crate::ui::{self, theme::format_size};

/// Options for `apkit install`.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub serial: Option<String>,
    pub no_check: bool,
    pub reinstall: bool,
    pub downgrade: bool,
    pub installer: Option<String>,
    pub originating_uri: Option<String>,
    pub skip_broken: bool,
    pub json: bool,
}

impl InstallArgs {
    fn options(&self, dry_run: bool) -> InstallOptions {
        InstallOptions {
            flags: InstallFlags {
                reinstall: self.reinstall,
                downgrade: self.downgrade,
                installer: self.installer.clone(),
                originating_uri: self.originating_uri.clone(),
            },
            dry_run,
        }
    }
}

/// Install an APK or the splits of a bundle the device needs.
///
/// Without a serial, every attached device in the `device` state is a
/// target, and each gets the selection that fits it.
pub fn install(ctx: &Context, file: &Path, args: &InstallArgs) -> Result<()> {
    let package = ctx.open_package(file, args.skip_broken)?;
    let targets = ctx
        .bridge(args.serial.clone())?
        .targets()
        .context("Failed to list devices")?;
    if targets.is_empty() {
        bail!("no devices attached");
    }

    let options = args.options(ctx.dry_run);
    let mut results = Vec::with_capacity(targets.len());
    for bridge in &targets {
        let device = bridge
            .device_profile()
            .context("Failed to query the device")?;
        debug!(serial = ?bridge.serial(), ?device, "target device");

        let mut request = CompatibilityRequest::new(device);
        request.check = !args.no_check && ctx.config.install.check;

        let result = match &package {
            Package::Apk(apk) => apkit_core::install_apk(apk, &request, bridge, &options)?,
            Package::Bundle(bundle) => {
                apkit_core::install_bundle(bundle, &request, bridge, &options)?
            }
        };
        if !args.json {
            report(&result);
        }
        results.push(result);
    }

    if args.json {
        ui::print_json(&serde_json::to_value(&results)?)?;
    }

    if let Package::Bundle(bundle) = package {
        bundle.close()?;
    }
    Ok(())
}

fn report(result: &InstallResult) {
    for warning in &result.warnings {
        ui::warning(warning);
    }
    for broken in &result.skipped {
        ui::skipped(&format!("skipped {}: {}", broken.entry, broken.reason));
    }

    let name = result
        .package
        .as_ref()
        .map_or_else(|| "package".to_string(), ToString::to_string);
    let target = result.serial.as_deref().unwrap_or("device");
    let size = format_size(result.total_bytes);

    if result.dry_run {
        println!("Would install {name} on {target} ({size}):");
        for member in &result.members {
            println!("  {member}");
        }
        return;
    }
    ui::success(&format!(
        "Installed {name} on {target}: {} file(s), {size}",
        result.members.len()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_carry_installer_flags() {
        let args = InstallArgs {
            reinstall: true,
            installer: Some("com.android.vending".to_string()),
            originating_uri: Some("https://example.org/app".to_string()),
            ..InstallArgs::default()
        };
        let options = args.options(true);
        assert!(options.dry_run);
        assert!(options.flags.reinstall && !options.flags.downgrade);
        assert_eq!(
            options.flags.args(),
            vec![
                "-r",
                "-i",
                "com.android.vending",
                "--originating-uri",
                "https://example.org/app"
            ]
        );
    }
}
