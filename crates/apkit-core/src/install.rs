//! Installing bundles and APKs onto a device.
//!
//! The flow is the same for both: check compatibility, decide what to push,
//! extract it, then hand everything to the [`DeviceBridge`] in one call so
//! the platform installs it atomically.

use std::path::{Path, PathBuf};

use apkit_schema::{Abi, MemberRole, PackageName};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::apk::{ApkError, ApkFile};
use crate::bridge::{DeviceBridge, InstallFlags};
use crate::bundle::{BrokenMember, Bundle, BundleError, MemberRef};
use crate::process::ToolError;
use crate::select::{self, CompatibilityRequest};

/// Errors from an install attempt.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The device's platform version is below the package's minimum.
    #[error("{package} requires SDK {min_sdk}, device runs SDK {device_sdk}")]
    IncompatibleDevice {
        /// Package being installed.
        package: PackageName,
        /// The package's `minSdkVersion`.
        min_sdk: u32,
        /// The device's API level.
        device_sdk: u32,
    },

    /// None of the package's native code runs on the device.
    #[error("{package} ships native code for [{package_abis}], device supports [{device_abis}]")]
    IncompatibleAbi {
        /// Package being installed.
        package: PackageName,
        /// ABIs the package ships.
        package_abis: String,
        /// ABIs the device runs.
        device_abis: String,
    },

    /// The bridge ran and reported failure.
    #[error("`{command}` failed: {diagnostic}")]
    InstallFailed {
        /// The install command.
        command: String,
        /// The tool's output, verbatim.
        diagnostic: String,
    },

    /// Reading the bundle failed.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Reading the APK failed.
    #[error(transparent)]
    Apk(#[from] ApkError),

    /// The bridge could not be run.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Install-time switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Flags passed to the bridge.
    pub flags: InstallFlags,
    /// Decide and report, but extract and install nothing.
    pub dry_run: bool,
}

/// Outcome of a successful (or simulated) install.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallResult {
    /// Targeted device, if one was named.
    pub serial: Option<String>,
    /// Package that was installed.
    pub package: Option<PackageName>,
    /// Archive entries (bundles) or files (APKs) that were chosen.
    pub members: Vec<String>,
    /// Files handed to the bridge; empty on a dry run.
    pub paths: Vec<PathBuf>,
    /// Total size of the chosen members.
    pub total_bytes: u64,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
    /// Members skipped because they could not be inspected.
    pub skipped: Vec<BrokenMember>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// What the bridge printed.
    pub output: String,
}

fn check_sdk(
    package: &PackageName,
    min_sdk: Option<u32>,
    request: &CompatibilityRequest,
) -> Result<(), InstallError> {
    if !request.check {
        return Ok(());
    }
    match (min_sdk, request.device.sdk) {
        (Some(min_sdk), Some(device_sdk)) if min_sdk > device_sdk => {
            Err(InstallError::IncompatibleDevice {
                package: package.clone(),
                min_sdk,
                device_sdk,
            })
        }
        _ => Ok(()),
    }
}

/// Whether some device ABI can run some package ABI. Packages without
/// native code run anywhere; an unknown device accepts everything.
fn abi_compatible(package: &[&Abi], device: &[Abi]) -> bool {
    package.is_empty()
        || device.is_empty()
        || device
            .iter()
            .any(|d| package.iter().any(|p| d.is_compatible_with(p)))
}

fn join_abis<'a>(abis: impl IntoIterator<Item = &'a Abi>) -> String {
    abis.into_iter()
        .map(Abi::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_bridge(
    bridge: &dyn DeviceBridge,
    paths: &[PathBuf],
    flags: &InstallFlags,
) -> Result<String, InstallError> {
    let refs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    let output = bridge.install(&refs, flags)?;
    if output.success {
        Ok(output.text)
    } else {
        Err(InstallError::InstallFailed {
            command: output.command,
            diagnostic: output.text,
        })
    }
}

/// Install the members of `bundle` the device needs.
///
/// With `request.check`, the bundle's minimum SDK (from the manifest, or
/// the base APK when the manifest is silent) is compared against the
/// device before anything is extracted or pushed.
///
/// # Errors
///
/// - [`InstallError::IncompatibleDevice`] if the check fails.
/// - [`InstallError::Bundle`] if members cannot be extracted or inspected.
/// - [`InstallError::Tool`] if the bridge cannot be run.
/// - [`InstallError::InstallFailed`] if the bridge reports failure.
pub fn install_bundle(
    bundle: &Bundle,
    request: &CompatibilityRequest,
    bridge: &dyn DeviceBridge,
    options: &InstallOptions,
) -> Result<InstallResult, InstallError> {
    let package = bundle.package_name().clone();
    if request.check {
        check_sdk(&package, bundle.min_sdk_version()?, request)?;
    }

    let selection = select::select_members(bundle, &request.device);
    let mut warnings = selection.warnings.clone();

    let has_abi_split = selection
        .members
        .iter()
        .any(|m| matches!(m.role(), MemberRole::Abi(_)));
    if request.check && !has_abi_split {
        if let Ok(base) = bundle.base().metadata() {
            if !abi_compatible(&base.abis.iter().collect::<Vec<_>>(), &request.device.abis) {
                warnings.push(format!(
                    "base APK ships native code for [{}] only",
                    join_abis(&base.abis)
                ));
            }
        }
    }

    let mut result = InstallResult {
        serial: bridge.serial().map(str::to_string),
        package: Some(package),
        members: selection
            .entries()
            .into_iter()
            .map(str::to_string)
            .collect(),
        total_bytes: selection.total_size(),
        skipped: selection.skipped.clone(),
        dry_run: options.dry_run,
        ..InstallResult::default()
    };

    if options.dry_run {
        result.warnings = warnings;
        return Ok(result);
    }

    let paths = selection
        .members
        .iter()
        .map(MemberRef::extract)
        .collect::<Result<Vec<_>, _>>()?;

    result.output = run_bridge(bridge, &paths, &options.flags)?;
    info!(
        package = ?result.package,
        members = paths.len(),
        bytes = result.total_bytes,
        "installed"
    );
    result.paths = paths;
    result.warnings = warnings;
    Ok(result)
}

/// Install a single APK.
///
/// With `request.check`, both the minimum SDK and native-code ABIs are
/// checked against the device first.
///
/// # Errors
///
/// - [`InstallError::IncompatibleDevice`] or [`InstallError::IncompatibleAbi`]
///   if a check fails.
/// - [`InstallError::Tool`] if the bridge cannot be run.
/// - [`InstallError::InstallFailed`] if the bridge reports failure.
pub fn install_apk(
    apk: &ApkFile,
    request: &CompatibilityRequest,
    bridge: &dyn DeviceBridge,
    options: &InstallOptions,
) -> Result<InstallResult, InstallError> {
    let meta = apk.metadata();
    check_sdk(&meta.package_name, meta.min_sdk_version, request)?;

    let mut warnings = Vec::new();
    let abis: Vec<&Abi> = meta.abis.iter().collect();
    if !abi_compatible(&abis, &request.device.abis) {
        let package_abis = join_abis(abis.iter().copied());
        let device_abis = join_abis(&request.device.abis);
        if request.check {
            return Err(InstallError::IncompatibleAbi {
                package: meta.package_name.clone(),
                package_abis,
                device_abis,
            });
        }
        warn!(%package_abis, %device_abis, "installing despite ABI mismatch");
        warnings.push(format!(
            "native code for [{package_abis}] may not run on [{device_abis}]"
        ));
    }

    let mut result = InstallResult {
        serial: bridge.serial().map(str::to_string),
        package: Some(meta.package_name.clone()),
        members: vec![apk.path().display().to_string()],
        total_bytes: apk.size()?,
        warnings,
        dry_run: options.dry_run,
        ..InstallResult::default()
    };
    if options.dry_run {
        return Ok(result);
    }

    let paths = vec![apk.path().to_path_buf()];
    result.output = run_bridge(bridge, &paths, &options.flags)?;
    info!(package = %meta.package_name, "installed");
    result.paths = paths;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::RecordingBridge;
    use crate::bundle::BundleOptions;
    use crate::bundle::tests::{FakeInspector, dump, sample_bundle};
    use crate::select::DeviceProfile;
    use std::sync::Arc;

    fn request(sdk: u32) -> CompatibilityRequest {
        CompatibilityRequest::new(DeviceProfile {
            abis: vec![Abi::Arm64V8a, Abi::ArmeabiV7a],
            density: Some(440),
            locales: vec!["en".to_string()],
            sdk: Some(sdk),
        })
    }

    #[test]
    fn test_install_bundle_pushes_selection_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let bridge = RecordingBridge::new(true);

        let options = InstallOptions {
            flags: InstallFlags {
                reinstall: true,
                installer: Some("com.android.vending".to_string()),
                ..InstallFlags::default()
            },
            dry_run: false,
        };
        let result = install_bundle(&bundle, &request(30), &bridge, &options).unwrap();

        let calls = bridge.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (paths, flags) = &calls[0];
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.starts_with(bundle.workdir())));
        assert!(flags.reinstall);
        assert_eq!(flags.installer.as_deref(), Some("com.android.vending"));
        assert_eq!(
            result.members,
            vec!["base.apk", "split_config.arm64_v8a.apk", "split_config.en.apk"]
        );
        assert_eq!(result.output, "Success");
        assert_eq!(result.package.as_deref(), Some("org.example"));
    }

    #[test]
    fn test_incompatible_device_fails_before_bridge() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let bridge = RecordingBridge::new(true);

        let err =
            install_bundle(&bundle, &request(16), &bridge, &InstallOptions::default()).unwrap_err();
        match err {
            InstallError::IncompatibleDevice {
                min_sdk,
                device_sdk,
                ..
            } => {
                assert_eq!(min_sdk, 21);
                assert_eq!(device_sdk, 16);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(bridge.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_check_installs_anyway() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let bridge = RecordingBridge::new(true);

        let mut req = request(16);
        req.check = false;
        install_bundle(&bundle, &req, &bridge, &InstallOptions::default()).unwrap();
        assert_eq!(bridge.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let bridge = RecordingBridge::new(true);

        let options = InstallOptions {
            dry_run: true,
            ..InstallOptions::default()
        };
        let result = install_bundle(&bundle, &request(30), &bridge, &options).unwrap();
        assert!(result.dry_run);
        assert!(result.paths.is_empty());
        assert_eq!(result.members.len(), 3);
        assert!(bridge.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(bundle.workdir()).unwrap().count(), 0);
    }

    #[test]
    fn test_bridge_failure_is_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let bridge = RecordingBridge::new(false);

        let err = install_bundle(&bundle, &request(30), &bridge, &InstallOptions::default())
            .unwrap_err();
        match err {
            InstallError::InstallFailed { diagnostic, .. } => assert_eq!(
                diagnostic,
                "Failure [INSTALL_FAILED_OLDER_SDK: Requires newer sdk version #21]"
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_min_sdk_falls_back_to_base_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("app.apks");
        crate::extract::tests::write_zip(
            &path,
            &[
                ("meta.sai_v2.json", br#"{"package": "org.example", "version_code": 1}"#),
                ("base.apk", b"b"),
            ],
        );
        let inspector = Arc::new(
            FakeInspector::default().with("base.apk", &dump("org.example", 1, "sdkVersion:'26'")),
        );
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let err = install_bundle(
            &bundle,
            &request(24),
            &RecordingBridge::new(true),
            &InstallOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::IncompatibleDevice { min_sdk: 26, .. }));
    }

    #[test]
    fn test_install_apk_abi_check() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x86.apk");
        std::fs::write(&path, b"apk").unwrap();
        let inspector = FakeInspector::default().with(
            "x86.apk",
            &dump("org.example", 1, "native-code: 'x86' 'x86_64'"),
        );
        let apk = ApkFile::open(&path, &inspector).unwrap();
        let bridge = RecordingBridge::new(true);

        let err = install_apk(&apk, &request(30), &bridge, &InstallOptions::default()).unwrap_err();
        assert!(matches!(err, InstallError::IncompatibleAbi { .. }));
        assert!(bridge.calls.lock().unwrap().is_empty());

        let mut req = request(30);
        req.check = false;
        let result = install_apk(&apk, &req, &bridge, &InstallOptions::default()).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(bridge.calls.lock().unwrap()[0].0, vec![path]);
    }

    #[test]
    fn test_abi_compatible() {
        assert!(abi_compatible(&[], &[Abi::X86]));
        assert!(abi_compatible(&[&Abi::ArmeabiV7a], &[Abi::Arm64V8a]));
        assert!(abi_compatible(&[&Abi::Arm64V8a], &[Abi::X86_64]));
        assert!(!abi_compatible(&[&Abi::X86], &[Abi::Arm64V8a]));
    }
}
