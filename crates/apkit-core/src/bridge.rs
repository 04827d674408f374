//! The device bridge boundary (`adb`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use apkit_schema::{Abi, PackageName};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ToolConfig;
use crate::process::{ToolCommand, ToolError};
use crate::select::DeviceProfile;

/// Switches passed through to the install command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallFlags {
    /// Replace an existing installation (`-r`).
    pub reinstall: bool,
    /// Allow a lower version code than the installed one (`-d`).
    pub downgrade: bool,
    /// Package name recorded as the installer (`-i`), e.g. `com.android.vending`.
    pub installer: Option<String>,
    /// URI the package was obtained from (`--originating-uri`).
    pub originating_uri: Option<String>,
}

impl InstallFlags {
    /// Command-line switches for these flags.
    pub fn args(&self) -> Vec<&str> {
        let mut args = Vec::new();
        if self.reinstall {
            args.push("-r");
        }
        if self.downgrade {
            args.push("-d");
        }
        if let Some(installer) = &self.installer {
            args.extend(["-i", installer.as_str()]);
        }
        if let Some(uri) = &self.originating_uri {
            args.extend(["--originating-uri", uri.as_str()]);
        }
        args
    }
}

/// What the bridge reported for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOutput {
    /// The command that ran.
    pub command: String,
    /// Whether the tool reported success.
    pub success: bool,
    /// The tool's own output, verbatim.
    pub text: String,
}

/// Pushes packages onto a device.
pub trait DeviceBridge: Send + Sync + std::fmt::Debug {
    /// Install all `paths` as one package, atomically.
    ///
    /// A tool that runs but reports failure is not an error here; check
    /// [`BridgeOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if the tool cannot be run or times out.
    fn install(&self, paths: &[&Path], flags: &InstallFlags) -> Result<BridgeOutput, ToolError>;

    /// Serial of the targeted device, when one was chosen explicitly.
    fn serial(&self) -> Option<&str> {
        None
    }
}

/// An attached device as listed by `adb devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Device serial.
    pub serial: String,
    /// Connection state (`device`, `unauthorized`, `offline`, ...).
    pub state: String,
}

impl DeviceInfo {
    /// Whether the device accepts commands.
    pub fn is_ready(&self) -> bool {
        self.state == "device"
    }
}

/// [`DeviceBridge`] backed by the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    binary: PathBuf,
    serial: Option<String>,
    timeout: Option<Duration>,
}

impl AdbBridge {
    /// Use the executable at `binary`, targeting the only attached device.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            serial: None,
            timeout: None,
        }
    }

    /// Locate `adb` from configuration, environment, or `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if `adb` cannot be found.
    pub fn discover(config: &ToolConfig) -> Result<Self, ToolError> {
        Ok(Self::new(config.adb_path()?).with_timeout(config.timeout()))
    }

    /// Target a specific device (`-s <serial>`).
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    /// Kill commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> ToolCommand {
        let cmd = ToolCommand::new(&self.binary).timeout(self.timeout);
        match &self.serial {
            Some(serial) => cmd.arg("-s").arg(serial),
            None => cmd,
        }
    }

    fn finish(cmd: &ToolCommand) -> Result<BridgeOutput, ToolError> {
        let output = cmd.output()?;
        let text = output.diagnostic();
        // Older adb versions exit 0 and print "Failure [REASON]"
        let success = output.status.success() && !text.contains("Failure [");
        Ok(BridgeOutput {
            command: cmd.display(),
            success,
            text,
        })
    }

    /// List attached devices.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if `adb devices` fails.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>, ToolError> {
        let out = ToolCommand::new(&self.binary)
            .timeout(self.timeout)
            .arg("devices")
            .run()?;
        Ok(parse_devices(&out))
    }

    /// One bridge per install target: this bridge when a serial is set,
    /// otherwise one for every attached device that is ready.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if `adb devices` fails.
    pub fn targets(&self) -> Result<Vec<AdbBridge>, ToolError> {
        if self.serial.is_some() {
            return Ok(vec![self.clone()]);
        }
        let serials = ready_serials(&self.devices()?);
        debug!(?serials, "install targets");
        Ok(serials
            .into_iter()
            .map(|serial| self.clone().with_serial(Some(serial)))
            .collect())
    }

    /// Read one system property from the device.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if the shell command fails.
    pub fn getprop(&self, name: &str) -> Result<Option<String>, ToolError> {
        let out = self.command().args(["shell", "getprop", name]).run()?;
        let value = out.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    /// Query the device's ABIs, density, locale, and platform version.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if the device cannot be queried.
    pub fn device_profile(&self) -> Result<DeviceProfile, ToolError> {
        let profile = profile_from_props(|name| self.getprop(name))?;
        debug!(serial = ?self.serial, ?profile, "device profile");
        Ok(profile)
    }

    /// Remove an installed package.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if `adb` cannot be run.
    pub fn uninstall(&self, package: &PackageName) -> Result<BridgeOutput, ToolError> {
        info!(%package, "uninstalling");
        Self::finish(&self.command().arg("uninstall").arg(package.as_str()))
    }
}

impl DeviceBridge for AdbBridge {
    fn install(&self, paths: &[&Path], flags: &InstallFlags) -> Result<BridgeOutput, ToolError> {
        let subcommand = if paths.len() > 1 {
            "install-multiple"
        } else {
            "install"
        };
        let cmd = self
            .command()
            .arg(subcommand)
            .args(flags.args())
            .args(paths);
        info!(command = %cmd.display(), "installing");
        Self::finish(&cmd)
    }

    fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }
}

/// Build a profile from system properties, trying the older property
/// names when the newer ones are unset.
fn profile_from_props(
    mut getprop: impl FnMut(&str) -> Result<Option<String>, ToolError>,
) -> Result<DeviceProfile, ToolError> {
    let abilist = match getprop("ro.product.cpu.abilist")? {
        Some(list) => Some(list),
        None => getprop("ro.product.cpu.abi")?,
    };
    let locale = match getprop("persist.sys.locale")? {
        Some(locale) => Some(locale),
        None => getprop("ro.product.locale")?,
    };
    Ok(DeviceProfile {
        abis: abilist.as_deref().map(parse_abilist).unwrap_or_default(),
        density: getprop("ro.sf.lcd_density")?.and_then(|d| d.trim().parse().ok()),
        locales: locale.into_iter().collect(),
        sdk: getprop("ro.build.version.sdk")?.and_then(|s| s.trim().parse().ok()),
    })
}

/// Serials of the devices that accept commands.
pub fn ready_serials(devices: &[DeviceInfo]) -> Vec<String> {
    devices
        .iter()
        .filter(|d| d.is_ready())
        .map(|d| d.serial.clone())
        .collect()
}

/// Parse `adb devices` output.
pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(DeviceInfo {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Parse a comma-separated `ro.product.cpu.abilist`.
pub fn parse_abilist(list: &str) -> Vec<Abi> {
    list.split(',')
        .map(str::trim)
        .filter(|abi| !abi.is_empty())
        .map(Abi::from)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Bridge that records calls and answers with a canned result.
    #[derive(Debug)]
    pub(crate) struct RecordingBridge {
        pub(crate) calls: Mutex<Vec<(Vec<PathBuf>, InstallFlags)>>,
        pub(crate) succeed: bool,
    }

    impl RecordingBridge {
        pub(crate) fn new(succeed: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                succeed,
            }
        }
    }

    impl DeviceBridge for RecordingBridge {
        fn install(&self, paths: &[&Path], flags: &InstallFlags) -> Result<BridgeOutput, ToolError> {
            self.calls
                .lock()
                .unwrap()
                .push((paths.iter().map(|p| p.to_path_buf()).collect(), flags.clone()));
            Ok(BridgeOutput {
                command: "adb install-multiple".to_string(),
                success: self.succeed,
                text: if self.succeed {
                    "Success".to_string()
                } else {
                    "Failure [INSTALL_FAILED_OLDER_SDK: Requires newer sdk version #21]".to_string()
                },
            })
        }
    }

    #[test]
    fn test_parse_devices() {
        let out = "* daemon not running; starting now at tcp:5037\n\
                   * daemon started successfully\n\
                   List of devices attached\n\
                   emulator-5554\tdevice\n\
                   0123456789ABCDEF\tunauthorized\n\n";
        let devices = parse_devices(out);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert!(devices[0].is_ready());
        assert!(!devices[1].is_ready());
    }

    #[test]
    fn test_parse_abilist() {
        assert_eq!(
            parse_abilist("arm64-v8a,armeabi-v7a,armeabi\n"),
            vec![Abi::Arm64V8a, Abi::ArmeabiV7a, Abi::Armeabi]
        );
        assert!(parse_abilist("").is_empty());
    }

    #[test]
    fn test_flags() {
        assert!(InstallFlags::default().args().is_empty());
        let flags = InstallFlags {
            reinstall: true,
            downgrade: true,
            installer: Some("com.android.vending".to_string()),
            originating_uri: Some("https://example.org/app".to_string()),
        };
        assert_eq!(
            flags.args(),
            vec![
                "-r",
                "-d",
                "-i",
                "com.android.vending",
                "--originating-uri",
                "https://example.org/app"
            ]
        );
    }

    #[test]
    fn test_ready_serials() {
        let devices = parse_devices(
            "List of devices attached\n\
             emulator-5554\tdevice\n\
             R58M123\toffline\n\
             192.168.1.20:5555\tdevice\n",
        );
        assert_eq!(ready_serials(&devices), vec!["emulator-5554", "192.168.1.20:5555"]);
    }

    #[test]
    fn test_targets_keep_explicit_serial() {
        // No process is spawned when a serial is set.
        let bridge = AdbBridge::new("/nonexistent/adb").with_serial(Some("emulator-5554".to_string()));
        let targets = bridge.targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].serial(), Some("emulator-5554"));
    }

    fn props(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Result<Option<String>, ToolError> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| Ok(map.get(name).cloned())
    }

    #[test]
    fn test_profile_from_current_props() {
        let profile = profile_from_props(props(&[
            ("ro.product.cpu.abilist", "arm64-v8a,armeabi-v7a"),
            ("ro.product.cpu.abi", "x86"),
            ("persist.sys.locale", "de-DE"),
            ("ro.product.locale", "en-US"),
            ("ro.sf.lcd_density", "440"),
            ("ro.build.version.sdk", "33"),
        ]))
        .unwrap();
        assert_eq!(profile.abis, vec![Abi::Arm64V8a, Abi::ArmeabiV7a]);
        assert_eq!(profile.locales, vec!["de-DE"]);
        assert_eq!(profile.density, Some(440));
        assert_eq!(profile.sdk, Some(33));
    }

    #[test]
    fn test_profile_falls_back_to_older_props() {
        let profile = profile_from_props(props(&[
            ("ro.product.cpu.abi", "armeabi-v7a"),
            ("ro.product.locale", "en-US"),
            ("ro.sf.lcd_density", "junk"),
        ]))
        .unwrap();
        assert_eq!(profile.abis, vec![Abi::ArmeabiV7a]);
        assert_eq!(profile.locales, vec!["en-US"]);
        assert_eq!(profile.density, None);
        assert_eq!(profile.sdk, None);
    }

    #[test]
    fn test_profile_propagates_query_errors() {
        let err = profile_from_props(|_| {
            Err(ToolError::NotFound {
                tool: "adb".to_string(),
                env: "APKIT_ADB",
            })
        })
        .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_install_command_line() {
        let bridge = AdbBridge::new("echo").with_serial(Some("emulator-5554".to_string()));
        let out = bridge
            .install(
                &[Path::new("/tmp/base.apk"), Path::new("/tmp/split.apk")],
                &InstallFlags {
                    reinstall: true,
                    installer: Some("com.android.vending".to_string()),
                    ..InstallFlags::default()
                },
            )
            .unwrap();
        assert!(out.success);
        assert_eq!(
            out.text,
            "-s emulator-5554 install-multiple -r -i com.android.vending /tmp/base.apk /tmp/split.apk"
        );
        assert_eq!(bridge.serial(), Some("emulator-5554"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_text_detected() {
        let bridge = AdbBridge::new("echo");
        let out = bridge
            .install(&[Path::new("Failure [INSTALL_FAILED_INVALID_APK]")], &InstallFlags::default())
            .unwrap();
        assert!(!out.success);
        assert!(out.command.starts_with("echo install "));
    }
}
