//! Per-invocation settings shared by all commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use apkit_core::bundle::{Bundle, BundleOptions};
use apkit_core::config::Config;
use apkit_core::{AaptInspector, AdbBridge, ApkFile, Inspector, ToolError};

use crate::Cli;

/// Effective configuration after layering file, environment, and flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub dry_run: bool,
}

/// A file opened as whichever kind of package it is.
#[derive(Debug)]
pub enum Package {
    Apk(ApkFile),
    Bundle(Bundle),
}

impl Context {
    /// Load config and apply global flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Config::load().context("Failed to load configuration")?;
        if let Some(aapt) = &cli.aapt {
            config.tools.aapt = Some(aapt.clone());
        }
        if let Some(adb) = &cli.adb {
            config.tools.adb = Some(adb.clone());
        }
        if let Some(timeout) = cli.timeout {
            config.tools.timeout_secs = Some(timeout);
        }
        Ok(Self {
            config,
            dry_run: cli.dry_run,
        })
    }

    /// The configured inspector. If `aapt` cannot be found, an inspector
    /// that fails on use, so commands that never inspect still run.
    pub fn inspector(&self) -> Arc<dyn Inspector> {
        match AaptInspector::discover(&self.config.tools) {
            Ok(inspector) => Arc::new(inspector),
            Err(ToolError::NotFound { tool, env }) => Arc::new(MissingInspector { tool, env }),
            Err(e) => {
                tracing::debug!(error = %e, "inspector discovery failed");
                Arc::new(MissingInspector {
                    tool: "aapt".to_string(),
                    env: apkit_core::config::AAPT_ENV,
                })
            }
        }
    }

    pub fn bridge(&self, serial: Option<String>) -> Result<AdbBridge> {
        let serial = serial.or_else(|| self.config.install.serial.clone());
        Ok(AdbBridge::discover(&self.config.tools)?.with_serial(serial))
    }

    /// Open `path` as an APK when it is named like one, else as a bundle.
    pub fn open_package(&self, path: &Path, skip_broken: bool) -> Result<Package> {
        let inspector = self.inspector();
        if is_apk(path) {
            let apk = ApkFile::open(path, inspector.as_ref())?;
            Ok(Package::Apk(apk))
        } else {
            Ok(Package::Bundle(self.open_bundle(path, inspector, skip_broken)?))
        }
    }

    pub fn open_bundle(
        &self,
        path: &Path,
        inspector: Arc<dyn Inspector>,
        skip_broken: bool,
    ) -> Result<Bundle> {
        let options = BundleOptions::new(inspector)
            .skip_broken(skip_broken || self.config.install.skip_broken);
        Ok(Bundle::open(path, options)?)
    }
}

#[derive(Debug)]
struct MissingInspector {
    tool: String,
    env: &'static str,
}

impl Inspector for MissingInspector {
    fn dump_badging(&self, _apk: &Path) -> Result<String, ToolError> {
        Err(ToolError::NotFound {
            tool: self.tool.clone(),
            env: self.env,
        })
    }
}

pub fn is_apk(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("apk"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_inspector_reports_not_found() {
        let inspector = MissingInspector {
            tool: "aapt or aapt2".to_string(),
            env: "APKIT_AAPT",
        };
        let err = inspector.dump_badging(Path::new("a.apk")).unwrap_err();
        assert!(err.to_string().contains("APKIT_AAPT"));
    }

    #[test]
    fn test_is_apk() {
        assert!(is_apk(Path::new("a/b/App.APK")));
        assert!(!is_apk(Path::new("app.xapk")));
        assert!(!is_apk(Path::new("apk")));
    }
}
