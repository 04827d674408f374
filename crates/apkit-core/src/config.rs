//! User configuration and tool discovery.
//!
//! Settings are layered: built-in defaults, then `config.toml` in the apkit
//! home directory, then `APKIT_*` environment variables. Command-line flags
//! are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::process::ToolError;

/// Environment variable overriding the inspection tool path.
pub const AAPT_ENV: &str = "APKIT_AAPT";
/// Environment variable overriding the device bridge path.
pub const ADB_ENV: &str = "APKIT_ADB";
/// Environment variable setting the tool timeout in seconds.
pub const TIMEOUT_ENV: &str = "APKIT_TIMEOUT";

/// Returns the apkit configuration directory, or None if it cannot be resolved.
pub fn try_apkit_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("APKIT_HOME") {
        return Some(PathBuf::from(val));
    }
    dirs::config_dir().map(|d| d.join("apkit"))
}

/// Config file path: `<apkit home>/config.toml`
pub fn config_path() -> Option<PathBuf> {
    try_apkit_home().map(|h| h.join("config.toml"))
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// External tool locations and limits.
    pub tools: ToolConfig,
    /// Defaults for `install`.
    pub install: InstallDefaults,
}

/// Where the external tools live and how long they may run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Explicit `aapt`/`aapt2` path.
    pub aapt: Option<PathBuf>,
    /// Explicit `adb` path.
    pub adb: Option<PathBuf>,
    /// Per-invocation timeout in seconds; unset or 0 means no limit.
    pub timeout_secs: Option<u64>,
}

/// Install behaviour when no flag says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallDefaults {
    /// Refuse packages whose minimum SDK exceeds the device's.
    pub check: bool,
    /// Skip members that fail to inspect instead of aborting.
    pub skip_broken: bool,
    /// Device serial to target.
    pub serial: Option<String>,
}

impl Default for InstallDefaults {
    fn default() -> Self {
        Self {
            check: true,
            skip_broken: false,
            serial: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    ///
    /// A missing config file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// an environment override is malformed.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.tools.apply_env()?;
        Ok(config)
    }

    /// Parse a specific config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse config TOML.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or unknown keys.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl ToolConfig {
    /// Overlay `APKIT_AAPT`, `APKIT_ADB`, and `APKIT_TIMEOUT`.
    ///
    /// # Errors
    ///
    /// Returns an error if `APKIT_TIMEOUT` is not a whole number of seconds.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout value is not a whole number of seconds.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(aapt) = lookup(AAPT_ENV).filter(|v| !v.is_empty()) {
            self.aapt = Some(PathBuf::from(aapt));
        }
        if let Some(adb) = lookup(ADB_ENV).filter(|v| !v.is_empty()) {
            self.adb = Some(PathBuf::from(adb));
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV).filter(|v| !v.is_empty()) {
            let secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{TIMEOUT_ENV}='{timeout}' is not a number of seconds"))?;
            self.timeout_secs = Some(secs);
        }
        Ok(())
    }

    /// Effective timeout, `None` meaning unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Resolve the inspection tool: explicit path, else `aapt`, else `aapt2`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if nothing is configured or on `PATH`.
    pub fn aapt_path(&self) -> Result<PathBuf, ToolError> {
        match &self.aapt {
            Some(path) => Ok(path.clone()),
            None => find_tool(&["aapt", "aapt2"], AAPT_ENV),
        }
    }

    /// Resolve the device bridge: explicit path, else `adb`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if nothing is configured or on `PATH`.
    pub fn adb_path(&self) -> Result<PathBuf, ToolError> {
        match &self.adb {
            Some(path) => Ok(path.clone()),
            None => find_tool(&["adb"], ADB_ENV),
        }
    }
}

fn find_tool(candidates: &[&str], env: &'static str) -> Result<PathBuf, ToolError> {
    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| ToolError::NotFound {
            tool: candidates.join(" or "),
            env,
        })
}
