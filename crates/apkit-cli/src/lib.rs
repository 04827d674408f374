//! apkit - APK metadata and install tool
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads package metadata from APK files and from XAPK, APKM and APKS
//! bundles via `aapt dump badging`, and installs them onto a device via
//! `adb`, choosing the splits the device needs.
//!
//! # Configuration
//!
//! ```text
//! $APKIT_HOME/config.toml     # default: <config dir>/apkit/config.toml
//!
//! [tools]
//! aapt = "/opt/android-sdk/build-tools/34.0.0/aapt2"
//! adb = "/opt/android-sdk/platform-tools/adb"
//! timeout_secs = 60
//!
//! [install]
//! check = true
//! skip_broken = false
//! serial = "emulator-5554"
//! ```
//!
//! `APKIT_AAPT`, `APKIT_ADB` and `APKIT_TIMEOUT` override the file; flags
//! override both.

pub mod cmd;
pub mod context;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use context::Context;

#[derive(Debug, Parser)]
#[command(name = "apkit")]
#[command(author, version, about = "apkit - inspect and install Android packages")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to aapt or aapt2
    #[arg(long, global = true, value_name = "PATH")]
    pub aapt: Option<PathBuf>,

    /// Path to adb
    #[arg(long, global = true, value_name = "PATH")]
    pub adb: Option<PathBuf>,

    /// Kill external tools after this many seconds (0 = no limit)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show package metadata
    Info {
        /// APK, XAPK, APKM or APKS file
        file: PathBuf,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// For bundles, show the manifest and member table without
        /// inspecting members
        #[arg(long)]
        no_recursion: bool,
        /// Only these metadata fields (JSON keys)
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        only: Vec<String>,
        /// Skip bundle members that fail to inspect
        #[arg(long)]
        skip_broken: bool,
    },
    /// Install onto a connected device, or every attached device when no
    /// serial is given
    Install {
        /// APK, XAPK, APKM or APKS file
        file: PathBuf,
        /// Target device serial
        #[arg(short, long, env = "ANDROID_SERIAL")]
        serial: Option<String>,
        /// Skip the SDK and ABI compatibility checks
        #[arg(long)]
        no_check: bool,
        /// Replace an existing installation
        #[arg(short, long)]
        reinstall: bool,
        /// Allow installing a lower version code
        #[arg(short, long)]
        downgrade: bool,
        /// Record this package as the installer, e.g. com.android.vending
        #[arg(long, value_name = "PACKAGE")]
        installer: Option<String>,
        /// Record the URI the package was downloaded from
        #[arg(long, value_name = "URI")]
        originating_uri: Option<String>,
        /// Skip bundle members that fail to inspect
        #[arg(long)]
        skip_broken: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an installed package from a device
    Uninstall {
        /// Package name, e.g. org.example.app
        package: String,
        /// Target device serial
        #[arg(short, long, env = "ANDROID_SERIAL")]
        serial: Option<String>,
    },
    /// Unpack the entries of a bundle or an APK
    Extract {
        /// APK, XAPK, APKM or APKS file
        file: PathBuf,
        /// Destination directory
        #[arg(short, long)]
        output: PathBuf,
        /// Only these archive entries, e.g. base.apk or res/icon.png
        entries: Vec<String>,
    },
    /// Rename a file from its metadata, e.g. '{package_name}-{version_code}.apk'
    Rename {
        /// APK, XAPK, APKM or APKS file
        file: PathBuf,
        /// New file name; `{field}` is replaced by the metadata field
        template: String,
    },
    /// Compute SHA256 (or MD5) hash of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print MD5 instead of SHA256
        #[arg(long)]
        md5: bool,
    },
    /// List attached devices
    Devices {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
