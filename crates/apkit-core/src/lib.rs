//! Core library for apkit.
//!
//! - [`badging`] turns `aapt dump badging` output into [`PackageMetadata`].
//! - [`bundle`] opens XAPK, APKM and APKS archives and inspects their
//!   members lazily.
//! - [`select`] and [`install`] decide which members a device needs and push
//!   them through a [`DeviceBridge`].
//!
//! The external tools sit behind the [`Inspector`] and [`DeviceBridge`]
//! traits; [`AaptInspector`] and [`AdbBridge`] are the real implementations.

pub mod apk;
pub mod badging;
pub mod bridge;
pub mod bundle;
pub mod config;
pub mod digest;
pub mod extract;
pub mod inspect;
pub mod install;
pub mod process;
pub mod select;

pub use apk::{ApkError, ApkFile};
pub use apkit_schema::PackageMetadata;
pub use badging::MalformedMetadata;
pub use bridge::{AdbBridge, DeviceBridge, InstallFlags};
pub use bundle::{Bundle, BundleError, BundleFormat, BundleOptions, MemberRef};
pub use config::Config;
pub use inspect::{AaptInspector, Inspector};
pub use install::{InstallError, InstallOptions, InstallResult, install_apk, install_bundle};
pub use process::ToolError;
pub use select::{CompatibilityRequest, DeviceProfile, Selection, select_members};
