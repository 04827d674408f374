//! Shared types for apkit.
//!
//! Everything here is plain data: the typed form of an APK's badging dump
//! and the closed vocabularies (ABI, density, install location, screen size)
//! it is expressed in. Producing these values is `apkit-core`'s job.

#[macro_use]
mod vocab;

pub mod abi;
pub mod density;
pub mod hash;
pub mod metadata;
pub mod types;

// Re-exports
pub use abi::Abi;
pub use density::{Density, UnknownDensity};
pub use hash::{InvalidDigest, Sha256Digest};
pub use metadata::PackageMetadata;
pub use types::*;
