//! Single APK files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use apkit_schema::{PackageMetadata, Sha256Digest};
use thiserror::Error;

use crate::badging::{self, MalformedMetadata};
use crate::digest;
use crate::inspect::Inspector;
use crate::process::ToolError;

/// Errors from inspecting a standalone APK.
#[derive(Error, Debug)]
pub enum ApkError {
    /// The file does not exist or is not a regular file.
    #[error("{}: not a file", .0.display())]
    NotFound(PathBuf),

    /// The inspection tool failed.
    #[error("{}: {source}", .path.display())]
    Tool {
        /// The APK.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ToolError,
    },

    /// The badging output lacked required fields.
    #[error("{}: {source}", .path.display())]
    Malformed {
        /// The APK.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: MalformedMetadata,
    },

    /// The file could not be read.
    #[error("{}: {source}", .path.display())]
    Io {
        /// The APK.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// An inspected APK on disk.
#[derive(Debug, Clone)]
pub struct ApkFile {
    path: PathBuf,
    metadata: Arc<PackageMetadata>,
}

impl ApkFile {
    /// Inspect `path` and parse its badging dump.
    ///
    /// # Errors
    ///
    /// Returns [`ApkError::NotFound`] for missing files, otherwise the
    /// inspection or parse failure.
    pub fn open(path: impl AsRef<Path>, inspector: &dyn Inspector) -> Result<Self, ApkError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ApkError::NotFound(path));
        }
        let raw = match inspector.dump_badging(&path) {
            Ok(raw) => raw,
            Err(source) => return Err(ApkError::Tool { path, source }),
        };
        let metadata = match badging::parse(&raw) {
            Ok(meta) => Arc::new(meta),
            Err(source) => return Err(ApkError::Malformed { path, source }),
        };
        Ok(Self { path, metadata })
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed metadata.
    pub fn metadata(&self) -> &Arc<PackageMetadata> {
        &self.metadata
    }

    /// File size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ApkError::Io`] if the file cannot be stat'ed.
    pub fn size(&self) -> Result<u64, ApkError> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|source| self.io_error(source))
    }

    /// SHA-256 of the file contents.
    ///
    /// # Errors
    ///
    /// Returns [`ApkError::Io`] if the file cannot be read.
    pub fn sha256(&self) -> Result<Sha256Digest, ApkError> {
        digest::sha256_file(&self.path).map_err(|source| self.io_error(source))
    }

    /// MD5 of the file contents, as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns [`ApkError::Io`] if the file cannot be read.
    pub fn md5(&self) -> Result<String, ApkError> {
        digest::md5_file(&self.path).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> ApkError {
        ApkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
