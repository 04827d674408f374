//! Hash command

use anyhow::{Context, Result};
use apkit_core::digest::{md5_file, sha256_file};
use std::path::{Path, PathBuf};

/// Print `<digest> <path>` for each file, SHA-256 unless `md5` is set.
pub fn hash(files: &[PathBuf], md5: bool) -> Result<()> {
    for file in files {
        let hash = digest(file, md5).with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{hash} {}", file.display());
    }
    Ok(())
}

fn digest(file: &Path, md5: bool) -> std::io::Result<String> {
    if md5 {
        md5_file(file)
    } else {
        sha256_file(file).map(|d| d.to_string())
    }
}
