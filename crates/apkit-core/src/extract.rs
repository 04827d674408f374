//! Zip extraction for bundle archives.
//!
//! Every call opens its own handle on the archive, so extractions of
//! different entries never share reader state.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

/// Failure while unpacking archive entries.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Filesystem error on the destination side.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive itself could not be read.
    #[error("Archive error: {0}")]
    Archive(#[from] ZipError),

    /// The requested entry does not exist.
    #[error("Entry '{0}' not found in archive")]
    MissingEntry(String),

    /// The entry name would escape the destination directory.
    #[error("Invalid path in archive: {0}")]
    UnsafePath(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// Extract a single named entry into `dest_dir`, keeping its relative path.
///
/// # Errors
///
/// Returns [`ExtractError::MissingEntry`] if there is no such entry,
/// [`ExtractError::UnsafePath`] for names like `../evil.apk`, and I/O or
/// archive errors otherwise. A partially written file is removed.
pub fn extract_entry(
    archive_path: &Path,
    entry: &str,
    dest_dir: &Path,
) -> Result<ExtractedFile, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Err(ExtractError::MissingEntry(entry.to_string())),
        Err(e) => return Err(e.into()),
    };
    let relative_path = match file.enclosed_name() {
        Some(path) => path.to_owned(),
        None => return Err(ExtractError::UnsafePath(entry.to_string())),
    };

    let absolute_path = dest_dir.join(&relative_path);
    if let Some(p) = absolute_path.parent() {
        fs::create_dir_all(p)?;
    }

    let mut outfile = File::create(&absolute_path)?;
    if let Err(e) = io::copy(&mut file, &mut outfile) {
        drop(outfile);
        let _ = fs::remove_file(&absolute_path);
        return Err(e.into());
    }

    Ok(ExtractedFile {
        relative_path,
        absolute_path,
        size: file.size(),
    })
}

/// Names of the file entries in `archive_path`, in archive order.
///
/// # Errors
///
/// Returns [`ExtractError::Archive`] if the archive cannot be read.
pub fn entry_names(archive_path: &Path) -> Result<Vec<String>, ExtractError> {
    let archive = ZipArchive::new(File::open(archive_path)?)?;
    Ok(archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}

/// Extract every entry of a zip archive
///
/// # Errors
///
/// Returns an error if the archive cannot be read or a file cannot be
/// written. Entries with unsafe names are skipped.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let relative_path = match file.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                tracing::warn!(entry = file.name(), "skipping entry with unsafe path");
                continue;
            }
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
            size: file.size(),
        });
    }

    Ok(extracted_files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Write a zip with the given `(name, bytes)` entries.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("base.apk", b"base"), ("splits/x.apk", b"split")]);

        let out = tmp.path().join("out");
        let file = extract_entry(&archive, "splits/x.apk", &out).unwrap();
        assert_eq!(file.relative_path, PathBuf::from("splits/x.apk"));
        assert_eq!(fs::read(&file.absolute_path).unwrap(), b"split");
        assert_eq!(file.size, 5);
        assert!(!out.join("base.apk").exists());
    }

    #[test]
    fn test_extract_missing_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("base.apk", b"base")]);
        let err = extract_entry(&archive, "nope.apk", tmp.path()).unwrap_err();
        assert!(matches!(err, ExtractError::MissingEntry(name) if name == "nope.apk"));
    }

    #[test]
    fn test_extract_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("../evil.apk", b"x"), ("ok.apk", b"y")]);

        let out = tmp.path().join("out");
        let err = extract_entry(&archive, "../evil.apk", &out).unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath(_)));

        let files = extract_zip(&archive, &out).unwrap();
        assert_eq!(files.len(), 1);
        assert!(!tmp.path().join("evil.apk").exists());
    }

    #[test]
    fn test_entry_names_skip_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("app.apk");
        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        zip.start_file("AndroidManifest.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"axml").unwrap();
        zip.add_directory("res/", SimpleFileOptions::default())
            .unwrap();
        zip.start_file("res/icon.png", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"png").unwrap();
        zip.finish().unwrap();

        assert_eq!(
            entry_names(&archive).unwrap(),
            vec!["AndroidManifest.xml", "res/icon.png"]
        );
    }

    #[test]
    fn test_not_a_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();
        assert!(matches!(
            extract_zip(&archive, tmp.path()),
            Err(ExtractError::Archive(_))
        ));
    }
}
