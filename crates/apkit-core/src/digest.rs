//! Streaming SHA-256 and MD5 of files and archive entries.

use std::io::{self, Read};
use std::path::Path;

use apkit_schema::Sha256Digest;
use md5::Md5;
use sha2::{Digest, Sha256};

fn digest_reader<D: Digest>(mut reader: impl Read) -> io::Result<D> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 65536]; // 64KB buffer

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher)
}

/// Hash everything `reader` yields.
///
/// # Errors
///
/// Propagates read errors.
pub fn sha256_reader(reader: impl Read) -> io::Result<Sha256Digest> {
    let hasher = digest_reader::<Sha256>(reader)?;
    Ok(Sha256Digest::from_bytes(&hasher.finalize().into()))
}

/// Hash a file on disk.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> io::Result<Sha256Digest> {
    sha256_reader(std::fs::File::open(path)?)
}

/// MD5 of everything `reader` yields, as lowercase hex.
///
/// # Errors
///
/// Propagates read errors.
pub fn md5_reader(reader: impl Read) -> io::Result<String> {
    let hasher = digest_reader::<Md5>(reader)?;
    Ok(hex::encode(hasher.finalize()))
}

/// MD5 of a file on disk, as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn md5_file(path: &Path) -> io::Result<String> {
    md5_reader(std::fs::File::open(path)?)
}
