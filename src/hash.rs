//! Streaming content hashing

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer size; files are never loaded whole
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// SHA-256 of a file together with the number of bytes actually read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex digest
    pub sha256: String,
    pub bytes: u64,
}

/// Hash a file by streaming it in [`CHUNK_SIZE`] chunks
pub fn hash_file(path: &Path) -> io::Result<FileDigest> {
    let file = File::open(path)?;
    hash_reader(file)
}

/// Hash everything a reader yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<FileDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut bytes = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
        bytes += read as u64;
    }

    Ok(FileDigest {
        sha256: format!("{:x}", hasher.finalize()),
        bytes,
    })
}
