//! Random-access byte sources and content hashing.
//!
//! The engine reads artifacts through one capability — "read bytes at an
//! offset, report total size" — so that every format inspector works
//! identically over a local file and a remote HTTP resource. The local
//! variant lives here; the remote variant is [`crate::remote::RemoteSource`].
//!
//! Hashing happens against the same capability, before any parsing, so a
//! malformed container never loses integrity tracking.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::HASH_ERROR;

/// Read granularity for streaming hashes.
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Failure while reading from a byte source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Local I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Remote transport failure (connect, timeout, HTTP status).
    #[error("network error: {0}")]
    Network(String),
    /// The server answered a range request without a usable range.
    #[error("range request not satisfied for {url}")]
    RangeNotSatisfied {
        /// Resource that rejected the range.
        url: String,
    },
}

/// Uniform random-access read capability over an artifact.
///
/// Blanket-implemented for anything seekable; inspectors take
/// `&mut dyn ByteSource` so local and remote artifacts share one code path.
pub trait ByteSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteSource for T {}

/// Local byte source wrapping an open file handle.
///
/// The handle is scoped to one artifact inspection and closed on drop,
/// on every exit path.
#[derive(Debug)]
pub struct LocalSource {
    file: File,
}

impl LocalSource {
    /// Open a local file for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Total size in bytes, from file metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if metadata cannot be read.
    pub fn len(&self) -> Result<u64, SourceError> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the file is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if metadata cannot be read.
    pub fn is_empty(&self) -> Result<bool, SourceError> {
        Ok(self.len()? == 0)
    }
}

impl Read for LocalSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for LocalSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Stream SHA-256 over the first `cap` bytes of a source.
///
/// Returns the lowercase hex digest. Any failure — seek, read, open —
/// collapses to the [`HASH_ERROR`] sentinel; hashing is best-effort and
/// must never abort a scan.
#[must_use]
pub fn hash_source(source: &mut dyn ByteSource, cap: u64) -> String {
    if source.seek(SeekFrom::Start(0)).is_err() {
        return HASH_ERROR.to_owned();
    }

    let mut hasher = Sha256::new();
    let mut remaining = cap;
    let mut buf = [0u8; HASH_CHUNK_BYTES];

    while remaining > 0 {
        let want = remaining.min(HASH_CHUNK_BYTES as u64) as usize;
        match source.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buf[..n]);
                remaining -= n as u64;
            }
            Err(_) => return HASH_ERROR.to_owned(),
        }
    }

    hex::encode(hasher.finalize())
}

/// Hash a local file's bounded prefix.
///
/// Open failures (missing file, permissions) yield [`HASH_ERROR`] like
/// any other hashing failure.
#[must_use]
pub fn hash_file(path: &Path, cap: u64) -> String {
    match LocalSource::open(path) {
        Ok(mut source) => hash_source(&mut source, cap),
        Err(_) => HASH_ERROR.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    /// A reader that fails after a successful seek — models a file that
    /// became unreadable mid-stream.
    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            ))
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
            Ok(0)
        }
    }

    fn reference_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    #[test]
    fn test_hash_source_matches_reference() {
        let data = b"hello artifact";
        let mut cursor = Cursor::new(data.to_vec());
        assert_eq!(
            hash_source(&mut cursor, u64::MAX),
            reference_sha256(data.as_slice())
        );
    }

    #[test]
    fn test_hash_source_respects_cap() {
        let data = b"0123456789";
        let mut cursor = Cursor::new(data.to_vec());
        assert_eq!(hash_source(&mut cursor, 4), reference_sha256(b"0123"));
    }

    #[test]
    fn test_hash_source_rewinds_first() {
        let data = b"abcdef";
        let mut cursor = Cursor::new(data.to_vec());
        cursor.seek(SeekFrom::Start(3)).unwrap();
        // Hash must cover the whole prefix, not the remainder after seek.
        assert_eq!(
            hash_source(&mut cursor, u64::MAX),
            reference_sha256(data.as_slice())
        );
    }

    #[test]
    fn test_hash_failure_yields_sentinel() {
        let mut failing = FailingReader;
        assert_eq!(hash_source(&mut failing, 1024), HASH_ERROR);
    }

    #[test]
    fn test_hash_file_missing_yields_sentinel() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.pt");
        assert_eq!(hash_file(&missing, 1024), HASH_ERROR);
    }

    #[test]
    fn test_hash_file_real_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights.bin");
        std::fs::write(&path, b"tensor bytes").unwrap();
        assert_eq!(hash_file(&path, u64::MAX), reference_sha256(b"tensor bytes"));
    }

    #[test]
    fn test_local_source_len() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        std::fs::write(&path, b"GGUF").unwrap();
        let source = LocalSource::open(&path).unwrap();
        assert_eq!(source.len().unwrap(), 4);
        assert!(!source.is_empty().unwrap());
    }
}
