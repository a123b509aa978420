//! # Common Types and Utilities
//!
//! This module provides common types, error handling, and utility functions used
//! throughout the chunk transfer implementation. It includes:
//! - Error handling infrastructure
//! - Constants for sizing and file naming
//! - Chunk arithmetic shared by the splitter and the reassembler

use std::path::{Path, PathBuf};

/// Default size of a single part: 20 MiB, small enough for most mail gateways.
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;
/// Minimum number of digits of a part index. Sets of up to 99 parts keep the
/// historical `partNN` names.
pub const DEFAULT_INDEX_WIDTH: usize = 2;
/// Text placed between the base name and the part index.
pub const PART_INFIX: &str = ".part";
/// Extension appended to every part file.
pub const PART_SUFFIX: &str = ".zip";
/// Extension of the companion manifest file.
pub const MANIFEST_SUFFIX: &str = ".parts";
/// Size of the buffer used to stream parts during reassembly and verification.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

pub type PartsResult<R> = Result<R, PartsError>;

/// Represents errors that can occur while splitting or reassembling
///
/// Precondition failures (`NotFound`, `IncompleteSet`, `InvalidChunkSize`) are
/// raised before any output byte is written.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PartsError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Incomplete chunk set: expected {expected} parts, found {found}, missing {missing:?}")]
    IncompleteSet {
        expected: u32,
        found: u32,
        missing: Vec<u32>,
    },
    #[error("IO error on {}: {message}", path.display())]
    IO { path: PathBuf, message: String },
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("Digest mismatch for {what}: expected {expected}, got {actual}")]
    DigestMismatch {
        what: String,
        expected: String,
        actual: String,
    },
    #[error("Chunk size must be positive")]
    InvalidChunkSize,
    #[error("Manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),
    #[error("Invalid manifest checksum")]
    InvalidManifestChecksum,
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl PartsError {
    /// Builds a closure mapping an `std::io::Error` to `PartsError::IO` for `path`.
    pub fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> PartsError + '_ {
        move |e| PartsError::IO {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for PartsError {
    fn from(e: std::io::Error) -> Self {
        PartsError::IO {
            path: PathBuf::new(),
            message: e.to_string(),
        }
    }
}

/// Number of parts needed to hold `total_size` bytes in parts of `chunk_size`.
///
/// An empty source produces no parts.
pub fn part_count(total_size: u64, chunk_size: u64) -> PartsResult<u32> {
    if chunk_size == 0 {
        return Err(PartsError::InvalidChunkSize);
    }
    u32::try_from(total_size.div_ceil(chunk_size))
        .map_err(|_| PartsError::ParseError(format!("too many parts for {total_size} bytes")))
}

/// Number of digits used to pad part indices of a set of `count` parts.
///
/// Derived from the count instead of being fixed, so that a set with more
/// than 99 parts never produces colliding or misordered names.
pub fn index_width(count: u32) -> usize {
    let digits = count.checked_ilog10().map_or(1, |log| log as usize + 1);
    digits.max(DEFAULT_INDEX_WIDTH)
}

/// Reads until `buffer` is full or the reader is exhausted.
///
/// A single `read` call may return fewer bytes than requested, so a part is
/// only considered short once EOF has been reached.
pub fn read_full<R: std::io::Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads the file at `path` to its end through `buffer`, handing every block
/// to `consume`. Returns the number of bytes read.
pub fn stream_file<F>(path: &Path, buffer: &mut [u8], mut consume: F) -> PartsResult<u64>
where
    F: FnMut(&[u8]) -> PartsResult<()>,
{
    let mut file = std::fs::File::open(path).map_err(PartsError::io_at(path))?;
    let mut total = 0u64;
    loop {
        let read = read_full(&mut file, buffer).map_err(PartsError::io_at(path))?;
        if read == 0 {
            break;
        }
        consume(&buffer[..read])?;
        total += read as u64;
    }
    Ok(total)
}

/// Returns the file name component of `path` as a string.
pub fn file_name_of(path: &Path) -> PartsResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(String::from)
        .ok_or_else(|| PartsError::ParseError(format!("no file name in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_count_rounds_up() {
        assert_eq!(part_count(0, 20), Ok(0));
        assert_eq!(part_count(5, 20), Ok(1));
        assert_eq!(part_count(40, 20), Ok(2));
        assert_eq!(part_count(41, 20), Ok(3));
        assert_eq!(part_count(45, 0), Err(PartsError::InvalidChunkSize));
    }

    #[test]
    fn width_grows_with_count() {
        assert_eq!(index_width(0), 2);
        assert_eq!(index_width(9), 2);
        assert_eq!(index_width(99), 2);
        assert_eq!(index_width(100), 3);
        assert_eq!(index_width(12345), 5);
    }

    #[test]
    fn read_full_collects_short_reads() {
        struct Trickle<'a>(&'a [u8]);
        impl std::io::Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let mut reader = Trickle(b"abcdefg");
        let mut buffer = [0u8; 5];
        assert_eq!(read_full(&mut reader, &mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"abcde");
        assert_eq!(read_full(&mut reader, &mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"fg");
    }
}
