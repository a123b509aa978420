//! # Checksummed Key-Value Files
//!
//! Metadata files written next to a part set are line-by-line key-value
//! pairs where the key is a single character at the beginning of a line,
//! directly followed by the value.
//!
//! The key-value section is terminated either by EOF or by a termination line
//! (`--`) followed by the SHA-1 hex digest of the key-value section (without
//! the termination line) and a newline:
//!
//! ```text
//! Nphi-2.Q4_K_M.gguf
//! S1602461952
//! --
//! 2fd4e1c67a2d28fced849ee1bb76e7391b93eb12
//! ```

use std::io::{BufRead, BufReader, Read, Write};
use std::str::Split;

use hex::ToHex;
use sha1::{Digest, Sha1};

use crate::common::{PartsError, PartsResult};

const TERMINATOR: &str = "--";
const CHECKSUM_LENGTH: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub struct SignedFile {
    /// SHA-1 of `contents`. `None` when the file carried no checksum section.
    checksum: Option<String>,
    /// Key-value lines, each terminated by `\n`.
    contents: String,
}

impl SignedFile {
    /// Builds a file from key-value pairs and computes its checksum.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (char, &'a str)>,
    {
        let mut contents = String::new();
        for (key, value) in entries {
            contents.push(key);
            contents.push_str(value);
            contents.push('\n');
        }
        let checksum = Some(Self::digest(&contents));
        Self { checksum, contents }
    }

    pub fn has_checksum(&self) -> bool {
        self.checksum.is_some()
    }

    pub fn lines(&self) -> Split<char> {
        self.contents.split('\n')
    }

    /// Iterates over `(key, value)` pairs, skipping empty lines.
    pub fn entries(&self) -> impl Iterator<Item = (char, &str)> {
        self.lines().filter_map(|line| {
            let key = line.chars().next()?;
            Some((key, &line[key.len_utf8()..]))
        })
    }

    /// Parses a file, verifying its checksum if present.
    ///
    /// # Errors
    ///
    /// * `PartsError::IO` if reading fails
    /// * `PartsError::ParseError` if the checksum line is malformed
    /// * `PartsError::InvalidManifestChecksum` if the checksum does not match
    pub fn read<R: Read>(input: R) -> PartsResult<Self> {
        let mut reader = BufReader::new(input);
        let mut buffer = String::new();
        let mut contents = String::new();
        let mut checksum: Option<String> = None;

        loop {
            buffer.clear();
            if reader.read_line(&mut buffer)? == 0 {
                break;
            }
            if buffer.trim_end_matches('\n') == TERMINATOR {
                buffer.clear();
                reader.read_line(&mut buffer)?;
                let line = buffer.trim_end_matches('\n');
                if line.len() != CHECKSUM_LENGTH {
                    return Err(PartsError::ParseError(format!(
                        "checksum line has {} characters instead of {CHECKSUM_LENGTH}",
                        line.len()
                    )));
                }
                checksum = Some(line.to_ascii_lowercase());
                break;
            }
            contents.push_str(&buffer);
        }

        if let Some(expected) = checksum.as_deref() {
            if Self::digest(&contents) != expected {
                return Err(PartsError::InvalidManifestChecksum);
            }
        }

        Ok(Self { checksum, contents })
    }

    /// Writes the key-value section followed by the termination line and checksum.
    pub fn write<W: Write>(&self, mut output: W) -> std::io::Result<()> {
        output.write_all(self.contents.as_bytes())?;
        if let Some(checksum) = &self.checksum {
            writeln!(output, "{TERMINATOR}")?;
            writeln!(output, "{checksum}")?;
        }
        output.flush()
    }

    fn digest(contents: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(contents.as_bytes());
        hasher.finalize().encode_hex()
    }
}
