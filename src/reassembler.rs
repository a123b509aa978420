//! # Reassembling Parts into the Original File
//!
//! Reassembly is a single ordered pass over the parts `1..=N`:
//!
//! 1. The working directory is scanned and the set must hold exactly `N`
//!    parts forming a contiguous run, otherwise `IncompleteSet` is returned
//!    with every missing index and nothing is written.
//! 2. Parts are streamed in ascending index order into a temporary file
//!    created next to the destination.
//! 3. When digests are known from the manifest, each part and the whole
//!    output are checked against them; any difference is fatal.
//! 4. The output length is compared with the expected size. A mismatch is
//!    logged and reported but only fatal in strict mode.
//! 5. The temporary file is renamed to the destination.
//!
//! The destination never holds a partially written file: on any failure the
//! temporary is removed when its guard is dropped.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use hex::ToHex;
use sha1::{Digest, Sha1};

use crate::chunk_set::ChunkSet;
use crate::common::{
    file_name_of, index_width, stream_file, PartsError, PartsResult, COPY_BUFFER_SIZE,
};
use crate::manifest::Manifest;
use crate::part_name::manifest_path;

/// Result of comparing the output length with the expected size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Match,
    Mismatch { expected: u64, actual: u64 },
}

impl SizeCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, SizeCheck::Match)
    }
}

/// Outcome of a completed reassembly
#[derive(Debug, Clone, PartialEq)]
pub struct ReassemblyReport {
    pub output: PathBuf,
    pub parts: u32,
    pub bytes_written: u64,
    pub size_check: SizeCheck,
    /// Whether part and whole-file digests were verified.
    pub digests_verified: bool,
}

#[derive(Debug, Clone)]
pub struct Reassembler {
    directory: PathBuf,
    basename: String,
    strict: bool,
}

impl Reassembler {
    pub fn new(directory: &Path, basename: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            basename: basename.into(),
            strict: false,
        }
    }

    /// Turns a size mismatch into a `PartsError::SizeMismatch` failure.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reassembles `expected_count` parts into `destination`, checking the
    /// result against `expected_total` bytes.
    ///
    /// # Errors
    ///
    /// * `PartsError::NotFound` if the working directory does not exist
    /// * `PartsError::IncompleteSet` if parts are missing, before anything is written
    /// * `PartsError::IO` if a part cannot be read or the destination written
    /// * `PartsError::SizeMismatch` in strict mode only
    pub fn reassemble(
        &self,
        expected_count: u32,
        expected_total: u64,
        destination: &Path,
    ) -> PartsResult<ReassemblyReport> {
        self.run(
            expected_count,
            index_width(expected_count),
            expected_total,
            destination,
            None,
        )
    }

    /// Reassembles using the part count, size and digests stored in the
    /// manifest next to the parts.
    ///
    /// # Errors
    ///
    /// Same as [`reassemble`](Self::reassemble), plus
    /// `PartsError::ManifestNotFound`, manifest parse errors and
    /// `PartsError::DigestMismatch`.
    pub fn reassemble_with_manifest(&self, destination: &Path) -> PartsResult<ReassemblyReport> {
        let manifest = Manifest::load(&manifest_path(&self.directory, &self.basename))?;
        self.run(
            manifest.part_count,
            manifest.width,
            manifest.total_size,
            destination,
            Some(&manifest),
        )
    }

    fn run(
        &self,
        expected_count: u32,
        width: usize,
        expected_total: u64,
        destination: &Path,
        manifest: Option<&Manifest>,
    ) -> PartsResult<ReassemblyReport> {
        let set = ChunkSet::discover(&self.directory, &self.basename)?;
        set.ensure_complete(expected_count, width)?;
        log::info!(
            "Reassembling {expected_count} parts of {} into {}",
            self.basename,
            destination.display()
        );

        let mut output = PendingOutput::create(destination)?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut whole = Sha1::new();

        for (position, path) in set.ordered_paths(expected_count, width).iter().enumerate() {
            let index = position as u32 + 1;
            let mut part = Sha1::new();
            let copied = stream_file(path, &mut buffer, |bytes| {
                part.update(bytes);
                whole.update(bytes);
                output.write_all(bytes)
            })?;
            log::debug!("Appended {} ({copied} bytes)", path.display());

            if let Some(expected) = manifest.and_then(|m| m.chunk(index)) {
                check_digest(
                    &format!("part {index}"),
                    &expected.content_hash,
                    part.finalize().encode_hex(),
                )?;
            }
        }

        let bytes_written = output.finish()?;
        let mut digests_verified = false;
        if let Some(manifest) = manifest.filter(|m| !m.content_hash.is_empty()) {
            check_digest(
                &manifest.source_name,
                &manifest.content_hash,
                whole.finalize().encode_hex(),
            )?;
            digests_verified = true;
        }

        let size_check = if bytes_written == expected_total {
            log::info!("Size check passed: {bytes_written} bytes");
            SizeCheck::Match
        } else {
            log::warn!(
                "Size mismatch for {}: expected {expected_total} bytes, wrote {bytes_written}",
                destination.display()
            );
            if self.strict {
                return Err(PartsError::SizeMismatch {
                    expected: expected_total,
                    actual: bytes_written,
                });
            }
            SizeCheck::Mismatch {
                expected: expected_total,
                actual: bytes_written,
            }
        };

        output.commit()?;
        log::info!("Reassembled {}", destination.display());
        Ok(ReassemblyReport {
            output: destination.to_path_buf(),
            parts: expected_count,
            bytes_written,
            size_check,
            digests_verified,
        })
    }
}

fn check_digest(what: &str, expected: &str, actual: String) -> PartsResult<()> {
    if expected.is_empty() || expected.eq_ignore_ascii_case(&actual) {
        return Ok(());
    }
    log::error!("Digest mismatch for {what}: expected {expected}, got {actual}");
    Err(PartsError::DigestMismatch {
        what: what.into(),
        expected: expected.into(),
        actual,
    })
}

/// Exclusive handle on a temporary output file
///
/// The temporary lives next to the destination so that the final rename
/// stays on one filesystem. Dropping the guard without committing closes the
/// handle and removes the temporary.
struct PendingOutput {
    temporary: PathBuf,
    destination: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
    committed: bool,
}

impl PendingOutput {
    fn create(destination: &Path) -> PartsResult<Self> {
        let name = file_name_of(destination)?;
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temporary = parent.join(format!(".{name}.{:08x}.partial", rand::random::<u32>()));
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(&temporary)
            .map_err(PartsError::io_at(&temporary))?;
        log::debug!("Writing to temporary {}", temporary.display());
        Ok(Self {
            temporary,
            destination: destination.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            written: 0,
            committed: false,
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> PartsResult<()> {
        let writer = self.writer.as_mut().ok_or_else(|| PartsError::IO {
            path: self.temporary.clone(),
            message: "output already closed".into(),
        })?;
        writer
            .write_all(bytes)
            .map_err(PartsError::io_at(&self.temporary))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Flushes and closes the handle, returning the number of bytes written.
    fn finish(&mut self) -> PartsResult<u64> {
        if let Some(writer) = self.writer.take() {
            let file = writer
                .into_inner()
                .map_err(|e| PartsError::io_at(&self.temporary)(e.into_error()))?;
            file.sync_all().map_err(PartsError::io_at(&self.temporary))?;
        }
        Ok(self.written)
    }

    fn commit(mut self) -> PartsResult<()> {
        self.finish()?;
        fs::rename(&self.temporary, &self.destination)
            .map_err(PartsError::io_at(&self.destination))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.writer.take();
        if let Err(e) = fs::remove_file(&self.temporary) {
            log::error!("Could not remove {}: {:?}", self.temporary.display(), e);
        } else {
            log::debug!("Discarded {}", self.temporary.display());
        }
    }
}
