//! # Splitting a Source File into Parts
//!
//! The splitter reads a source file sequentially from offset 0 and writes it
//! out as `<basename>.part<NN>.zip` files of exactly `chunk_size` bytes, the
//! last one holding whatever remains. One buffer of at most `chunk_size`
//! bytes (and never more than the source) is allocated per run and reused for
//! every part, so memory never grows with the size of the source.
//!
//! While streaming, SHA-1 digests of every part and of the whole source are
//! computed and, unless disabled, stored in a companion manifest
//! (`<basename>.parts`) that the reassembler uses to verify the result.
//!
//! Parts written before a failure are left on disk; running the split again
//! overwrites them. Parts of an earlier split that the new set would not
//! overwrite are removed before writing starts.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use hex::ToHex;
use sha1::{Digest, Sha1};

use crate::chunk_set::ChunkSet;
use crate::common::{
    file_name_of, index_width, part_count, read_full, PartsError, PartsResult,
    DEFAULT_CHUNK_SIZE,
};
use crate::manifest::{Chunk, Manifest};
use crate::part_name::{manifest_path, PartName};

/// Outcome of a successful split
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub source: PathBuf,
    pub total_size: u64,
    pub chunk_size: u64,
    pub width: usize,
    /// Written parts with their paths, in index order.
    pub chunks: Vec<(PathBuf, Chunk)>,
    pub content_hash: String,
    pub manifest: Option<PathBuf>,
}

impl SplitReport {
    pub fn part_count(&self) -> usize {
        self.chunks.len()
    }
}

#[derive(Debug, Clone)]
pub struct Splitter {
    chunk_size: u64,
    write_manifest: bool,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_manifest: true,
        }
    }
}

impl Splitter {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Enables or disables the companion manifest.
    pub fn with_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Splits `input` into parts written to `output_dir`.
    ///
    /// # Errors
    ///
    /// * `PartsError::InvalidChunkSize` if the chunk size is zero
    /// * `PartsError::NotFound` if `input` or `output_dir` does not exist
    /// * `PartsError::IO` if the source cannot be read or a part cannot be written
    pub fn split(&self, input: &Path, output_dir: &Path) -> PartsResult<SplitReport> {
        if self.chunk_size == 0 {
            return Err(PartsError::InvalidChunkSize);
        }
        if !input.is_file() {
            return Err(PartsError::NotFound(input.to_path_buf()));
        }
        if !output_dir.is_dir() {
            return Err(PartsError::NotFound(output_dir.to_path_buf()));
        }

        let basename = file_name_of(input)?;
        let source = File::open(input).map_err(PartsError::io_at(input))?;
        let total_size = source.metadata().map_err(PartsError::io_at(input))?.len();
        let expected_parts = part_count(total_size, self.chunk_size)?;
        let width = index_width(expected_parts);
        log::info!(
            "Splitting {} ({total_size} bytes) into {expected_parts} parts of {} bytes",
            input.display(),
            self.chunk_size
        );

        self.remove_stale_parts(output_dir, &basename, expected_parts, width)?;

        // Never larger than the source, so an oversized chunk size still yields one part.
        let buffer_size = usize::try_from(self.chunk_size.min(total_size).max(1))
            .map_err(|_| PartsError::InvalidChunkSize)?;
        let mut reader = BufReader::new(source);
        let mut buffer = vec![0u8; buffer_size];
        let mut whole = Sha1::new();
        let mut chunks = Vec::with_capacity(expected_parts as usize);
        let mut offset = 0u64;
        let mut index = 0u32;

        loop {
            let read = read_full(&mut reader, &mut buffer).map_err(PartsError::io_at(input))?;
            if read == 0 {
                break;
            }
            index += 1;
            let bytes = &buffer[..read];
            whole.update(bytes);

            let path = PartName::new(&basename, index, width).path_in(output_dir);
            write_part(&path, bytes)?;
            let chunk = Chunk {
                index,
                offset,
                size: read as u64,
                content_hash: Sha1::digest(bytes).encode_hex(),
            };
            log::debug!("Wrote {} ({} bytes)", path.display(), chunk.size);
            chunks.push((path, chunk));
            offset += read as u64;
        }

        if offset != total_size || index != expected_parts {
            log::warn!(
                "{} changed while splitting: expected {total_size} bytes in \
                 {expected_parts} parts, read {offset} in {index}",
                input.display()
            );
        }

        let content_hash: String = whole.finalize().encode_hex();
        let manifest = if self.write_manifest {
            let path = manifest_path(output_dir, &basename);
            let parts = chunks.iter().map(|(_, chunk)| chunk.clone()).collect();
            Manifest::new(&basename, offset, self.chunk_size, content_hash.clone(), parts)?
                .save(&path)?;
            log::info!("Wrote manifest {}", path.display());
            Some(path)
        } else {
            None
        };

        log::info!("Split {} into {} parts", input.display(), chunks.len());
        Ok(SplitReport {
            source: input.to_path_buf(),
            total_size: offset,
            chunk_size: self.chunk_size,
            width,
            chunks,
            content_hash,
            manifest,
        })
    }

    /// Removes parts left by an earlier split of `basename` that the new set
    /// will not overwrite: indices above `expected_parts` and names padded to
    /// another width. A stale manifest is removed when none will be written.
    fn remove_stale_parts(
        &self,
        output_dir: &Path,
        basename: &str,
        expected_parts: u32,
        width: usize,
    ) -> PartsResult<()> {
        let existing = ChunkSet::discover(output_dir, basename)?;
        for part in existing.parts() {
            if part.name.index > expected_parts || part.name.width != width {
                log::info!("Removing stale part {}", part.path.display());
                fs::remove_file(&part.path).map_err(PartsError::io_at(&part.path))?;
            }
        }
        let manifest = manifest_path(output_dir, basename);
        if !self.write_manifest && manifest.is_file() {
            log::info!("Removing stale manifest {}", manifest.display());
            fs::remove_file(&manifest).map_err(PartsError::io_at(&manifest))?;
        }
        Ok(())
    }
}

fn write_part(path: &Path, bytes: &[u8]) -> PartsResult<()> {
    let mut file = File::create(path).map_err(PartsError::io_at(path))?;
    file.write_all(bytes).map_err(PartsError::io_at(path))?;
    file.sync_all().map_err(PartsError::io_at(path))
}
