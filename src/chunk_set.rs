//! # Part Discovery
//!
//! Finds the part files of one base name inside a working directory and
//! answers completeness questions about them. Discovery order on disk is
//! irrelevant: parts are kept ordered by their numeric index.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::{PartsError, PartsResult};
use crate::part_name::PartName;

/// A part file found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPart {
    pub name: PartName,
    pub path: PathBuf,
    pub size: u64,
}

/// The part files of one base name present in a directory
#[derive(Debug, Clone)]
pub struct ChunkSet {
    pub directory: PathBuf,
    pub basename: String,
    /// Every matching file, ordered by index then width.
    parts: Vec<DiscoveredPart>,
}

impl ChunkSet {
    /// Lists the files of `directory` named `<basename>.part<NN>.zip`.
    ///
    /// # Errors
    ///
    /// Returns `PartsError::NotFound` if the directory does not exist, or
    /// `PartsError::IO` if it cannot be listed.
    pub fn discover(directory: &Path, basename: &str) -> PartsResult<Self> {
        if !directory.is_dir() {
            return Err(PartsError::NotFound(directory.to_path_buf()));
        }
        let mut parts = Vec::new();
        for entry in fs::read_dir(directory).map_err(PartsError::io_at(directory))? {
            let entry = entry.map_err(PartsError::io_at(directory))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(|n| PartName::parse(n, basename)) else {
                continue;
            };
            let path = entry.path();
            // Follows symlinks, like the existence checks of `missing`.
            let metadata = fs::metadata(&path).map_err(PartsError::io_at(&path))?;
            if !metadata.is_file() {
                continue;
            }
            log::debug!("Discovered part {} ({} bytes)", path.display(), metadata.len());
            parts.push(DiscoveredPart {
                name,
                path,
                size: metadata.len(),
            });
        }
        parts.sort_by_key(|part| (part.name.index, part.name.width));
        Ok(Self {
            directory: directory.to_path_buf(),
            basename: basename.into(),
            parts,
        })
    }

    pub fn parts(&self) -> &[DiscoveredPart] {
        &self.parts
    }

    /// Number of matching files, including duplicates of one index written
    /// with different widths.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Distinct padding widths seen in the directory.
    pub fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.parts.iter().map(|part| part.name.width).collect();
        widths.sort_unstable();
        widths.dedup();
        widths
    }

    /// Indices absent from the contiguous run `1..=expected`, found by
    /// rebuilding every expected file name padded to `width` and checking it
    /// individually.
    pub fn missing(&self, expected: u32, width: usize) -> Vec<u32> {
        (1..=expected)
            .filter(|&index| {
                !PartName::new(&self.basename, index, width)
                    .path_in(&self.directory)
                    .is_file()
            })
            .collect()
    }

    /// Indices not covered by `1..=highest present index`, for sets whose
    /// expected size is unknown.
    pub fn gaps(&self) -> Vec<u32> {
        let present: BTreeSet<u32> = self.parts.iter().map(|part| part.name.index).collect();
        let highest = present.last().copied().unwrap_or(0);
        (1..=highest).filter(|index| !present.contains(index)).collect()
    }

    /// Fails with `PartsError::IncompleteSet` unless exactly `expected` parts
    /// are present and they form the run `1..=expected` at `width`.
    pub fn ensure_complete(&self, expected: u32, width: usize) -> PartsResult<()> {
        let found = u32::try_from(self.len()).unwrap_or(u32::MAX);
        let missing = self.missing(expected, width);
        if found != expected || !missing.is_empty() {
            log::error!(
                "Expected {expected} parts of {}, found {found}, missing {missing:?}",
                self.basename
            );
            return Err(PartsError::IncompleteSet {
                expected,
                found,
                missing,
            });
        }
        Ok(())
    }

    /// Paths of the parts `1..=expected` padded to `width`, in index order.
    pub fn ordered_paths(&self, expected: u32, width: usize) -> Vec<PathBuf> {
        (1..=expected)
            .map(|index| PartName::new(&self.basename, index, width).path_in(&self.directory))
            .collect()
    }
}
