//! # Part File Naming
//!
//! Part file names are the only metadata persisted with every part, so the
//! convention has to stay bit-exact with existing sets:
//!
//! ```text
//! <basename>.part<NN>.zip
//! ```
//!
//! `<NN>` is the 1-based decimal index, left padded with zeros to the width of
//! the set (see [`index_width`](crate::common::index_width)). Ordering is
//! always done on the parsed numeric index, never on the file name.

use std::path::{Path, PathBuf};

use crate::common::{index_width, MANIFEST_SUFFIX, PART_INFIX, PART_SUFFIX};

/// Name of a single part file, split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartName {
    pub basename: String,
    pub index: u32,
    pub width: usize,
}

impl PartName {
    pub fn new(basename: &str, index: u32, width: usize) -> Self {
        Self {
            basename: basename.into(),
            index,
            width,
        }
    }

    /// Name of part `index` in a set of `count` parts.
    pub fn for_set(basename: &str, index: u32, count: u32) -> Self {
        Self::new(basename, index, index_width(count))
    }

    /// Parses `file_name` as a part of `basename`.
    ///
    /// Returns `None` for anything that is not `<basename>.part<digits>.zip`,
    /// including index zero.
    pub fn parse(file_name: &str, basename: &str) -> Option<Self> {
        let digits = file_name
            .strip_prefix(basename)?
            .strip_prefix(PART_INFIX)?
            .strip_suffix(PART_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index: u32 = digits.parse().ok()?;
        if index == 0 {
            return None;
        }
        Some(Self::new(basename, index, digits.len()))
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}{:0width$}{}",
            self.basename,
            PART_INFIX,
            self.index,
            PART_SUFFIX,
            width = self.width
        )
    }

    pub fn path_in(&self, directory: &Path) -> PathBuf {
        directory.join(self.file_name())
    }
}

/// Path of the manifest describing the parts of `basename`.
pub fn manifest_path(directory: &Path, basename: &str) -> PathBuf {
    directory.join(format!("{basename}{MANIFEST_SUFFIX}"))
}
