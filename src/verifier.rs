use std::path::{Path, PathBuf};

use hex::ToHex;
use sha1::{Digest, Sha1};

use crate::chunk_set::ChunkSet;
use crate::common::{stream_file, PartsResult, COPY_BUFFER_SIZE};
use crate::manifest::Manifest;
use crate::part_name::{manifest_path, PartName};

/// A problem found while checking one part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartProblem {
    Missing { index: u32 },
    WrongSize { index: u32, expected: u64, actual: u64 },
    WrongDigest { index: u32, expected: String, actual: String },
    Unexpected { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub basename: String,
    pub parts: u32,
    pub problems: Vec<PartProblem>,
    /// `None` when parts were missing and the whole digest could not be computed.
    pub content_hash_matches: Option<bool>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty() && self.content_hash_matches != Some(false)
    }
}

/// Checks a part set against its manifest without writing anything
#[derive(Debug, Clone)]
pub struct Verifier {
    directory: PathBuf,
    basename: String,
}

impl Verifier {
    pub fn new(directory: &Path, basename: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            basename: basename.into(),
        }
    }

    pub fn verify(&self) -> PartsResult<VerifyReport> {
        let manifest = Manifest::load(&manifest_path(&self.directory, &self.basename))?;
        self.verify_against(&manifest)
    }

    pub fn verify_against(&self, manifest: &Manifest) -> PartsResult<VerifyReport> {
        let set = ChunkSet::discover(&self.directory, &self.basename)?;
        let mut problems = Vec::new();

        for part in set.parts() {
            if part.name.index > manifest.part_count || part.name.width != manifest.width {
                problems.push(PartProblem::Unexpected {
                    path: part.path.clone(),
                });
            }
        }

        let mut whole = Some(Sha1::new());
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        for index in 1..=manifest.part_count {
            let path =
                PartName::new(&self.basename, index, manifest.width).path_in(&self.directory);
            if !path.is_file() {
                log::warn!("Part {index} is missing: {}", path.display());
                problems.push(PartProblem::Missing { index });
                whole = None;
                continue;
            }
            let mut part = Sha1::new();
            let size = stream_file(&path, &mut buffer, |bytes| {
                part.update(bytes);
                if let Some(whole) = whole.as_mut() {
                    whole.update(bytes);
                }
                Ok(())
            })?;
            let digest: String = part.finalize().encode_hex();

            let Some(expected) = manifest.chunk(index) else {
                continue;
            };
            if size != expected.size {
                log::warn!("Part {index} has {size} bytes, expected {}", expected.size);
                problems.push(PartProblem::WrongSize {
                    index,
                    expected: expected.size,
                    actual: size,
                });
            }
            if !expected.content_hash.eq_ignore_ascii_case(&digest) {
                log::warn!("Part {index} digest {digest} differs from {}", expected.content_hash);
                problems.push(PartProblem::WrongDigest {
                    index,
                    expected: expected.content_hash.clone(),
                    actual: digest,
                });
            }
        }

        let content_hash_matches = whole
            .filter(|_| !manifest.content_hash.is_empty())
            .map(|hasher| {
                let digest: String = hasher.finalize().encode_hex();
                manifest.content_hash.eq_ignore_ascii_case(&digest)
            });
        log::info!(
            "Verified {} parts of {}: {} problems",
            manifest.part_count,
            self.basename,
            problems.len()
        );

        Ok(VerifyReport {
            basename: self.basename.clone(),
            parts: manifest.part_count,
            problems,
            content_hash_matches,
        })
    }
}
