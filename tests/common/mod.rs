#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(&mut bytes[..]);
    bytes
}

pub fn write_source(directory: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = directory.join(name);
    fs::write(&path, bytes).expect("Failure writing the source file");
    path
}

pub fn leftover_temporaries(directory: &Path) -> Vec<PathBuf> {
    fs::read_dir(directory)
        .expect("Failure listing the directory")
        .map(|entry| entry.expect("Failure reading an entry").path())
        .filter(|path| path.to_string_lossy().ends_with(".partial"))
        .collect()
}
