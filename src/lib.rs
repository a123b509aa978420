//! Split large binaries into fixed-size parts and put them back together.
//!
//! Parts are named `<basename>.part<NN>.zip` and can be accompanied by a
//! `<basename>.parts` manifest holding SHA-1 digests of every part and of the
//! whole source.
//!
//! ```no_run
//! use std::path::Path;
//! use chunkparts::reassembler::Reassembler;
//! use chunkparts::splitter::Splitter;
//!
//! let report = Splitter::new(20 * 1024 * 1024)
//!     .split(Path::new("phi-2.Q4_K_M.gguf"), Path::new("outbox"))
//!     .unwrap();
//! println!("{} parts", report.part_count());
//!
//! Reassembler::new(Path::new("outbox"), "phi-2.Q4_K_M.gguf")
//!     .reassemble_with_manifest(Path::new("restored.gguf"))
//!     .unwrap();
//! ```

pub mod chunk_set;
pub mod common;
pub mod manifest;
pub mod part_name;
pub mod reassembler;
pub mod signed_file;
pub mod splitter;
pub mod verifier;
